use async_trait::async_trait;
use dashmap::DashMap;
use rand::{distributions::Alphanumeric, Rng};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::MembersApiConfig;
use crate::db::{hash_password, verify_password};
use crate::error::{AppError, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberContact {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(default)]
    pub phones: Vec<String>,
}

/// Identity of a signed-in member as reported by the member provider.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: String,
    pub login_email: String,
    #[serde(default)]
    pub contact: MemberContact,
    pub nickname: Option<String>,
}

impl Member {
    /// "First Last" when both names are known, else the nickname, else "User".
    pub fn display_name(&self) -> String {
        match (&self.contact.first_name, &self.contact.last_name) {
            (Some(first), Some(last)) if !first.is_empty() && !last.is_empty() => format!("{} {}", first, last),
            _ => self
                .nickname
                .clone()
                .filter(|nickname| !nickname.is_empty())
                .unwrap_or_else(|| "User".to_string()),
        }
    }

    pub fn primary_phone(&self) -> Option<&str> {
        self.contact.phones.first().map(String::as_str)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberSession {
    pub token: String,
    pub member: Member,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
}

/// External member/authentication provider.
///
/// Credentials and sessions live with the provider; the site only ever holds
/// the opaque session token.
#[async_trait]
pub trait MemberProvider: Send + Sync {
    /// `Ok(None)` for unknown or expired tokens.
    async fn resolve(&self, token: &str) -> Result<Option<Member>>;

    async fn login(&self, email: &str, password: &str) -> Result<MemberSession>;

    async fn logout(&self, token: &str) -> Result<()>;

    async fn register(&self, registration: Registration) -> Result<Member>;

    async fn request_password_reset(&self, email: &str) -> Result<()>;
}


/// Client for the hosted member API.
pub struct RemoteMemberProvider {
    pub client: reqwest::Client,
    pub base_url: String,
    api_key: String,
}

impl RemoteMemberProvider {
    pub fn new(config: &MembersApiConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.clone(),
            api_key: config.api_key.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        tracing::warn!("Member API returned {}: {}", status, body);
        match status.as_u16() {
            400 | 422 => Err(AppError::BadRequest("Request rejected by member service".to_string())),
            401 | 403 => Err(AppError::Unauthorized("Invalid credentials".to_string())),
            409 => Err(AppError::Conflict("Email already registered".to_string())),
            _ => Err(AppError::Upstream(format!("member API status {}", status))),
        }
    }
}

#[async_trait]
impl MemberProvider for RemoteMemberProvider {
    async fn resolve(&self, token: &str) -> Result<Option<Member>> {
        let response = self.client
            .get(self.url("/sessions/current"))
            .bearer_auth(&self.api_key)
            .header("X-Member-Token", token)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED || response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let member = Self::check(response).await?.json::<Member>().await?;
        Ok(Some(member))
    }

    async fn login(&self, email: &str, password: &str) -> Result<MemberSession> {
        let response = self.client
            .post(self.url("/sessions"))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;

        Ok(Self::check(response).await?.json::<MemberSession>().await?)
    }

    async fn logout(&self, token: &str) -> Result<()> {
        let response = self.client
            .delete(self.url("/sessions/current"))
            .bearer_auth(&self.api_key)
            .header("X-Member-Token", token)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn register(&self, registration: Registration) -> Result<Member> {
        let response = self.client
            .post(self.url("/members"))
            .bearer_auth(&self.api_key)
            .json(&registration)
            .send()
            .await?;

        Ok(Self::check(response).await?.json::<Member>().await?)
    }

    async fn request_password_reset(&self, email: &str) -> Result<()> {
        let response = self.client
            .post(self.url("/password-resets"))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "email": email }))
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}


/// In-process provider used for local development and tests.
#[derive(Default)]
pub struct StaticMemberProvider {
    // login email (lowercased) -> (member, argon2 hash)
    accounts: DashMap<String, (Member, String)>,
    sessions: DashMap<String, Member>,
}

impl StaticMemberProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a session without a password check.
    pub fn issue_session(&self, member: Member) -> String {
        let token = new_token();
        self.sessions.insert(token.clone(), member);
        token
    }
}

pub(crate) fn new_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect()
}

#[async_trait]
impl MemberProvider for StaticMemberProvider {
    async fn resolve(&self, token: &str) -> Result<Option<Member>> {
        Ok(self.sessions.get(token).map(|member| member.value().clone()))
    }

    async fn login(&self, email: &str, password: &str) -> Result<MemberSession> {
        let (member, hash) = self.accounts
            .get(&email.trim().to_lowercase())
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::Unauthorized("Invalid credentials".to_string()))?;

        if !verify_password(password, &hash)? {
            return Err(AppError::Unauthorized("Invalid credentials".to_string()));
        }
        let token = self.issue_session(member.clone());
        Ok(MemberSession { token, member })
    }

    async fn logout(&self, token: &str) -> Result<()> {
        self.sessions.remove(token);
        Ok(())
    }

    async fn register(&self, registration: Registration) -> Result<Member> {
        let email = registration.email.trim().to_lowercase();
        let member = Member {
            id: Uuid::new_v4().to_string(),
            login_email: email.clone(),
            contact: MemberContact {
                first_name: registration.first_name,
                last_name: registration.last_name,
                phones: registration.phone.into_iter().filter(|p| !p.is_empty()).collect(),
            },
            nickname: None,
        };
        let hash = hash_password(&registration.password)?;

        match self.accounts.entry(email) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(AppError::Conflict("Email already registered".to_string()))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert((member.clone(), hash));
                Ok(member)
            }
        }
    }

    async fn request_password_reset(&self, email: &str) -> Result<()> {
        // No mail goes out locally; unknown addresses are not revealed either way.
        tracing::info!(
            "Password reset requested for {} (known: {})",
            email,
            self.accounts.contains_key(&email.trim().to_lowercase())
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_prefers_full_contact_name() {
        let mut member = Member {
            id: "m1".to_string(),
            login_email: "m@example.com".to_string(),
            contact: MemberContact {
                first_name: Some("Ada".to_string()),
                last_name: Some("Lovelace".to_string()),
                phones: vec![],
            },
            nickname: Some("ada".to_string()),
        };
        assert_eq!(member.display_name(), "Ada Lovelace");

        member.contact.last_name = None;
        assert_eq!(member.display_name(), "ada");

        member.nickname = None;
        assert_eq!(member.display_name(), "User");
    }

    #[tokio::test]
    async fn static_provider_login_cycle() {
        let provider = StaticMemberProvider::new();
        let member = provider
            .register(Registration {
                email: "Student@Example.com".to_string(),
                password: "s3cret".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(member.login_email, "student@example.com");

        assert!(matches!(
            provider.login("student@example.com", "wrong").await,
            Err(AppError::Unauthorized(_))
        ));

        let session = provider.login("student@example.com", "s3cret").await.unwrap();
        assert_eq!(provider.resolve(&session.token).await.unwrap(), Some(member));

        provider.logout(&session.token).await.unwrap();
        assert_eq!(provider.resolve(&session.token).await.unwrap(), None);
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts() {
        let provider = StaticMemberProvider::new();
        let registration = Registration {
            email: "dup@example.com".to_string(),
            password: "pw".to_string(),
            ..Default::default()
        };
        provider.register(registration.clone()).await.unwrap();
        assert!(matches!(provider.register(registration).await, Err(AppError::Conflict(_))));
    }
}
