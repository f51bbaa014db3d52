use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::{AppConfig, SmtpConfig};
use crate::db::{hash_password, verify_password};
use crate::error::{AppError, Result};
use crate::members::{new_token, MemberProvider};
use crate::models::{AdminAccount, Entity, ROLE_ADMIN};
use crate::store::{self, to_record, EntityStore, Record};

/// The admin acting on a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminIdentity {
    pub admin_id: String,
    pub email: String,
    pub role: String,
}

#[derive(Debug, Clone)]
struct AdminSession {
    identity: AdminIdentity,
    expires_at: DateTime<Utc>,
}

/// Shared application state handed to every handler.
pub struct StoreStateManager {
    pub store: Arc<dyn EntityStore>,
    pub members: Arc<dyn MemberProvider>,
    pub display_timezone: Tz,
    pub smtp: Option<SmtpConfig>,
    admin_session_hours: i64,
    admin_sessions: DashMap<String, AdminSession>,
}

impl StoreStateManager {
    pub fn new(store: Arc<dyn EntityStore>, members: Arc<dyn MemberProvider>) -> Self {
        Self {
            store,
            members,
            display_timezone: Tz::UTC,
            smtp: None,
            admin_session_hours: 12,
            admin_sessions: DashMap::new(),
        }
    }

    pub fn with_config(mut self, config: &AppConfig) -> Self {
        self.display_timezone = config.display_timezone;
        self.smtp = config.smtp.clone();
        self.admin_session_hours = config.admin_session_hours;
        self
    }

    pub fn store(&self) -> &dyn EntityStore {
        self.store.as_ref()
    }

    pub fn admin_session_hours(&self) -> i64 {
        self.admin_session_hours
    }

    /// Creates the configured admin account unless one with that email already exists.
    pub async fn seed_admin(&self, email: &str, password: &str) -> Result<AdminAccount> {
        let account = AdminAccount {
            id: Uuid::new_v4().to_string(),
            email: Some(email.trim().to_lowercase()),
            password_hash: Some(hash_password(password)?),
            full_name: Some("Site Admin".to_string()),
            role: Some(ROLE_ADMIN.to_string()),
            is_active: Some(true),
            ..Default::default()
        };

        let created = self.store
            .create_unique(AdminAccount::COLLECTION, "email", to_record(&account)?)
            .await?;
        if created.inserted {
            tracing::info!("Seeded admin account {}", email);
        }
        store::from_record(created.record)
    }

    /// Seeds the configured admin when a password is configured; otherwise
    /// only accounts already in the store can log in.
    pub async fn seed_configured_admin(&self, email: &str, password: Option<&str>) -> Result<Option<AdminAccount>> {
        match password {
            Some(password) => self.seed_admin(email, password).await.map(Some),
            None => {
                tracing::warn!("Skipping admin seed for {}: no password configured", email);
                Ok(None)
            }
        }
    }

    pub async fn authenticate_admin(&self, email: &str, password: &str) -> Result<(AdminIdentity, String)> {
        let email = email.trim().to_lowercase();
        let account = store::fetch_all::<AdminAccount>(self.store())
            .await?
            .into_iter()
            .find(|account| account.email.as_deref().map(str::to_lowercase).as_deref() == Some(email.as_str()))
            .ok_or_else(|| AppError::Unauthorized("Invalid credentials".to_string()))?;

        if account.is_active != Some(true) {
            tracing::warn!("Login attempt for inactive admin {}", email);
            return Err(AppError::Unauthorized("Invalid credentials".to_string()));
        }
        let hash = account.password_hash.as_deref().unwrap_or_default();
        if hash.is_empty() || !verify_password(password, hash)? {
            return Err(AppError::Unauthorized("Invalid credentials".to_string()));
        }

        let mut last_login = Record::new();
        last_login.insert("lastLogin".to_string(), Value::String(Utc::now().to_rfc3339()));
        store::patch::<AdminAccount>(self.store(), &account.id, last_login).await?;

        let identity = AdminIdentity {
            admin_id: account.id,
            email,
            role: account.role.unwrap_or_else(|| ROLE_ADMIN.to_string()),
        };
        let now = Utc::now();
        self.admin_sessions.retain(|_, session| session.expires_at > now);

        let token = new_token();
        self.admin_sessions.insert(
            token.clone(),
            AdminSession {
                identity: identity.clone(),
                expires_at: now + Duration::hours(self.admin_session_hours),
            },
        );
        Ok((identity, token))
    }

    pub fn verify_admin_session(&self, token: &str) -> Option<AdminIdentity> {
        let session = self.admin_sessions.get(token)?.value().clone();
        if session.expires_at < Utc::now() {
            self.admin_sessions.remove(token);
            tracing::debug!("Admin session for {} expired", session.identity.email);
            return None;
        }
        Some(session.identity)
    }

    pub fn invalidate_admin_session(&self, token: &str) {
        self.admin_sessions.remove(token);
    }
}
