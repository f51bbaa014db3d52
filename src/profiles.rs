use serde_json::Value;
use uuid::Uuid;

use crate::api::UpdateSettingsRequest;
use crate::error::{AppError, Result};
use crate::members::Member;
use crate::models::{Entity, UserProfile};
use crate::store::{self, to_record, EntityStore, Record};

pub const SUPPORTED_LANGUAGES: &[&str] = &["en", "ar"];

/// Profile synthesised for a member signing in for the first time.
pub fn new_profile_for(member: &Member) -> UserProfile {
    UserProfile {
        id: Uuid::new_v4().to_string(),
        user_id: Some(member.id.clone()),
        full_name: Some(member.display_name()),
        email: Some(member.login_email.clone()),
        phone_number: Some(member.primary_phone().unwrap_or_default().to_string()),
        language_preference: Some("en".to_string()),
        has_paid_access: Some(false),
        ..Default::default()
    }
}

/// Returns the member's profile, creating it on first use.
///
/// Existence check and insert are a single `create_unique` on `email`, so
/// concurrent first visits still end with one profile.
pub async fn ensure_profile(store: &dyn EntityStore, member: &Member) -> Result<UserProfile> {
    if member.login_email.trim().is_empty() {
        return Err(AppError::BadRequest("Member has no login email".to_string()));
    }
    let created = store
        .create_unique(UserProfile::COLLECTION, "email", to_record(&new_profile_for(member))?)
        .await?;
    if created.inserted {
        tracing::info!("Created profile for {}", member.login_email);
    }
    store::from_record(created.record)
}

pub async fn find_profile(store: &dyn EntityStore, email: &str) -> Result<Option<UserProfile>> {
    let email = email.trim().to_lowercase();
    Ok(store::fetch_all::<UserProfile>(store)
        .await?
        .into_iter()
        .find(|p| p.email.as_deref().map(|e| e.trim().to_lowercase()) == Some(email.clone())))
}

pub async fn update_settings(
    store: &dyn EntityStore,
    member: &Member,
    settings: &UpdateSettingsRequest,
) -> Result<UserProfile> {
    let language = settings.language_preference.trim();
    if !SUPPORTED_LANGUAGES.contains(&language) {
        return Err(AppError::BadRequest(format!("Unsupported language {}", language)));
    }
    if settings.full_name.trim().is_empty() {
        return Err(AppError::BadRequest("Full name is required".to_string()));
    }

    let profile = ensure_profile(store, member).await?;

    let mut fields = Record::new();
    fields.insert("fullName".to_string(), Value::String(settings.full_name.trim().to_string()));
    fields.insert("phoneNumber".to_string(), Value::String(settings.phone_number.trim().to_string()));
    fields.insert("languagePreference".to_string(), Value::String(language.to_string()));
    store::patch::<UserProfile>(store, &profile.id, fields).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::members::MemberContact;
    use crate::store::MemoryStore;

    fn member(email: &str) -> Member {
        Member {
            id: "member-1".to_string(),
            login_email: email.to_string(),
            contact: MemberContact {
                first_name: Some("Sara".to_string()),
                last_name: Some("Khan".to_string()),
                phones: vec!["+971 4 000 0000".to_string()],
            },
            nickname: None,
        }
    }

    #[tokio::test]
    async fn first_visit_creates_exactly_one_profile() {
        let store = MemoryStore::new();
        let m = member("sara@example.com");

        let created = ensure_profile(&store, &m).await.unwrap();
        let again = ensure_profile(&store, &m).await.unwrap();

        assert_eq!(created.id, again.id);
        assert_eq!(created.full_name.as_deref(), Some("Sara Khan"));
        assert_eq!(created.user_id.as_deref(), Some("member-1"));
        assert_eq!(created.phone_number.as_deref(), Some("+971 4 000 0000"));
        assert_eq!(created.language_preference.as_deref(), Some("en"));
        assert_eq!(created.has_paid_access, Some(false));
        assert_eq!(store::fetch_all::<UserProfile>(&store).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn concurrent_first_visits_still_yield_one_profile() {
        let store = MemoryStore::new();
        let m = member("twotabs@example.com");

        let (a, b) = tokio::join!(ensure_profile(&store, &m), ensure_profile(&store, &m));
        assert_eq!(a.unwrap().id, b.unwrap().id);

        let profiles = store::fetch_all::<UserProfile>(&store).await.unwrap();
        assert_eq!(profiles.len(), 1);
    }

    #[tokio::test]
    async fn settings_update_validates_language() {
        let store = MemoryStore::new();
        let m = member("sara@example.com");

        let bad = UpdateSettingsRequest {
            full_name: "Sara K".to_string(),
            phone_number: "".to_string(),
            language_preference: "fr".to_string(),
        };
        assert!(matches!(update_settings(&store, &m, &bad).await, Err(AppError::BadRequest(_))));

        let good = UpdateSettingsRequest {
            language_preference: "ar".to_string(),
            ..bad
        };
        let updated = update_settings(&store, &m, &good).await.unwrap();
        assert_eq!(updated.full_name.as_deref(), Some("Sara K"));
        assert_eq!(updated.language_preference.as_deref(), Some("ar"));

        let found = find_profile(&store, "SARA@example.com").await.unwrap().unwrap();
        assert_eq!(found.id, updated.id);
    }
}
