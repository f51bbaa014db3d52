use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Named collections held by the entity store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Courses,
    Services,
    Bookings,
    BlogPosts,
    UserProfiles,
    ContactSubmissions,
    AdminAccounts,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Courses => "courses",
            Collection::Services => "services",
            Collection::Bookings => "bookings",
            Collection::BlogPosts => "blogposts",
            Collection::UserProfiles => "userprofiles",
            Collection::ContactSubmissions => "contactsubmissions",
            Collection::AdminAccounts => "adminaccounts",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed record stored in one collection.
pub trait Entity: Serialize + for<'de> Deserialize<'de> + Send + Sync {
    const COLLECTION: Collection;

    fn id(&self) -> &str;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_createdDate", default, skip_serializing_if = "Option::is_none")]
    pub created_date: Option<DateTime<Utc>>,
    #[serde(rename = "_updatedDate", default, skip_serializing_if = "Option::is_none")]
    pub updated_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_published: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_lesson_urls: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_material_urls: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quiz_ids: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_duration: Option<String>,
}

impl Entity for Course {
    const COLLECTION: Collection = Collection::Courses;
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_createdDate", default, skip_serializing_if = "Option::is_none")]
    pub created_date: Option<DateTime<Utc>>,
    #[serde(rename = "_updatedDate", default, skip_serializing_if = "Option::is_none")]
    pub updated_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_available: Option<bool>,
}

impl Entity for Service {
    const COLLECTION: Collection = Collection::Services;
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_createdDate", default, skip_serializing_if = "Option::is_none")]
    pub created_date: Option<DateTime<Utc>>,
    #[serde(rename = "_updatedDate", default, skip_serializing_if = "Option::is_none")]
    pub updated_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booked_item_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booked_item_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_contact_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_owner_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_history: Option<String>,
}

impl Entity for BookingRequest {
    const COLLECTION: Collection = Collection::Bookings;
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_createdDate", default, skip_serializing_if = "Option::is_none")]
    pub created_date: Option<DateTime<Utc>>,
    #[serde(rename = "_updatedDate", default, skip_serializing_if = "Option::is_none")]
    pub updated_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_preference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_paid_access: Option<bool>,
}

impl Entity for UserProfile {
    const COLLECTION: Collection = Collection::UserProfiles;
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlogPost {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_createdDate", default, skip_serializing_if = "Option::is_none")]
    pub created_date: Option<DateTime<Utc>>,
    #[serde(rename = "_updatedDate", default, skip_serializing_if = "Option::is_none")]
    pub updated_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_published: Option<bool>,
}

impl Entity for BlogPost {
    const COLLECTION: Collection = Collection::BlogPosts;
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactSubmission {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_createdDate", default, skip_serializing_if = "Option::is_none")]
    pub created_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitter_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitter_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitter_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submission_date: Option<DateTime<Utc>>,
}

impl Entity for ContactSubmission {
    const COLLECTION: Collection = Collection::ContactSubmissions;
    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminAccount {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_createdDate", default, skip_serializing_if = "Option::is_none")]
    pub created_date: Option<DateTime<Utc>>,
    #[serde(rename = "_updatedDate", default, skip_serializing_if = "Option::is_none")]
    pub updated_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login: Option<DateTime<Utc>>,
}

impl Entity for AdminAccount {
    const COLLECTION: Collection = Collection::AdminAccounts;
    fn id(&self) -> &str {
        &self.id
    }
}

pub const ROLE_ADMIN: &str = "admin";

pub const STATUS_PENDING: &str = "pending";
pub const STATUS_IN_PROGRESS: &str = "in progress";
pub const STATUS_COMPLETED: &str = "completed";

/// Interpretation of the free-text `status` field of a booking.
///
/// Storage never constrains the value, so anything outside the three known
/// states is kept as `Unrecognized` rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingStatus {
    Pending,
    InProgress,
    Completed,
    Unrecognized(String),
}

impl BookingStatus {
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return BookingStatus::Pending;
        };
        if raw.is_empty() {
            return BookingStatus::Pending;
        }
        match raw.to_lowercase().as_str() {
            STATUS_PENDING => BookingStatus::Pending,
            STATUS_IN_PROGRESS => BookingStatus::InProgress,
            STATUS_COMPLETED => BookingStatus::Completed,
            _ => BookingStatus::Unrecognized(raw.to_string()),
        }
    }

    /// Value written to storage for the known states.
    pub fn as_stored(&self) -> &str {
        match self {
            BookingStatus::Pending => STATUS_PENDING,
            BookingStatus::InProgress => STATUS_IN_PROGRESS,
            BookingStatus::Completed => STATUS_COMPLETED,
            BookingStatus::Unrecognized(raw) => raw,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BookingStatus::InProgress => "In Progress",
            BookingStatus::Completed => "Completed",
            BookingStatus::Pending | BookingStatus::Unrecognized(_) => "Pending",
        }
    }

    pub fn icon(&self) -> &'static str {
        match self {
            BookingStatus::Completed => "check-circle",
            BookingStatus::InProgress => "clock",
            BookingStatus::Pending | BookingStatus::Unrecognized(_) => "alert-circle",
        }
    }
}

/// Kind of catalogue item a booking refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookedItemType {
    Course,
    Service,
}

impl BookedItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookedItemType::Course => "course",
            BookedItemType::Service => "service",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_and_empty_status_read_as_pending() {
        assert_eq!(BookingStatus::parse(None), BookingStatus::Pending);
        assert_eq!(BookingStatus::parse(Some("")), BookingStatus::Pending);
        assert_eq!(BookingStatus::parse(None).label(), "Pending");
        assert_eq!(BookingStatus::parse(None).icon(), "alert-circle");
    }

    #[test]
    fn status_parsing_ignores_case() {
        assert_eq!(BookingStatus::parse(Some("In Progress")), BookingStatus::InProgress);
        assert_eq!(BookingStatus::parse(Some("COMPLETED")), BookingStatus::Completed);
        assert_eq!(BookingStatus::parse(Some("Completed")).icon(), "check-circle");
    }

    #[test]
    fn unrecognized_status_displays_as_pending() {
        let status = BookingStatus::parse(Some("on hold"));
        assert_eq!(status, BookingStatus::Unrecognized("on hold".to_string()));
        assert_eq!(status.label(), "Pending");
        assert_eq!(status.icon(), "alert-circle");
        assert_eq!(status.as_stored(), "on hold");
    }

    #[test]
    fn records_use_store_field_names() {
        let booking = BookingRequest {
            id: "b1".to_string(),
            admin_owner_id: Some("a1".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&booking).unwrap();
        assert_eq!(json["_id"], "b1");
        assert_eq!(json["adminOwnerId"], "a1");
        assert!(json.get("status").is_none());
    }
}
