//! Booking lifecycle: pending → in progress → completed.
//!
//! Status stays free text in storage. Transitions are admin actions; the first
//! admin to act on a booking becomes its owner and later transitions by any
//! other admin are refused.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde_json::Value;
use std::cmp::Reverse;
use uuid::Uuid;

use crate::api::{AdminStats, BookingView, CreateBookingRequest};
use crate::error::{AppError, Result};
use crate::models::{
    BookedItemType, BookingRequest, BookingStatus, Course, Entity, Service, UserProfile, STATUS_COMPLETED,
    STATUS_IN_PROGRESS, STATUS_PENDING,
};
use crate::state::AdminIdentity;
use crate::store::{self, from_record, CasOutcome, EntityStore, Record};

const OWNER_FIELD: &str = "adminOwnerId";

// Older records carry this instead of a real admin id.
const LEGACY_PLACEHOLDER_OWNER: &str = "current-admin-id";

const DISPLAY_FORMAT: &str = "%b %d, %Y %H:%M";

const MAX_TRANSITION_ATTEMPTS: usize = 4;

/// Filter tabs of the admin bookings view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusFilter {
    All,
    Only(BookingStatus),
}

impl StatusFilter {
    pub fn parse(raw: Option<&str>) -> Result<Self> {
        let raw = raw.map(|s| s.trim().to_lowercase()).unwrap_or_default();
        match raw.as_str() {
            "" | "all" => Ok(StatusFilter::All),
            STATUS_PENDING => Ok(StatusFilter::Only(BookingStatus::Pending)),
            STATUS_IN_PROGRESS => Ok(StatusFilter::Only(BookingStatus::InProgress)),
            STATUS_COMPLETED => Ok(StatusFilter::Only(BookingStatus::Completed)),
            other => Err(AppError::BadRequest(format!("Unknown status filter {}", other))),
        }
    }

    pub fn matches(&self, booking: &BookingRequest) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(status) => BookingStatus::parse(booking.status.as_deref()) == *status,
        }
    }
}

/// Newest request first; bookings without a request date go last.
pub fn sort_newest_first(bookings: &mut [BookingRequest]) {
    // Reverse(None) sorts after every Reverse(Some(_))
    bookings.sort_by_key(|b| Reverse(b.request_date));
}

/// Actions an admin is offered for a stored status.
///
/// Compares the raw value exactly, so "In Progress" still offers "start".
pub fn available_actions(status: Option<&str>) -> Vec<&'static str> {
    let mut actions = Vec::new();
    if status != Some(STATUS_IN_PROGRESS) {
        actions.push("start");
    }
    if status != Some(STATUS_COMPLETED) {
        actions.push("complete");
    }
    actions
}

pub fn format_display_time(when: DateTime<Utc>, tz: Tz) -> String {
    when.with_timezone(&tz).format(DISPLAY_FORMAT).to_string()
}

pub fn view(booking: BookingRequest, tz: Tz) -> BookingView {
    let status = BookingStatus::parse(booking.status.as_deref());
    BookingView {
        status_label: status.label().to_string(),
        status_icon: status.icon().to_string(),
        request_date_display: booking.request_date.map(|d| format_display_time(d, tz)),
        actions: available_actions(booking.status.as_deref())
            .into_iter()
            .map(str::to_string)
            .collect(),
        booking,
    }
}

fn append_history(history: Option<&str>, line: String) -> String {
    match history {
        Some(previous) if !previous.trim().is_empty() => format!("{}\n{}", previous, line),
        _ => line,
    }
}

fn is_unclaimed(owner: &str) -> bool {
    owner.is_empty() || owner == LEGACY_PLACEHOLDER_OWNER
}

pub struct BookingWorkflow<'a> {
    store: &'a dyn EntityStore,
    tz: Tz,
}

impl<'a> BookingWorkflow<'a> {
    pub fn new(store: &'a dyn EntityStore, tz: Tz) -> Self {
        Self { store, tz }
    }

    pub async fn get(&self, id: &str) -> Result<BookingRequest> {
        store::fetch::<BookingRequest>(self.store, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Booking {} not found", id)))
    }

    pub async fn list_for_admin(&self, filter: &StatusFilter) -> Result<Vec<BookingRequest>> {
        let mut bookings: Vec<BookingRequest> = store::fetch_all::<BookingRequest>(self.store)
            .await?
            .into_iter()
            .filter(|b| filter.matches(b))
            .collect();
        sort_newest_first(&mut bookings);
        Ok(bookings)
    }

    pub async fn list_for_user(&self, user_id: &str) -> Result<Vec<BookingRequest>> {
        let mut bookings: Vec<BookingRequest> = store::fetch_all::<BookingRequest>(self.store)
            .await?
            .into_iter()
            .filter(|b| b.user_id.as_deref() == Some(user_id))
            .collect();
        sort_newest_first(&mut bookings);
        Ok(bookings)
    }

    pub async fn start(&self, id: &str, admin: &AdminIdentity) -> Result<BookingRequest> {
        self.transition(id, admin, BookingStatus::InProgress).await
    }

    pub async fn complete(&self, id: &str, admin: &AdminIdentity) -> Result<BookingRequest> {
        self.transition(id, admin, BookingStatus::Completed).await
    }

    fn transition_fields(&self, target: &BookingStatus, admin: &AdminIdentity, history: Option<&str>) -> Record {
        let line = format!(
            "{}: {} by {}",
            format_display_time(Utc::now(), self.tz),
            target.as_stored(),
            admin.email
        );
        let mut fields = Record::new();
        fields.insert("status".to_string(), Value::String(target.as_stored().to_string()));
        fields.insert(OWNER_FIELD.to_string(), Value::String(admin.admin_id.clone()));
        fields.insert("taskHistory".to_string(), Value::String(append_history(history, line)));
        fields
    }

    /// Writes `target` while claiming or holding ownership of the booking.
    ///
    /// The history line is appended to the record the store actually
    /// replaces, so concurrent transitions by the owner never drop a line.
    async fn transition(&self, id: &str, admin: &AdminIdentity, target: BookingStatus) -> Result<BookingRequest> {
        let booking = self.get(id).await?;
        let mut expected = booking.admin_owner_id.map(Value::String);
        let stamp = |current: &Record| {
            self.transition_fields(&target, admin, current.get("taskHistory").and_then(Value::as_str))
        };

        for _ in 0..MAX_TRANSITION_ATTEMPTS {
            if let Some(owner) = expected.as_ref().and_then(Value::as_str) {
                if owner != admin.admin_id && !is_unclaimed(owner) {
                    tracing::warn!("Admin {} refused on booking {} owned by {}", admin.email, id, owner);
                    return Err(AppError::Conflict(format!("Booking {} is already handled by {}", id, owner)));
                }
            }

            let outcome = self.store
                .compare_and_set(BookingRequest::COLLECTION, id, OWNER_FIELD, expected.as_ref(), &stamp)
                .await?;
            match outcome {
                CasOutcome::Applied(record) => {
                    let updated: BookingRequest = from_record(record)?;
                    tracing::info!("Booking {} set to {} by {}", id, target.as_stored(), admin.email);
                    return Ok(updated);
                }
                CasOutcome::Mismatch(record) => {
                    let current: BookingRequest = from_record(record)?;
                    expected = current.admin_owner_id.map(Value::String);
                }
            }
        }

        Err(AppError::Conflict(format!("Booking {} is being modified concurrently", id)))
    }

    /// Files a pending booking for a published course or an available service.
    pub async fn request(&self, profile: &UserProfile, request: &CreateBookingRequest) -> Result<BookingRequest> {
        let user_id = profile
            .user_id
            .clone()
            .ok_or_else(|| AppError::Internal(format!("Profile {} has no userId", profile.id)))?;

        let item_name = match request.item_type {
            BookedItemType::Course => {
                let course = store::fetch::<Course>(self.store, &request.item_id)
                    .await?
                    .filter(|c| c.is_published == Some(true))
                    .ok_or_else(|| AppError::NotFound("Course not available".to_string()))?;
                course.course_name.unwrap_or_else(|| "Untitled course".to_string())
            }
            BookedItemType::Service => {
                let service = store::fetch::<Service>(self.store, &request.item_id)
                    .await?
                    .filter(|s| s.is_available == Some(true))
                    .ok_or_else(|| AppError::NotFound("Service not available".to_string()))?;
                service.service_name.unwrap_or_else(|| "Untitled service".to_string())
            }
        };

        let phone = request
            .contact_phone
            .clone()
            .filter(|p| !p.trim().is_empty())
            .or_else(|| profile.phone_number.clone())
            .filter(|p| !p.trim().is_empty());

        let booking = BookingRequest {
            id: Uuid::new_v4().to_string(),
            user_id: Some(user_id),
            booked_item_name: Some(item_name),
            booked_item_type: Some(request.item_type.as_str().to_string()),
            user_contact_phone: phone,
            request_date: Some(Utc::now()),
            status: Some(STATUS_PENDING.to_string()),
            ..Default::default()
        };
        let created = store::insert(self.store, &booking).await?;
        tracing::info!("Booking {} requested for {}", created.id, created.booked_item_name.as_deref().unwrap_or_default());
        Ok(created)
    }

    pub async fn stats(&self) -> Result<AdminStats> {
        let (courses, services, bookings) = futures::try_join!(
            store::fetch_all::<Course>(self.store),
            store::fetch_all::<Service>(self.store),
            store::fetch_all::<BookingRequest>(self.store),
        )?;
        let pending = StatusFilter::Only(BookingStatus::Pending);

        Ok(AdminStats {
            courses: courses.len(),
            services: services.len(),
            bookings: bookings.len(),
            pending_bookings: bookings.iter().filter(|b| pending.matches(b)).count(),
        })
    }
}
