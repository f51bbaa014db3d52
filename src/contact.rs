use chrono::Utc;
use email_address::EmailAddress;
use uuid::Uuid;

use crate::api::ContactForm;
use crate::config::SmtpConfig;
use crate::email_sender::send_custom_email;
use crate::error::{AppError, Result, TraceErr};
use crate::models::ContactSubmission;
use crate::store::{self, EntityStore};

fn validate(form: &ContactForm) -> Result<()> {
    if form.name.trim().is_empty() {
        return Err(AppError::BadRequest("Name is required".to_string()));
    }
    if !EmailAddress::is_valid(form.email.trim()) {
        return Err(AppError::BadRequest("A valid email is required".to_string()));
    }
    if form.message.trim().is_empty() {
        return Err(AppError::BadRequest("Message is required".to_string()));
    }
    Ok(())
}

pub fn notification_html(submission: &ContactSubmission) -> String {
    let field = |value: &Option<String>| ammonia::clean_text(value.as_deref().unwrap_or_default());
    format!(
        "<html><body><h2>New contact message</h2>\
         <p><strong>Name:</strong> {}</p>\
         <p><strong>Email:</strong> {}</p>\
         <p><strong>Phone:</strong> {}</p>\
         <p>{}</p></body></html>",
        field(&submission.submitter_name),
        field(&submission.submitter_email),
        field(&submission.submitter_phone),
        field(&submission.message_content),
    )
}

/// Stores the submission and, with SMTP configured, mails the inbox in the background.
pub async fn submit(store: &dyn EntityStore, smtp: Option<&SmtpConfig>, form: &ContactForm) -> Result<ContactSubmission> {
    validate(form)?;

    let submission = ContactSubmission {
        id: Uuid::new_v4().to_string(),
        submitter_name: Some(form.name.trim().to_string()),
        submitter_email: Some(form.email.trim().to_string()),
        submitter_phone: form.phone.as_deref().map(str::trim).filter(|p| !p.is_empty()).map(str::to_string),
        message_content: Some(form.message.trim().to_string()),
        submission_date: Some(Utc::now()),
        ..Default::default()
    };
    let stored = store::insert(store, &submission).await?;
    tracing::info!("Stored contact submission {}", stored.id);

    if let Some(smtp) = smtp.cloned() {
        let html = notification_html(&stored);
        let subject = format!("Contact form: {}", form.name.trim());
        tokio::spawn(async move {
            if let Ok(false) = send_custom_email(&smtp, &smtp.inbox, &html, &subject).await.trace() {
                tracing::warn!("Contact notification was not delivered");
            }
        });
    }
    Ok(stored)
}
