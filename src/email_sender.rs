// email_sender.rs
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::error::Error;
use tracing::{error, info};

use crate::config::SmtpConfig;

/// Sends an HTML mail from the configured SMTP account to `receiver_email`.
///
/// `Ok(false)` means the relay rejected the message; the failure is already logged.
pub async fn send_custom_email(
    smtp: &SmtpConfig,
    receiver_email: &str,
    html: &str,
    subject: &str,
) -> Result<bool, Box<dyn Error + Send + Sync>> {
    let sender: Mailbox = smtp.user.parse()?;
    let receiver: Mailbox = receiver_email.parse()?;

    let email = Message::builder()
        .from(sender)
        .to(receiver)
        .subject(subject)
        .header(ContentType::TEXT_HTML)
        .body(html.to_string())?;

    info!("Attempting SMTP connection to {} on port {}", smtp.host, smtp.port);
    let creds = Credentials::new(smtp.user.clone(), smtp.password.clone());
    let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp.host)?
        .credentials(creds)
        .port(smtp.port)
        .build();

    match mailer.send(email).await {
        Ok(_) => {
            info!("Email '{}' sent to {}", subject, receiver_email);
            Ok(true)
        }
        Err(e) => {
            error!("SMTP delivery via {} failed: {}", smtp.host, e);
            Ok(false)
        }
    }
}
