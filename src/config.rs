use chrono_tz::Tz;
use std::{env, fmt::Display, str::FromStr};
use tracing::{info, warn};

use crate::error::{AppError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Scylla(ScyllaConfig),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScyllaConfig {
    pub nodes: Vec<String>,
    pub user: String,
    pub password: String,
    pub keyspace: String,
    pub schema_path: String,
    pub schema_version: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembersApiConfig {
    pub base_url: String,
    pub api_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub inbox: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub log_level: tracing::Level,
    pub store: StoreBackend,
    /// `None` selects the in-process member provider.
    pub members_api: Option<MembersApiConfig>,
    pub admin_email: String,
    /// No admin account is seeded without one.
    pub admin_password: Option<String>,
    pub admin_session_hours: i64,
    pub display_timezone: Tz,
    pub seed_defaults: bool,
    pub template_dir: String,
    pub smtp: Option<SmtpConfig>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let store = match try_load::<String>("STORE_BACKEND", "memory")?.as_str() {
            "memory" => StoreBackend::Memory,
            "scylla" => StoreBackend::Scylla(ScyllaConfig {
                nodes: try_load::<String>("SCYLLA_NODES", "127.0.0.1:9042")?
                    .split(',')
                    .map(|node| node.trim().to_string())
                    .filter(|node| !node.is_empty())
                    .collect(),
                user: try_load("SCYLLA_USER", "cassandra")?,
                password: try_load("SCYLLA_PASSWORD", "cassandra")?,
                keyspace: try_load("SCYLLA_KEYSPACE", "zaintech")?,
                schema_path: try_load("SCHEMA_PATH", "schema")?,
                schema_version: try_load("SCHEMA_VERSION", "1")?,
            }),
            other => return Err(AppError::Config(format!("Unknown STORE_BACKEND {}", other))),
        };

        let members_api = match (optional("MEMBERS_API_URL"), optional("MEMBERS_API_KEY")) {
            (Some(base_url), Some(api_key)) => Some(MembersApiConfig {
                base_url: base_url.trim_end_matches('/').to_string(),
                api_key,
            }),
            (Some(_), None) => return Err(AppError::Config("MEMBERS_API_URL set without MEMBERS_API_KEY".to_string())),
            _ => None,
        };

        let smtp = match optional("SMTP_HOST") {
            Some(host) => Some(SmtpConfig {
                host,
                port: try_load("SMTP_PORT", "465")?,
                user: required("SMTP_USER")?,
                password: required("SMTP_PASSWORD")?,
                inbox: required("CONTACT_INBOX")?,
            }),
            None => None,
        };

        let admin_password = optional("ADMIN_PASSWORD");
        if admin_password.is_none() {
            warn!("ADMIN_PASSWORD not set. No admin account will be seeded.");
        }

        Ok(Self {
            bind_addr: try_load("BIND_ADDR", "127.0.0.1:1227")?,
            log_level: try_load("LOG_LEVEL", "info")?,
            store,
            members_api,
            admin_email: try_load("ADMIN_EMAIL", "admin@zaintech.local")?,
            admin_password,
            admin_session_hours: try_load("ADMIN_SESSION_HOURS", "12")?,
            display_timezone: try_load("DISPLAY_TIMEZONE", "UTC")?,
            seed_defaults: try_load("SEED_DEFAULTS", "true")?,
            template_dir: try_load("TEMPLATE_DIR", "templates")?,
            smtp,
        })
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn required(key: &str) -> Result<String> {
    optional(key).ok_or_else(|| AppError::Config(format!("{} must be set", key)))
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    let raw = optional(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });
    raw.parse()
        .map_err(|e| AppError::Config(format!("Invalid {key} value {raw:?}: {e}")))
}
