use actix_web::{
    cookie::{Cookie, SameSite}, dev::Payload, http::header::AUTHORIZATION, FromRequest, HttpRequest,
};
use futures_util::future::{ready, Ready};

use crate::error::AppError;
use crate::members::Member;
use crate::state::{AdminIdentity, StoreStateManager};

pub const MEMBER_COOKIE: &str = "member_session";
pub const ADMIN_COOKIE: &str = "admin_session";

fn bearer_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_owned())
        .filter(|token| !token.is_empty())
}

fn session_token(req: &HttpRequest, cookie_name: &str) -> Option<String> {
    req.cookie(cookie_name)
        .map(|cookie| cookie.value().to_owned())
        .filter(|token| !token.is_empty())
        .or_else(|| bearer_token(req))
}

pub fn session_cookie(name: &'static str, token: String, hours: i64) -> Cookie<'static> {
    Cookie::build(name, token)
        .path("/")
        .secure(true)
        .http_only(true)
        .same_site(SameSite::Strict)
        .max_age(time::Duration::hours(hours))
        .finish()
}

pub fn removal_cookie(name: &'static str) -> Cookie<'static> {
    Cookie::build(name, "")
        .path("/")
        .max_age(time::Duration::seconds(0))
        .finish()
}

/// Member session token taken from the request.
///
/// Extraction only checks that a token is present; the provider is consulted
/// in `validate`, which the handler awaits.
pub struct LoggedMember {
    pub token: String,
}

impl FromRequest for LoggedMember {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        match session_token(req, MEMBER_COOKIE) {
            Some(token) => ready(Ok(LoggedMember { token })),
            None => {
                tracing::debug!("Member session cookie missing.");
                ready(Err(AppError::Unauthorized("Sign in required".to_string())))
            }
        }
    }
}

impl LoggedMember {
    pub async fn validate(&self, state: &StoreStateManager) -> Result<Member, AppError> {
        match state.members.resolve(&self.token).await? {
            Some(member) => {
                tracing::debug!("Member session valid for {}", member.id);
                Ok(member)
            }
            None => Err(AppError::Unauthorized("Invalid or expired session".to_string())),
        }
    }
}

/// Admin session token taken from the request; see `LoggedMember`.
pub struct LoggedAdmin {
    pub token: String,
}

impl FromRequest for LoggedAdmin {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        match session_token(req, ADMIN_COOKIE) {
            Some(token) => ready(Ok(LoggedAdmin { token })),
            None => ready(Err(AppError::Unauthorized("Admin access required".to_string()))),
        }
    }
}

impl LoggedAdmin {
    pub fn validate(&self, state: &StoreStateManager) -> Result<AdminIdentity, AppError> {
        state
            .verify_admin_session(&self.token)
            .ok_or_else(|| AppError::Unauthorized("Invalid or expired admin session".to_string()))
    }
}
