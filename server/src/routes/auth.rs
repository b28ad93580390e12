//! Caller identity from upstream headers.
//!
//! An identity provider in front of this service authenticates the user and
//! injects `x-user-id`, `x-user-role` and optionally `x-site-id`. This module
//! only parses them; it never issues or validates credentials.

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;

use axum::http::request::Parts;
use uuid::Uuid;

use super::documents::ApiError;
use crate::services::access::{Actor, Role};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const ROLE_HEADER: &str = "x-user-role";
pub const SITE_ID_HEADER: &str = "x-site-id";

// =============================================================================
// AUTH EXTRACTOR
// =============================================================================

/// Authenticated caller. Use as a handler parameter to require identity headers.
pub struct AuthUser {
    pub actor: Actor,
}

impl<S> axum::extract::FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        actor_from_parts(parts).map(|actor| Self { actor })
    }
}

/// Missing or unusable user and role headers are 401; a malformed site id is 400.
pub(crate) fn actor_from_parts(parts: &Parts) -> Result<Actor, ApiError> {
    let user_id = header(parts, USER_ID_HEADER)
        .and_then(|raw| Uuid::parse_str(raw).ok())
        .ok_or_else(|| ApiError::unauthorized(format!("missing or invalid {USER_ID_HEADER} header")))?;
    let role = header(parts, ROLE_HEADER)
        .and_then(Role::parse)
        .ok_or_else(|| ApiError::unauthorized(format!("missing or unknown {ROLE_HEADER} header")))?;
    let site_id = match header(parts, SITE_ID_HEADER) {
        None => None,
        Some(raw) => Some(
            Uuid::parse_str(raw).map_err(|_| ApiError::bad_request(format!("invalid {SITE_ID_HEADER} header {raw:?}")))?,
        ),
    };
    Ok(Actor { user_id, role, site_id })
}

/// Trimmed header value; absent, non-UTF-8 and blank values read as `None`.
fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}
