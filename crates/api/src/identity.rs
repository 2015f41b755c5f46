//! Caller identity extraction.
//!
//! Authentication happens upstream; the gateway forwards the verified user
//! in request headers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::UserId;
use domain::{Role, UserIdentity};

use crate::error::ApiError;

/// Header carrying the authenticated user id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Header carrying the authenticated user's role.
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Extractor that requires an authenticated caller.
///
/// Rejects with 401 when the user id header is missing or is not a positive
/// integer, or when the role header names an unknown role.
pub struct RequireUser(pub UserIdentity);

impl<S> FromRequestParts<S> for RequireUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw_id = header(parts, USER_ID_HEADER)
            .ok_or_else(|| ApiError::Unauthorized("Missing user identity".to_string()))?;
        let user_id: i64 = raw_id
            .parse()
            .map_err(|_| ApiError::Unauthorized(format!("Invalid user id: {raw_id}")))?;

        let role = match header(parts, USER_ROLE_HEADER) {
            Some(raw) => Role::parse(raw)
                .ok_or_else(|| ApiError::Unauthorized(format!("Unknown role: {raw}")))?,
            None => Role::Customer,
        };

        let identity = UserIdentity::new(UserId::new(user_id), role)
            .map_err(|e| ApiError::Unauthorized(e.to_string()))?;

        Ok(Self(identity))
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
}
