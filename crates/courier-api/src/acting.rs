//! The acting user, as asserted by the identity layer in front of the API.
//!
//! Authentication is not Courier's concern: whatever sits in front of the
//! API sets `X-User-Id` to the authenticated user's UUID.

use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::ApiError;

/// Header carrying the acting user's id.
pub const USER_HEADER: &str = "x-user-id";

/// Extractor for the user on whose behalf the request runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActingUser(pub Uuid);

impl<S> FromRequestParts<S> for ActingUser
where
  S: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
    let raw = parts
      .headers
      .get(USER_HEADER)
      .and_then(|v| v.to_str().ok())
      .ok_or_else(|| ApiError::Unauthorized(format!("missing {USER_HEADER} header")))?;

    Uuid::parse_str(raw.trim())
      .map(ActingUser)
      .map_err(|_| ApiError::Unauthorized(format!("malformed {USER_HEADER} header")))
  }
}
