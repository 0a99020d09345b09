//! Request extractors.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use attendance_core::StudentId;

use crate::response::ApiError;

/// Header carrying the caller's student id, set by the authenticating gateway.
pub const STUDENT_ID_HEADER: &str = "X-Student-Id";

/// Authenticated student making the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StudentIdentity(pub StudentId);

#[async_trait]
impl<S> FromRequestParts<S> for StudentIdentity
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(STUDENT_ID_HEADER)
            .ok_or_else(|| ApiError::unauthorized("Missing student identity"))?
            .to_str()
            .map_err(|_| ApiError::unauthorized("Invalid student identity"))?;

        match raw.trim().parse::<StudentId>() {
            Ok(id) if id > 0 => Ok(StudentIdentity(id)),
            _ => Err(ApiError::unauthorized("Invalid student identity")),
        }
    }
}
