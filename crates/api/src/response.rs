//! Response bodies and the API error type.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use attendance_core::{Error, FinalizeOutcome, LectureId};
use serde::{Deserialize, Serialize};
use telemetry::{HealthReport, MetricsSnapshot};

#[derive(Debug, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FinalizeResponse {
    pub lecture_id: LectureId,
    pub finalized_count: usize,
}

impl From<FinalizeOutcome> for FinalizeResponse {
    fn from(outcome: FinalizeOutcome) -> Self {
        Self {
            lecture_id: outcome.lecture_id,
            finalized_count: outcome.finalized_count,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub store_connected: bool,
    pub report: HealthReport,
    pub metrics: MetricsSnapshot,
}

/// Error body: `{"error", "code", "kind"}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            kind: None,
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub response: ErrorResponse,
}

impl ApiError {
    pub fn with_code(status: StatusCode, code: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            status,
            response: ErrorResponse::new(msg, code),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::with_code(StatusCode::BAD_REQUEST, "VALID_001", msg)
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::with_code(StatusCode::UNAUTHORIZED, "AUTH_001", msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::with_code(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_001", msg)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.response)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        let status =
            StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        match err {
            Error::Attendance { kind, message } => Self {
                status,
                response: ErrorResponse::new(message, kind.code()).with_kind(kind.as_str()),
            },
            Error::Storage { code, message, .. } => ApiError::with_code(status, code, message),
            Error::Serialization(e) => ApiError::bad_request(e.to_string()),
            other => ApiError::internal(other.to_string()),
        }
    }
}
