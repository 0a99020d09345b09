//! Unified error types for the attendance service.
//!
//! Error codes:
//! - ATT_001-007: Attendance tracker rejections
//! - DB_001: Storage errors

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Machine-distinguishable kinds of tracker rejections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttendanceErrorKind {
    /// ATT_001: Lecture does not exist
    NotFound,
    /// ATT_002: Token requested outside the lecture window
    OutOfWindow,
    /// ATT_003: Student is not enrolled in the lecture's section
    NotEnrolled,
    /// ATT_004: Token failed to decode, decrypt, or parse
    InvalidToken,
    /// ATT_005: Token was issued to a different student
    TokenMismatch,
    /// ATT_006: Token lifetime has passed
    TokenExpired,
    /// ATT_007: Heartbeat received outside the lecture window
    LectureNotActive,
}

impl AttendanceErrorKind {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound => "ATT_001",
            Self::OutOfWindow => "ATT_002",
            Self::NotEnrolled => "ATT_003",
            Self::InvalidToken => "ATT_004",
            Self::TokenMismatch => "ATT_005",
            Self::TokenExpired => "ATT_006",
            Self::LectureNotActive => "ATT_007",
        }
    }

    /// Get the snake_case kind name used in API responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::OutOfWindow => "out_of_window",
            Self::NotEnrolled => "not_enrolled",
            Self::InvalidToken => "invalid_token",
            Self::TokenMismatch => "token_mismatch",
            Self::TokenExpired => "token_expired",
            Self::LectureNotActive => "lecture_not_active",
        }
    }

    /// Get the HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotFound => 404,
            Self::OutOfWindow => 422,
            Self::NotEnrolled => 403,
            Self::InvalidToken => 401,
            Self::TokenMismatch => 403,
            Self::TokenExpired => 401,
            Self::LectureNotActive => 422,
        }
    }
}

/// Storage error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorCode {
    /// DB_001: Read or write against the store failed
    Failed,
}

impl StorageErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Failed => "DB_001",
        }
    }

    pub fn http_status(&self) -> u16 {
        500
    }
}

/// Unified error type for the attendance service.
#[derive(Debug, Error)]
pub enum Error {
    /// Tracker rejection with a machine-distinguishable kind.
    #[error("[{}] {message}", .kind.code())]
    Attendance {
        kind: AttendanceErrorKind,
        message: String,
    },

    /// Storage error with code.
    #[error("[{code}] {message}")]
    Storage {
        code: &'static str,
        message: String,
        http_status: u16,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a tracker rejection.
    pub fn attendance(kind: AttendanceErrorKind, msg: impl Into<String>) -> Self {
        Self::Attendance {
            kind,
            message: msg.into(),
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::attendance(AttendanceErrorKind::NotFound, msg)
    }

    pub fn out_of_window(msg: impl Into<String>) -> Self {
        Self::attendance(AttendanceErrorKind::OutOfWindow, msg)
    }

    pub fn not_enrolled(msg: impl Into<String>) -> Self {
        Self::attendance(AttendanceErrorKind::NotEnrolled, msg)
    }

    pub fn invalid_token(msg: impl Into<String>) -> Self {
        Self::attendance(AttendanceErrorKind::InvalidToken, msg)
    }

    pub fn token_mismatch(msg: impl Into<String>) -> Self {
        Self::attendance(AttendanceErrorKind::TokenMismatch, msg)
    }

    pub fn token_expired(msg: impl Into<String>) -> Self {
        Self::attendance(AttendanceErrorKind::TokenExpired, msg)
    }

    pub fn lecture_not_active(msg: impl Into<String>) -> Self {
        Self::attendance(AttendanceErrorKind::LectureNotActive, msg)
    }

    /// Create a storage error.
    pub fn storage(code: StorageErrorCode, msg: impl Into<String>) -> Self {
        Self::Storage {
            code: code.code(),
            message: msg.into(),
            http_status: code.http_status(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Get the tracker rejection kind, if this is one.
    pub fn kind(&self) -> Option<AttendanceErrorKind> {
        match self {
            Self::Attendance { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Get the HTTP status code for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::Attendance { kind, .. } => kind.http_status(),
            Self::Storage { http_status, .. } => *http_status,
            Self::Config(_) => 500,
            Self::Serialization(_) => 400,
            Self::Internal(_) => 500,
        }
    }

    /// Get the error code if this is a coded error.
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            Self::Attendance { kind, .. } => Some(kind.code()),
            Self::Storage { code, .. } => Some(code),
            _ => None,
        }
    }
}
