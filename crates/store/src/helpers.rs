use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};

use attendance_core::{AttendanceStatus, Error, LectureStatus, StorageErrorCode};

/// Fixed-width RFC 3339 so that text order matches time order.
pub fn format_datetime(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

pub fn parse_optional_datetime(
    value: Option<String>,
    field: &str,
) -> Result<Option<DateTime<Utc>>> {
    match value {
        Some(raw) => parse_datetime(&raw, field).map(Some),
        None => Ok(None),
    }
}

pub fn parse_lecture_status(value: &str) -> Result<LectureStatus> {
    LectureStatus::parse(value).ok_or_else(|| anyhow!("unknown lecture status {value}"))
}

pub fn parse_attendance_status(value: &str) -> Result<AttendanceStatus> {
    AttendanceStatus::parse(value).ok_or_else(|| anyhow!("unknown attendance status {value}"))
}

pub fn to_minutes(value: Option<i64>) -> Result<Option<u32>> {
    value
        .map(|m| u32::try_from(m).map_err(|_| anyhow!("minutes_attended out of range: {m}")))
        .transpose()
}

/// Map a database failure onto the service error type.
pub fn storage_error(err: anyhow::Error) -> Error {
    Error::storage(StorageErrorCode::Failed, format!("{err:#}"))
}
