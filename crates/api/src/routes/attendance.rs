//! Attendance endpoints.
//!
//! Every handler reads `now` from the state clock and delegates to the
//! tracker. Rejections surface as coded `ApiError`s.

use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{Path, State},
    Json,
};
use attendance_core::{HeartbeatAck, IssuedToken, LectureAttendance, LectureId};
use telemetry::metrics;
use tracing::{debug, info, warn};

use crate::extractors::StudentIdentity;
use crate::response::{ApiError, FinalizeResponse, HeartbeatRequest};
use crate::state::AppState;

/// POST /lectures/:lecture_id/attendance-token
pub async fn issue_token_handler(
    State(state): State<AppState>,
    StudentIdentity(student_id): StudentIdentity,
    Path(lecture_id): Path<LectureId>,
) -> Result<Json<IssuedToken>, ApiError> {
    let now = state.now();

    match state.tracker.issue_token(lecture_id, student_id, now).await {
        Ok(issued) => {
            metrics().tokens_issued.inc();
            Ok(Json(issued))
        }
        Err(e) => {
            metrics().tokens_rejected.inc();
            warn!(lecture_id, student_id, error = %e, "Token request rejected");
            Err(e.into())
        }
    }
}

/// POST /attendance/heartbeat
pub async fn heartbeat_handler(
    State(state): State<AppState>,
    StudentIdentity(student_id): StudentIdentity,
    body: Bytes,
) -> Result<Json<HeartbeatAck>, ApiError> {
    let start = Instant::now();

    let request: HeartbeatRequest = serde_json::from_slice(&body).map_err(|e| {
        metrics().heartbeats_rejected.inc();
        debug!("Failed to parse heartbeat body: {}", e);
        ApiError::bad_request(format!("Invalid heartbeat body: {}", e))
    })?;

    let now = state.now();
    let result = state
        .tracker
        .record_heartbeat(&request.token, student_id, now)
        .await;

    metrics()
        .heartbeat_latency_ms
        .observe(start.elapsed().as_millis() as u64);

    match result {
        Ok(ack) => {
            metrics().heartbeats_accepted.inc();
            Ok(Json(ack))
        }
        Err(e) => {
            metrics().heartbeats_rejected.inc();
            debug!(student_id, error = %e, "Heartbeat rejected");
            Err(e.into())
        }
    }
}

/// POST /lectures/:lecture_id/finalize - Internal trigger, normally run by the worker.
pub async fn finalize_handler(
    State(state): State<AppState>,
    Path(lecture_id): Path<LectureId>,
) -> Result<Json<FinalizeResponse>, ApiError> {
    let start = Instant::now();
    let now = state.now();

    let outcome = state
        .tracker
        .finalize_lecture(lecture_id, now)
        .await
        .inspect_err(|e| {
            metrics().finalize_errors.inc();
            warn!(lecture_id, error = %e, "Finalization failed");
        })?;

    let latency_ms = start.elapsed().as_millis() as u64;
    metrics().finalize_latency_ms.observe(latency_ms);
    metrics().lectures_finalized.inc();
    metrics()
        .students_finalized
        .inc_by(outcome.finalized_count as u64);

    info!(
        lecture_id,
        finalized = outcome.finalized_count,
        latency_ms,
        "Finalization triggered over HTTP"
    );

    Ok(Json(outcome.into()))
}

/// GET /lectures/:lecture_id/attendance
pub async fn lecture_attendance_handler(
    State(state): State<AppState>,
    Path(lecture_id): Path<LectureId>,
) -> Result<Json<LectureAttendance>, ApiError> {
    let report = state.tracker.lecture_attendance(lecture_id).await?;
    Ok(Json(report))
}
