//! Attendance tracker: token issuance, heartbeat ingestion, and end-of-lecture
//! finalization.
//!
//! Heartbeats and finalization write the same attendance record. A heartbeat
//! optimistically marks the student `present`; finalization recomputes the
//! status from the heartbeat trail and overwrites it.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{Thresholds, TrackerConfig};
use crate::error::{Error, Result};
use crate::lecture::{Lecture, LectureId, StudentId};
use crate::records::{AttendanceRecord, AttendanceStatus, AttendanceSummary, HeartbeatRecord};
use crate::registry::{AttendanceStore, EnrollmentRegistry, LectureRegistry};
use crate::token::{TokenClaims, TokenCodec};

/// Token handed to a student's client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Result of an accepted heartbeat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatAck {
    pub lecture_id: LectureId,
    pub last_seen_at: DateTime<Utc>,
}

/// Result of a finalization pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizeOutcome {
    pub lecture_id: LectureId,
    pub finalized_count: usize,
}

/// Attendance report for one lecture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LectureAttendance {
    pub lecture: Lecture,
    pub records: Vec<AttendanceRecord>,
    pub summary: AttendanceSummary,
}

pub struct AttendanceTracker {
    lectures: Arc<dyn LectureRegistry>,
    enrollments: Arc<dyn EnrollmentRegistry>,
    store: Arc<dyn AttendanceStore>,
    codec: TokenCodec,
    token_ttl: Duration,
    thresholds: Thresholds,
}

impl AttendanceTracker {
    /// Creates a tracker. Fails if the config is out of range or the key is
    /// not a base64 encoded 256-bit key.
    pub fn new(
        config: &TrackerConfig,
        lectures: Arc<dyn LectureRegistry>,
        enrollments: Arc<dyn EnrollmentRegistry>,
        store: Arc<dyn AttendanceStore>,
    ) -> Result<Self> {
        config.check()?;
        let codec = TokenCodec::from_base64_key(&config.token_key)?;

        Ok(Self {
            lectures,
            enrollments,
            store,
            codec,
            token_ttl: config.token_ttl(),
            thresholds: config.thresholds(),
        })
    }

    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    async fn require_lecture(&self, lecture_id: LectureId) -> Result<Lecture> {
        self.lectures
            .lecture(lecture_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("lecture {} not found", lecture_id)))
    }

    /// Issue a short-lived token scoping `student_id` to the lecture.
    ///
    /// No state is written.
    pub async fn issue_token(
        &self,
        lecture_id: LectureId,
        student_id: StudentId,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken> {
        let lecture = self.require_lecture(lecture_id).await?;

        if !lecture.is_within_window(now) {
            return Err(Error::out_of_window(format!(
                "lecture {} runs from {} to {}",
                lecture.id, lecture.starts_at, lecture.ends_at
            )));
        }

        if !self
            .enrollments
            .is_enrolled(lecture.section_id, student_id)
            .await?
        {
            return Err(Error::not_enrolled(format!(
                "student {} is not enrolled in section {}",
                student_id, lecture.section_id
            )));
        }

        let claims = TokenClaims::new(lecture.id, student_id, now + self.token_ttl);
        let expires_at = claims
            .expires_at()
            .ok_or_else(|| Error::internal("token expiry out of range"))?;
        let token = self.codec.seal(&claims)?;

        debug!(
            lecture_id = lecture.id,
            student_id = student_id,
            expires_at = %expires_at,
            "Issued attendance token"
        );

        Ok(IssuedToken { token, expires_at })
    }

    /// Ingest one heartbeat from `student_id`.
    ///
    /// All checks run before any write. On success the heartbeat trail is
    /// updated and the attendance record is marked `present`.
    pub async fn record_heartbeat(
        &self,
        token: &str,
        student_id: StudentId,
        now: DateTime<Utc>,
    ) -> Result<HeartbeatAck> {
        let claims = self.codec.open(token)?;

        if claims.student_id != student_id {
            return Err(Error::token_mismatch(
                "token was issued to a different student",
            ));
        }

        if claims.is_expired(now) {
            return Err(Error::token_expired("attendance token expired, request a new one"));
        }

        let lecture = self.require_lecture(claims.lecture_id).await?;

        if !lecture.is_within_window(now) {
            return Err(Error::lecture_not_active(format!(
                "lecture {} is not in progress",
                lecture.id
            )));
        }

        let heartbeat = self
            .store
            .record_heartbeat(lecture.id, student_id, now)
            .await?;

        debug!(
            lecture_id = lecture.id,
            student_id = student_id,
            joined_at = %heartbeat.joined_at,
            "Heartbeat recorded"
        );

        Ok(HeartbeatAck {
            lecture_id: lecture.id,
            last_seen_at: heartbeat.last_seen_at,
        })
    }

    /// Classify every enrolled student of the lecture and overwrite their
    /// attendance records.
    ///
    /// Safe to re-run: the same heartbeat data and `now` produce the same
    /// records.
    pub async fn finalize_lecture(
        &self,
        lecture_id: LectureId,
        now: DateTime<Utc>,
    ) -> Result<FinalizeOutcome> {
        let lecture = self.require_lecture(lecture_id).await?;

        let roster = self.enrollments.roster(lecture.section_id).await?;
        let heartbeats: HashMap<StudentId, HeartbeatRecord> = self
            .store
            .heartbeats_for_lecture(lecture.id)
            .await?
            .into_iter()
            .map(|h| (h.student_id, h))
            .collect();

        let records: Vec<AttendanceRecord> = roster
            .iter()
            .map(|student_id| {
                classify(
                    &lecture,
                    *student_id,
                    heartbeats.get(student_id),
                    now,
                    self.thresholds,
                )
            })
            .collect();

        let summary = AttendanceSummary::from_records(&records);
        let finalized_count = self.store.write_final_attendance(records).await?;

        info!(
            lecture_id = lecture.id,
            finalized = finalized_count,
            present = summary.present,
            late = summary.late,
            left = summary.left,
            absent = summary.absent,
            "Lecture attendance finalized"
        );

        Ok(FinalizeOutcome {
            lecture_id: lecture.id,
            finalized_count,
        })
    }

    /// Attendance ledger for one lecture with per-status counts.
    pub async fn lecture_attendance(&self, lecture_id: LectureId) -> Result<LectureAttendance> {
        let lecture = self.require_lecture(lecture_id).await?;
        let records = self.store.attendance_for_lecture(lecture.id).await?;
        let summary = AttendanceSummary::from_records(&records);

        Ok(LectureAttendance {
            lecture,
            records,
            summary,
        })
    }
}

/// Final classification of one student from their heartbeat trail.
///
/// `late` is assigned before `left`, so a student who both joined late and
/// went silent ends up `left`.
pub fn classify(
    lecture: &Lecture,
    student_id: StudentId,
    heartbeat: Option<&HeartbeatRecord>,
    now: DateTime<Utc>,
    thresholds: Thresholds,
) -> AttendanceRecord {
    let Some(heartbeat) = heartbeat else {
        return AttendanceRecord::absent(lecture.id, student_id);
    };

    let joined = heartbeat.joined_at;
    let last_seen = heartbeat.last_seen_at;

    let mut status = AttendanceStatus::Present;
    if joined > lecture.starts_at + thresholds.late {
        status = AttendanceStatus::Late;
    }
    if last_seen < now - thresholds.inactive {
        status = AttendanceStatus::Left;
    }

    let attended_until = last_seen.min(lecture.ends_at);
    let minutes = (attended_until - joined).num_minutes().max(0);

    AttendanceRecord {
        lecture_id: lecture.id,
        student_id,
        status,
        checked_in_at: Some(joined),
        last_seen_at: Some(last_seen),
        minutes_attended: Some(u32::try_from(minutes).unwrap_or(u32::MAX)),
    }
}
