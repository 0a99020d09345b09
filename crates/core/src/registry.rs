//! Collaborator interfaces consumed by the tracker.
//!
//! Lectures and enrollments belong to the scheduling subsystem and are only
//! read here. The attendance store owns both ledgers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::lecture::{Lecture, LectureId, SectionId, StudentId};
use crate::records::{AttendanceRecord, HeartbeatRecord};

/// Lecture lookup.
#[async_trait]
pub trait LectureRegistry: Send + Sync {
    async fn lecture(&self, id: LectureId) -> Result<Option<Lecture>>;

    /// Lectures whose `ends_at` lies in `(after, until]`, ordered by `ends_at`.
    async fn lectures_ending_between(
        &self,
        after: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Lecture>>;
}

/// Section membership.
#[async_trait]
pub trait EnrollmentRegistry: Send + Sync {
    async fn is_enrolled(&self, section_id: SectionId, student_id: StudentId) -> Result<bool>;

    /// Students enrolled in a section, ascending by id.
    async fn roster(&self, section_id: SectionId) -> Result<Vec<StudentId>>;
}

/// Heartbeat and attendance ledgers.
///
/// Implementations must apply each write with upsert-by-key semantics on
/// (lecture, student) so concurrent writers never violate uniqueness.
#[async_trait]
pub trait AttendanceStore: Send + Sync {
    /// Observed write path for one heartbeat, applied atomically:
    /// - heartbeat: `joined_at` set only if absent, `last_seen_at = now`
    /// - attendance: `status = present`, `checked_in_at = joined_at`,
    ///   `last_seen_at = now`, `minutes_attended` untouched
    ///
    /// Returns the heartbeat record as stored after the write.
    async fn record_heartbeat(
        &self,
        lecture_id: LectureId,
        student_id: StudentId,
        now: DateTime<Utc>,
    ) -> Result<HeartbeatRecord>;

    async fn heartbeat(
        &self,
        lecture_id: LectureId,
        student_id: StudentId,
    ) -> Result<Option<HeartbeatRecord>>;

    async fn heartbeats_for_lecture(&self, lecture_id: LectureId) -> Result<Vec<HeartbeatRecord>>;

    /// Authoritative write path. Overwrites every given record as one batch
    /// and returns how many were written.
    async fn write_final_attendance(&self, records: Vec<AttendanceRecord>) -> Result<usize>;

    async fn attendance(
        &self,
        lecture_id: LectureId,
        student_id: StudentId,
    ) -> Result<Option<AttendanceRecord>>;

    /// Attendance records of a lecture, ascending by student id.
    async fn attendance_for_lecture(&self, lecture_id: LectureId) -> Result<Vec<AttendanceRecord>>;
}
