//! Heartbeat and attendance ledger records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::lecture::{LectureId, StudentId};

/// Final or interim attendance status of a student for one lecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Late,
    Left,
    Absent,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Present => "present",
            Self::Late => "late",
            Self::Left => "left",
            Self::Absent => "absent",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "present" => Some(Self::Present),
            "late" => Some(Self::Late),
            "left" => Some(Self::Left),
            "absent" => Some(Self::Absent),
            _ => None,
        }
    }
}

/// Liveness trail of one student in one lecture.
///
/// `joined_at` is written by the first heartbeat only; `last_seen_at` moves
/// forward with every heartbeat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatRecord {
    pub lecture_id: LectureId,
    pub student_id: StudentId,
    pub joined_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

/// Attendance ledger entry, keyed by (lecture, student).
///
/// Written on two paths: every heartbeat marks the student `present`
/// (observed), and finalization overwrites the whole record (authoritative).
/// Both paths share the single `status` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub lecture_id: LectureId,
    pub student_id: StudentId,
    pub status: AttendanceStatus,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub minutes_attended: Option<u32>,
}

impl AttendanceRecord {
    /// Record for an enrolled student that never sent a heartbeat.
    pub fn absent(lecture_id: LectureId, student_id: StudentId) -> Self {
        Self {
            lecture_id,
            student_id,
            status: AttendanceStatus::Absent,
            checked_in_at: None,
            last_seen_at: None,
            minutes_attended: None,
        }
    }
}

/// Per-status counts for one lecture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceSummary {
    pub present: usize,
    pub late: usize,
    pub left: usize,
    pub absent: usize,
}

impl AttendanceSummary {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a AttendanceRecord>) -> Self {
        let mut summary = Self::default();
        for record in records {
            match record.status {
                AttendanceStatus::Present => summary.present += 1,
                AttendanceStatus::Late => summary.late += 1,
                AttendanceStatus::Left => summary.left += 1,
                AttendanceStatus::Absent => summary.absent += 1,
            }
        }
        summary
    }

    pub fn total(&self) -> usize {
        self.present + self.late + self.left + self.absent
    }
}
