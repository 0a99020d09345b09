//! Lecture and enrollment types owned by the scheduling subsystem.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type LectureId = i64;
pub type SectionId = i64;
pub type StudentId = i64;

/// Lifecycle status of a lecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LectureStatus {
    Scheduled,
    Running,
    Ended,
    Cancelled,
}

impl LectureStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Running => "running",
            Self::Ended => "ended",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "scheduled" => Some(Self::Scheduled),
            "running" => Some(Self::Running),
            "ended" => Some(Self::Ended),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// A scheduled lecture. Read-only to the attendance tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lecture {
    pub id: LectureId,
    pub section_id: SectionId,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub status: LectureStatus,
}

impl Lecture {
    /// Whether `now` falls inside the lecture window. Both bounds are inclusive.
    pub fn is_within_window(&self, now: DateTime<Utc>) -> bool {
        now >= self.starts_at && now <= self.ends_at
    }

    /// Scheduled length of the lecture in whole minutes.
    pub fn scheduled_minutes(&self) -> i64 {
        (self.ends_at - self.starts_at).num_minutes().max(0)
    }
}

/// A student's membership in a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Enrollment {
    pub section_id: SectionId,
    pub student_id: StudentId,
}
