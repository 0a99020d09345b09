//! Test data: one running lecture with a small section.

use attendance_core::{Lecture, LectureId, LectureStatus, SectionId, StudentId};
use chrono::{DateTime, TimeZone, Utc};

pub const LECTURE_ID: LectureId = 1;
pub const SECTION_ID: SectionId = 10;

/// Enrolled in `SECTION_ID`.
pub const ALICE: StudentId = 7;
pub const BOB: StudentId = 8;
pub const CAROL: StudentId = 9;

/// Not enrolled anywhere.
pub const MALLORY: StudentId = 99;

pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, hour, minute, 0).unwrap()
}

/// 09:00 to 11:00, running.
pub fn lecture() -> Lecture {
    Lecture {
        id: LECTURE_ID,
        section_id: SECTION_ID,
        starts_at: at(9, 0),
        ends_at: at(11, 0),
        status: LectureStatus::Running,
    }
}

pub fn roster() -> Vec<StudentId> {
    vec![ALICE, BOB, CAROL]
}
