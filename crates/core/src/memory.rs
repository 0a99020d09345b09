//! In-memory implementation of the registries and ledgers.
//!
//! A single lock guards all state, so every trait call is atomic. Used by
//! tests and in-process embedding.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

use crate::error::Result;
use crate::lecture::{Lecture, LectureId, LectureStatus, SectionId, StudentId};
use crate::records::{AttendanceRecord, AttendanceStatus, HeartbeatRecord};
use crate::registry::{AttendanceStore, EnrollmentRegistry, LectureRegistry};

type Key = (LectureId, StudentId);

#[derive(Debug, Default)]
struct State {
    lectures: BTreeMap<LectureId, Lecture>,
    enrollments: BTreeSet<(SectionId, StudentId)>,
    heartbeats: BTreeMap<Key, HeartbeatRecord>,
    attendance: BTreeMap<Key, AttendanceRecord>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a lecture.
    pub fn insert_lecture(&self, lecture: Lecture) {
        self.state.lock().lectures.insert(lecture.id, lecture);
    }

    pub fn set_lecture_status(&self, id: LectureId, status: LectureStatus) -> bool {
        match self.state.lock().lectures.get_mut(&id) {
            Some(lecture) => {
                lecture.status = status;
                true
            }
            None => false,
        }
    }

    pub fn enroll(&self, section_id: SectionId, student_id: StudentId) {
        self.state.lock().enrollments.insert((section_id, student_id));
    }

    pub fn unenroll(&self, section_id: SectionId, student_id: StudentId) {
        self.state.lock().enrollments.remove(&(section_id, student_id));
    }

    pub fn heartbeat_count(&self) -> usize {
        self.state.lock().heartbeats.len()
    }

    pub fn attendance_count(&self) -> usize {
        self.state.lock().attendance.len()
    }
}

#[async_trait]
impl LectureRegistry for MemoryStore {
    async fn lecture(&self, id: LectureId) -> Result<Option<Lecture>> {
        Ok(self.state.lock().lectures.get(&id).cloned())
    }

    async fn lectures_ending_between(
        &self,
        after: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Lecture>> {
        let mut lectures: Vec<Lecture> = self
            .state
            .lock()
            .lectures
            .values()
            .filter(|l| l.ends_at > after && l.ends_at <= until)
            .cloned()
            .collect();
        lectures.sort_by_key(|l| (l.ends_at, l.id));
        Ok(lectures)
    }
}

#[async_trait]
impl EnrollmentRegistry for MemoryStore {
    async fn is_enrolled(&self, section_id: SectionId, student_id: StudentId) -> Result<bool> {
        Ok(self
            .state
            .lock()
            .enrollments
            .contains(&(section_id, student_id)))
    }

    async fn roster(&self, section_id: SectionId) -> Result<Vec<StudentId>> {
        Ok(self
            .state
            .lock()
            .enrollments
            .range((section_id, StudentId::MIN)..=(section_id, StudentId::MAX))
            .map(|(_, student)| *student)
            .collect())
    }
}

#[async_trait]
impl AttendanceStore for MemoryStore {
    async fn record_heartbeat(
        &self,
        lecture_id: LectureId,
        student_id: StudentId,
        now: DateTime<Utc>,
    ) -> Result<HeartbeatRecord> {
        let mut state = self.state.lock();
        let key = (lecture_id, student_id);

        let heartbeat = state
            .heartbeats
            .entry(key)
            .and_modify(|h| h.last_seen_at = now)
            .or_insert_with(|| HeartbeatRecord {
                lecture_id,
                student_id,
                joined_at: now,
                last_seen_at: now,
            })
            .clone();

        let minutes_attended = state
            .attendance
            .get(&key)
            .and_then(|a| a.minutes_attended);
        state.attendance.insert(
            key,
            AttendanceRecord {
                lecture_id,
                student_id,
                status: AttendanceStatus::Present,
                checked_in_at: Some(heartbeat.joined_at),
                last_seen_at: Some(now),
                minutes_attended,
            },
        );

        Ok(heartbeat)
    }

    async fn heartbeat(
        &self,
        lecture_id: LectureId,
        student_id: StudentId,
    ) -> Result<Option<HeartbeatRecord>> {
        Ok(self
            .state
            .lock()
            .heartbeats
            .get(&(lecture_id, student_id))
            .cloned())
    }

    async fn heartbeats_for_lecture(&self, lecture_id: LectureId) -> Result<Vec<HeartbeatRecord>> {
        Ok(self
            .state
            .lock()
            .heartbeats
            .range((lecture_id, StudentId::MIN)..=(lecture_id, StudentId::MAX))
            .map(|(_, h)| h.clone())
            .collect())
    }

    async fn write_final_attendance(&self, records: Vec<AttendanceRecord>) -> Result<usize> {
        let mut state = self.state.lock();
        let count = records.len();
        for record in records {
            state
                .attendance
                .insert((record.lecture_id, record.student_id), record);
        }
        Ok(count)
    }

    async fn attendance(
        &self,
        lecture_id: LectureId,
        student_id: StudentId,
    ) -> Result<Option<AttendanceRecord>> {
        Ok(self
            .state
            .lock()
            .attendance
            .get(&(lecture_id, student_id))
            .cloned())
    }

    async fn attendance_for_lecture(&self, lecture_id: LectureId) -> Result<Vec<AttendanceRecord>> {
        Ok(self
            .state
            .lock()
            .attendance
            .range((lecture_id, StudentId::MIN)..=(lecture_id, StudentId::MAX))
            .map(|(_, a)| a.clone())
            .collect())
    }
}
