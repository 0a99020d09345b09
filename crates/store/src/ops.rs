//! Registry and ledger operations on the SQLite database.
//!
//! Writes keyed by (lecture, student) use `INSERT ... ON CONFLICT DO UPDATE`,
//! so concurrent upserts never violate the unique key.

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tracing::debug;

use attendance_core::{
    AttendanceRecord, AttendanceStore, EnrollmentRegistry, HeartbeatRecord, Lecture, LectureId,
    LectureRegistry, LectureStatus, Result, SectionId, StudentId,
};

use crate::client::Database;
use crate::helpers::{
    format_datetime, parse_attendance_status, parse_datetime, parse_lecture_status,
    parse_optional_datetime, storage_error, to_minutes,
};

const LECTURE_COLUMNS: &str = "id, section_id, starts_at, ends_at, status";
const ATTENDANCE_COLUMNS: &str =
    "lecture_id, student_id, status, checked_in_at, last_seen_at, minutes_attended";

fn row_to_lecture(row: &Row) -> anyhow::Result<Lecture> {
    let starts_at: String = row.get("starts_at")?;
    let ends_at: String = row.get("ends_at")?;
    let status: String = row.get("status")?;

    Ok(Lecture {
        id: row.get("id")?,
        section_id: row.get("section_id")?,
        starts_at: parse_datetime(&starts_at, "starts_at")?,
        ends_at: parse_datetime(&ends_at, "ends_at")?,
        status: parse_lecture_status(&status)?,
    })
}

fn row_to_heartbeat(row: &Row) -> anyhow::Result<HeartbeatRecord> {
    let joined_at: String = row.get("joined_at")?;
    let last_seen_at: String = row.get("last_seen_at")?;

    Ok(HeartbeatRecord {
        lecture_id: row.get("lecture_id")?,
        student_id: row.get("student_id")?,
        joined_at: parse_datetime(&joined_at, "joined_at")?,
        last_seen_at: parse_datetime(&last_seen_at, "last_seen_at")?,
    })
}

fn row_to_attendance(row: &Row) -> anyhow::Result<AttendanceRecord> {
    let status: String = row.get("status")?;
    let checked_in_at: Option<String> = row.get("checked_in_at")?;
    let last_seen_at: Option<String> = row.get("last_seen_at")?;
    let minutes_attended: Option<i64> = row.get("minutes_attended")?;

    Ok(AttendanceRecord {
        lecture_id: row.get("lecture_id")?,
        student_id: row.get("student_id")?,
        status: parse_attendance_status(&status)?,
        checked_in_at: parse_optional_datetime(checked_in_at, "checked_in_at")?,
        last_seen_at: parse_optional_datetime(last_seen_at, "last_seen_at")?,
        minutes_attended: to_minutes(minutes_attended)?,
    })
}

/// Writes mirrored from the scheduling subsystem.
impl Database {
    /// Insert or replace a lecture.
    pub async fn upsert_lecture(&self, lecture: &Lecture) -> anyhow::Result<()> {
        let record = lecture.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO lectures (id, section_id, starts_at, ends_at, status)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (id) DO UPDATE SET
                     section_id = excluded.section_id,
                     starts_at = excluded.starts_at,
                     ends_at = excluded.ends_at,
                     status = excluded.status",
                params![
                    record.id,
                    record.section_id,
                    format_datetime(record.starts_at),
                    format_datetime(record.ends_at),
                    record.status.as_str(),
                ],
            )
            .context("failed to upsert lecture")?;
            Ok(())
        })
        .await?;

        if let Some(cache) = self.lecture_cache() {
            cache.invalidate(lecture.id).await;
        }
        Ok(())
    }

    pub async fn set_lecture_status(
        &self,
        lecture_id: LectureId,
        status: LectureStatus,
    ) -> anyhow::Result<bool> {
        let changed = self
            .execute(move |conn| {
                let changed = conn
                    .execute(
                        "UPDATE lectures SET status = ?1 WHERE id = ?2",
                        params![status.as_str(), lecture_id],
                    )
                    .context("failed to update lecture status")?;
                Ok(changed > 0)
            })
            .await?;

        if let Some(cache) = self.lecture_cache() {
            cache.invalidate(lecture_id).await;
        }
        Ok(changed)
    }

    pub async fn enroll(&self, section_id: SectionId, student_id: StudentId) -> anyhow::Result<()> {
        self.execute(move |conn| {
            conn.execute(
                "INSERT OR IGNORE INTO enrollments (section_id, student_id) VALUES (?1, ?2)",
                params![section_id, student_id],
            )
            .context("failed to insert enrollment")?;
            Ok(())
        })
        .await
    }

    pub async fn unenroll(
        &self,
        section_id: SectionId,
        student_id: StudentId,
    ) -> anyhow::Result<()> {
        self.execute(move |conn| {
            conn.execute(
                "DELETE FROM enrollments WHERE section_id = ?1 AND student_id = ?2",
                params![section_id, student_id],
            )
            .context("failed to delete enrollment")?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl LectureRegistry for Database {
    async fn lecture(&self, id: LectureId) -> Result<Option<Lecture>> {
        if let Some(cached) = self.lecture_cache() {
            if let Some(lecture) = cached.get(id).await {
                debug!(lecture_id = id, "Lecture cache hit");
                return Ok(Some(lecture));
            }
        }

        let lecture = self
            .execute(move |conn| {
                let mut stmt = conn.prepare_cached(&format!(
                    "SELECT {LECTURE_COLUMNS} FROM lectures WHERE id = ?1"
                ))?;
                let lecture = stmt
                    .query_row(params![id], |row| Ok(row_to_lecture(row)))
                    .optional()?
                    .transpose()?;
                Ok(lecture)
            })
            .await
            .map_err(storage_error)?;

        if let (Some(cache), Some(found)) = (self.lecture_cache(), &lecture) {
            cache.insert(found.clone()).await;
        }
        Ok(lecture)
    }

    async fn lectures_ending_between(
        &self,
        after: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<Lecture>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT {LECTURE_COLUMNS} FROM lectures
                 WHERE ends_at > ?1 AND ends_at <= ?2
                 ORDER BY ends_at, id"
            ))?;
            let mut rows = stmt.query(params![format_datetime(after), format_datetime(until)])?;
            let mut lectures = Vec::new();
            while let Some(row) = rows.next()? {
                lectures.push(row_to_lecture(row)?);
            }
            Ok(lectures)
        })
        .await
        .map_err(storage_error)
    }
}

#[async_trait]
impl EnrollmentRegistry for Database {
    async fn is_enrolled(&self, section_id: SectionId, student_id: StudentId) -> Result<bool> {
        self.execute(move |conn| {
            let found = conn
                .query_row(
                    "SELECT 1 FROM enrollments WHERE section_id = ?1 AND student_id = ?2",
                    params![section_id, student_id],
                    |_| Ok(()),
                )
                .optional()?;
            Ok(found.is_some())
        })
        .await
        .map_err(storage_error)
    }

    async fn roster(&self, section_id: SectionId) -> Result<Vec<StudentId>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT student_id FROM enrollments WHERE section_id = ?1 ORDER BY student_id",
            )?;
            let students = stmt
                .query_map(params![section_id], |row| row.get::<_, i64>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(students)
        })
        .await
        .map_err(storage_error)
    }
}

#[async_trait]
impl AttendanceStore for Database {
    async fn record_heartbeat(
        &self,
        lecture_id: LectureId,
        student_id: StudentId,
        now: DateTime<Utc>,
    ) -> Result<HeartbeatRecord> {
        self.execute(move |conn| {
            let tx = conn
                .transaction()
                .context("failed to open heartbeat transaction")?;
            let now_text = format_datetime(now);

            let heartbeat = {
                let mut stmt = tx.prepare_cached(
                    "INSERT INTO heartbeats (lecture_id, student_id, joined_at, last_seen_at)
                     VALUES (?1, ?2, ?3, ?3)
                     ON CONFLICT (lecture_id, student_id) DO UPDATE SET
                         last_seen_at = excluded.last_seen_at
                     RETURNING lecture_id, student_id, joined_at, last_seen_at",
                )?;
                let mut rows = stmt.query(params![lecture_id, student_id, now_text])?;
                let row = rows
                    .next()?
                    .context("heartbeat upsert returned no row")?;
                row_to_heartbeat(row)?
            };

            tx.execute(
                "INSERT INTO attendance_records
                     (lecture_id, student_id, status, checked_in_at, last_seen_at, minutes_attended)
                 VALUES (?1, ?2, 'present', ?3, ?4, NULL)
                 ON CONFLICT (lecture_id, student_id) DO UPDATE SET
                     status = 'present',
                     checked_in_at = excluded.checked_in_at,
                     last_seen_at = excluded.last_seen_at",
                params![
                    lecture_id,
                    student_id,
                    format_datetime(heartbeat.joined_at),
                    format_datetime(heartbeat.last_seen_at),
                ],
            )
            .context("failed to upsert attendance on heartbeat")?;

            tx.commit().context("failed to commit heartbeat")?;
            Ok(heartbeat)
        })
        .await
        .map_err(storage_error)
    }

    async fn heartbeat(
        &self,
        lecture_id: LectureId,
        student_id: StudentId,
    ) -> Result<Option<HeartbeatRecord>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT lecture_id, student_id, joined_at, last_seen_at FROM heartbeats
                 WHERE lecture_id = ?1 AND student_id = ?2",
            )?;
            let heartbeat = stmt
                .query_row(params![lecture_id, student_id], |row| Ok(row_to_heartbeat(row)))
                .optional()?
                .transpose()?;
            Ok(heartbeat)
        })
        .await
        .map_err(storage_error)
    }

    async fn heartbeats_for_lecture(&self, lecture_id: LectureId) -> Result<Vec<HeartbeatRecord>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare_cached(
                "SELECT lecture_id, student_id, joined_at, last_seen_at FROM heartbeats
                 WHERE lecture_id = ?1 ORDER BY student_id",
            )?;
            let mut rows = stmt.query(params![lecture_id])?;
            let mut heartbeats = Vec::new();
            while let Some(row) = rows.next()? {
                heartbeats.push(row_to_heartbeat(row)?);
            }
            Ok(heartbeats)
        })
        .await
        .map_err(storage_error)
    }

    async fn write_final_attendance(&self, records: Vec<AttendanceRecord>) -> Result<usize> {
        self.execute(move |conn| {
            let tx = conn
                .transaction()
                .context("failed to open finalization transaction")?;
            let count = records.len();

            {
                let mut stmt = tx.prepare_cached(
                    "INSERT INTO attendance_records
                         (lecture_id, student_id, status, checked_in_at, last_seen_at, minutes_attended)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                     ON CONFLICT (lecture_id, student_id) DO UPDATE SET
                         status = excluded.status,
                         checked_in_at = excluded.checked_in_at,
                         last_seen_at = excluded.last_seen_at,
                         minutes_attended = excluded.minutes_attended",
                )?;
                for record in &records {
                    stmt.execute(params![
                        record.lecture_id,
                        record.student_id,
                        record.status.as_str(),
                        record.checked_in_at.map(format_datetime),
                        record.last_seen_at.map(format_datetime),
                        record.minutes_attended.map(i64::from),
                    ])
                    .with_context(|| {
                        format!(
                            "failed to write attendance for student {}",
                            record.student_id
                        )
                    })?;
                }
            }

            tx.commit().context("failed to commit finalization")?;
            debug!(count, "Final attendance written");
            Ok(count)
        })
        .await
        .map_err(storage_error)
    }

    async fn attendance(
        &self,
        lecture_id: LectureId,
        student_id: StudentId,
    ) -> Result<Option<AttendanceRecord>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT {ATTENDANCE_COLUMNS} FROM attendance_records
                 WHERE lecture_id = ?1 AND student_id = ?2"
            ))?;
            let record = stmt
                .query_row(params![lecture_id, student_id], |row| {
                    Ok(row_to_attendance(row))
                })
                .optional()?
                .transpose()?;
            Ok(record)
        })
        .await
        .map_err(storage_error)
    }

    async fn attendance_for_lecture(&self, lecture_id: LectureId) -> Result<Vec<AttendanceRecord>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare_cached(&format!(
                "SELECT {ATTENDANCE_COLUMNS} FROM attendance_records
                 WHERE lecture_id = ?1 ORDER BY student_id"
            ))?;
            let mut rows = stmt.query(params![lecture_id])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(row_to_attendance(row)?);
            }
            Ok(records)
        })
        .await
        .map_err(storage_error)
    }
}
