//! Finalization sweep.
//!
//! Each sweep finalizes lectures whose `ends_at` falls in
//! `(watermark, now]`, then moves the watermark forward. Lectures are
//! classified as of their `ends_at`, so sweeping the same lecture again
//! (after a restart or a retry) writes the same records.
//!
//! A lecture that fails pins the watermark just before its `ends_at` so the
//! next sweep retries it, up to `MAX_FINALIZE_ATTEMPTS`. A lecture that no
//! longer exists is dropped without pinning.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use attendance_core::{
    AttendanceErrorKind, AttendanceTracker, Clock, LectureId, LectureRegistry, LectureStatus,
};
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use telemetry::metrics;
use tracing::{debug, error, info, warn};

/// Sweeps a failing lecture is retried on before the watermark moves past it.
pub const MAX_FINALIZE_ATTEMPTS: u32 = 5;

/// Counts from one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepOutcome {
    pub lectures_finalized: usize,
    pub students_finalized: usize,
    pub skipped_cancelled: usize,
    pub skipped_missing: usize,
    pub failed: usize,
    pub abandoned: usize,
}

pub struct FinalizationWorker {
    tracker: Arc<AttendanceTracker>,
    lectures: Arc<dyn LectureRegistry>,
    clock: Arc<dyn Clock>,
    watermark: Mutex<DateTime<Utc>>,
    attempts: Mutex<HashMap<LectureId, u32>>,
}

impl FinalizationWorker {
    /// Starts with the watermark at `now - lookback`.
    pub fn new(
        tracker: Arc<AttendanceTracker>,
        lectures: Arc<dyn LectureRegistry>,
        clock: Arc<dyn Clock>,
        lookback: Duration,
    ) -> Self {
        let watermark = clock.now() - lookback;
        metrics().worker_watermark.set(watermark.timestamp().max(0) as u64);

        Self {
            tracker,
            lectures,
            clock,
            watermark: Mutex::new(watermark),
            attempts: Mutex::new(HashMap::new()),
        }
    }

    pub fn watermark(&self) -> DateTime<Utc> {
        *self.watermark.lock()
    }

    /// Finalize every lecture that ended since the last sweep.
    ///
    /// Errors only when the lecture listing itself fails; per-lecture failures
    /// are counted in the outcome.
    pub async fn sweep(&self) -> Result<SweepOutcome> {
        let now = self.clock.now();
        let since = self.watermark();
        let mut outcome = SweepOutcome::default();

        if now <= since {
            return Ok(outcome);
        }

        metrics().worker_sweeps.inc();

        let ended = self
            .lectures
            .lectures_ending_between(since, now)
            .await
            .with_context(|| format!("failed to list lectures ending in ({since}, {now}]"))?;

        let mut next_watermark = now;

        for lecture in ended {
            if lecture.status == LectureStatus::Cancelled {
                debug!(lecture_id = lecture.id, "Skipping cancelled lecture");
                outcome.skipped_cancelled += 1;
                continue;
            }

            let start = Instant::now();
            let finalize_at = lecture.ends_at.min(now);

            match self.tracker.finalize_lecture(lecture.id, finalize_at).await {
                Ok(result) => {
                    self.attempts.lock().remove(&lecture.id);
                    metrics()
                        .finalize_latency_ms
                        .observe(start.elapsed().as_millis() as u64);
                    metrics().lectures_finalized.inc();
                    metrics()
                        .students_finalized
                        .inc_by(result.finalized_count as u64);

                    outcome.lectures_finalized += 1;
                    outcome.students_finalized += result.finalized_count;
                }
                Err(e) if e.kind() == Some(AttendanceErrorKind::NotFound) => {
                    self.attempts.lock().remove(&lecture.id);
                    warn!(lecture_id = lecture.id, "Lecture vanished before finalization");
                    outcome.skipped_missing += 1;
                }
                Err(e) => {
                    metrics().finalize_errors.inc();

                    let attempt = {
                        let mut attempts = self.attempts.lock();
                        let count = attempts.entry(lecture.id).or_insert(0);
                        *count += 1;
                        *count
                    };

                    if attempt >= MAX_FINALIZE_ATTEMPTS {
                        self.attempts.lock().remove(&lecture.id);
                        error!(
                            lecture_id = lecture.id,
                            attempt,
                            error = %e,
                            "Giving up on lecture finalization"
                        );
                        outcome.abandoned += 1;
                        continue;
                    }

                    error!(lecture_id = lecture.id, attempt, error = %e, "Failed to finalize lecture");
                    outcome.failed += 1;
                    let retry_from = lecture.ends_at - Duration::nanoseconds(1);
                    if retry_from < next_watermark {
                        next_watermark = retry_from;
                    }
                }
            }
        }

        *self.watermark.lock() = next_watermark;
        metrics()
            .worker_watermark
            .set(next_watermark.timestamp().max(0) as u64);

        if outcome != SweepOutcome::default() {
            info!(
                lectures = outcome.lectures_finalized,
                students = outcome.students_finalized,
                skipped = outcome.skipped_cancelled + outcome.skipped_missing,
                failed = outcome.failed,
                abandoned = outcome.abandoned,
                watermark = %next_watermark,
                "Finalization sweep complete"
            );
        }

        Ok(outcome)
    }
}
