//! Application state shared across handlers.

use std::sync::Arc;

use attendance_core::{AttendanceTracker, Clock, SystemClock};
use chrono::{DateTime, Utc};

#[derive(Clone)]
pub struct AppState {
    pub tracker: Arc<AttendanceTracker>,
    /// Source of `now` for every tracker call.
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(tracker: Arc<AttendanceTracker>) -> Self {
        Self::with_clock(tracker, Arc::new(SystemClock))
    }

    pub fn with_clock(tracker: Arc<AttendanceTracker>, clock: Arc<dyn Clock>) -> Self {
        Self { tracker, clock }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}
