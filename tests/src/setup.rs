//! Common test setup functions.

use std::sync::Arc;

use api::{router, state::AppState};
use attendance_core::{
    AttendanceStore, AttendanceTracker, EnrollmentRegistry, LectureId, LectureRegistry, ManualClock,
    MemoryStore, StudentId, TokenCodec, TrackerConfig,
};
use attendance_store::Database;
use axum::Router;
use axum_test::{TestResponse, TestServer};
use chrono::{DateTime, Utc};
use serde_json::json;
use telemetry::health;

use crate::fixtures;

/// Real router over a seeded store, driven by a manual clock.
pub struct TestContext {
    pub clock: Arc<ManualClock>,
    pub lectures: Arc<dyn LectureRegistry>,
    pub tracker: Arc<AttendanceTracker>,
    pub router: Router,
}

impl TestContext {
    /// In-memory store seeded with `fixtures::lecture()` and its roster.
    pub async fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        store.insert_lecture(fixtures::lecture());
        for student in fixtures::roster() {
            store.enroll(fixtures::SECTION_ID, student);
        }

        Self::build(store.clone(), store.clone(), store)
    }

    /// Same fixtures on an in-memory SQLite database.
    pub async fn with_sqlite() -> Self {
        let db = Arc::new(Database::open_in_memory().expect("Failed to open database"));
        db.upsert_lecture(&fixtures::lecture())
            .await
            .expect("Failed to seed lecture");
        for student in fixtures::roster() {
            db.enroll(fixtures::SECTION_ID, student)
                .await
                .expect("Failed to seed enrollment");
        }

        Self::from_database(db)
    }

    /// Context over an already seeded database.
    pub fn from_database(db: Arc<Database>) -> Self {
        Self::build(db.clone(), db.clone(), db)
    }

    fn build(
        lectures: Arc<dyn LectureRegistry>,
        enrollments: Arc<dyn EnrollmentRegistry>,
        store: Arc<dyn AttendanceStore>,
    ) -> Self {
        health().store.set_healthy();

        let config = TrackerConfig::new(TokenCodec::generate_key());
        let tracker = Arc::new(
            AttendanceTracker::new(&config, lectures.clone(), enrollments, store)
                .expect("Failed to build tracker"),
        );

        let clock = Arc::new(ManualClock::new(fixtures::at(9, 0)));
        let state = AppState::with_clock(tracker.clone(), clock.clone());

        Self {
            clock,
            lectures,
            tracker,
            router: router(state),
        }
    }

    pub fn server(&self) -> TestServer {
        TestServer::new(self.router.clone()).expect("Failed to create test server")
    }

    pub fn set_time(&self, now: DateTime<Utc>) {
        self.clock.set(now);
    }
}

/// POST the token request for `student` and return the raw response.
pub async fn request_token(
    server: &TestServer,
    lecture_id: LectureId,
    student: StudentId,
) -> TestResponse {
    server
        .post(&format!("/lectures/{}/attendance-token", lecture_id))
        .add_header("X-Student-Id", student.to_string())
        .await
}

/// Issue a token and return the token string.
pub async fn token_for(server: &TestServer, student: StudentId) -> String {
    let response = request_token(server, fixtures::LECTURE_ID, student).await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    body["token"]
        .as_str()
        .expect("token missing from response")
        .to_string()
}

pub async fn send_heartbeat(server: &TestServer, student: StudentId, token: &str) -> TestResponse {
    server
        .post("/attendance/heartbeat")
        .add_header("X-Student-Id", student.to_string())
        .json(&json!({ "token": token }))
        .await
}
