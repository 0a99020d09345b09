//! Finalization worker sweeping a SQLite-backed store, with results read
//! back through the HTTP report endpoint.

use std::sync::Arc;

use attendance_core::{
    AttendanceStatus, AttendanceStore, Clock, LectureRegistry, LectureStatus,
};
use attendance_store::Database;
use chrono::Duration;
use integration_tests::fixtures::{self, at, ALICE, LECTURE_ID};
use integration_tests::setup::{send_heartbeat, token_for, TestContext};
use worker::FinalizationWorker;

#[tokio::test]
async fn test_worker_finalizes_ended_lecture() {
    let ctx = TestContext::new().await;
    let server = ctx.server();

    ctx.set_time(at(9, 0));
    let token = token_for(&server, ALICE).await;
    send_heartbeat(&server, ALICE, &token).await.assert_status_ok();

    let lectures: Arc<dyn LectureRegistry> = ctx.lectures.clone();
    let clock: Arc<dyn Clock> = ctx.clock.clone();
    let worker =
        FinalizationWorker::new(ctx.tracker.clone(), lectures, clock, Duration::minutes(60));

    // Lecture still running: nothing to finalize.
    ctx.set_time(at(10, 30));
    let outcome = worker.sweep().await.unwrap();
    assert_eq!(outcome.lectures_finalized, 0);

    ctx.set_time(at(11, 1));
    let outcome = worker.sweep().await.unwrap();
    assert_eq!(outcome.lectures_finalized, 1);
    assert_eq!(outcome.students_finalized, fixtures::roster().len());

    let report: serde_json::Value = server
        .get(&format!("/lectures/{}/attendance", LECTURE_ID))
        .await
        .json();
    assert_eq!(report["records"][0]["status"], "left");
    assert_eq!(report["summary"]["absent"], 2);

    // Already past the watermark: not finalized again.
    ctx.set_time(at(11, 2));
    assert_eq!(worker.sweep().await.unwrap().lectures_finalized, 0);
}

#[tokio::test]
async fn test_worker_skips_cancelled_lecture_in_sqlite() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let mut lecture = fixtures::lecture();
    lecture.status = LectureStatus::Cancelled;
    db.upsert_lecture(&lecture).await.unwrap();
    db.enroll(fixtures::SECTION_ID, ALICE).await.unwrap();

    let ctx = TestContext::from_database(db.clone());
    ctx.set_time(at(11, 5));

    let lectures: Arc<dyn LectureRegistry> = db.clone();
    let clock: Arc<dyn Clock> = ctx.clock.clone();
    let worker =
        FinalizationWorker::new(ctx.tracker.clone(), lectures, clock, Duration::minutes(60));

    let outcome = worker.sweep().await.unwrap();
    assert_eq!(outcome.skipped_cancelled, 1);
    assert_eq!(outcome.lectures_finalized, 0);
    assert_eq!(worker.watermark(), at(11, 5));
}

#[tokio::test]
async fn test_restarted_worker_keeps_sqlite_records() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    db.upsert_lecture(&fixtures::lecture()).await.unwrap();
    db.enroll(fixtures::SECTION_ID, ALICE).await.unwrap();

    let mut seen = at(9, 0);
    while seen <= at(11, 0) {
        db.record_heartbeat(LECTURE_ID, ALICE, seen).await.unwrap();
        seen += Duration::minutes(5);
    }

    let ctx = TestContext::from_database(db.clone());
    let lectures: Arc<dyn LectureRegistry> = db.clone();
    let clock: Arc<dyn Clock> = ctx.clock.clone();

    ctx.set_time(at(11, 1));
    let first = FinalizationWorker::new(
        ctx.tracker.clone(),
        lectures.clone(),
        clock.clone(),
        Duration::minutes(60),
    );
    assert_eq!(first.sweep().await.unwrap().lectures_finalized, 1);
    let before = db.attendance(LECTURE_ID, ALICE).await.unwrap().unwrap();
    assert_eq!(before.status, AttendanceStatus::Present);

    // A new worker's lookback covers the same lecture 40 minutes later.
    ctx.set_time(at(11, 40));
    let restarted =
        FinalizationWorker::new(ctx.tracker.clone(), lectures, clock, Duration::minutes(60));
    assert_eq!(restarted.sweep().await.unwrap().lectures_finalized, 1);

    let after = db.attendance(LECTURE_ID, ALICE).await.unwrap().unwrap();
    assert_eq!(after, before);
}
