//! API routes.

pub mod attendance;
pub mod health;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::state::AppState;

/// Creates the API router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/lectures/:lecture_id/attendance-token",
            post(attendance::issue_token_handler),
        )
        .route("/attendance/heartbeat", post(attendance::heartbeat_handler))
        .route(
            "/lectures/:lecture_id/finalize",
            post(attendance::finalize_handler),
        )
        .route(
            "/lectures/:lecture_id/attendance",
            get(attendance::lecture_attendance_handler),
        )
        .route("/health", get(health::health_handler))
        .route("/health/ready", get(health::ready_handler))
        .route("/health/live", get(health::live_handler))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
