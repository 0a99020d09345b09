//! Lecture attendance service.
//!
//! - Issues short-lived attendance tokens to enrolled students
//! - Ingests presence heartbeats during a lecture
//! - Finalizes per-student attendance after the lecture ends

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};

use api::{router, AppState};
use attendance_core::{AttendanceTracker, Clock, LectureRegistry, SystemClock, TrackerConfig};
use attendance_store::{Database, StoreConfig};
use telemetry::{health, init_tracing_from_env};
use worker::{FinalizationWorker, WorkerConfig, WorkerScheduler, WorkerSettings};

/// Application configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Config {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,

    #[serde(default)]
    store: StoreConfig,

    #[serde(default)]
    tracker: TrackerConfig,

    #[serde(default)]
    worker: WorkerSettings,

    /// How long lecture lookups stay cached
    #[serde(default = "default_lecture_cache_ttl_secs")]
    lecture_cache_ttl_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_lecture_cache_ttl_secs() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            store: StoreConfig::default(),
            tracker: TrackerConfig::default(),
            worker: WorkerSettings::default(),
            lecture_cache_ttl_secs: default_lecture_cache_ttl_secs(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    init_tracing_from_env();

    info!("Starting attendance service v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;

    info!(
        store = %config.store.path.display(),
        tracker = ?config.tracker,
        worker_enabled = config.worker.enabled,
        "Loaded configuration"
    );

    let db = Arc::new(
        Database::open(config.store.clone())
            .context("Failed to open database")?
            .with_lecture_cache(Duration::from_secs(config.lecture_cache_ttl_secs)),
    );

    check_health(&db).await;

    let lectures: Arc<dyn LectureRegistry> = db.clone();

    let tracker = Arc::new(
        AttendanceTracker::new(&config.tracker, lectures.clone(), db.clone(), db.clone())
            .context("Failed to build attendance tracker")?,
    );

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let _worker_handles = if config.worker.enabled {
        let finalization = Arc::new(FinalizationWorker::new(
            tracker.clone(),
            lectures.clone(),
            clock.clone(),
            config.worker.lookback(),
        ));
        let scheduler = Arc::new(WorkerScheduler::new(
            WorkerConfig::from(&config.worker),
            finalization,
        ));
        scheduler.start()
    } else {
        warn!("Finalization worker disabled; lectures finalize only via the HTTP trigger");
        Vec::new()
    };

    let state = AppState::with_clock(tracker, clock);
    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid server address")?;

    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutdown complete");
    Ok(())
}

/// Load configuration from files and environment.
fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        .add_source(config::Config::try_from(&Config::default())?)
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        // e.g. ATTENDANCE__TRACKER__LATE_THRESHOLD_MINUTES=15
        .add_source(
            config::Environment::default()
                .separator("__")
                .prefix("ATTENDANCE")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let mut config: Config = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    // Secrets are usually injected flat rather than nested.
    if let Ok(key) = std::env::var("ATTENDANCE_TOKEN_KEY") {
        config.tracker.token_key = key;
    }
    if let Ok(path) = std::env::var("ATTENDANCE_DB_PATH") {
        config.store.path = path.into();
    }

    Ok(config)
}

/// Check component health on startup.
async fn check_health(db: &Database) {
    if attendance_store::health::check_connection(db).await {
        health().store.set_healthy();
        info!("SQLite store: healthy");
    } else {
        health().store.set_unhealthy("Connection failed");
        error!("SQLite store: unhealthy");
    }
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
