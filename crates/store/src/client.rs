//! SQLite connection owned by a dedicated thread.
//!
//! The connection is opened and migrated on the caller's thread, then moved
//! into a worker thread that drains a queue of closures. Async callers await
//! each closure's result over a oneshot channel. One connection means writers
//! are serialized and each closure sees a consistent database.

use std::sync::{mpsc, Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use rusqlite::Connection;
use tokio::sync::oneshot;
use tracing::{debug, error, info};

use crate::cache::LectureCache;
use crate::config::StoreConfig;
use crate::schema::run_migrations;

type DbTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

/// Queue into the DB thread. Dropping the sender ends the thread's loop.
struct TaskQueue {
    sender: Mutex<Option<mpsc::Sender<DbTask>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl TaskQueue {
    fn submit(&self, task: DbTask) -> Result<()> {
        let guard = self
            .sender
            .lock()
            .map_err(|_| anyhow!("database queue lock poisoned"))?;
        let sender = guard
            .as_ref()
            .ok_or_else(|| anyhow!("database thread already stopped"))?;
        sender
            .send(task)
            .map_err(|_| anyhow!("database thread is not accepting work"))
    }
}

impl Drop for TaskQueue {
    fn drop(&mut self) {
        if let Ok(mut sender) = self.sender.lock() {
            sender.take();
        }
        let handle = self.thread.lock().ok().and_then(|mut slot| slot.take());
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("Database thread panicked");
            }
        }
    }
}

/// Handle to the SQLite database. Cheap to clone.
#[derive(Clone)]
pub struct Database {
    queue: Arc<TaskQueue>,
    config: Arc<StoreConfig>,
    lecture_cache: Option<LectureCache>,
}

impl Database {
    /// Opens the database, applies migrations, and starts the DB thread.
    pub fn open(config: StoreConfig) -> Result<Self> {
        let mut conn = connect(&config)?;
        run_migrations(&mut conn).context("failed to run database migrations")?;

        let (sender, receiver) = mpsc::channel::<DbTask>();
        let thread = thread::Builder::new()
            .name("attendance-db".into())
            .spawn(move || {
                while let Ok(task) = receiver.recv() {
                    task(&mut conn);
                }
                debug!("Database thread stopped");
            })
            .context("failed to spawn database thread")?;

        info!(path = %config.path.display(), "Opened attendance database");

        Ok(Self {
            queue: Arc::new(TaskQueue {
                sender: Mutex::new(Some(sender)),
                thread: Mutex::new(Some(thread)),
            }),
            config: Arc::new(config),
            lecture_cache: None,
        })
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Self::open(StoreConfig::in_memory())
    }

    /// Serve single-lecture lookups from a cache. Lecture writes made
    /// through this handle invalidate their entry.
    pub fn with_lecture_cache(mut self, ttl: Duration) -> Self {
        self.lecture_cache = Some(LectureCache::new(ttl));
        self
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub(crate) fn lecture_cache(&self) -> Option<&LectureCache> {
        self.lecture_cache.as_ref()
    }

    /// Runs `task` on the DB thread and returns its result.
    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.queue.submit(Box::new(move |conn| {
            // The caller may have been cancelled; the result is then unused.
            let _ = reply_tx.send(task(conn));
        }))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("database thread dropped the request"))?
    }
}

fn connect(config: &StoreConfig) -> Result<Connection> {
    if !config.is_in_memory() {
        if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }
    }

    let conn = Connection::open(&config.path)
        .with_context(|| format!("failed to open SQLite database {}", config.path.display()))?;

    conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .context("failed to set busy timeout")?;
    if !config.is_in_memory() {
        conn.pragma_update(None, "journal_mode", "WAL")
            .context("failed to enable WAL mode")?;
    }
    conn.pragma_update(None, "foreign_keys", "ON")
        .context("failed to enable foreign keys")?;

    Ok(conn)
}
