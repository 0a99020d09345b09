//! Tracker configuration.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{Error, Result};

/// Default token lifetime in minutes.
pub const DEFAULT_TOKEN_TTL_MINUTES: u32 = 10;

/// Minutes after lecture start beyond which a first heartbeat counts as late.
pub const DEFAULT_LATE_THRESHOLD_MINUTES: u32 = 10;

/// Minutes of heartbeat silence before finalization that count as having left.
pub const DEFAULT_INACTIVE_THRESHOLD_MINUTES: u32 = 10;

/// Configuration injected into the tracker at construction.
#[derive(Clone, Serialize, Deserialize, Validate)]
pub struct TrackerConfig {
    /// Base64-encoded 256-bit key for attendance tokens.
    /// Loaded at startup and never rotated while the process runs.
    #[serde(default)]
    #[validate(length(min = 1))]
    pub token_key: String,
    #[serde(default = "default_token_ttl_minutes")]
    #[validate(range(min = 1, max = 1440))]
    pub token_ttl_minutes: u32,
    #[serde(default = "default_late_threshold_minutes")]
    #[validate(range(max = 1440))]
    pub late_threshold_minutes: u32,
    #[serde(default = "default_inactive_threshold_minutes")]
    #[validate(range(max = 1440))]
    pub inactive_threshold_minutes: u32,
}

fn default_token_ttl_minutes() -> u32 {
    DEFAULT_TOKEN_TTL_MINUTES
}

fn default_late_threshold_minutes() -> u32 {
    DEFAULT_LATE_THRESHOLD_MINUTES
}

fn default_inactive_threshold_minutes() -> u32 {
    DEFAULT_INACTIVE_THRESHOLD_MINUTES
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            token_key: String::new(),
            token_ttl_minutes: default_token_ttl_minutes(),
            late_threshold_minutes: default_late_threshold_minutes(),
            inactive_threshold_minutes: default_inactive_threshold_minutes(),
        }
    }
}

// Keeps the key out of logs.
impl std::fmt::Debug for TrackerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackerConfig")
            .field("token_key", &"<redacted>")
            .field("token_ttl_minutes", &self.token_ttl_minutes)
            .field("late_threshold_minutes", &self.late_threshold_minutes)
            .field("inactive_threshold_minutes", &self.inactive_threshold_minutes)
            .finish()
    }
}

impl TrackerConfig {
    pub fn new(token_key: impl Into<String>) -> Self {
        Self {
            token_key: token_key.into(),
            ..Self::default()
        }
    }

    /// Validate field ranges.
    pub fn check(&self) -> Result<()> {
        self.validate()
            .map_err(|e| Error::config(format!("tracker config: {}", e)))
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::minutes(i64::from(self.token_ttl_minutes))
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            late: Duration::minutes(i64::from(self.late_threshold_minutes)),
            inactive: Duration::minutes(i64::from(self.inactive_threshold_minutes)),
        }
    }
}

/// Classification thresholds used at finalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub late: Duration,
    pub inactive: Duration,
}

impl Default for Thresholds {
    fn default() -> Self {
        TrackerConfig::default().thresholds()
    }
}
