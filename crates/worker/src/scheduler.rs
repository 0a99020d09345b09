//! Worker scheduler for background tasks.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use telemetry::health;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use crate::finalization::FinalizationWorker;

/// Worker settings as read from configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSettings {
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    #[serde(default = "default_lookback_minutes")]
    pub lookback_minutes: u32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_lookback_minutes() -> u32 {
    60
}

fn default_enabled() -> bool {
    true
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval_secs(),
            lookback_minutes: default_lookback_minutes(),
            enabled: default_enabled(),
        }
    }
}

impl WorkerSettings {
    pub fn lookback(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.lookback_minutes))
    }
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Finalization sweep interval
    pub sweep_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl From<&WorkerSettings> for WorkerConfig {
    fn from(settings: &WorkerSettings) -> Self {
        Self {
            sweep_interval: Duration::from_secs(settings.sweep_interval_secs.max(1)),
        }
    }
}

/// Background worker scheduler.
pub struct WorkerScheduler {
    config: WorkerConfig,
    finalization: Arc<FinalizationWorker>,
}

impl WorkerScheduler {
    pub fn new(config: WorkerConfig, finalization: Arc<FinalizationWorker>) -> Self {
        Self {
            config,
            finalization,
        }
    }

    /// Starts all background workers.
    pub fn start(self: Arc<Self>) -> Vec<tokio::task::JoinHandle<()>> {
        let scheduler = self.clone();
        let handles = vec![tokio::spawn(async move {
            scheduler.run_finalization_worker().await;
        })];

        info!(
            sweep_interval_secs = self.config.sweep_interval.as_secs(),
            "Background workers started"
        );
        handles
    }

    async fn run_finalization_worker(&self) {
        let mut ticker = interval(self.config.sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            match self.finalization.sweep().await {
                Ok(outcome) if outcome.failed + outcome.abandoned > 0 => {
                    health().worker.set_unhealthy(format!(
                        "{} lectures failed to finalize",
                        outcome.failed + outcome.abandoned
                    ));
                }
                Ok(_) => health().worker.set_healthy(),
                Err(e) => {
                    error!("Finalization worker error: {:#}", e);
                    health().worker.set_unhealthy(e.to_string());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_defaults() {
        let settings: WorkerSettings = serde_json::from_str("{}").unwrap();
        assert_eq!(settings.sweep_interval_secs, 60);
        assert_eq!(settings.lookback_minutes, 60);
        assert!(settings.enabled);
        assert_eq!(settings.lookback(), chrono::Duration::minutes(60));
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let settings = WorkerSettings {
            sweep_interval_secs: 0,
            ..WorkerSettings::default()
        };
        assert_eq!(
            WorkerConfig::from(&settings).sweep_interval,
            Duration::from_secs(1)
        );
    }
}
