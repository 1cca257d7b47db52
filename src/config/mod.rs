use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::errors::RecoveryError;

/// Per-source recovery configuration, persisted through a
/// [`ConfigStore`](crate::store::ConfigStore).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecoveryConfig {
    pub enabled: bool,
    pub check_interval_minutes: u32,
    pub stuck_job_threshold_minutes: u32,
    pub max_retries: u32,
    pub auto_reset_stuck_jobs: bool,
    pub auto_trigger_processor: bool,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            check_interval_minutes: 5,
            stuck_job_threshold_minutes: 10,
            max_retries: 3,
            auto_reset_stuck_jobs: true,
            auto_trigger_processor: true,
        }
    }
}

impl RecoveryConfig {
    /// Reject configurations the monitor cannot run with. Called before any
    /// store access and again whenever a stored config is loaded.
    pub fn validate(&self) -> Result<(), RecoveryError> {
        if self.check_interval_minutes == 0 {
            return Err(RecoveryError::configuration(
                "check_interval_minutes must be greater than zero",
            ));
        }
        if self.stuck_job_threshold_minutes == 0 {
            return Err(RecoveryError::configuration(
                "stuck_job_threshold_minutes must be greater than zero",
            ));
        }
        Ok(())
    }

    pub fn check_interval(&self) -> Duration {
        Duration::minutes(self.check_interval_minutes as i64)
    }

    pub fn stuck_job_threshold(&self) -> Duration {
        Duration::minutes(self.stuck_job_threshold_minutes as i64)
    }

    /// A pending job is stale once it has gone one full check interval
    /// without being picked up.
    pub fn stale_pending_threshold(&self) -> Duration {
        self.check_interval()
    }
}

/// Process-local controller tunables. Unlike [`RecoveryConfig`] these are
/// never persisted; embedders set them at construction time.
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    /// Upper bound passed to the external job processor per trigger call.
    pub max_trigger_jobs: u32,
    /// Pause between resetting jobs and triggering the processor during a
    /// full recovery, so the resets are visible to the triggered worker.
    pub settle_delay: std::time::Duration,
    /// How long a source id stays in the recrawl guard set.
    pub recrawl_cooldown: std::time::Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            max_trigger_jobs: 50,
            settle_delay: std::time::Duration::from_secs(1),
            recrawl_cooldown: std::time::Duration::from_secs(2),
        }
    }
}

impl ControllerSettings {
    pub fn with_max_trigger_jobs(mut self, max_trigger_jobs: u32) -> Self {
        self.max_trigger_jobs = max_trigger_jobs;
        self
    }

    pub fn with_settle_delay(mut self, settle_delay: std::time::Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    pub fn with_recrawl_cooldown(mut self, recrawl_cooldown: std::time::Duration) -> Self {
        self.recrawl_cooldown = recrawl_cooldown;
        self
    }
}
