//! Automatic recovery for crawl job pipelines
//!
//! This module provides the recovery layer that keeps a crawl moving when
//! workers die mid-job or the job processor goes quiet:
//! - `RecoveryController`: per-source orchestration of detection, remediation
//!   and statistics, plus the manual recovery entry points
//! - monitor: the background check loop driven by the controller's config
//! - `RecoveryStatsTracker`: session-scoped counters behind the stats snapshot
//!
//! Cycles never panic the monitor loop: remediation failures are captured in
//! the returned [`RecoveryOutcome`] and the affected jobs are picked up again
//! on the next tick.

pub mod controller;
pub mod monitor;
pub mod stats;

pub use controller::RecoveryController;
pub use stats::RecoveryStatsTracker;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::processor::TriggerReceipt;

/// What a single recovery pass found and did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryReport {
    /// Jobs found in `processing` past the stuck threshold
    pub stuck_jobs: usize,
    /// Jobs found in `pending` past the stale threshold
    pub stale_pending_jobs: usize,
    /// How many jobs were actually reset back to `pending`
    pub jobs_reset: usize,
    /// Receipt from the job processor, when a trigger was sent and answered
    pub trigger: Option<TriggerReceipt>,
}

impl RecoveryReport {
    /// True when the pass detected anything worth remediating.
    pub fn found_issues(&self) -> bool {
        self.stuck_jobs > 0 || self.stale_pending_jobs > 0
    }

    /// True when remediation changed something downstream, either by
    /// resetting jobs or by getting the processor to accept a trigger.
    pub fn performed_work(&self) -> bool {
        self.jobs_reset > 0 || self.trigger.map(|r| r.accepted).unwrap_or(false)
    }
}

/// Result of one recovery cycle or manual recovery run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecoveryOutcome {
    /// Nothing stuck or stale; no mutation was performed.
    NoActionNeeded,
    /// Issues were detected and the configured remediation completed.
    Remediated(RecoveryReport),
    /// Issues were detected but remediation did not complete. Jobs that were
    /// not fixed surface again on the next detection pass.
    Failed {
        report: RecoveryReport,
        error: String,
    },
}

impl RecoveryOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, RecoveryOutcome::Failed { .. })
    }
}

/// Event broadcast to subscribers after each recovery pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryEvent {
    pub source_id: Uuid,
    pub outcome: RecoveryOutcome,
    pub at: DateTime<Utc>,
}
