//! Session-scoped recovery statistics

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use crate::models::RecoveryStats;

/// Rolling counters behind [`RecoveryStats`] snapshots.
///
/// Counters live in memory only and start fresh each time monitoring is
/// enabled. Cheap to clone; all clones share the same state.
#[derive(Clone, Default)]
pub struct RecoveryStatsTracker {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Default)]
struct Inner {
    total_recoveries: u32,
    last_recovery_at: Option<DateTime<Utc>>,
    cycles_run: u32,
    cycles_succeeded: u32,
    next_check_at: Option<DateTime<Utc>>,
}

impl Inner {
    fn success_rate(&self) -> u8 {
        if self.cycles_run == 0 {
            // No cycles yet, nothing has failed
            return 100;
        }
        ((self.cycles_succeeded as f64 / self.cycles_run as f64) * 100.0).round() as u8
    }
}

impl RecoveryStatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finished cycle. A cycle counts as successful when it ran to
    /// completion, whether or not it found anything to fix.
    pub async fn record_cycle(&self, success: bool) {
        let mut inner = self.inner.write().await;
        inner.cycles_run += 1;
        if success {
            inner.cycles_succeeded += 1;
        }
    }

    /// Record a recovery that performed actual work.
    pub async fn record_recovery(&self) {
        let mut inner = self.inner.write().await;
        inner.total_recoveries += 1;
        inner.last_recovery_at = Some(Utc::now());
    }

    /// Advance the advertised next check time by `interval` from now.
    pub async fn schedule_next_check(&self, interval: Duration) {
        self.inner.write().await.next_check_at = Some(Utc::now() + interval);
    }

    /// Clear all counters, used when monitoring is (re-)enabled.
    pub async fn reset(&self) {
        *self.inner.write().await = Inner::default();
    }

    pub async fn snapshot(&self) -> RecoveryStats {
        let inner = self.inner.read().await;
        RecoveryStats {
            total_recoveries: inner.total_recoveries,
            last_recovery_at: inner.last_recovery_at,
            success_rate: inner.success_rate(),
            next_check_at: inner.next_check_at,
        }
    }
}
