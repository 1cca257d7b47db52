//! Detection of jobs the worker pool has lost track of.
//!
//! Two distinct failure modes: a *stuck* job entered `Processing` and
//! never left (worker died or hung mid-flight); a *stale-pending* job was
//! never picked up at all. Thresholds always come from the caller.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::errors::RecoveryError;
use crate::models::{BackgroundJob, JobStatus};
use crate::store::JobStore;

#[derive(Clone)]
pub struct StuckJobDetector {
    store: Arc<dyn JobStore>,
}

impl StuckJobDetector {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// Jobs in `Processing` whose `started_at` is strictly older than
    /// `now - threshold`. A job exactly at the boundary is not stuck.
    pub async fn find_stuck_jobs(
        &self,
        source_id: Uuid,
        threshold: Duration,
    ) -> Result<Vec<BackgroundJob>, RecoveryError> {
        let jobs = self.store.list_jobs(source_id).await?;
        Ok(Self::stuck_jobs_in(jobs, threshold, Utc::now()))
    }

    /// Jobs still `Pending` whose `created_at` is strictly older than
    /// `now - threshold`, meaning no worker ever picked them up.
    pub async fn find_stale_pending(
        &self,
        source_id: Uuid,
        threshold: Duration,
    ) -> Result<Vec<BackgroundJob>, RecoveryError> {
        let jobs = self.store.list_jobs(source_id).await?;
        Ok(Self::stale_pending_in(jobs, threshold, Utc::now()))
    }

    /// Pure filtering core; `now` is explicit so tests can pin the exact
    /// boundary.
    pub fn stuck_jobs_in(
        jobs: Vec<BackgroundJob>,
        threshold: Duration,
        now: DateTime<Utc>,
    ) -> Vec<BackgroundJob> {
        let cutoff = now - threshold;
        jobs.into_iter()
            .filter(|job| {
                job.status == JobStatus::Processing
                    && matches!(job.started_at, Some(started_at) if started_at < cutoff)
            })
            .collect()
    }

    /// Pure filtering core for the never-picked-up case.
    pub fn stale_pending_in(
        jobs: Vec<BackgroundJob>,
        threshold: Duration,
        now: DateTime<Utc>,
    ) -> Vec<BackgroundJob> {
        let cutoff = now - threshold;
        jobs.into_iter()
            .filter(|job| job.status == JobStatus::Pending && job.created_at < cutoff)
            .collect()
    }
}
