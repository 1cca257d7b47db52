//! Read-only statistics over the job queue and page table.

use std::sync::Arc;

use uuid::Uuid;

use crate::errors::RecoveryError;
use crate::models::{JobStats, PageStats};
use crate::store::JobStore;

/// Computes per-source job and page counters from the current store
/// snapshot. Pure reads, no side effects.
#[derive(Clone)]
pub struct JobQueueInspector {
    store: Arc<dyn JobStore>,
}

impl JobQueueInspector {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// Job counts by status. Absence of work is not a failure state:
    /// an unknown or empty source yields zeroed counters.
    pub async fn job_stats(&self, source_id: Uuid) -> Result<JobStats, RecoveryError> {
        let jobs = self.store.list_jobs(source_id).await?;
        Ok(JobStats::from_jobs(&jobs))
    }

    /// Page counts by status, with `Removed` pages excluded entirely.
    pub async fn page_stats(&self, parent_source_id: Uuid) -> Result<PageStats, RecoveryError> {
        let pages = self.store.list_pages(parent_source_id).await?;
        Ok(PageStats::from_pages(&pages))
    }
}
