//! Collaborator seams for persistence: the job/page store and the
//! per-source recovery-config store.
//!
//! Real deployments back these with a database and a key-value store;
//! [`memory`] provides seedable in-memory implementations for tests and
//! embedders that bring their own scheduling.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::config::RecoveryConfig;
use crate::models::{BackgroundJob, ChildPage, CrawlStatus, JobStatus, ParentSource, SourceRollup};

pub mod memory;

pub use memory::{MemoryConfigStore, MemoryJobStore};

/// Error message recorded on jobs reset by the recovery system.
pub const AUTO_RESET_MESSAGE: &str = "Auto-reset by recovery system";

/// Partial update applied to a batch of jobs. An outer `None` leaves the
/// field unchanged; the nested `Option` distinguishes set from clear.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobPatch {
    pub status: Option<JobStatus>,
    pub started_at: Option<Option<DateTime<Utc>>>,
    pub error_message: Option<Option<String>>,
}

impl JobPatch {
    /// The patch recovery applies to stuck jobs: back to `Pending` with
    /// `started_at` cleared and the auto-reset marker recorded.
    pub fn auto_reset() -> Self {
        Self {
            status: Some(JobStatus::Pending),
            started_at: Some(None),
            error_message: Some(Some(AUTO_RESET_MESSAGE.to_string())),
        }
    }

    pub fn apply_to(&self, job: &mut BackgroundJob) {
        if let Some(status) = self.status {
            job.status = status;
        }
        if let Some(started_at) = self.started_at {
            job.started_at = started_at;
        }
        if let Some(error_message) = &self.error_message {
            job.error_message = error_message.clone();
        }
    }
}

/// Partial update applied to a parent source. `last_crawled_at` is
/// set-only; nothing in recovery ever clears it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourcePatch {
    pub crawl_status: Option<CrawlStatus>,
    pub progress: Option<u8>,
    pub links_count: Option<u32>,
    pub last_crawled_at: Option<DateTime<Utc>>,
}

impl SourcePatch {
    pub fn from_rollup(rollup: &SourceRollup) -> Self {
        Self {
            crawl_status: Some(rollup.status),
            progress: Some(rollup.progress),
            links_count: Some(rollup.links_count),
            last_crawled_at: None,
        }
    }

    pub fn apply_to(&self, source: &mut ParentSource) {
        if let Some(crawl_status) = self.crawl_status {
            source.crawl_status = crawl_status;
        }
        if let Some(progress) = self.progress {
            source.progress = progress;
        }
        if let Some(links_count) = self.links_count {
            source.links_count = links_count;
        }
        if let Some(last_crawled_at) = self.last_crawled_at {
            source.last_crawled_at = Some(last_crawled_at);
        }
    }
}

/// Persistence seam for sources, pages, and background jobs.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn get_source(&self, source_id: Uuid) -> Result<Option<ParentSource>>;

    async fn update_source(&self, source_id: Uuid, patch: &SourcePatch) -> Result<()>;

    /// Atomically reset `progress` to 0 and `crawl_status` to `Pending`
    /// while bumping the restart count. Backing stores must perform this
    /// as one operation.
    async fn mark_recrawl_started(&self, source_id: Uuid) -> Result<()>;

    async fn list_pages(&self, parent_source_id: Uuid) -> Result<Vec<ChildPage>>;

    async fn list_jobs(&self, source_id: Uuid) -> Result<Vec<BackgroundJob>>;

    /// Apply `patch` to every listed job; returns how many rows were
    /// actually touched. Unknown ids are skipped, not an error.
    async fn update_jobs(&self, ids: &[Uuid], patch: &JobPatch) -> Result<usize>;
}

/// Opaque key-value storage for per-source recovery configuration.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn load(&self, source_id: Uuid) -> Result<Option<RecoveryConfig>>;

    async fn save(&self, source_id: Uuid, config: &RecoveryConfig) -> Result<()>;
}
