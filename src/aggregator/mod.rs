//! Rolls child page and job state up into the parent source.
//!
//! `aggregate` is a pure read; `refresh` persists the rollup and stamps
//! `last_crawled_at` when a crawl first reaches a terminal state.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use crate::errors::RecoveryError;
use crate::models::{BackgroundJob, ChildPage, CrawlStatus, PageStats, ParentSource, SourceRollup};
use crate::store::{JobStore, SourcePatch};

#[derive(Clone)]
pub struct StatusAggregator {
    store: Arc<dyn JobStore>,
}

impl StatusAggregator {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// Compute the rollup for one source. Idempotent and side-effect-free;
    /// calling it repeatedly without intervening mutations returns
    /// identical output.
    pub async fn aggregate(&self, parent_source_id: Uuid) -> Result<SourceRollup, RecoveryError> {
        let (source, pages, jobs) = self.fetch(parent_source_id).await?;
        Ok(Self::rollup(&source, &pages, &jobs))
    }

    /// Compute the rollup and write it back through the store. Sets
    /// `last_crawled_at` only on the transition into a terminal state, so
    /// an already-completed source keeps its original completion time.
    pub async fn refresh(&self, parent_source_id: Uuid) -> Result<SourceRollup, RecoveryError> {
        let (source, pages, jobs) = self.fetch(parent_source_id).await?;
        let rollup = Self::rollup(&source, &pages, &jobs);

        let mut patch = SourcePatch::from_rollup(&rollup);
        if rollup.status.is_terminal() && !source.crawl_status.is_terminal() {
            patch.last_crawled_at = Some(Utc::now());
        }
        self.store.update_source(parent_source_id, &patch).await?;

        debug!(
            "Refreshed source {} to {} ({}%, {} links)",
            parent_source_id, rollup.status, rollup.progress, rollup.links_count
        );
        Ok(rollup)
    }

    async fn fetch(
        &self,
        parent_source_id: Uuid,
    ) -> Result<(ParentSource, Vec<ChildPage>, Vec<BackgroundJob>), RecoveryError> {
        let source = self
            .store
            .get_source(parent_source_id)
            .await?
            .ok_or_else(|| {
                RecoveryError::validation(format!("source not found: {parent_source_id}"))
            })?;
        let pages = self.store.list_pages(parent_source_id).await?;
        let jobs = self.store.list_jobs(parent_source_id).await?;
        Ok((source, pages, jobs))
    }

    /// Pure rollup core.
    ///
    /// With no countable children the status mirrors the source's own jobs
    /// (link discovery may still be running); otherwise the child pages
    /// decide: every child terminal with a failure ratio above one half is
    /// `Failed`, every child terminal otherwise is `Completed`, anything
    /// else is `InProgress`. Progress is completed-over-total, kept
    /// monotone while the source stays `InProgress`.
    pub fn rollup(
        source: &ParentSource,
        pages: &[ChildPage],
        jobs: &[BackgroundJob],
    ) -> SourceRollup {
        let stats = PageStats::from_pages(pages);
        let total = stats.total;

        if total == 0 {
            let status = if jobs.iter().any(|job| job.status.is_active()) {
                CrawlStatus::InProgress
            } else {
                source.crawl_status
            };
            let progress = if source.crawl_status == CrawlStatus::InProgress {
                source.progress
            } else {
                0
            };
            return SourceRollup {
                status,
                progress,
                links_count: source.links_count,
            };
        }

        let mut progress = ((100.0 * stats.completed as f64) / total as f64)
            .round()
            .clamp(0.0, 100.0) as u8;

        let status = if stats.all_terminal() {
            let failure_ratio = stats.failed as f64 / total as f64;
            if failure_ratio > 0.5 {
                CrawlStatus::Failed
            } else {
                CrawlStatus::Completed
            }
        } else {
            CrawlStatus::InProgress
        };

        // Late link discovery can grow the denominator; never let the bar
        // move backwards while the crawl is still running.
        if status == CrawlStatus::InProgress && source.crawl_status == CrawlStatus::InProgress {
            progress = progress.max(source.progress);
        }

        SourceRollup {
            status,
            progress,
            links_count: source.links_count.max(total as u32),
        }
    }
}
