//! Seedable in-memory store implementations.
//!
//! These back the integration tests and let embedders run the recovery
//! stack without a database. Listings are returned in a stable order
//! (jobs by creation time, pages by URL) the way a backing table would.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::RecoveryConfig;
use crate::models::{BackgroundJob, ChildPage, CrawlStatus, ParentSource};

use super::{ConfigStore, JobPatch, JobStore, SourcePatch};

#[derive(Clone, Default)]
pub struct MemoryJobStore {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Default)]
struct Inner {
    sources: HashMap<Uuid, ParentSource>,
    pages: HashMap<Uuid, ChildPage>,
    jobs: HashMap<Uuid, BackgroundJob>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_source(&self, source: ParentSource) {
        self.inner.write().await.sources.insert(source.id, source);
    }

    pub async fn insert_page(&self, page: ChildPage) {
        self.inner.write().await.pages.insert(page.id, page);
    }

    pub async fn insert_job(&self, job: BackgroundJob) {
        self.inner.write().await.jobs.insert(job.id, job);
    }

    pub async fn get_job(&self, job_id: Uuid) -> Option<BackgroundJob> {
        self.inner.read().await.jobs.get(&job_id).cloned()
    }

    pub async fn remove_job(&self, job_id: Uuid) {
        self.inner.write().await.jobs.remove(&job_id);
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn get_source(&self, source_id: Uuid) -> Result<Option<ParentSource>> {
        Ok(self.inner.read().await.sources.get(&source_id).cloned())
    }

    async fn update_source(&self, source_id: Uuid, patch: &SourcePatch) -> Result<()> {
        let mut inner = self.inner.write().await;
        match inner.sources.get_mut(&source_id) {
            Some(source) => {
                patch.apply_to(source);
                Ok(())
            }
            None => bail!("source not found: {source_id}"),
        }
    }

    async fn mark_recrawl_started(&self, source_id: Uuid) -> Result<()> {
        let mut inner = self.inner.write().await;
        match inner.sources.get_mut(&source_id) {
            Some(source) => {
                source.progress = 0;
                source.crawl_status = CrawlStatus::Pending;
                let count = source.restart_count() + 1;
                source.set_restart_count(count);
                Ok(())
            }
            None => bail!("source not found: {source_id}"),
        }
    }

    async fn list_pages(&self, parent_source_id: Uuid) -> Result<Vec<ChildPage>> {
        let inner = self.inner.read().await;
        let mut pages: Vec<ChildPage> = inner
            .pages
            .values()
            .filter(|page| page.parent_source_id == parent_source_id)
            .cloned()
            .collect();
        pages.sort_by(|a, b| a.url.cmp(&b.url));
        Ok(pages)
    }

    async fn list_jobs(&self, source_id: Uuid) -> Result<Vec<BackgroundJob>> {
        let inner = self.inner.read().await;
        let mut jobs: Vec<BackgroundJob> = inner
            .jobs
            .values()
            .filter(|job| job.source_id == source_id)
            .cloned()
            .collect();
        jobs.sort_by_key(|job| job.created_at);
        Ok(jobs)
    }

    async fn update_jobs(&self, ids: &[Uuid], patch: &JobPatch) -> Result<usize> {
        let mut inner = self.inner.write().await;
        let mut updated = 0;
        for id in ids {
            if let Some(job) = inner.jobs.get_mut(id) {
                patch.apply_to(job);
                updated += 1;
            }
        }
        Ok(updated)
    }
}

#[derive(Clone, Default)]
pub struct MemoryConfigStore {
    configs: Arc<RwLock<HashMap<Uuid, RecoveryConfig>>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn load(&self, source_id: Uuid) -> Result<Option<RecoveryConfig>> {
        Ok(self.configs.read().await.get(&source_id).cloned())
    }

    async fn save(&self, source_id: Uuid, config: &RecoveryConfig) -> Result<()> {
        self.configs
            .write()
            .await
            .insert(source_id, config.clone());
        Ok(())
    }
}
