//! Core data model: crawl sources, pages, background jobs, and the
//! statistics shapes derived from them.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata key tracking how many times a source has been recrawled.
pub const RESTART_COUNT_KEY: &str = "restart_count";

/// One crawl root added by a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParentSource {
    pub id: Uuid,
    pub url: String,
    pub crawl_status: CrawlStatus,
    pub progress: u8, // 0-100
    pub links_count: u32,
    pub last_crawled_at: Option<DateTime<Utc>>,
    pub is_excluded: bool,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl ParentSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            url: url.into(),
            crawl_status: CrawlStatus::Pending,
            progress: 0,
            links_count: 0,
            last_crawled_at: None,
            is_excluded: false,
            metadata: HashMap::new(),
        }
    }

    /// How many times this source has been recrawled, read from metadata.
    pub fn restart_count(&self) -> u32 {
        self.metadata
            .get(RESTART_COUNT_KEY)
            .and_then(|v| v.as_u64())
            .unwrap_or(0) as u32
    }

    pub fn set_restart_count(&mut self, count: u32) {
        self.metadata
            .insert(RESTART_COUNT_KEY.to_string(), serde_json::json!(count));
    }
}

/// One discovered/crawled URL beneath a [`ParentSource`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChildPage {
    pub id: Uuid,
    pub parent_source_id: Uuid,
    pub url: String,
    pub status: PageStatus,
    pub error_message: Option<String>,
    pub content_size: u64,
    pub chunks_created: u32,
    pub processing_time_ms: u64,
}

impl ChildPage {
    pub fn new(parent_source_id: Uuid, url: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            parent_source_id,
            url: url.into(),
            status: PageStatus::Pending,
            error_message: None,
            content_size: 0,
            chunks_created: 0,
            processing_time_ms: 0,
        }
    }
}

/// A unit of asynchronous work tracked independently of [`ChildPage`]
/// for retry and recovery purposes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackgroundJob {
    pub id: Uuid,
    pub source_id: Uuid,
    pub page_id: Option<Uuid>,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl BackgroundJob {
    pub fn new(source_id: Uuid, page_id: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_id,
            page_id,
            status: JobStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            error_message: None,
        }
    }
}

/// Overall crawl state of a [`ParentSource`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CrawlStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl CrawlStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CrawlStatus::Pending => "pending",
            CrawlStatus::InProgress => "in_progress",
            CrawlStatus::Completed => "completed",
            CrawlStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CrawlStatus::Completed | CrawlStatus::Failed)
    }

    /// Exhaustive transition table. A recrawl resets any state back to
    /// `Pending`; late-arriving work may reopen a terminal source.
    pub fn can_transition_to(&self, next: CrawlStatus) -> bool {
        use CrawlStatus::*;
        match (*self, next) {
            (current, target) if current == target => true,
            (Pending, InProgress) => true,
            (InProgress, Completed) | (InProgress, Failed) => true,
            (Completed, InProgress) | (Failed, InProgress) => true,
            (_, Pending) => true,
            _ => false,
        }
    }
}

impl fmt::Display for CrawlStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-page crawl state. `Removed` pages are kept for audit but excluded
/// from every aggregation counter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Removed,
}

impl PageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageStatus::Pending => "pending",
            PageStatus::InProgress => "in_progress",
            PageStatus::Completed => "completed",
            PageStatus::Failed => "failed",
            PageStatus::Removed => "removed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PageStatus::Completed | PageStatus::Failed)
    }

    pub fn can_transition_to(&self, next: PageStatus) -> bool {
        use PageStatus::*;
        match (*self, next) {
            (current, target) if current == target => true,
            (Pending, InProgress) => true,
            (InProgress, Completed) | (InProgress, Failed) => true,
            (Pending, Removed) | (InProgress, Removed) => true,
            (Completed, Removed) | (Failed, Removed) => true,
            (Completed, Pending) | (Failed, Pending) => true,
            _ => false,
        }
    }
}

impl fmt::Display for PageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a [`BackgroundJob`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Processing)
    }

    /// Exhaustive transition table. Recovery may force `Processing` back to
    /// `Pending`; `Pending` to `Pending` is an observed no-op. Terminal
    /// states have no outgoing transitions.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        match (*self, next) {
            (Pending, Processing) => true,
            (Pending, Pending) => true,
            (Processing, Completed) | (Processing, Failed) => true,
            (Processing, Pending) => true,
            _ => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Job counts by status for one source.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobStats {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    pub total: usize,
}

impl JobStats {
    pub fn from_jobs(jobs: &[BackgroundJob]) -> Self {
        let mut stats = JobStats::default();
        for job in jobs {
            match job.status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::Processing => stats.processing += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed => stats.failed += 1,
            }
            stats.total += 1;
        }
        stats
    }

    pub fn has_active(&self) -> bool {
        self.pending > 0 || self.processing > 0
    }
}

/// Page counts by status for one parent source. `Removed` pages are not
/// counted, including in `total`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageStats {
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub failed: usize,
    pub total: usize,
}

impl PageStats {
    pub fn from_pages(pages: &[ChildPage]) -> Self {
        let mut stats = PageStats::default();
        for page in pages {
            match page.status {
                PageStatus::Pending => stats.pending += 1,
                PageStatus::InProgress => stats.in_progress += 1,
                PageStatus::Completed => stats.completed += 1,
                PageStatus::Failed => stats.failed += 1,
                PageStatus::Removed => continue,
            }
            stats.total += 1;
        }
        stats
    }

    pub fn terminal(&self) -> usize {
        self.completed + self.failed
    }

    pub fn all_terminal(&self) -> bool {
        self.total > 0 && self.terminal() == self.total
    }
}

/// Output of rolling child state up into a parent source.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceRollup {
    pub status: CrawlStatus,
    pub progress: u8,
    pub links_count: u32,
}

/// Session-scoped recovery statistics for one monitored source.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct RecoveryStats {
    pub total_recoveries: u32,
    pub last_recovery_at: Option<DateTime<Utc>>,
    pub success_rate: u8, // 0-100
    pub next_check_at: Option<DateTime<Utc>>,
}
