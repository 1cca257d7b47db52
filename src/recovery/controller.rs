//! Per-source recovery orchestration
//!
//! The controller owns everything recovery does for one crawl source: the
//! background monitor lifecycle, the detect/remediate sequence each cycle
//! runs, the manual recovery entry points and the statistics snapshot.
//! Detection reads and remediation writes go through the injected
//! [`JobStore`] and [`JobProcessorTrigger`] seams, so the controller stays
//! storage- and transport-agnostic.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::aggregator::StatusAggregator;
use crate::config::{ControllerSettings, RecoveryConfig};
use crate::errors::{validate_source_id, RecoveryError};
use crate::models::{BackgroundJob, RecoveryStats};
use crate::processor::{JobProcessorTrigger, TriggerReceipt, TriggerRequest};
use crate::queue::StuckJobDetector;
use crate::store::{ConfigStore, JobPatch, JobStore};

use super::monitor::{self, MonitorHandle};
use super::stats::RecoveryStatsTracker;
use super::{RecoveryEvent, RecoveryOutcome, RecoveryReport};

/// Orchestrates stuck-job recovery for a single crawl source.
///
/// Cheap to clone; clones share configuration, statistics, the event channel
/// and the monitor handle, so one controller can be handed to an API layer
/// and a background task at the same time.
#[derive(Clone)]
pub struct RecoveryController {
    source_id: Uuid,
    store: Arc<dyn JobStore>,
    trigger: Arc<dyn JobProcessorTrigger>,
    config_store: Arc<dyn ConfigStore>,
    config: Arc<RwLock<RecoveryConfig>>,
    settings: ControllerSettings,
    detector: StuckJobDetector,
    aggregator: StatusAggregator,
    stats: RecoveryStatsTracker,
    reset_counts: Arc<RwLock<HashMap<Uuid, u32>>>,
    event_tx: broadcast::Sender<RecoveryEvent>,
    config_tx: broadcast::Sender<()>,
    monitor: Arc<RwLock<Option<MonitorHandle>>>,
}

impl RecoveryController {
    /// Create a controller for one source. The nil source id is rejected
    /// here so no later operation has to re-check it.
    pub fn new(
        source_id: Uuid,
        store: Arc<dyn JobStore>,
        trigger: Arc<dyn JobProcessorTrigger>,
        config_store: Arc<dyn ConfigStore>,
    ) -> Result<Self, RecoveryError> {
        validate_source_id(source_id)?;

        let (event_tx, _) = broadcast::channel(100);
        let (config_tx, _) = broadcast::channel(16);

        Ok(Self {
            source_id,
            detector: StuckJobDetector::new(Arc::clone(&store)),
            aggregator: StatusAggregator::new(Arc::clone(&store)),
            store,
            trigger,
            config_store,
            config: Arc::new(RwLock::new(RecoveryConfig::default())),
            settings: ControllerSettings::default(),
            stats: RecoveryStatsTracker::new(),
            reset_counts: Arc::new(RwLock::new(HashMap::new())),
            event_tx,
            config_tx,
            monitor: Arc::new(RwLock::new(None)),
        })
    }

    /// Override the process-local tunables.
    pub fn with_settings(mut self, settings: ControllerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn source_id(&self) -> Uuid {
        self.source_id
    }

    pub async fn config(&self) -> RecoveryConfig {
        self.config.read().await.clone()
    }

    pub async fn stats(&self) -> RecoveryStats {
        self.stats.snapshot().await
    }

    /// Subscribe to recovery events. Slow subscribers miss events rather
    /// than slowing recovery down.
    pub fn subscribe(&self) -> broadcast::Receiver<RecoveryEvent> {
        self.event_tx.subscribe()
    }

    /// Start background monitoring.
    ///
    /// Loads the persisted configuration when one exists (persisting the
    /// in-memory one otherwise), clears session statistics and spawns the
    /// check loop. Enabling an already-active controller is a no-op.
    pub async fn enable(&self) -> Result<(), RecoveryError> {
        if self.is_active().await {
            debug!(
                "Recovery monitoring already enabled for source {}",
                self.source_id
            );
            return Ok(());
        }

        let config = {
            let mut config = self.config.write().await;
            if let Some(stored) = self.config_store.load(self.source_id).await? {
                stored.validate()?;
                *config = stored;
            }
            config.enabled = true;
            config.clone()
        };
        self.config_store.save(self.source_id, &config).await?;

        self.stats.reset().await;
        self.start_monitor().await;
        info!(
            "Recovery monitoring enabled for source {} (checking every {}m)",
            self.source_id, config.check_interval_minutes
        );
        Ok(())
    }

    /// Stop background monitoring and persist the disabled flag so a
    /// process restart stays off. An in-flight cycle finishes; the loop
    /// exits before its next tick. Manual recovery calls keep working.
    pub async fn disable(&self) -> Result<(), RecoveryError> {
        let config = {
            let mut config = self.config.write().await;
            config.enabled = false;
            config.clone()
        };
        self.config_store.save(self.source_id, &config).await?;
        self.stop_monitor().await;
        Ok(())
    }

    /// Whether the background monitor task is currently running.
    pub async fn is_active(&self) -> bool {
        match self.monitor.read().await.as_ref() {
            Some(handle) => !handle.is_finished(),
            None => false,
        }
    }

    /// Validate, persist and apply a new configuration.
    ///
    /// A running monitor picks up interval changes without restarting.
    /// Setting `enabled: false` here also stops the monitor; setting it back
    /// to `true` does not start one, that stays explicit via [`enable`].
    ///
    /// [`enable`]: RecoveryController::enable
    pub async fn update_config(&self, new_config: RecoveryConfig) -> Result<(), RecoveryError> {
        new_config.validate()?;
        self.config_store.save(self.source_id, &new_config).await?;

        let stop = !new_config.enabled;
        *self.config.write().await = new_config;
        let _ = self.config_tx.send(());

        if stop {
            self.stop_monitor().await;
        }
        debug!("Recovery config updated for source {}", self.source_id);
        Ok(())
    }

    /// Run one detection/remediation cycle.
    ///
    /// The monitor calls this on every tick; it is also callable directly
    /// for an on-demand check. Store failures during detection abort the
    /// cycle with an error. Remediation failures never propagate: they are
    /// captured in [`RecoveryOutcome::Failed`] and the affected jobs are
    /// re-detected on the next pass.
    pub async fn run_recovery_cycle(&self) -> Result<RecoveryOutcome, RecoveryError> {
        let config = self.config().await;
        let result = self.detect_and_remediate(&config, false, None).await;

        // The next check time is advertised even when this cycle aborted
        self.stats
            .schedule_next_check(config.check_interval())
            .await;

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                self.stats.record_cycle(false).await;
                return Err(e);
            }
        };

        self.stats.record_cycle(outcome.is_success()).await;
        if let RecoveryOutcome::Remediated(report) = &outcome {
            if report.performed_work() {
                self.stats.record_recovery().await;
                self.refresh_source_status().await;
            }
        }
        self.publish(&outcome);
        Ok(outcome)
    }

    /// Full manual recovery: reset whatever is stuck, give the store a
    /// moment to settle, then force-trigger the processor. Runs both
    /// remediation arms regardless of the `auto_*` flags. A clean queue
    /// still short-circuits to [`RecoveryOutcome::NoActionNeeded`].
    pub async fn run_full_recovery(&self) -> Result<RecoveryOutcome, RecoveryError> {
        info!("Running full recovery for source {}", self.source_id);
        let config = self.config().await;
        let outcome = self
            .detect_and_remediate(&config, true, Some(self.settings.settle_delay))
            .await?;

        if let RecoveryOutcome::Remediated(report) = &outcome {
            if report.performed_work() {
                self.stats.record_recovery().await;
                self.refresh_source_status().await;
            }
        }
        self.publish(&outcome);
        Ok(outcome)
    }

    /// Detect stuck jobs and reset them back to `pending` right now,
    /// regardless of `auto_reset_stuck_jobs`. Returns how many were reset.
    pub async fn reset_stuck_jobs_now(&self) -> Result<usize, RecoveryError> {
        let config = self.config().await;
        let stuck = self
            .detector
            .find_stuck_jobs(self.source_id, config.stuck_job_threshold())
            .await?;
        if stuck.is_empty() {
            return Ok(0);
        }

        let count = self.reset_jobs(&stuck, &config).await?;
        if count > 0 {
            self.stats.record_recovery().await;
            self.refresh_source_status().await;
        }
        Ok(count)
    }

    /// Ask the job processor to pick up pending work right now.
    pub async fn trigger_job_processor_now(&self) -> Result<TriggerReceipt, RecoveryError> {
        let request = TriggerRequest {
            source_id: self.source_id,
            max_jobs: self.settings.max_trigger_jobs,
            force_trigger: true,
        };
        let receipt = self
            .trigger
            .invoke(request)
            .await
            .map_err(RecoveryError::trigger)?;
        info!(
            "Manual trigger for source {}: accepted={} processed={}",
            self.source_id, receipt.accepted, receipt.processed
        );
        if receipt.accepted {
            self.stats.record_recovery().await;
        }
        Ok(receipt)
    }

    async fn detect_and_remediate(
        &self,
        config: &RecoveryConfig,
        force: bool,
        settle: Option<std::time::Duration>,
    ) -> Result<RecoveryOutcome, RecoveryError> {
        let stuck = self
            .detector
            .find_stuck_jobs(self.source_id, config.stuck_job_threshold())
            .await?;
        let stale = self
            .detector
            .find_stale_pending(self.source_id, config.stale_pending_threshold())
            .await?;

        if stuck.is_empty() && stale.is_empty() {
            debug!("No stuck or stale jobs for source {}", self.source_id);
            return Ok(RecoveryOutcome::NoActionNeeded);
        }

        info!(
            "Source {}: detected {} stuck and {} stale pending job(s)",
            self.source_id,
            stuck.len(),
            stale.len()
        );

        let mut report = RecoveryReport {
            stuck_jobs: stuck.len(),
            stale_pending_jobs: stale.len(),
            ..Default::default()
        };

        if (config.auto_reset_stuck_jobs || force) && !stuck.is_empty() {
            match self.reset_jobs(&stuck, config).await {
                Ok(count) => report.jobs_reset = count,
                Err(e) => {
                    warn!(
                        "Failed to reset stuck jobs for source {}: {}",
                        self.source_id, e
                    );
                    return Ok(RecoveryOutcome::Failed {
                        report,
                        error: e.to_string(),
                    });
                }
            }
        }

        if let Some(delay) = settle {
            // Let the resets land before the triggered worker reads the queue
            tokio::time::sleep(delay).await;
        }

        if config.auto_trigger_processor || force {
            let request = TriggerRequest {
                source_id: self.source_id,
                max_jobs: self.settings.max_trigger_jobs,
                force_trigger: force,
            };
            match self.trigger.invoke(request).await {
                Ok(receipt) => {
                    if !receipt.accepted {
                        warn!(
                            "Job processor declined the trigger for source {}",
                            self.source_id
                        );
                    }
                    report.trigger = Some(receipt);
                }
                Err(e) => {
                    warn!(
                        "Job processor trigger failed for source {}: {}",
                        self.source_id, e
                    );
                    return Ok(RecoveryOutcome::Failed {
                        report,
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(RecoveryOutcome::Remediated(report))
    }

    async fn reset_jobs(
        &self,
        stuck: &[BackgroundJob],
        config: &RecoveryConfig,
    ) -> Result<usize, RecoveryError> {
        let ids: Vec<Uuid> = stuck.iter().map(|job| job.id).collect();
        let count = self.store.update_jobs(&ids, &JobPatch::auto_reset()).await?;
        info!(
            "Reset {} stuck job(s) back to pending for source {}",
            count, self.source_id
        );

        // Counters for jobs the store no longer tracks are dropped so the
        // map stays bounded by the live job set.
        let live: Option<HashSet<Uuid>> = self
            .store
            .list_jobs(self.source_id)
            .await
            .ok()
            .map(|jobs| jobs.iter().map(|job| job.id).collect());

        let mut reset_counts = self.reset_counts.write().await;
        if let Some(live) = live {
            reset_counts.retain(|id, _| live.contains(id));
        }

        // The retry budget is advisory: jobs past it are still reset, the
        // log is what tells an operator something deeper is wrong.
        for job in stuck {
            let resets = reset_counts.entry(job.id).or_insert(0);
            *resets += 1;
            if *resets > config.max_retries {
                warn!(
                    "Job {} has been auto-reset {} times (budget {}), workers keep abandoning it",
                    job.id, resets, config.max_retries
                );
            }
        }
        Ok(count)
    }

    /// Re-derive the parent status after remediation so readers see fresh
    /// progress without waiting for the next crawl event.
    async fn refresh_source_status(&self) {
        if let Err(e) = self.aggregator.refresh(self.source_id).await {
            warn!(
                "Failed to refresh status for source {} after recovery: {}",
                self.source_id, e
            );
        }
    }

    fn publish(&self, outcome: &RecoveryOutcome) {
        // Nobody listening is fine
        let _ = self.event_tx.send(RecoveryEvent {
            source_id: self.source_id,
            outcome: outcome.clone(),
            at: Utc::now(),
        });
    }

    async fn start_monitor(&self) {
        let mut slot = self.monitor.write().await;
        if let Some(handle) = slot.as_ref() {
            if !handle.is_finished() {
                debug!(
                    "Recovery monitor already running for source {}",
                    self.source_id
                );
                return;
            }
        }
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let config_rx = self.config_tx.subscribe();
        let task = tokio::spawn(monitor::run(self.clone(), shutdown_rx, config_rx));
        *slot = Some(MonitorHandle::new(shutdown_tx, task));
    }

    async fn stop_monitor(&self) {
        if let Some(handle) = self.monitor.write().await.take() {
            handle.shutdown();
            info!("Recovery monitoring disabled for source {}", self.source_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ChildPage, JobStatus, ParentSource};
    use crate::store::{MemoryConfigStore, MemoryJobStore, SourcePatch, AUTO_RESET_MESSAGE};
    use anyhow::bail;
    use async_trait::async_trait;
    use chrono::Duration;

    #[derive(Clone, Default)]
    struct RecordingTrigger {
        calls: Arc<RwLock<Vec<TriggerRequest>>>,
        fail: bool,
        accept: bool,
    }

    impl RecordingTrigger {
        fn accepting() -> Self {
            Self {
                accept: true,
                ..Default::default()
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        async fn calls(&self) -> Vec<TriggerRequest> {
            self.calls.read().await.clone()
        }
    }

    #[async_trait]
    impl JobProcessorTrigger for RecordingTrigger {
        async fn invoke(&self, request: TriggerRequest) -> anyhow::Result<TriggerReceipt> {
            self.calls.write().await.push(request);
            if self.fail {
                bail!("processor unreachable");
            }
            Ok(TriggerReceipt {
                accepted: self.accept,
                processed: 2,
            })
        }
    }

    struct FailingStore;

    #[async_trait]
    impl JobStore for FailingStore {
        async fn get_source(&self, _source_id: Uuid) -> anyhow::Result<Option<ParentSource>> {
            bail!("store offline")
        }

        async fn update_source(
            &self,
            _source_id: Uuid,
            _patch: &SourcePatch,
        ) -> anyhow::Result<()> {
            bail!("store offline")
        }

        async fn mark_recrawl_started(&self, _source_id: Uuid) -> anyhow::Result<()> {
            bail!("store offline")
        }

        async fn list_pages(&self, _parent_source_id: Uuid) -> anyhow::Result<Vec<ChildPage>> {
            bail!("store offline")
        }

        async fn list_jobs(&self, _source_id: Uuid) -> anyhow::Result<Vec<BackgroundJob>> {
            bail!("store offline")
        }

        async fn update_jobs(&self, _ids: &[Uuid], _patch: &JobPatch) -> anyhow::Result<usize> {
            bail!("store offline")
        }
    }

    async fn seed_source(store: &MemoryJobStore) -> Uuid {
        let source = ParentSource::new("https://example.com");
        let source_id = source.id;
        store.insert_source(source).await;
        source_id
    }

    async fn seed_stuck_job(store: &MemoryJobStore, source_id: Uuid, age_minutes: i64) -> Uuid {
        let mut job = BackgroundJob::new(source_id, None);
        job.status = JobStatus::Processing;
        job.started_at = Some(Utc::now() - Duration::minutes(age_minutes));
        let job_id = job.id;
        store.insert_job(job).await;
        job_id
    }

    fn controller_for(
        source_id: Uuid,
        store: &MemoryJobStore,
        trigger: &RecordingTrigger,
    ) -> RecoveryController {
        RecoveryController::new(
            source_id,
            Arc::new(store.clone()),
            Arc::new(trigger.clone()),
            Arc::new(MemoryConfigStore::new()),
        )
        .unwrap()
        .with_settings(
            ControllerSettings::default()
                .with_settle_delay(std::time::Duration::from_millis(5)),
        )
    }

    #[tokio::test]
    async fn test_nil_source_rejected_at_construction() {
        let store = MemoryJobStore::new();
        let result = RecoveryController::new(
            Uuid::nil(),
            Arc::new(store),
            Arc::new(RecordingTrigger::accepting()),
            Arc::new(MemoryConfigStore::new()),
        );
        assert!(matches!(result, Err(RecoveryError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_clean_queue_takes_no_action() {
        let store = MemoryJobStore::new();
        let source_id = seed_source(&store).await;
        // A recent pending job is below both thresholds
        store.insert_job(BackgroundJob::new(source_id, None)).await;

        let trigger = RecordingTrigger::accepting();
        let controller = controller_for(source_id, &store, &trigger);

        let outcome = controller.run_recovery_cycle().await.unwrap();
        assert_eq!(outcome, RecoveryOutcome::NoActionNeeded);
        assert!(trigger.calls().await.is_empty());

        let stats = controller.stats().await;
        assert_eq!(stats.total_recoveries, 0);
        assert_eq!(stats.success_rate, 100);
        assert!(stats.next_check_at.is_some());
    }

    #[tokio::test]
    async fn test_cycle_resets_stuck_job_and_triggers() {
        let store = MemoryJobStore::new();
        let source_id = seed_source(&store).await;
        let job_id = seed_stuck_job(&store, source_id, 30).await;

        let trigger = RecordingTrigger::accepting();
        let controller = controller_for(source_id, &store, &trigger);

        let outcome = controller.run_recovery_cycle().await.unwrap();
        match outcome {
            RecoveryOutcome::Remediated(report) => {
                assert_eq!(report.stuck_jobs, 1);
                assert_eq!(report.jobs_reset, 1);
                assert!(report.trigger.is_some_and(|r| r.accepted));
            }
            other => panic!("expected remediated outcome, got {other:?}"),
        }

        let job = store.get_job(job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.started_at, None);
        assert_eq!(job.error_message.as_deref(), Some(AUTO_RESET_MESSAGE));

        let calls = trigger.calls().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].source_id, source_id);
        assert_eq!(calls[0].max_jobs, 50);
        assert!(!calls[0].force_trigger);

        let stats = controller.stats().await;
        assert_eq!(stats.total_recoveries, 1);
        assert!(stats.last_recovery_at.is_some());
        assert_eq!(stats.success_rate, 100);
    }

    #[tokio::test]
    async fn test_stale_pending_prompts_trigger_without_reset() {
        let store = MemoryJobStore::new();
        let source_id = seed_source(&store).await;
        // Pending for 6 minutes against a 5 minute check interval
        let mut job = BackgroundJob::new(source_id, None);
        job.created_at = Utc::now() - Duration::minutes(6);
        store.insert_job(job).await;

        let trigger = RecordingTrigger::accepting();
        let controller = controller_for(source_id, &store, &trigger);

        let before = Utc::now();
        let outcome = controller.run_recovery_cycle().await.unwrap();
        match outcome {
            RecoveryOutcome::Remediated(report) => {
                assert_eq!(report.stuck_jobs, 0);
                assert_eq!(report.stale_pending_jobs, 1);
                assert_eq!(report.jobs_reset, 0);
                assert!(report.trigger.is_some_and(|r| r.accepted));
            }
            other => panic!("expected remediated outcome, got {other:?}"),
        }
        assert_eq!(trigger.calls().await.len(), 1);

        let stats = controller.stats().await;
        assert_eq!(stats.total_recoveries, 1);
        let next = stats.next_check_at.unwrap();
        assert!(next >= before + Duration::minutes(5));
        assert!(next <= Utc::now() + Duration::minutes(5));
    }

    #[tokio::test]
    async fn test_detection_only_when_autos_disabled() {
        let store = MemoryJobStore::new();
        let source_id = seed_source(&store).await;
        let job_id = seed_stuck_job(&store, source_id, 30).await;

        let trigger = RecordingTrigger::accepting();
        let controller = controller_for(source_id, &store, &trigger);
        let config = RecoveryConfig {
            auto_reset_stuck_jobs: false,
            auto_trigger_processor: false,
            ..Default::default()
        };
        controller.update_config(config).await.unwrap();

        let outcome = controller.run_recovery_cycle().await.unwrap();
        match outcome {
            RecoveryOutcome::Remediated(report) => {
                assert_eq!(report.stuck_jobs, 1);
                assert_eq!(report.jobs_reset, 0);
                assert!(report.trigger.is_none());
                assert!(!report.performed_work());
            }
            other => panic!("expected remediated outcome, got {other:?}"),
        }

        // Nothing was touched
        assert!(trigger.calls().await.is_empty());
        let job = store.get_job(job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Processing);

        let stats = controller.stats().await;
        assert_eq!(stats.total_recoveries, 0);
        assert_eq!(stats.success_rate, 100);
    }

    #[tokio::test]
    async fn test_cycle_survives_trigger_failure() {
        let store = MemoryJobStore::new();
        let source_id = seed_source(&store).await;
        let job_id = seed_stuck_job(&store, source_id, 30).await;

        let trigger = RecordingTrigger::failing();
        let controller = controller_for(source_id, &store, &trigger);

        let outcome = controller.run_recovery_cycle().await.unwrap();
        match outcome {
            RecoveryOutcome::Failed { report, error } => {
                assert_eq!(report.jobs_reset, 1);
                assert!(report.trigger.is_none());
                assert!(error.contains("unreachable"));
            }
            other => panic!("expected failed outcome, got {other:?}"),
        }

        // The reset sticks even though the trigger failed
        let job = store.get_job(job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Pending);

        let stats = controller.stats().await;
        assert_eq!(stats.total_recoveries, 0);
        assert!(stats.last_recovery_at.is_none());
        assert_eq!(stats.success_rate, 0);
        assert!(stats.next_check_at.is_some());
    }

    #[tokio::test]
    async fn test_detection_store_failure_aborts_cycle() {
        let trigger = RecordingTrigger::accepting();
        let controller = RecoveryController::new(
            Uuid::new_v4(),
            Arc::new(FailingStore),
            Arc::new(trigger.clone()),
            Arc::new(MemoryConfigStore::new()),
        )
        .unwrap();

        let err = controller.run_recovery_cycle().await.unwrap_err();
        assert!(matches!(err, RecoveryError::Store { .. }));
        assert!(trigger.calls().await.is_empty());

        // The failed cycle still counts and the next check is still advertised
        let stats = controller.stats().await;
        assert_eq!(stats.success_rate, 0);
        assert!(stats.next_check_at.is_some());
    }

    #[tokio::test]
    async fn test_reset_stuck_jobs_now_is_idempotent() {
        let store = MemoryJobStore::new();
        let source_id = seed_source(&store).await;
        seed_stuck_job(&store, source_id, 30).await;

        let trigger = RecordingTrigger::accepting();
        let controller = controller_for(source_id, &store, &trigger);

        assert_eq!(controller.reset_stuck_jobs_now().await.unwrap(), 1);
        // Already pending now, nothing left to reset
        assert_eq!(controller.reset_stuck_jobs_now().await.unwrap(), 0);

        let stats = controller.stats().await;
        assert_eq!(stats.total_recoveries, 1);
        // Manual resets never touch the trigger
        assert!(trigger.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_manual_trigger_forces_and_records() {
        let store = MemoryJobStore::new();
        let source_id = seed_source(&store).await;

        let trigger = RecordingTrigger::accepting();
        let controller = controller_for(source_id, &store, &trigger);

        let receipt = controller.trigger_job_processor_now().await.unwrap();
        assert!(receipt.accepted);
        assert_eq!(receipt.processed, 2);

        let calls = trigger.calls().await;
        assert_eq!(calls.len(), 1);
        assert!(calls[0].force_trigger);
        assert_eq!(controller.stats().await.total_recoveries, 1);
    }

    #[tokio::test]
    async fn test_manual_trigger_failure_maps_to_trigger_error() {
        let store = MemoryJobStore::new();
        let source_id = seed_source(&store).await;

        let trigger = RecordingTrigger::failing();
        let controller = controller_for(source_id, &store, &trigger);

        let err = controller.trigger_job_processor_now().await.unwrap_err();
        assert!(matches!(err, RecoveryError::Trigger { .. }));
        assert_eq!(controller.stats().await.total_recoveries, 0);
    }

    #[tokio::test]
    async fn test_full_recovery_overrides_disabled_autos() {
        let store = MemoryJobStore::new();
        let source_id = seed_source(&store).await;
        let job_id = seed_stuck_job(&store, source_id, 30).await;

        let trigger = RecordingTrigger::accepting();
        let controller = controller_for(source_id, &store, &trigger);
        let config = RecoveryConfig {
            auto_reset_stuck_jobs: false,
            auto_trigger_processor: false,
            ..Default::default()
        };
        controller.update_config(config).await.unwrap();

        let outcome = controller.run_full_recovery().await.unwrap();
        match outcome {
            RecoveryOutcome::Remediated(report) => {
                assert_eq!(report.jobs_reset, 1);
                assert!(report.trigger.is_some_and(|r| r.accepted));
            }
            other => panic!("expected remediated outcome, got {other:?}"),
        }

        let job = store.get_job(job_id).await.unwrap();
        assert_eq!(job.status, JobStatus::Pending);

        let calls = trigger.calls().await;
        assert_eq!(calls.len(), 1);
        assert!(calls[0].force_trigger);

        // Manual recovery counts the work but never schedules a check
        let stats = controller.stats().await;
        assert_eq!(stats.total_recoveries, 1);
        assert!(stats.next_check_at.is_none());
    }

    #[tokio::test]
    async fn test_full_recovery_on_clean_queue_is_a_no_op() {
        let store = MemoryJobStore::new();
        let source_id = seed_source(&store).await;

        let trigger = RecordingTrigger::accepting();
        let controller = controller_for(source_id, &store, &trigger);

        let outcome = controller.run_full_recovery().await.unwrap();
        assert_eq!(outcome, RecoveryOutcome::NoActionNeeded);
        assert!(trigger.calls().await.is_empty());
    }

    #[tokio::test]
    async fn test_update_config_rejects_invalid_and_keeps_current() {
        let store = MemoryJobStore::new();
        let source_id = seed_source(&store).await;

        let trigger = RecordingTrigger::accepting();
        let controller = controller_for(source_id, &store, &trigger);

        let bad = RecoveryConfig {
            check_interval_minutes: 0,
            ..Default::default()
        };
        let err = controller.update_config(bad).await.unwrap_err();
        assert!(matches!(err, RecoveryError::Configuration { .. }));
        assert_eq!(controller.config().await.check_interval_minutes, 5);
    }

    #[tokio::test]
    async fn test_events_broadcast_on_remediation() {
        let store = MemoryJobStore::new();
        let source_id = seed_source(&store).await;
        seed_stuck_job(&store, source_id, 30).await;

        let trigger = RecordingTrigger::accepting();
        let controller = controller_for(source_id, &store, &trigger);
        let mut events = controller.subscribe();

        controller.run_recovery_cycle().await.unwrap();

        let event = events.recv().await.unwrap();
        assert_eq!(event.source_id, source_id);
        assert!(matches!(event.outcome, RecoveryOutcome::Remediated(_)));
    }

    #[tokio::test]
    async fn test_repeated_resets_keep_working_past_budget() {
        let store = MemoryJobStore::new();
        let source_id = seed_source(&store).await;
        let job_id = seed_stuck_job(&store, source_id, 30).await;

        let trigger = RecordingTrigger::accepting();
        let controller = controller_for(source_id, &store, &trigger);

        // Simulate a job that keeps getting picked up and abandoned
        for round in 0..5 {
            let count = controller.reset_stuck_jobs_now().await.unwrap();
            assert_eq!(count, 1, "round {round}");

            let mut job = store.get_job(job_id).await.unwrap();
            job.status = JobStatus::Processing;
            job.started_at = Some(Utc::now() - Duration::minutes(30));
            store.insert_job(job).await;
        }

        // Budget of 3 exceeded, the job is still reset every time
        assert_eq!(controller.reset_stuck_jobs_now().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_reset_counters_follow_the_live_job_set() {
        let store = MemoryJobStore::new();
        let source_id = seed_source(&store).await;
        let first = seed_stuck_job(&store, source_id, 30).await;

        let trigger = RecordingTrigger::accepting();
        let controller = controller_for(source_id, &store, &trigger);

        assert_eq!(controller.reset_stuck_jobs_now().await.unwrap(), 1);
        assert!(controller.reset_counts.read().await.contains_key(&first));

        // The first job's row was cleaned up once its crawl finished
        store.remove_job(first).await;
        let second = seed_stuck_job(&store, source_id, 30).await;
        assert_eq!(controller.reset_stuck_jobs_now().await.unwrap(), 1);

        let counts = controller.reset_counts.read().await;
        assert!(!counts.contains_key(&first));
        assert_eq!(counts.get(&second), Some(&1));
    }
}
