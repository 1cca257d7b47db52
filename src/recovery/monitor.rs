//! Background check loop
//!
//! One task per enabled controller. Each tick runs a recovery cycle; cycle
//! failures are logged and the loop keeps ticking. Interval changes arrive
//! over the controller's config channel so the loop retunes itself without
//! being restarted.

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info};

use super::controller::RecoveryController;

/// Handle to a spawned monitor task.
pub(crate) struct MonitorHandle {
    shutdown_tx: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

impl MonitorHandle {
    pub(crate) fn new(shutdown_tx: broadcast::Sender<()>, task: JoinHandle<()>) -> Self {
        Self { shutdown_tx, task }
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub(crate) fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        // A replaced or abandoned handle still stops its task
        let _ = self.shutdown_tx.send(());
    }
}

fn check_ticker(minutes: u32) -> Interval {
    let period = Duration::from_secs(u64::from(minutes) * 60);
    // First tick lands one period out; the immediate check runs explicitly.
    // Skipped ticks collapse when a cycle outlasts the interval.
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

/// Run the check loop until shutdown. The first cycle runs right away so
/// enabling recovery gives immediate feedback, then the loop settles into
/// the configured cadence.
pub(crate) async fn run(
    controller: RecoveryController,
    mut shutdown_rx: broadcast::Receiver<()>,
    mut config_rx: broadcast::Receiver<()>,
) {
    let source_id = controller.source_id();
    let mut check_minutes = controller.config().await.check_interval_minutes;
    info!(
        "Recovery monitor started for source {} (interval: {}m)",
        source_id, check_minutes
    );

    run_cycle(&controller).await;
    let mut ticker = check_ticker(check_minutes);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                run_cycle(&controller).await;
            }
            _ = config_rx.recv() => {
                let minutes = controller.config().await.check_interval_minutes;
                if minutes != check_minutes {
                    info!(
                        "Recovery interval for source {} changed from {}m to {}m",
                        source_id, check_minutes, minutes
                    );
                    check_minutes = minutes;
                    ticker = check_ticker(minutes);
                }
            }
            _ = shutdown_rx.recv() => {
                break;
            }
        }
    }

    info!("Recovery monitor stopped for source {}", source_id);
}

async fn run_cycle(controller: &RecoveryController) {
    match controller.run_recovery_cycle().await {
        Ok(outcome) => debug!(
            "Recovery cycle finished for source {}: {:?}",
            controller.source_id(),
            outcome
        ),
        Err(e) => error!(
            "Recovery cycle failed for source {}: {}",
            controller.source_id(),
            e
        ),
    }
}
