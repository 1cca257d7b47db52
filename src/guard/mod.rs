//! Debounce for recrawl requests.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::{validate_source_id, RecoveryError};
use crate::store::JobStore;

/// Prevents duplicate concurrent recrawl requests for the same source.
///
/// A source id is held in an in-memory set for a fixed cool-down after a
/// recrawl begins, bounding the guard's lifetime independently of how long
/// the downstream crawl takes. Duplicate requests are a no-op result, not
/// an error.
#[derive(Clone)]
pub struct RecrawlGuard {
    store: Arc<dyn JobStore>,
    in_flight: Arc<RwLock<HashSet<Uuid>>>,
    cooldown: Duration,
}

impl RecrawlGuard {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self::with_cooldown(store, Duration::from_secs(2))
    }

    pub fn with_cooldown(store: Arc<dyn JobStore>, cooldown: Duration) -> Self {
        Self {
            store,
            in_flight: Arc::new(RwLock::new(HashSet::new())),
            cooldown,
        }
    }

    /// Begin a recrawl unless one is already in flight for this source.
    ///
    /// Returns `Ok(true)` when the recrawl transition was performed and
    /// `Ok(false)` when a duplicate request was debounced. A store failure
    /// releases the id immediately so the caller can retry.
    pub async fn try_begin_recrawl(&self, source_id: Uuid) -> Result<bool, RecoveryError> {
        validate_source_id(source_id)?;

        {
            let mut in_flight = self.in_flight.write().await;
            if !in_flight.insert(source_id) {
                debug!("Skipping duplicate recrawl request for source {}", source_id);
                return Ok(false);
            }
        }

        if let Err(e) = self.store.mark_recrawl_started(source_id).await {
            self.in_flight.write().await.remove(&source_id);
            return Err(e.into());
        }

        let in_flight = Arc::clone(&self.in_flight);
        let cooldown = self.cooldown;
        tokio::spawn(async move {
            tokio::time::sleep(cooldown).await;
            in_flight.write().await.remove(&source_id);
        });

        info!(
            "Recrawl started for source {} (cool-down {:?})",
            source_id, cooldown
        );
        Ok(true)
    }

    /// Whether the guard currently holds this source.
    pub async fn is_in_flight(&self, source_id: Uuid) -> bool {
        self.in_flight.read().await.contains(&source_id)
    }
}
