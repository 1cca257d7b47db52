//! Entry point into the external worker pool.
//!
//! The trigger is the one remediation step that leaves the process. It may
//! fail (network, timeout, overloaded pool); callers treat that as a
//! transient remediation error, never as fatal.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::errors::RecoveryError;

/// Parameters for one trigger call. `force_trigger` is set on manual
/// invocations outside the normal schedule.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TriggerRequest {
    pub source_id: Uuid,
    pub max_jobs: u32,
    pub force_trigger: bool,
}

/// What the worker pool reported back for a trigger call.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TriggerReceipt {
    pub accepted: bool,
    pub processed: u32,
}

#[async_trait]
pub trait JobProcessorTrigger: Send + Sync {
    async fn invoke(&self, request: TriggerRequest) -> Result<TriggerReceipt>;
}

/// Default adapter: JSON POST against the worker pool's trigger endpoint.
#[derive(Debug, Clone)]
pub struct HttpJobProcessorClient {
    client: reqwest::Client,
    endpoint: Url,
    timeout: std::time::Duration,
}

impl HttpJobProcessorClient {
    /// Build a client for the given endpoint. The URL is validated here so
    /// a misconfigured endpoint surfaces at construction, not mid-cycle.
    pub fn new(endpoint: &str) -> Result<Self, RecoveryError> {
        let endpoint = Url::parse(endpoint).map_err(|e| {
            RecoveryError::configuration(format!("invalid trigger endpoint '{endpoint}': {e}"))
        })?;
        Ok(Self {
            client: reqwest::Client::new(),
            endpoint,
            timeout: std::time::Duration::from_secs(30),
        })
    }

    pub fn with_timeout(mut self, timeout: std::time::Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl JobProcessorTrigger for HttpJobProcessorClient {
    async fn invoke(&self, request: TriggerRequest) -> Result<TriggerReceipt> {
        debug!(
            "Triggering job processor for source {} (max_jobs: {}, force: {})",
            request.source_id, request.max_jobs, request.force_trigger
        );

        let response = self
            .client
            .post(self.endpoint.clone())
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .context("trigger request failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("trigger endpoint returned {status}");
        }

        let receipt = response
            .json::<TriggerReceipt>()
            .await
            .context("trigger response was not a valid receipt")?;
        debug!(
            "Job processor receipt for source {}: accepted={}, processed={}",
            request.source_id, receipt.accepted, receipt.processed
        );
        Ok(receipt)
    }
}
