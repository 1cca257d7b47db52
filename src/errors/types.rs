//! Error type definitions for crawl recovery
//!
//! One taxonomy covers the whole crate: validation failures are rejected
//! before any store access, store failures abort only the current cycle,
//! and trigger failures are transient remediation errors that the
//! controller catches rather than propagating to its timer loop.

use thiserror::Error;
use uuid::Uuid;

/// Top-level error type for recovery operations
#[derive(Error, Debug)]
pub enum RecoveryError {
    /// Invalid caller input, rejected before any store access
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// A store read or write failed
    #[error("Store error: {source}")]
    Store {
        #[from]
        source: anyhow::Error,
    },

    /// The external job-processor trigger call failed (network/timeout)
    #[error("Trigger error: {source}")]
    Trigger {
        #[source]
        source: anyhow::Error,
    },

    /// Invalid recovery configuration
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

/// Convenience methods for creating common error types
impl RecoveryError {
    /// Create a validation error with a custom message
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a trigger error from a collaborator failure
    pub fn trigger(source: anyhow::Error) -> Self {
        Self::Trigger { source }
    }

    /// Create a store error from a collaborator failure
    pub fn store(source: anyhow::Error) -> Self {
        Self::Store { source }
    }
}

/// Reject the nil UUID before touching the store.
pub fn validate_source_id(source_id: Uuid) -> Result<(), RecoveryError> {
    if source_id.is_nil() {
        return Err(RecoveryError::validation("source id must not be nil"));
    }
    Ok(())
}
