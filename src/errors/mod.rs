//! Error handling for the crawl recovery crate

pub mod types;

pub use types::{validate_source_id, RecoveryError};
