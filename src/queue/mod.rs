//! Job queue introspection.
//!
//! Two read-only views over the store:
//! - `JobQueueInspector`: job/page counters by status
//! - `StuckJobDetector`: stuck and stale-pending classification

pub mod detector;
pub mod inspector;

pub use detector::StuckJobDetector;
pub use inspector::JobQueueInspector;
