pub mod aggregator;
pub mod config;
pub mod errors;
pub mod guard;
pub mod models;
pub mod processor;
pub mod queue;
pub mod recovery;
pub mod store;
