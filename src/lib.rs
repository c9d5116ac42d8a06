//! Order Cache - order ingestion service with a bounded LRU/TTL cache
//!
//! Consumes order records from a stream, persists valid ones, caches them
//! for fast reads and serves them over HTTP.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod store;
pub mod tasks;
pub mod validation;

pub use api::AppState;
pub use cache::{build_cache, OrderCache};
pub use config::Config;
pub use pipeline::IngestionPipeline;
