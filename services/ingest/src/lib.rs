//! Consumer complaints ingestion pipeline.
//!
//! Chunked CSV read -> per-request staging table -> set-based upsert keyed by
//! complaint id. Two ingestion modes share the pipeline: whole-file (stage
//! every batch, merge once) and paginated batch (stage and merge one page per
//! request). Re-running either mode is idempotent.

pub mod config;
pub mod download;
pub mod error;
pub mod loader;
pub mod reader;
pub mod record;
pub mod store;

pub use error::IngestError;
pub use loader::{load_all, load_page, LoadReport};
