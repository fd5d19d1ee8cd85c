//! Environment-backed configuration and dataset constants.

use std::path::PathBuf;

use anyhow::{Context, Result};

/// Kaggle dataset slug for the CFPB consumer complaints database.
pub const DATASET: &str = "anoopjohny/consumer-complaint-database";

/// File name of the extracted CSV inside the download directory.
pub const DATA_FILE_NAME: &str = "complaints.csv";

/// Permanent table keyed by complaint id.
pub const MAIN_TABLE: &str = "consumer_complaints";

/// Session-local staging table created per ingestion request.
pub const STAGING_TABLE: &str = "staging_consumer_complaints";

pub const MIN_BATCH_SIZE: usize = 1;
pub const MAX_BATCH_SIZE: usize = 1000;
pub const DEFAULT_BATCH_SIZE: usize = MAX_BATCH_SIZE;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_uri: String,
    pub download_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_uri: std::env::var("DATABASE_URI")
                .context("DATABASE_URI env var missing")?,
            download_dir: PathBuf::from(
                std::env::var("DOWNLOAD_DIR").unwrap_or_else(|_| "./data".to_string()),
            ),
        })
    }

    /// Local path where the complaints CSV lands after download.
    pub fn data_path(&self) -> PathBuf {
        self.download_dir.join(DATA_FILE_NAME)
    }
}
