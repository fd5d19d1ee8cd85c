//! Ingestion orchestrator: Reader -> Normalizer -> Staging -> Merge.
//!
//! Two entry points over the same pipeline. Whole-file mode stages every
//! batch of the file cumulatively and merges once at the end; batch mode
//! reads one caller-addressed page and merges it immediately. Neither holds
//! any cross-request state: resuming a multi-page load is entirely the
//! caller's job via the page index.

use std::path::Path;

use serde::Serialize;
use sqlx::PgPool;

use crate::error::Result;
use crate::reader::{read_page, BatchReader};
use crate::record::normalize_batch;
use crate::store::{ensure_schema, Staging};

/// Outcome of one successful ingestion request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub rows_read: u64,
    pub rows_inserted: u64,
    pub rows_updated: u64,
}

/// Whole-file mode. Any normalization or staging failure aborts the load and
/// rolls the staging transaction back, so no partial merge is ever visible.
pub async fn load_all(pool: &PgPool, path: &Path, batch_size: usize) -> Result<LoadReport> {
    ensure_schema(pool).await?;
    let mut reader = BatchReader::open(path, batch_size)?;
    let mut staging = Staging::begin(pool).await?;
    let mut rows_read = 0u64;
    while let Some(batch) = reader.next_batch()? {
        rows_read += batch.len() as u64;
        let records = normalize_batch(&batch)?;
        staging.stage(&records).await?;
    }
    let counts = staging.merge().await?;
    Ok(LoadReport {
        rows_read,
        rows_inserted: counts.inserted,
        rows_updated: counts.updated,
    })
}

/// Batch mode: one page per request, staged and merged in its own scope.
/// A page past the end of the file reports zero counts without opening a
/// transaction.
pub async fn load_page(
    pool: &PgPool,
    path: &Path,
    page: usize,
    page_size: usize,
) -> Result<LoadReport> {
    ensure_schema(pool).await?;
    let batch = read_page(path, page, page_size)?;
    if batch.is_empty() {
        return Ok(LoadReport::default());
    }
    let records = normalize_batch(&batch)?;
    let mut staging = Staging::begin(pool).await?;
    staging.stage(&records).await?;
    let counts = staging.merge().await?;
    Ok(LoadReport {
        rows_read: batch.len() as u64,
        rows_inserted: counts.inserted,
        rows_updated: counts.updated,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_report_is_all_zero() {
        let report = LoadReport::default();
        assert_eq!(report.rows_read, 0);
        assert_eq!(report.rows_inserted, 0);
        assert_eq!(report.rows_updated, 0);
    }

    #[test]
    fn report_serializes_counts_by_name() {
        let report = LoadReport {
            rows_read: 1000,
            rows_inserted: 990,
            rows_updated: 10,
        };
        let json = serde_json::to_value(report).unwrap();
        assert_eq!(json["rows_read"], 1000);
        assert_eq!(json["rows_inserted"], 990);
        assert_eq!(json["rows_updated"], 10);
    }
}
