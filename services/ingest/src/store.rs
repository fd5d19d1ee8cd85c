//! Staging loader and upsert engine.
//!
//! Each ingestion request owns a [`Staging`] scope: one transaction plus a
//! session-local temp table created with `ON COMMIT DROP`. Batches are
//! bulk-inserted into the temp table carrying an arrival-order `seq`, then a
//! single set-based `INSERT ... ON CONFLICT DO UPDATE` merges them into the
//! permanent table. Because the temp table lives on the request's own
//! connection, concurrent requests never share staging state.

use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};

use crate::config::{MAIN_TABLE, STAGING_TABLE};
use crate::error::{IngestError, Result};
use crate::record::ComplaintRecord;

/// Column list shared by the permanent and staging tables, in schema order.
const COLUMNS: &str = "complaint_id, date_received, product, sub_product, issue, sub_issue, \
consumer_complaint_narrative, company_public_response, company, state, zip_code, tags, \
consumer_consent_provided, submitted_via, date_sent_to_company, \
company_response_to_consumer, timely_response, consumer_disputed";

/// Create the permanent complaints table when it does not exist yet.
pub async fn ensure_schema(pool: &PgPool) -> Result<()> {
    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {MAIN_TABLE} (
            complaint_id                 BIGINT PRIMARY KEY,
            date_received                DATE,
            product                      TEXT,
            sub_product                  TEXT,
            issue                        TEXT,
            sub_issue                    TEXT,
            consumer_complaint_narrative TEXT,
            company_public_response      TEXT,
            company                      TEXT,
            state                        TEXT,
            zip_code                     TEXT,
            tags                         TEXT,
            consumer_consent_provided    TEXT,
            submitted_via                TEXT,
            date_sent_to_company         DATE,
            company_response_to_consumer TEXT,
            timely_response              BOOLEAN,
            consumer_disputed            BOOLEAN
        )
        "#
    ))
    .execute(pool)
    .await
    .map_err(IngestError::StorageWrite)?;
    Ok(())
}

/// Counts reported by a completed merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeCounts {
    pub inserted: u64,
    pub updated: u64,
}

/// Staging scope owned by exactly one ingestion operation. Dropping it
/// without calling [`Staging::merge`] rolls the transaction back, discarding
/// every staged row.
pub struct Staging {
    tx: Transaction<'static, Postgres>,
    seq: i64,
}

impl Staging {
    pub async fn begin(pool: &PgPool) -> Result<Self> {
        let mut tx = pool.begin().await.map_err(IngestError::StorageWrite)?;
        sqlx::query(&format!(
            "CREATE TEMP TABLE {STAGING_TABLE} \
             (LIKE {MAIN_TABLE} INCLUDING DEFAULTS, seq BIGINT) ON COMMIT DROP"
        ))
        .execute(&mut *tx)
        .await
        .map_err(IngestError::StorageWrite)?;
        Ok(Self { tx, seq: 0 })
    }

    /// Insert one normalized batch. Staged rows accumulate across calls
    /// within this scope; `seq` keeps global arrival order.
    pub async fn stage(&mut self, records: &[ComplaintRecord]) -> Result<u64> {
        if records.is_empty() {
            return Ok(0);
        }
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("INSERT INTO {STAGING_TABLE} ({COLUMNS}, seq) "));
        let base = self.seq;
        builder.push_values(records.iter().enumerate(), |mut b, (i, r)| {
            b.push_bind(r.complaint_id)
                .push_bind(r.date_received)
                .push_bind(&r.product)
                .push_bind(&r.sub_product)
                .push_bind(&r.issue)
                .push_bind(&r.sub_issue)
                .push_bind(&r.consumer_complaint_narrative)
                .push_bind(&r.company_public_response)
                .push_bind(&r.company)
                .push_bind(&r.state)
                .push_bind(&r.zip_code)
                .push_bind(&r.tags)
                .push_bind(&r.consumer_consent_provided)
                .push_bind(&r.submitted_via)
                .push_bind(r.date_sent_to_company)
                .push_bind(&r.company_response_to_consumer)
                .push_bind(r.timely_response)
                .push_bind(r.consumer_disputed)
                .push_bind(base + i as i64);
        });
        let result = builder
            .build()
            .execute(&mut *self.tx)
            .await
            .map_err(IngestError::StorageWrite)?;
        self.seq += records.len() as i64;
        Ok(result.rows_affected())
    }

    /// Merge staged rows into the permanent table and commit. Duplicate ids
    /// inside the staging scope resolve to the last staged occurrence.
    pub async fn merge(mut self) -> Result<MergeCounts> {
        let (updated,): (i64,) = sqlx::query_as(&format!(
            "SELECT COUNT(DISTINCT s.complaint_id) FROM {STAGING_TABLE} s \
             JOIN {MAIN_TABLE} c USING (complaint_id)"
        ))
        .fetch_one(&mut *self.tx)
        .await
        .map_err(IngestError::UpsertConflict)?;

        let (staged,): (i64,) = sqlx::query_as(&format!(
            "SELECT COUNT(DISTINCT complaint_id) FROM {STAGING_TABLE}"
        ))
        .fetch_one(&mut *self.tx)
        .await
        .map_err(IngestError::UpsertConflict)?;

        sqlx::query(&merge_statement())
            .execute(&mut *self.tx)
            .await
            .map_err(IngestError::UpsertConflict)?;

        self.tx.commit().await.map_err(IngestError::UpsertConflict)?;

        Ok(MergeCounts {
            inserted: (staged - updated) as u64,
            updated: updated as u64,
        })
    }
}

/// Set-based insert-or-update from staging into the permanent table. One
/// statement, one conflict key; `DISTINCT ON ... seq DESC` picks the last
/// staged occurrence of each id before the conflict clause ever sees it.
fn merge_statement() -> String {
    let assignments = COLUMNS
        .split(", ")
        .filter(|c| *c != "complaint_id")
        .map(|c| format!("{c} = EXCLUDED.{c}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {MAIN_TABLE} ({COLUMNS}) \
         SELECT DISTINCT ON (complaint_id) {COLUMNS} \
         FROM {STAGING_TABLE} \
         ORDER BY complaint_id, seq DESC \
         ON CONFLICT (complaint_id) DO UPDATE SET {assignments}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_list_matches_schema_width() {
        assert_eq!(COLUMNS.split(", ").count(), 18);
        assert!(COLUMNS.starts_with("complaint_id"));
    }

    #[test]
    fn merge_upserts_on_the_business_key() {
        let sql = merge_statement();
        assert!(sql.contains("ON CONFLICT (complaint_id) DO UPDATE SET"));
        assert!(sql.contains("DISTINCT ON (complaint_id)"));
    }

    #[test]
    fn merge_tie_break_prefers_last_staged_row() {
        assert!(merge_statement().contains("ORDER BY complaint_id, seq DESC"));
    }

    #[test]
    fn merge_never_reassigns_the_key() {
        let sql = merge_statement();
        assert!(!sql.contains("complaint_id = EXCLUDED.complaint_id"));
        // every non-key column gets overwritten on conflict
        for column in COLUMNS.split(", ").skip(1) {
            assert!(
                sql.contains(&format!("{column} = EXCLUDED.{column}")),
                "missing assignment for {column}"
            );
        }
    }
}
