//! Row normalization: raw CSV text fields into typed complaint records.
//!
//! Normalization happens immediately at the boundary; nothing downstream of
//! this module touches untyped data. A row whose business key is missing or
//! unparsable aborts its whole batch rather than being silently dropped.

use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::{IngestError, Result};
use crate::reader::Batch;

/// One CSV row exactly as published by the CFPB export, all fields untyped.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct RawRow {
    #[serde(rename = "Date received")]
    pub date_received: String,
    #[serde(rename = "Product")]
    pub product: String,
    #[serde(rename = "Sub-product")]
    pub sub_product: String,
    #[serde(rename = "Issue")]
    pub issue: String,
    #[serde(rename = "Sub-issue")]
    pub sub_issue: String,
    #[serde(rename = "Consumer complaint narrative")]
    pub consumer_complaint_narrative: String,
    #[serde(rename = "Company public response")]
    pub company_public_response: String,
    #[serde(rename = "Company")]
    pub company: String,
    #[serde(rename = "State")]
    pub state: String,
    #[serde(rename = "ZIP code")]
    pub zip_code: String,
    #[serde(rename = "Tags")]
    pub tags: String,
    #[serde(rename = "Consumer consent provided?")]
    pub consumer_consent_provided: String,
    #[serde(rename = "Submitted via")]
    pub submitted_via: String,
    #[serde(rename = "Date sent to company")]
    pub date_sent_to_company: String,
    #[serde(rename = "Company response to consumer")]
    pub company_response_to_consumer: String,
    #[serde(rename = "Timely response?")]
    pub timely_response: String,
    #[serde(rename = "Consumer disputed?")]
    pub consumer_disputed: String,
    #[serde(rename = "Complaint ID")]
    pub complaint_id: String,
}

/// Normalized complaint, matching the consumer_complaints schema. The
/// complaint id is the business key; every other field is nullable.
#[derive(Debug, Clone, PartialEq)]
pub struct ComplaintRecord {
    pub complaint_id: i64,
    pub date_received: Option<NaiveDate>,
    pub product: Option<String>,
    pub sub_product: Option<String>,
    pub issue: Option<String>,
    pub sub_issue: Option<String>,
    pub consumer_complaint_narrative: Option<String>,
    pub company_public_response: Option<String>,
    pub company: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    pub tags: Option<String>,
    pub consumer_consent_provided: Option<String>,
    pub submitted_via: Option<String>,
    pub date_sent_to_company: Option<NaiveDate>,
    pub company_response_to_consumer: Option<String>,
    pub timely_response: Option<bool>,
    pub consumer_disputed: Option<bool>,
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_date(s: &str, field: &str, line: usize) -> Result<Option<NaiveDate>> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%m/%d/%Y"))
        .map(Some)
        .map_err(|_| IngestError::MalformedRecord {
            line,
            reason: format!("unparsable '{}' date '{}'", field, trimmed),
        })
}

/// "Yes"/"No" flags; anything else (empty, "N/A") carries no information.
fn parse_flag(s: &str) -> Option<bool> {
    match s.trim() {
        "Yes" => Some(true),
        "No" => Some(false),
        _ => None,
    }
}

/// Map one raw row to a typed record. `line` is the 1-based CSV line of the
/// row (the header is line 1), used for error reporting.
pub fn normalize(raw: &RawRow, line: usize) -> Result<ComplaintRecord> {
    let id = raw.complaint_id.trim();
    if id.is_empty() {
        return Err(IngestError::MalformedRecord {
            line,
            reason: "empty Complaint ID field".to_string(),
        });
    }
    let complaint_id: i64 = id.parse().map_err(|_| IngestError::MalformedRecord {
        line,
        reason: format!("unparsable Complaint ID '{}'", id),
    })?;

    Ok(ComplaintRecord {
        complaint_id,
        date_received: parse_date(&raw.date_received, "Date received", line)?,
        product: non_empty(&raw.product),
        sub_product: non_empty(&raw.sub_product),
        issue: non_empty(&raw.issue),
        sub_issue: non_empty(&raw.sub_issue),
        consumer_complaint_narrative: non_empty(&raw.consumer_complaint_narrative),
        company_public_response: non_empty(&raw.company_public_response),
        company: non_empty(&raw.company),
        state: non_empty(&raw.state),
        zip_code: non_empty(&raw.zip_code),
        tags: non_empty(&raw.tags),
        consumer_consent_provided: non_empty(&raw.consumer_consent_provided),
        submitted_via: non_empty(&raw.submitted_via),
        date_sent_to_company: parse_date(&raw.date_sent_to_company, "Date sent to company", line)?,
        company_response_to_consumer: non_empty(&raw.company_response_to_consumer),
        timely_response: parse_flag(&raw.timely_response),
        consumer_disputed: parse_flag(&raw.consumer_disputed),
    })
}

/// Normalize every row of a batch, aborting on the first bad row. The error
/// carries the CSV line of the failing row.
pub fn normalize_batch(batch: &Batch) -> Result<Vec<ComplaintRecord>> {
    batch
        .rows
        .iter()
        .enumerate()
        .map(|(i, raw)| normalize(raw, batch.first_line + i))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(id: &str) -> RawRow {
        RawRow {
            date_received: "2023-05-01".into(),
            product: "Credit card".into(),
            issue: "Billing dispute".into(),
            company: "Acme Bank".into(),
            state: "NY".into(),
            zip_code: "10001".into(),
            submitted_via: "Web".into(),
            date_sent_to_company: "05/03/2023".into(),
            company_response_to_consumer: "Closed with explanation".into(),
            timely_response: "Yes".into(),
            consumer_disputed: "No".into(),
            complaint_id: id.into(),
            ..RawRow::default()
        }
    }

    #[test]
    fn normalizes_typed_fields() {
        let record = normalize(&raw("7001"), 2).unwrap();
        assert_eq!(record.complaint_id, 7001);
        assert_eq!(
            record.date_received,
            NaiveDate::from_ymd_opt(2023, 5, 1)
        );
        // fallback format
        assert_eq!(
            record.date_sent_to_company,
            NaiveDate::from_ymd_opt(2023, 5, 3)
        );
        assert_eq!(record.timely_response, Some(true));
        assert_eq!(record.consumer_disputed, Some(false));
        assert_eq!(record.product.as_deref(), Some("Credit card"));
    }

    #[test]
    fn empty_strings_become_null() {
        let record = normalize(&raw("7002"), 2).unwrap();
        assert_eq!(record.sub_product, None);
        assert_eq!(record.consumer_complaint_narrative, None);
        assert_eq!(record.tags, None);
    }

    #[test]
    fn empty_complaint_id_is_malformed() {
        let err = normalize(&raw("  "), 17).unwrap_err();
        match err {
            IngestError::MalformedRecord { line, reason } => {
                assert_eq!(line, 17);
                assert!(reason.contains("Complaint ID"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn non_numeric_complaint_id_is_malformed() {
        let err = normalize(&raw("X123"), 5).unwrap_err();
        assert_eq!(err.line(), Some(5));
        assert_eq!(err.kind(), "malformed_record");
    }

    #[test]
    fn unparsable_date_is_malformed() {
        let mut row = raw("7003");
        row.date_received = "yesterday".into();
        let err = normalize(&row, 9).unwrap_err();
        assert_eq!(err.kind(), "malformed_record");
        assert_eq!(err.line(), Some(9));
    }

    #[test]
    fn na_flag_carries_no_information() {
        let mut row = raw("7004");
        row.consumer_disputed = "N/A".into();
        row.timely_response = String::new();
        let record = normalize(&row, 2).unwrap();
        assert_eq!(record.consumer_disputed, None);
        assert_eq!(record.timely_response, None);
    }

    #[test]
    fn batch_failure_reports_absolute_line() {
        let batch = Batch {
            rows: vec![raw("1"), raw(""), raw("3")],
            first_line: 100,
        };
        let err = normalize_batch(&batch).unwrap_err();
        assert_eq!(err.line(), Some(101));
    }

    #[test]
    fn batch_success_preserves_order() {
        let batch = Batch {
            rows: vec![raw("10"), raw("11"), raw("12")],
            first_line: 2,
        };
        let records = normalize_batch(&batch).unwrap();
        let ids: Vec<i64> = records.iter().map(|r| r.complaint_id).collect();
        assert_eq!(ids, vec![10, 11, 12]);
    }
}
