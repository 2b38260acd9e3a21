//! # Document Numbering
//!
//! Numbers have the form `PREFIX-YYYYMMDD-NNNN`, where NNNN restarts at 0001
//! every day for every prefix. The counter is bumped inside the caller's
//! transaction, so a rolled-back document does not burn a number.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;

/// Document series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentSeries {
    SalesInvoice,
    PurchaseInvoice,
    SalesOrder,
    SalesReturn,
    CreditNote,
}

impl DocumentSeries {
    pub fn prefix(&self) -> &'static str {
        match self {
            DocumentSeries::SalesInvoice => "INV",
            DocumentSeries::PurchaseInvoice => "PUR",
            DocumentSeries::SalesOrder => "SO",
            DocumentSeries::SalesReturn => "RET",
            DocumentSeries::CreditNote => "CN",
        }
    }
}

/// Formats a document number.
///
/// ```rust
/// use chrono::{TimeZone, Utc};
/// use kirana_db::repository::numbering::{format_number, DocumentSeries};
///
/// let at = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
/// assert_eq!(format_number(DocumentSeries::SalesInvoice, at, 7), "INV-20260301-0007");
/// ```
pub fn format_number(series: DocumentSeries, at: DateTime<Utc>, sequence: i64) -> String {
    format!("{}-{}-{:04}", series.prefix(), at.format("%Y%m%d"), sequence)
}

/// Allocates the next number of `series` for the day of `at`.
pub async fn next_number(
    conn: &mut SqliteConnection,
    series: DocumentSeries,
    at: DateTime<Utc>,
) -> DbResult<String> {
    let day = at.format("%Y%m%d").to_string();

    let sequence: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO document_sequences (prefix, day, last_value)
        VALUES (?1, ?2, 1)
        ON CONFLICT (prefix, day) DO UPDATE SET last_value = last_value + 1
        RETURNING last_value
        "#,
    )
    .bind(series.prefix())
    .bind(&day)
    .fetch_one(&mut *conn)
    .await?;

    let number = format_number(series, at, sequence);
    debug!(number = %number, "Allocated document number");
    Ok(number)
}
