//! # Credit Repository
//!
//! The credits ledger: what customers owe on invoices, and the credit notes
//! the store owes them after returns. The rules (`apply_payment`, `redeem`)
//! are in `kirana_core::credit`; writes here are guarded by the previous
//! amount so two tills cannot settle the same balance twice.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use kirana_core::credit::{CreditEntry, CreditNote};
use kirana_core::Money;

use super::new_id;
use crate::error::{DbError, DbResult};

#[derive(Debug, Clone)]
pub struct CreditRepository {
    pool: SqlitePool,
}

impl CreditRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CreditRepository { pool }
    }

    pub async fn get_entry(&self, id: &str) -> DbResult<Option<CreditEntry>> {
        let entry = sqlx::query_as::<_, CreditEntry>("SELECT * FROM credit_entries WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(entry)
    }

    pub async fn entry_for_invoice(&self, invoice_id: &str) -> DbResult<Option<CreditEntry>> {
        let entry = sqlx::query_as::<_, CreditEntry>("SELECT * FROM credit_entries WHERE invoice_id = ?1")
            .bind(invoice_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(entry)
    }

    pub async fn entries_for_party(&self, party_id: &str) -> DbResult<Vec<CreditEntry>> {
        let entries = sqlx::query_as::<_, CreditEntry>(
            "SELECT * FROM credit_entries WHERE party_id = ?1 ORDER BY created_at",
        )
        .bind(party_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    /// Total a customer still owes across open entries.
    pub async fn outstanding_for_party(&self, party_id: &str) -> DbResult<Money> {
        let paise: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(amount_due - amount_paid), 0)
            FROM credit_entries
            WHERE party_id = ?1 AND status = 'open'
            "#,
        )
        .bind(party_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(Money::from_paise(paise))
    }

    /// Records a repayment against a credit entry.
    ///
    /// ## Errors
    /// - `CoreError::CreditExceeded` when `amount` is more than outstanding
    /// - `DbError::ConcurrentModification` if another payment landed first
    pub async fn record_payment(&self, credit_id: &str, amount: Money) -> DbResult<CreditEntry> {
        let mut tx = self.pool.begin().await?;

        let mut entry = sqlx::query_as::<_, CreditEntry>("SELECT * FROM credit_entries WHERE id = ?1")
            .bind(credit_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DbError::not_found("Credit entry", credit_id))?;

        apply_payment_in(&mut tx, &mut entry, amount, Utc::now()).await?;

        tx.commit().await?;

        info!(
            credit_id = %entry.id,
            amount = %amount,
            outstanding = %entry.outstanding(),
            "Credit payment recorded"
        );
        Ok(entry)
    }

    pub async fn get_note_by_number(&self, note_number: &str) -> DbResult<Option<CreditNote>> {
        let note = sqlx::query_as::<_, CreditNote>("SELECT * FROM credit_notes WHERE note_number = ?1")
            .bind(note_number)
            .fetch_optional(&self.pool)
            .await?;
        Ok(note)
    }

    pub async fn notes_for_party(&self, party_id: &str) -> DbResult<Vec<CreditNote>> {
        let notes = sqlx::query_as::<_, CreditNote>(
            "SELECT * FROM credit_notes WHERE party_id = ?1 ORDER BY created_at",
        )
        .bind(party_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(notes)
    }
}

// =============================================================================
// Transaction-scoped operations
// =============================================================================

/// Opens a credit entry for the unpaid part of an invoice.
pub async fn insert_entry(
    conn: &mut SqliteConnection,
    invoice_id: &str,
    party_id: &str,
    amount_due: Money,
    at: DateTime<Utc>,
) -> DbResult<CreditEntry> {
    let entry = CreditEntry {
        id: new_id(),
        invoice_id: invoice_id.to_string(),
        party_id: party_id.to_string(),
        amount_due,
        amount_paid: Money::zero(),
        status: kirana_core::credit::CreditStatus::Open,
        created_at: at,
        updated_at: at,
    };

    debug!(invoice_id = %invoice_id, party_id = %party_id, amount_due = %amount_due, "Opening credit entry");

    sqlx::query(
        r#"
        INSERT INTO credit_entries (
            id, invoice_id, party_id, amount_due, amount_paid, status, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&entry.id)
    .bind(&entry.invoice_id)
    .bind(&entry.party_id)
    .bind(entry.amount_due)
    .bind(entry.amount_paid)
    .bind(entry.status)
    .bind(entry.created_at)
    .bind(entry.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(entry)
}

/// The credit entry opened for `invoice_id`, if the invoice was not paid in full.
pub async fn fetch_entry_for_invoice(conn: &mut SqliteConnection, invoice_id: &str) -> DbResult<Option<CreditEntry>> {
    let entry = sqlx::query_as::<_, CreditEntry>("SELECT * FROM credit_entries WHERE invoice_id = ?1")
        .bind(invoice_id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(entry)
}

/// Applies `amount` to the entry and records it in `credit_payments`.
///
/// Guarded on the previous `amount_paid`; a concurrent settlement surfaces
/// as `DbError::ConcurrentModification`.
pub async fn apply_payment_in(
    conn: &mut SqliteConnection,
    entry: &mut CreditEntry,
    amount: Money,
    at: DateTime<Utc>,
) -> DbResult<()> {
    let previous_paid = entry.amount_paid;
    entry.apply_payment(amount)?;
    entry.updated_at = at;

    let result = sqlx::query(
        r#"
        UPDATE credit_entries SET amount_paid = ?2, status = ?3, updated_at = ?4
        WHERE id = ?1 AND amount_paid = ?5
        "#,
    )
    .bind(&entry.id)
    .bind(entry.amount_paid)
    .bind(entry.status)
    .bind(entry.updated_at)
    .bind(previous_paid)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::concurrent("credit entry", &entry.id));
    }

    sqlx::query("INSERT INTO credit_payments (id, credit_id, amount, created_at) VALUES (?1, ?2, ?3, ?4)")
        .bind(new_id())
        .bind(&entry.id)
        .bind(amount)
        .bind(at)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

pub async fn insert_note(conn: &mut SqliteConnection, note: &CreditNote) -> DbResult<()> {
    debug!(note_number = %note.note_number, amount = %note.amount, "Issuing credit note");

    sqlx::query(
        r#"
        INSERT INTO credit_notes (
            id, note_number, party_id, return_id, amount, balance, status, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&note.id)
    .bind(&note.note_number)
    .bind(&note.party_id)
    .bind(&note.return_id)
    .bind(note.amount)
    .bind(note.balance)
    .bind(note.status)
    .bind(note.created_at)
    .bind(note.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn fetch_note_by_number(conn: &mut SqliteConnection, note_number: &str) -> DbResult<CreditNote> {
    sqlx::query_as::<_, CreditNote>("SELECT * FROM credit_notes WHERE note_number = ?1")
        .bind(note_number)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Credit note", note_number))
}

/// Redeems `amount` from the note and persists the new balance.
pub async fn redeem_note(
    conn: &mut SqliteConnection,
    note: &mut CreditNote,
    amount: Money,
    at: DateTime<Utc>,
) -> DbResult<()> {
    let previous_balance = note.balance;
    note.redeem(amount)?;
    note.updated_at = at;

    let result = sqlx::query(
        r#"
        UPDATE credit_notes SET balance = ?2, status = ?3, updated_at = ?4
        WHERE id = ?1 AND balance = ?5
        "#,
    )
    .bind(&note.id)
    .bind(note.balance)
    .bind(note.status)
    .bind(note.updated_at)
    .bind(previous_balance)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::concurrent("credit note", &note.note_number));
    }

    debug!(note_number = %note.note_number, redeemed = %amount, balance = %note.balance, "Credit note redeemed");
    Ok(())
}
