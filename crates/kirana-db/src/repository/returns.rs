//! # Sales Return Repository
//!
//! Takes goods back against a saved invoice. Returned goods never merge into
//! the batch they came from; each returned line becomes a new `returned`
//! batch with no expiry, so FEFO picks it last.
//!
//! If the invoice still has an open credit entry, the return value clears
//! that balance first (`credit_offset`). Only the rest, `refund_due()`, is
//! refunded in cash or issued as a credit note redeemable on later invoices.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

use kirana_core::credit::{CreditNote, CreditNoteStatus};
use kirana_core::returns::{plan_return, ReturnLineRequest};
use kirana_core::stock::RestockRequest;
use kirana_core::{Money, RefundMode, SalesReturn, SalesReturnLine};

use super::batch::restock_in;
use super::credit::{apply_payment_in, fetch_entry_for_invoice, insert_note};
use super::item::fetch_item;
use super::new_id;
use super::numbering::{next_number, DocumentSeries};
use super::sales_invoice::{fetch_invoice, fetch_lines};
use crate::error::{DbError, DbResult};

#[derive(Debug, Clone)]
pub struct SavedReturn {
    pub sales_return: SalesReturn,
    pub lines: Vec<SalesReturnLine>,
    pub credit_note: Option<CreditNote>,
}

#[derive(Debug, Clone)]
pub struct ReturnRepository {
    pool: SqlitePool,
}

impl ReturnRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ReturnRepository { pool }
    }

    /// Processes a return against `invoice_id`.
    ///
    /// ## Errors
    /// - `CoreError::OverReturn` if a line would be returned beyond what was sold
    /// - `CoreError::LineNotFound` if a request names a line not on the invoice
    /// - `DbError::ConcurrentModification` if another return touched the same line,
    ///   or a payment landed on the invoice's credit entry meanwhile
    pub async fn create(
        &self,
        invoice_id: &str,
        requests: Vec<ReturnLineRequest>,
        refund_mode: RefundMode,
    ) -> DbResult<SavedReturn> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let invoice = fetch_invoice(&mut tx, invoice_id).await?;
        let sold = fetch_lines(&mut tx, invoice_id).await?;
        let plan = plan_return(&sold, &requests, invoice.jurisdiction)?;

        let mut credit_offset = Money::zero();
        if let Some(mut entry) = fetch_entry_for_invoice(&mut tx, &invoice.id).await? {
            let offset = plan.refund.total.min(entry.outstanding());
            if offset.is_positive() {
                apply_payment_in(&mut tx, &mut entry, offset, now).await?;
                credit_offset = offset;
            }
        }

        let return_number = next_number(&mut tx, DocumentSeries::SalesReturn, now).await?;
        let mut sales_return = SalesReturn {
            id: new_id(),
            return_number,
            invoice_id: invoice.id.clone(),
            refund_mode,
            totals: plan.refund,
            credit_offset,
            credit_note_id: None,
            created_at: now,
        };

        let t = &sales_return.totals;
        sqlx::query(
            r#"
            INSERT INTO sales_returns (
                id, return_number, invoice_id, refund_mode,
                subtotal, discount_amount, taxable_amount, cgst, sgst, igst, round_off, total,
                credit_offset, credit_note_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
        )
        .bind(&sales_return.id)
        .bind(&sales_return.return_number)
        .bind(&sales_return.invoice_id)
        .bind(sales_return.refund_mode)
        .bind(t.subtotal)
        .bind(t.discount_amount)
        .bind(t.taxable_amount)
        .bind(t.cgst)
        .bind(t.sgst)
        .bind(t.igst)
        .bind(t.round_off)
        .bind(t.total)
        .bind(sales_return.credit_offset)
        .bind(&sales_return.credit_note_id)
        .bind(sales_return.created_at)
        .execute(&mut *tx)
        .await?;

        let source_ref = format!("RET:{}", sales_return.return_number);
        let mut lines = Vec::with_capacity(plan.lines.len());
        for (position, planned) in plan.lines.into_iter().enumerate() {
            mark_returned(&mut tx, &planned.invoice_line_id, planned.quantity).await?;

            let item = fetch_item(&mut tx, &planned.item_id).await?;
            let batch = restock_in(
                &mut tx,
                RestockRequest {
                    item_id: planned.item_id.clone(),
                    quantity: planned.quantity,
                    purchase_rate: item.purchase_rate,
                    source_ref: source_ref.clone(),
                    expiry_date: None,
                },
                now,
            )
            .await?;

            let line = SalesReturnLine {
                id: new_id(),
                return_id: sales_return.id.clone(),
                invoice_line_id: planned.invoice_line_id,
                item_id: planned.item_id,
                quantity: planned.quantity,
                batch_id: batch.id,
                position: position as i64,
            };
            sqlx::query(
                r#"
                INSERT INTO sales_return_lines (
                    id, return_id, invoice_line_id, item_id, quantity, batch_id, position
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(&line.id)
            .bind(&line.return_id)
            .bind(&line.invoice_line_id)
            .bind(&line.item_id)
            .bind(line.quantity)
            .bind(&line.batch_id)
            .bind(line.position)
            .execute(&mut *tx)
            .await?;
            lines.push(line);
        }

        let refund_due = sales_return.refund_due();
        let credit_note = if refund_mode == RefundMode::CreditNote && refund_due.is_positive() {
            let note = CreditNote {
                id: new_id(),
                note_number: next_number(&mut tx, DocumentSeries::CreditNote, now).await?,
                party_id: invoice.customer_id.clone(),
                return_id: sales_return.id.clone(),
                amount: refund_due,
                balance: refund_due,
                status: CreditNoteStatus::Open,
                created_at: now,
                updated_at: now,
            };
            insert_note(&mut tx, &note).await?;

            sqlx::query("UPDATE sales_returns SET credit_note_id = ?2 WHERE id = ?1")
                .bind(&sales_return.id)
                .bind(&note.id)
                .execute(&mut *tx)
                .await?;
            sales_return.credit_note_id = Some(note.id.clone());
            Some(note)
        } else {
            None
        };

        tx.commit().await?;

        info!(
            return_number = %sales_return.return_number,
            invoice_number = %invoice.invoice_number,
            value = %sales_return.totals.total,
            credit_offset = %credit_offset,
            refund = %refund_due,
            credit_note = credit_note.as_ref().map(|n| n.note_number.as_str()).unwrap_or("-"),
            "Sales return processed"
        );

        Ok(SavedReturn {
            sales_return,
            lines,
            credit_note,
        })
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<SalesReturn>> {
        let sales_return = sqlx::query_as::<_, SalesReturn>("SELECT * FROM sales_returns WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(sales_return)
    }

    pub async fn get_lines(&self, return_id: &str) -> DbResult<Vec<SalesReturnLine>> {
        let lines = sqlx::query_as::<_, SalesReturnLine>(
            "SELECT * FROM sales_return_lines WHERE return_id = ?1 ORDER BY position",
        )
        .bind(return_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(lines)
    }

    pub async fn list_for_invoice(&self, invoice_id: &str) -> DbResult<Vec<SalesReturn>> {
        let returns = sqlx::query_as::<_, SalesReturn>(
            "SELECT * FROM sales_returns WHERE invoice_id = ?1 ORDER BY created_at",
        )
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(returns)
    }
}

/// Bumps `returned_quantity` on the sold line, guarded so two returns
/// cannot both pass the returnable check.
async fn mark_returned(conn: &mut SqliteConnection, invoice_line_id: &str, quantity: i64) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE sales_invoice_lines
        SET returned_quantity = returned_quantity + ?2
        WHERE id = ?1 AND returned_quantity + ?2 <= quantity
        "#,
    )
    .bind(invoice_line_id)
    .bind(quantity)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::concurrent("sales invoice line", invoice_line_id));
    }
    Ok(())
}
