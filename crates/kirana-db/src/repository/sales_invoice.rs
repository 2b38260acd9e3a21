//! # Sales Invoice Repository
//!
//! Billing. Saving an invoice is a single unit of work.
//!
//! ## Save Workflow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │   1. resolve customer (party or walk-in) → jurisdiction                 │
//! │   2. load items, snapshot rate / GST per line, validate                 │
//! │   3. compute_totals_for(SalesInvoice, ..)  (rounded to the rupee)       │
//! │   4. allocate INV-YYYYMMDD-NNNN                                         │
//! │   5. redeem credit note (if any)                                        │
//! │   6. insert header + lines                                              │
//! │   7. FEFO-deduct stock per line      ── short / stale? ──► ROLLBACK     │
//! │   8. open credit entry for any unpaid amount                            │
//! │  COMMIT                                                                 │
//! │                                                                         │
//! │  print receipt (failure logged, sale stands)                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! No stock moves, no number is consumed and no credit is recorded unless
//! every step succeeds.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use std::sync::Arc;
use tracing::{debug, info};

use kirana_core::credit::{amount_on_credit, CreditEntry};
use kirana_core::receipt::{Receipt, ReceiptPrinter};
use kirana_core::stock::DeductionPlan;
use kirana_core::validation::{validate_document_lines, validate_line_item, validate_rate, validate_state_name};
use kirana_core::{
    compute_totals_for, DocumentKind, LineItem, Money, PaymentMode, Percent, SalesInvoice,
    SalesInvoiceLine, StoreProfile, ValidationError,
};

use super::batch::deduct_in;
use super::credit::{fetch_note_by_number, insert_entry, redeem_note};
use super::item::fetch_item;
use super::new_id;
use super::numbering::{next_number, DocumentSeries};
use super::party::fetch_party;
use crate::error::{DbError, DbResult};
use crate::printer::print_after_commit;

/// Name printed for customers without a party record.
pub const WALK_IN_CUSTOMER: &str = "Walk-in";

// =============================================================================
// Draft Types
// =============================================================================

/// One line of an invoice being billed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceLineDraft {
    pub item_id: String,
    pub quantity: i64,
    pub discount: Percent,
    /// Overrides the item's sale rate (price agreed on a sales order).
    pub rate: Option<Money>,
    /// Overrides the item's GST rate.
    pub gst_rate: Option<Percent>,
}

impl InvoiceLineDraft {
    pub fn new(item_id: impl Into<String>, quantity: i64) -> Self {
        InvoiceLineDraft {
            item_id: item_id.into(),
            quantity,
            discount: Percent::zero(),
            rate: None,
            gst_rate: None,
        }
    }

    pub fn discount(mut self, discount: Percent) -> Self {
        self.discount = discount;
        self
    }

    pub fn rate(mut self, rate: Money) -> Self {
        self.rate = Some(rate);
        self
    }
}

/// An invoice ready to be saved.
#[derive(Debug, Clone)]
pub struct InvoiceDraft {
    /// Registered customer; `None` for a walk-in sale.
    pub customer_id: Option<String>,
    /// State of a walk-in customer. Defaults to the store's home state.
    pub customer_state: Option<String>,
    pub lines: Vec<InvoiceLineDraft>,
    /// Cash / card / UPI tendered.
    pub amount_paid: Money,
    pub payment_mode: PaymentMode,
    /// Credit note offered against this invoice.
    pub credit_note_number: Option<String>,
    pub sales_order_id: Option<String>,
}

impl InvoiceDraft {
    /// A walk-in sale paid with `payment_mode`.
    pub fn walk_in(lines: Vec<InvoiceLineDraft>, amount_paid: Money, payment_mode: PaymentMode) -> Self {
        InvoiceDraft {
            customer_id: None,
            customer_state: None,
            lines,
            amount_paid,
            payment_mode,
            credit_note_number: None,
            sales_order_id: None,
        }
    }

    pub fn for_customer(mut self, customer_id: impl Into<String>) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }

    pub fn redeeming(mut self, credit_note_number: impl Into<String>) -> Self {
        self.credit_note_number = Some(credit_note_number.into());
        self
    }
}

/// Everything written by a successful save.
#[derive(Debug, Clone)]
pub struct SavedInvoice {
    pub invoice: SalesInvoice,
    pub lines: Vec<SalesInvoiceLine>,
    /// One plan per line, in line order.
    pub deductions: Vec<DeductionPlan>,
    pub credit_entry: Option<CreditEntry>,
    /// Whether the receipt printer accepted the receipt.
    pub printed: bool,
}

// =============================================================================
// Repository
// =============================================================================

#[derive(Clone)]
pub struct SalesInvoiceRepository {
    pool: SqlitePool,
    store: StoreProfile,
    printer: Arc<dyn ReceiptPrinter>,
}

impl std::fmt::Debug for SalesInvoiceRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SalesInvoiceRepository")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl SalesInvoiceRepository {
    pub fn new(pool: SqlitePool, store: StoreProfile, printer: Arc<dyn ReceiptPrinter>) -> Self {
        SalesInvoiceRepository { pool, store, printer }
    }

    pub fn store(&self) -> &StoreProfile {
        &self.store
    }

    /// Saves the invoice atomically, then prints the receipt.
    ///
    /// ## Errors
    /// - `ValidationError` for empty/oversized documents, bad quantities or rates,
    ///   or an unpaid balance on a walk-in sale
    /// - `CoreError::InsufficientStock` if any line cannot be fully deducted
    /// - `DbError::ConcurrentModification` if stock or a credit note moved
    ///   during the save
    pub async fn save(&self, draft: InvoiceDraft) -> DbResult<SavedInvoice> {
        let mut tx = self.pool.begin().await?;
        let mut saved = save_in(&mut tx, &self.store, draft, Utc::now()).await?;
        tx.commit().await?;

        info!(
            invoice_number = %saved.invoice.invoice_number,
            total = %saved.invoice.totals.total,
            lines = saved.lines.len(),
            "Sales invoice saved"
        );

        saved.printed = self.print(&saved);
        Ok(saved)
    }

    pub(crate) fn print(&self, saved: &SavedInvoice) -> bool {
        let receipt = Receipt::from_invoice(&self.store, &saved.invoice, &saved.lines);
        print_after_commit(self.printer.as_ref(), &receipt)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<SalesInvoice>> {
        let invoice = sqlx::query_as::<_, SalesInvoice>("SELECT * FROM sales_invoices WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(invoice)
    }

    pub async fn get_by_number(&self, invoice_number: &str) -> DbResult<Option<SalesInvoice>> {
        let invoice = sqlx::query_as::<_, SalesInvoice>(
            "SELECT * FROM sales_invoices WHERE invoice_number = ?1",
        )
        .bind(invoice_number)
        .fetch_optional(&self.pool)
        .await?;
        Ok(invoice)
    }

    pub async fn get_lines(&self, invoice_id: &str) -> DbResult<Vec<SalesInvoiceLine>> {
        let mut conn = self.pool.acquire().await?;
        fetch_lines(&mut conn, invoice_id).await
    }

    pub async fn list_recent(&self, limit: u32) -> DbResult<Vec<SalesInvoice>> {
        let invoices = sqlx::query_as::<_, SalesInvoice>(
            "SELECT * FROM sales_invoices ORDER BY created_at DESC, invoice_number DESC LIMIT ?1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(invoices)
    }

    /// Rebuilds the receipt of a saved invoice (reprint).
    pub async fn receipt(&self, invoice_id: &str) -> DbResult<Receipt> {
        let invoice = self
            .get_by_id(invoice_id)
            .await?
            .ok_or_else(|| DbError::not_found("Sales invoice", invoice_id))?;
        let lines = self.get_lines(invoice_id).await?;
        Ok(Receipt::from_invoice(&self.store, &invoice, &lines))
    }
}

// =============================================================================
// Transaction-scoped operations
// =============================================================================

pub async fn fetch_invoice(conn: &mut SqliteConnection, id: &str) -> DbResult<SalesInvoice> {
    sqlx::query_as::<_, SalesInvoice>("SELECT * FROM sales_invoices WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Sales invoice", id))
}

pub async fn fetch_lines(conn: &mut SqliteConnection, invoice_id: &str) -> DbResult<Vec<SalesInvoiceLine>> {
    let lines = sqlx::query_as::<_, SalesInvoiceLine>(
        "SELECT * FROM sales_invoice_lines WHERE invoice_id = ?1 ORDER BY position",
    )
    .bind(invoice_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(lines)
}

/// The save workflow without BEGIN/COMMIT; shared with order fulfilment.
pub(crate) async fn save_in(
    conn: &mut SqliteConnection,
    store: &StoreProfile,
    draft: InvoiceDraft,
    at: DateTime<Utc>,
) -> DbResult<SavedInvoice> {
    validate_document_lines(draft.lines.len())?;
    validate_rate(draft.amount_paid)?;

    // 1. Customer and jurisdiction
    let (customer_name, customer_state) = match &draft.customer_id {
        Some(id) => {
            let party = fetch_party(conn, id).await?;
            (party.name, party.state)
        }
        None => (
            WALK_IN_CUSTOMER.to_string(),
            draft
                .customer_state
                .clone()
                .unwrap_or_else(|| store.home_state.clone()),
        ),
    };
    validate_state_name(&customer_state)?;
    let jurisdiction = store.jurisdiction_for(&customer_state);

    // 2. Line snapshots
    let mut priced: Vec<(LineItem, String, String)> = Vec::with_capacity(draft.lines.len());
    for line in &draft.lines {
        let item = fetch_item(conn, &line.item_id).await?;
        if !item.is_active {
            return Err(ValidationError::InvalidFormat {
                field: "item_id".to_string(),
                reason: format!("item {} is inactive", item.sku),
            }
            .into());
        }
        let mut line_item = item.sale_line(line.quantity, line.discount);
        if let Some(rate) = line.rate {
            line_item.rate = rate;
        }
        if let Some(gst_rate) = line.gst_rate {
            line_item.gst_rate = gst_rate;
        }
        validate_line_item(&line_item)?;
        priced.push((line_item, item.sku, item.name));
    }

    // 3. Totals
    let items: Vec<LineItem> = priced.iter().map(|(l, _, _)| l.clone()).collect();
    let totals = compute_totals_for(DocumentKind::SalesInvoice, &items, jurisdiction);

    // 4. Number
    let invoice_number = next_number(conn, DocumentSeries::SalesInvoice, at).await?;
    let invoice_id = new_id();

    debug!(
        invoice_number = %invoice_number,
        jurisdiction = ?jurisdiction,
        total = %totals.total,
        "Pricing sales invoice"
    );

    // 5. Credit note
    let mut credit_note_redeemed = Money::zero();
    if let Some(number) = &draft.credit_note_number {
        let mut note = fetch_note_by_number(conn, number).await?;
        if note.party_id.is_some() && note.party_id != draft.customer_id {
            return Err(ValidationError::InvalidFormat {
                field: "credit_note_number".to_string(),
                reason: format!("credit note {} was issued to another customer", note.note_number),
            }
            .into());
        }
        let wanted = (totals.total - draft.amount_paid).clamp_non_negative();
        let amount = wanted.min(note.balance);
        if amount.is_positive() {
            redeem_note(conn, &mut note, amount, at).await?;
            credit_note_redeemed = amount;
        }
    }

    let invoice = SalesInvoice {
        id: invoice_id.clone(),
        invoice_number,
        customer_id: draft.customer_id.clone(),
        customer_name,
        customer_state,
        jurisdiction,
        totals,
        amount_paid: draft.amount_paid,
        credit_note_redeemed,
        payment_mode: draft.payment_mode,
        sales_order_id: draft.sales_order_id.clone(),
        created_at: at,
    };

    let unpaid = amount_on_credit(totals.total, draft.amount_paid + credit_note_redeemed);
    if unpaid.is_positive() && invoice.customer_id.is_none() {
        return Err(ValidationError::Required {
            field: "customer_id (unpaid balance on walk-in sale)".to_string(),
        }
        .into());
    }

    // 6. Header and lines
    insert_header(conn, &invoice).await?;

    let mut lines = Vec::with_capacity(priced.len());
    for (position, (line_item, sku, name)) in priced.into_iter().enumerate() {
        let breakdown = line_item.breakdown(jurisdiction);
        let line = SalesInvoiceLine {
            id: new_id(),
            invoice_id: invoice_id.clone(),
            item_id: line_item.item_id.clone(),
            sku_snapshot: sku,
            name_snapshot: name,
            quantity: line_item.quantity,
            rate: line_item.rate,
            discount: line_item.discount,
            gst_rate: line_item.gst_rate,
            taxable: breakdown.taxable,
            cgst: breakdown.cgst,
            sgst: breakdown.sgst,
            igst: breakdown.igst,
            returned_quantity: 0,
            position: position as i64,
        };
        insert_line(conn, &line).await?;
        lines.push(line);
    }

    // 7. Stock
    let mut deductions = Vec::with_capacity(lines.len());
    for line in &lines {
        deductions.push(deduct_in(conn, &line.item_id, line.quantity).await?);
    }

    // 8. Credit
    let credit_entry = match (&invoice.customer_id, unpaid.is_positive()) {
        (Some(customer_id), true) => Some(insert_entry(conn, &invoice.id, customer_id, unpaid, at).await?),
        _ => None,
    };

    Ok(SavedInvoice {
        invoice,
        lines,
        deductions,
        credit_entry,
        printed: false,
    })
}

async fn insert_header(conn: &mut SqliteConnection, invoice: &SalesInvoice) -> DbResult<()> {
    let t = &invoice.totals;
    sqlx::query(
        r#"
        INSERT INTO sales_invoices (
            id, invoice_number, customer_id, customer_name, customer_state, jurisdiction,
            subtotal, discount_amount, taxable_amount, cgst, sgst, igst, round_off, total,
            amount_paid, credit_note_redeemed, payment_mode, sales_order_id, created_at
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5, ?6,
            ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14,
            ?15, ?16, ?17, ?18, ?19
        )
        "#,
    )
    .bind(&invoice.id)
    .bind(&invoice.invoice_number)
    .bind(&invoice.customer_id)
    .bind(&invoice.customer_name)
    .bind(&invoice.customer_state)
    .bind(invoice.jurisdiction)
    .bind(t.subtotal)
    .bind(t.discount_amount)
    .bind(t.taxable_amount)
    .bind(t.cgst)
    .bind(t.sgst)
    .bind(t.igst)
    .bind(t.round_off)
    .bind(t.total)
    .bind(invoice.amount_paid)
    .bind(invoice.credit_note_redeemed)
    .bind(invoice.payment_mode)
    .bind(&invoice.sales_order_id)
    .bind(invoice.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn insert_line(conn: &mut SqliteConnection, line: &SalesInvoiceLine) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO sales_invoice_lines (
            id, invoice_id, item_id, sku_snapshot, name_snapshot,
            quantity, rate, discount, gst_rate,
            taxable, cgst, sgst, igst, returned_quantity, position
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
        "#,
    )
    .bind(&line.id)
    .bind(&line.invoice_id)
    .bind(&line.item_id)
    .bind(&line.sku_snapshot)
    .bind(&line.name_snapshot)
    .bind(line.quantity)
    .bind(line.rate)
    .bind(line.discount)
    .bind(line.gst_rate)
    .bind(line.taxable)
    .bind(line.cgst)
    .bind(line.sgst)
    .bind(line.igst)
    .bind(line.returned_quantity)
    .bind(line.position)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
