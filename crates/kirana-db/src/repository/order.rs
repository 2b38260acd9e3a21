//! # Sales Order Repository
//!
//! Orders book a price with a customer but never touch stock. Fulfilling an
//! order bills it: a sales invoice is saved from the order lines (at the
//! ordered rates) and the order is closed, in one transaction.
//!
//! ```text
//!   create ──► Open ──fulfil──► Fulfilled (invoice_id set)
//!                │
//!                └──cancel───► Cancelled
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use std::sync::Arc;
use tracing::info;

use kirana_core::receipt::ReceiptPrinter;
use kirana_core::validation::{validate_document_lines, validate_line_item, validate_state_name};
use kirana_core::{
    compute_totals_for, CoreError, DocumentKind, LineItem, Money, OrderStatus, PaymentMode,
    SalesOrder, SalesOrderLine, StoreProfile,
};

use super::item::fetch_item;
use super::new_id;
use super::numbering::{next_number, DocumentSeries};
use super::party::fetch_party;
use super::sales_invoice::{
    save_in, InvoiceDraft, InvoiceLineDraft, SalesInvoiceRepository, SavedInvoice, WALK_IN_CUSTOMER,
};
use crate::error::{DbError, DbResult};

#[derive(Debug, Clone)]
pub struct OrderDraft {
    pub customer_id: Option<String>,
    /// State of a walk-in customer. Defaults to the store's home state.
    pub customer_state: Option<String>,
    pub lines: Vec<InvoiceLineDraft>,
}

#[derive(Clone)]
pub struct SalesOrderRepository {
    pool: SqlitePool,
    store: StoreProfile,
    printer: Arc<dyn ReceiptPrinter>,
}

impl std::fmt::Debug for SalesOrderRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SalesOrderRepository")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl SalesOrderRepository {
    pub fn new(pool: SqlitePool, store: StoreProfile, printer: Arc<dyn ReceiptPrinter>) -> Self {
        SalesOrderRepository { pool, store, printer }
    }

    /// Books an order. Stock is not checked or reserved.
    pub async fn create(&self, draft: OrderDraft) -> DbResult<(SalesOrder, Vec<SalesOrderLine>)> {
        validate_document_lines(draft.lines.len())?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let (customer_name, customer_state) = match &draft.customer_id {
            Some(id) => {
                let party = fetch_party(&mut tx, id).await?;
                (party.name, party.state)
            }
            None => (
                WALK_IN_CUSTOMER.to_string(),
                draft
                    .customer_state
                    .clone()
                    .unwrap_or_else(|| self.store.home_state.clone()),
            ),
        };
        validate_state_name(&customer_state)?;
        let jurisdiction = self.store.jurisdiction_for(&customer_state);

        let mut items = Vec::with_capacity(draft.lines.len());
        for line in &draft.lines {
            let item = fetch_item(&mut tx, &line.item_id).await?;
            let mut line_item = item.sale_line(line.quantity, line.discount);
            if let Some(rate) = line.rate {
                line_item.rate = rate;
            }
            if let Some(gst_rate) = line.gst_rate {
                line_item.gst_rate = gst_rate;
            }
            validate_line_item(&line_item)?;
            items.push(line_item);
        }

        let totals = compute_totals_for(DocumentKind::SalesOrder, &items, jurisdiction);
        let order_number = next_number(&mut tx, DocumentSeries::SalesOrder, now).await?;

        let order = SalesOrder {
            id: new_id(),
            order_number,
            customer_id: draft.customer_id.clone(),
            customer_name,
            customer_state,
            jurisdiction,
            totals,
            status: OrderStatus::Open,
            invoice_id: None,
            created_at: now,
            updated_at: now,
        };

        let t = &order.totals;
        sqlx::query(
            r#"
            INSERT INTO sales_orders (
                id, order_number, customer_id, customer_name, customer_state, jurisdiction,
                subtotal, discount_amount, taxable_amount, cgst, sgst, igst, round_off, total,
                status, invoice_id, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
            "#,
        )
        .bind(&order.id)
        .bind(&order.order_number)
        .bind(&order.customer_id)
        .bind(&order.customer_name)
        .bind(&order.customer_state)
        .bind(order.jurisdiction)
        .bind(t.subtotal)
        .bind(t.discount_amount)
        .bind(t.taxable_amount)
        .bind(t.cgst)
        .bind(t.sgst)
        .bind(t.igst)
        .bind(t.round_off)
        .bind(t.total)
        .bind(order.status)
        .bind(&order.invoice_id)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;

        let mut lines = Vec::with_capacity(items.len());
        for (position, line_item) in items.into_iter().enumerate() {
            let line = SalesOrderLine {
                id: new_id(),
                order_id: order.id.clone(),
                item_id: line_item.item_id,
                quantity: line_item.quantity,
                rate: line_item.rate,
                discount: line_item.discount,
                gst_rate: line_item.gst_rate,
                position: position as i64,
            };
            sqlx::query(
                r#"
                INSERT INTO sales_order_lines (
                    id, order_id, item_id, quantity, rate, discount, gst_rate, position
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(&line.id)
            .bind(&line.order_id)
            .bind(&line.item_id)
            .bind(line.quantity)
            .bind(line.rate)
            .bind(line.discount)
            .bind(line.gst_rate)
            .bind(line.position)
            .execute(&mut *tx)
            .await?;
            lines.push(line);
        }

        tx.commit().await?;

        info!(order_number = %order.order_number, total = %order.totals.total, "Sales order booked");
        Ok((order, lines))
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<SalesOrder>> {
        let order = sqlx::query_as::<_, SalesOrder>("SELECT * FROM sales_orders WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(order)
    }

    pub async fn get_lines(&self, order_id: &str) -> DbResult<Vec<SalesOrderLine>> {
        let mut conn = self.pool.acquire().await?;
        fetch_lines(&mut conn, order_id).await
    }

    pub async fn list_open(&self) -> DbResult<Vec<SalesOrder>> {
        let orders = sqlx::query_as::<_, SalesOrder>(
            "SELECT * FROM sales_orders WHERE status = 'open' ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(orders)
    }

    /// Cancels an open order.
    pub async fn cancel(&self, id: &str) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        let order = fetch_order(&mut tx, id).await?;
        require_open(&order)?;

        let result = sqlx::query(
            "UPDATE sales_orders SET status = ?2, updated_at = ?3 WHERE id = ?1 AND status = 'open'",
        )
        .bind(id)
        .bind(OrderStatus::Cancelled)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::concurrent("sales order", id));
        }
        tx.commit().await?;

        info!(order_number = %order.order_number, "Sales order cancelled");
        Ok(())
    }

    /// Bills an open order: saves the invoice (deducting stock) and marks
    /// the order fulfilled, atomically. The receipt prints after commit.
    pub async fn fulfil(&self, id: &str, amount_paid: Money, payment_mode: PaymentMode) -> DbResult<SavedInvoice> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let order = fetch_order(&mut tx, id).await?;
        require_open(&order)?;
        let order_lines = fetch_lines(&mut tx, id).await?;

        let draft = InvoiceDraft {
            customer_id: order.customer_id.clone(),
            customer_state: Some(order.customer_state.clone()),
            lines: order_lines
                .iter()
                .map(|l| InvoiceLineDraft {
                    item_id: l.item_id.clone(),
                    quantity: l.quantity,
                    discount: l.discount,
                    rate: Some(l.rate),
                    gst_rate: Some(l.gst_rate),
                })
                .collect(),
            amount_paid,
            payment_mode,
            credit_note_number: None,
            sales_order_id: Some(order.id.clone()),
        };

        let mut saved = save_in(&mut tx, &self.store, draft, now).await?;

        let result = sqlx::query(
            r#"
            UPDATE sales_orders SET status = ?2, invoice_id = ?3, updated_at = ?4
            WHERE id = ?1 AND status = 'open'
            "#,
        )
        .bind(id)
        .bind(OrderStatus::Fulfilled)
        .bind(&saved.invoice.id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::concurrent("sales order", id));
        }
        tx.commit().await?;

        info!(
            order_number = %order.order_number,
            invoice_number = %saved.invoice.invoice_number,
            "Sales order fulfilled"
        );

        let invoices = SalesInvoiceRepository::new(self.pool.clone(), self.store.clone(), self.printer.clone());
        saved.printed = invoices.print(&saved);
        Ok(saved)
    }
}

fn require_open(order: &SalesOrder) -> DbResult<()> {
    if order.status != OrderStatus::Open {
        return Err(CoreError::InvalidStatus {
            document: "sales order".to_string(),
            id: order.order_number.clone(),
            status: order.status.as_str().to_string(),
        }
        .into());
    }
    Ok(())
}

async fn fetch_order(conn: &mut SqliteConnection, id: &str) -> DbResult<SalesOrder> {
    sqlx::query_as::<_, SalesOrder>("SELECT * FROM sales_orders WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Sales order", id))
}

async fn fetch_lines(conn: &mut SqliteConnection, order_id: &str) -> DbResult<Vec<SalesOrderLine>> {
    let lines = sqlx::query_as::<_, SalesOrderLine>(
        "SELECT * FROM sales_order_lines WHERE order_id = ?1 ORDER BY position",
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(lines)
}

/// Prices order lines the way the invoice will.
pub fn order_line_items(lines: &[SalesOrderLine]) -> Vec<LineItem> {
    lines.iter().map(SalesOrderLine::as_line_item).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::item::NewItem;
    use kirana_core::{compute_totals, Percent};

    async fn setup() -> (Database, String) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let tea = db
            .items()
            .create(NewItem::new("TEA-250", "Tea 250g", Money::from_rupees(120), Percent::from_bps(500)))
            .await
            .unwrap();
        (db, tea.id)
    }

    fn order(item: &str, quantity: i64) -> OrderDraft {
        OrderDraft {
            customer_id: None,
            customer_state: None,
            lines: vec![InvoiceLineDraft::new(item, quantity)],
        }
    }

    #[tokio::test]
    async fn test_order_does_not_touch_stock_and_is_not_rounded() {
        let (db, tea) = setup().await;
        db.batches().receive(&tea, 1, Money::from_rupees(90), None, None).await.unwrap();

        let (order, lines) = db.sales_orders().create(order(&tea, 5)).await.unwrap();
        assert_eq!(order.status, OrderStatus::Open);
        assert!(order.order_number.starts_with("SO-"));
        assert_eq!(lines.len(), 1);
        assert_eq!(order.totals.round_off, Money::zero());
        assert_eq!(order.totals.total, Money::from_rupees(630));

        // Ordering more than is on hand is allowed.
        assert_eq!(db.batches().available_stock(&tea).await.unwrap(), 1);
        assert_eq!(db.sales_orders().list_open().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_fulfil_bills_at_ordered_rate() {
        let (db, tea) = setup().await;
        db.batches().receive(&tea, 10, Money::from_rupees(90), None, None).await.unwrap();
        let (order, lines) = db.sales_orders().create(order(&tea, 3)).await.unwrap();

        // Price goes up after the order was booked.
        db.items()
            .update_rates(&tea, Money::from_rupees(140), Money::from_rupees(90), Percent::from_bps(500))
            .await
            .unwrap();

        let saved = db
            .sales_orders()
            .fulfil(&order.id, Money::from_rupees(378), PaymentMode::Cash)
            .await
            .unwrap();

        let expected = compute_totals(&order_line_items(&lines), order.jurisdiction);
        assert_eq!(saved.invoice.totals, expected);
        assert_eq!(saved.lines[0].rate, Money::from_rupees(120));
        assert_eq!(saved.invoice.sales_order_id.as_deref(), Some(order.id.as_str()));
        assert_eq!(db.batches().available_stock(&tea).await.unwrap(), 7);

        let closed = db.sales_orders().get_by_id(&order.id).await.unwrap().unwrap();
        assert_eq!(closed.status, OrderStatus::Fulfilled);
        assert_eq!(closed.invoice_id, Some(saved.invoice.id.clone()));

        let again = db
            .sales_orders()
            .fulfil(&order.id, Money::from_rupees(378), PaymentMode::Cash)
            .await
            .unwrap_err();
        assert!(matches!(again, DbError::Core(CoreError::InvalidStatus { .. })));
    }

    #[tokio::test]
    async fn test_fulfil_without_stock_leaves_order_open() {
        let (db, tea) = setup().await;
        let (order, _) = db.sales_orders().create(order(&tea, 2)).await.unwrap();

        let err = db
            .sales_orders()
            .fulfil(&order.id, Money::from_rupees(252), PaymentMode::Cash)
            .await
            .unwrap_err();
        assert!(err.is_insufficient_stock());

        let still = db.sales_orders().get_by_id(&order.id).await.unwrap().unwrap();
        assert_eq!(still.status, OrderStatus::Open);
        assert!(db.sales_invoices().list_recent(5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancel() {
        let (db, tea) = setup().await;
        let (order, _) = db.sales_orders().create(order(&tea, 2)).await.unwrap();

        db.sales_orders().cancel(&order.id).await.unwrap();
        let cancelled = db.sales_orders().get_by_id(&order.id).await.unwrap().unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);

        assert!(db.sales_orders().cancel(&order.id).await.is_err());
        assert!(db.sales_orders().list_open().await.unwrap().is_empty());
    }
}
