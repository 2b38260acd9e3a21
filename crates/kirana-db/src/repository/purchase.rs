//! # Purchase Invoice Repository
//!
//! Goods receipt. Each purchase line becomes one `Normal` inventory batch
//! carrying the line's purchase rate and expiry date; batches are never
//! merged with existing stock.
//!
//! Purchase totals are not rounded to the rupee; they mirror the supplier's
//! bill to the paisa.

use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};

use kirana_core::stock::InventoryBatch;
use kirana_core::validation::{validate_document_lines, validate_line_item};
use kirana_core::{
    compute_totals_for, DocumentKind, LineItem, Money, PartyKind, Percent, PurchaseInvoice,
    PurchaseInvoiceLine, StoreProfile, ValidationError,
};

use super::batch::insert_batch;
use super::item::fetch_item;
use super::new_id;
use super::numbering::{next_number, DocumentSeries};
use super::party::fetch_party;
use crate::error::{DbError, DbResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseLineDraft {
    pub item_id: String,
    pub quantity: i64,
    pub rate: Money,
    pub discount: Percent,
    /// Defaults to the item's GST rate.
    pub gst_rate: Option<Percent>,
    pub expiry_date: Option<NaiveDate>,
}

impl PurchaseLineDraft {
    pub fn new(item_id: impl Into<String>, quantity: i64, rate: Money) -> Self {
        PurchaseLineDraft {
            item_id: item_id.into(),
            quantity,
            rate,
            discount: Percent::zero(),
            gst_rate: None,
            expiry_date: None,
        }
    }

    pub fn expiring(mut self, date: NaiveDate) -> Self {
        self.expiry_date = Some(date);
        self
    }
}

#[derive(Debug, Clone)]
pub struct PurchaseDraft {
    pub supplier_id: String,
    /// The supplier's own bill number.
    pub supplier_invoice_ref: Option<String>,
    pub lines: Vec<PurchaseLineDraft>,
}

#[derive(Debug, Clone)]
pub struct SavedPurchase {
    pub purchase: PurchaseInvoice,
    pub lines: Vec<PurchaseInvoiceLine>,
    pub batches: Vec<InventoryBatch>,
}

#[derive(Debug, Clone)]
pub struct PurchaseInvoiceRepository {
    pool: SqlitePool,
    store: StoreProfile,
}

impl PurchaseInvoiceRepository {
    pub fn new(pool: SqlitePool, store: StoreProfile) -> Self {
        PurchaseInvoiceRepository { pool, store }
    }

    /// Records a supplier bill and receives its goods, atomically.
    ///
    /// Also refreshes each item's default purchase rate.
    pub async fn receive(&self, draft: PurchaseDraft) -> DbResult<SavedPurchase> {
        validate_document_lines(draft.lines.len())?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let supplier = fetch_party(&mut tx, &draft.supplier_id).await?;
        if supplier.kind != PartyKind::Supplier {
            return Err(ValidationError::InvalidFormat {
                field: "supplier_id".to_string(),
                reason: "party is not a supplier".to_string(),
            }
            .into());
        }
        let jurisdiction = self.store.jurisdiction_for(&supplier.state);

        let mut items = Vec::with_capacity(draft.lines.len());
        for line in &draft.lines {
            let item = fetch_item(&mut tx, &line.item_id).await?;
            let line_item = LineItem::new(
                item.id.clone(),
                line.quantity,
                line.rate,
                line.discount,
                line.gst_rate.unwrap_or(item.gst_rate),
            );
            validate_line_item(&line_item)?;
            items.push(line_item);
        }

        let totals = compute_totals_for(DocumentKind::PurchaseInvoice, &items, jurisdiction);
        let purchase_number = next_number(&mut tx, DocumentSeries::PurchaseInvoice, now).await?;

        let purchase = PurchaseInvoice {
            id: new_id(),
            purchase_number,
            supplier_id: supplier.id.clone(),
            supplier_invoice_ref: draft.supplier_invoice_ref.clone(),
            supplier_state: supplier.state.clone(),
            jurisdiction,
            totals,
            created_at: now,
        };

        let t = &purchase.totals;
        sqlx::query(
            r#"
            INSERT INTO purchase_invoices (
                id, purchase_number, supplier_id, supplier_invoice_ref, supplier_state, jurisdiction,
                subtotal, discount_amount, taxable_amount, cgst, sgst, igst, round_off, total,
                created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
            "#,
        )
        .bind(&purchase.id)
        .bind(&purchase.purchase_number)
        .bind(&purchase.supplier_id)
        .bind(&purchase.supplier_invoice_ref)
        .bind(&purchase.supplier_state)
        .bind(purchase.jurisdiction)
        .bind(t.subtotal)
        .bind(t.discount_amount)
        .bind(t.taxable_amount)
        .bind(t.cgst)
        .bind(t.sgst)
        .bind(t.igst)
        .bind(t.round_off)
        .bind(t.total)
        .bind(purchase.created_at)
        .execute(&mut *tx)
        .await?;

        let mut lines = Vec::with_capacity(items.len());
        let mut batches = Vec::with_capacity(items.len());
        for (position, (line_item, draft_line)) in items.iter().zip(&draft.lines).enumerate() {
            let breakdown = line_item.breakdown(jurisdiction);
            // Landed cost per unit, after the supplier's discount.
            let unit_cost = Money::from_paise(breakdown.taxable.paise() / line_item.quantity);

            let batch = InventoryBatch::received(
                new_id(),
                line_item.item_id.clone(),
                line_item.quantity,
                unit_cost,
                draft_line.expiry_date,
                Some(purchase.purchase_number.clone()),
                now,
            );
            insert_batch(&mut tx, &batch).await?;

            let line = PurchaseInvoiceLine {
                id: new_id(),
                purchase_id: purchase.id.clone(),
                item_id: line_item.item_id.clone(),
                quantity: line_item.quantity,
                rate: line_item.rate,
                discount: line_item.discount,
                gst_rate: line_item.gst_rate,
                taxable: breakdown.taxable,
                expiry_date: draft_line.expiry_date,
                batch_id: batch.id.clone(),
                position: position as i64,
            };

            sqlx::query(
                r#"
                INSERT INTO purchase_invoice_lines (
                    id, purchase_id, item_id, quantity, rate, discount, gst_rate,
                    taxable, expiry_date, batch_id, position
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                "#,
            )
            .bind(&line.id)
            .bind(&line.purchase_id)
            .bind(&line.item_id)
            .bind(line.quantity)
            .bind(line.rate)
            .bind(line.discount)
            .bind(line.gst_rate)
            .bind(line.taxable)
            .bind(line.expiry_date)
            .bind(&line.batch_id)
            .bind(line.position)
            .execute(&mut *tx)
            .await?;

            sqlx::query("UPDATE items SET purchase_rate = ?2, updated_at = ?3 WHERE id = ?1")
                .bind(&line.item_id)
                .bind(unit_cost)
                .bind(now)
                .execute(&mut *tx)
                .await?;

            debug!(item_id = %line.item_id, batch_id = %batch.id, quantity = line.quantity, "Received line");
            lines.push(line);
            batches.push(batch);
        }

        tx.commit().await?;

        info!(
            purchase_number = %purchase.purchase_number,
            supplier = %supplier.name,
            total = %purchase.totals.total,
            batches = batches.len(),
            "Purchase invoice received"
        );

        Ok(SavedPurchase {
            purchase,
            lines,
            batches,
        })
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<PurchaseInvoice>> {
        let purchase = sqlx::query_as::<_, PurchaseInvoice>("SELECT * FROM purchase_invoices WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(purchase)
    }

    pub async fn get_lines(&self, purchase_id: &str) -> DbResult<Vec<PurchaseInvoiceLine>> {
        let lines = sqlx::query_as::<_, PurchaseInvoiceLine>(
            "SELECT * FROM purchase_invoice_lines WHERE purchase_id = ?1 ORDER BY position",
        )
        .bind(purchase_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(lines)
    }

    pub async fn list_for_supplier(&self, supplier_id: &str) -> DbResult<Vec<PurchaseInvoice>> {
        let purchases = sqlx::query_as::<_, PurchaseInvoice>(
            "SELECT * FROM purchase_invoices WHERE supplier_id = ?1 ORDER BY created_at DESC",
        )
        .bind(supplier_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(purchases)
    }

    /// Loads a purchase with its lines, failing if it does not exist.
    pub async fn load(&self, id: &str) -> DbResult<(PurchaseInvoice, Vec<PurchaseInvoiceLine>)> {
        let purchase = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Purchase invoice", id))?;
        let lines = self.get_lines(id).await?;
        Ok((purchase, lines))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::item::NewItem;
    use kirana_core::stock::BatchStatus;
    use kirana_core::TaxJurisdiction;

    async fn setup() -> (Database, String, String) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let supplier = db
            .parties()
            .create("Pune Wholesale", PartyKind::Supplier, "Maharashtra", None, None)
            .await
            .unwrap();
        let oil = db
            .items()
            .create(NewItem::new("OIL-1L", "Sunflower Oil 1L", Money::from_rupees(180), Percent::from_bps(500)))
            .await
            .unwrap();
        (db, supplier.id, oil.id)
    }

    #[tokio::test]
    async fn test_receive_creates_one_batch_per_line() {
        let (db, supplier, oil) = setup().await;
        let june = NaiveDate::from_ymd_opt(2026, 6, 30).unwrap();
        let dec = NaiveDate::from_ymd_opt(2026, 12, 31).unwrap();

        let saved = db
            .purchases()
            .receive(PurchaseDraft {
                supplier_id: supplier,
                supplier_invoice_ref: Some("PW/8812".to_string()),
                lines: vec![
                    PurchaseLineDraft::new(&oil, 12, Money::from_rupees(150)).expiring(june),
                    PurchaseLineDraft::new(&oil, 6, Money::from_rupees(155)).expiring(dec),
                ],
            })
            .await
            .unwrap();

        assert_eq!(saved.purchase.jurisdiction, TaxJurisdiction::Intrastate);
        assert_eq!(saved.purchase.totals.taxable_amount, Money::from_rupees(12 * 150 + 6 * 155));
        assert_eq!(saved.purchase.totals.round_off, Money::zero());
        assert_eq!(saved.batches.len(), 2);
        assert!(saved.batches.iter().all(|b| b.status == BatchStatus::Normal));
        assert_eq!(saved.batches[0].source_ref.as_deref(), Some(saved.purchase.purchase_number.as_str()));

        assert_eq!(db.batches().available_stock(&oil).await.unwrap(), 18);
        let listed = db.batches().list_for_item(&oil).await.unwrap();
        assert_eq!(listed[0].expiry_date, Some(june));

        let (stored, lines) = db.purchases().load(&saved.purchase.id).await.unwrap();
        assert_eq!(stored.purchase_number, saved.purchase.purchase_number);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].batch_id, saved.batches[1].id);

        let item = db.items().get_by_id(&oil).await.unwrap().unwrap();
        assert_eq!(item.purchase_rate, Money::from_rupees(155));
    }

    #[tokio::test]
    async fn test_customer_cannot_be_supplier() {
        let (db, _, oil) = setup().await;
        let customer = db
            .parties()
            .create("Not A Supplier", PartyKind::Customer, "Goa", None, None)
            .await
            .unwrap();

        let err = db
            .purchases()
            .receive(PurchaseDraft {
                supplier_id: customer.id,
                supplier_invoice_ref: None,
                lines: vec![PurchaseLineDraft::new(&oil, 1, Money::from_rupees(150))],
            })
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(db.batches().available_stock(&oil).await.unwrap(), 0);
    }
}
