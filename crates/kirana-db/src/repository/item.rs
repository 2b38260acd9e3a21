//! # Item Repository
//!
//! Database operations for the item catalog.
//!
//! Rates on an item are the defaults for new documents. Documents snapshot
//! the rate, discount and GST rate per line, so editing an item never changes
//! a saved invoice.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use kirana_core::validation::{validate_item_name, validate_percent, validate_rate, validate_sku};
use kirana_core::{Item, Money, Percent};

use super::new_id;
use crate::error::{DbError, DbResult};

/// Fields needed to add an item to the catalog.
#[derive(Debug, Clone)]
pub struct NewItem {
    pub sku: String,
    pub name: String,
    pub unit: String,
    pub sale_rate: Money,
    pub purchase_rate: Money,
    pub gst_rate: Percent,
    pub barcode: Option<String>,
    pub hsn_code: Option<String>,
}

impl NewItem {
    pub fn new(sku: impl Into<String>, name: impl Into<String>, sale_rate: Money, gst_rate: Percent) -> Self {
        NewItem {
            sku: sku.into(),
            name: name.into(),
            unit: "pcs".to_string(),
            sale_rate,
            purchase_rate: Money::zero(),
            gst_rate,
            barcode: None,
            hsn_code: None,
        }
    }

    pub fn purchase_rate(mut self, rate: Money) -> Self {
        self.purchase_rate = rate;
        self
    }

    pub fn unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }
}

/// Repository for item database operations.
///
/// ## Usage
/// ```rust,ignore
/// let atta = db.items().create(NewItem::new("ATTA-10", "Atta 10kg", Money::from_rupees(420), Percent::zero())).await?;
/// let same = db.items().get_by_sku("ATTA-10").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ItemRepository {
    pool: SqlitePool,
}

impl ItemRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ItemRepository { pool }
    }

    /// Validates and inserts a new catalog item.
    pub async fn create(&self, new: NewItem) -> DbResult<Item> {
        let now = Utc::now();
        let item = Item {
            id: new_id(),
            sku: new.sku.trim().to_string(),
            barcode: new.barcode,
            name: new.name.trim().to_string(),
            hsn_code: new.hsn_code,
            unit: new.unit,
            sale_rate: new.sale_rate,
            purchase_rate: new.purchase_rate,
            gst_rate: new.gst_rate,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.insert(&item).await?;
        Ok(item)
    }

    /// Inserts an item as given.
    pub async fn insert(&self, item: &Item) -> DbResult<()> {
        validate_sku(&item.sku)?;
        validate_item_name(&item.name)?;
        validate_rate(item.sale_rate)?;
        validate_rate(item.purchase_rate)?;
        validate_percent("gst_rate", item.gst_rate)?;

        debug!(id = %item.id, sku = %item.sku, "Inserting item");

        sqlx::query(
            r#"
            INSERT INTO items (
                id, sku, barcode, name, hsn_code, unit,
                sale_rate, purchase_rate, gst_rate, is_active,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&item.id)
        .bind(&item.sku)
        .bind(&item.barcode)
        .bind(&item.name)
        .bind(&item.hsn_code)
        .bind(&item.unit)
        .bind(item.sale_rate)
        .bind(item.purchase_rate)
        .bind(item.gst_rate)
        .bind(item.is_active)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } if field.ends_with(".sku") => {
                DbError::duplicate("sku", &item.sku)
            }
            other => other,
        })?;

        Ok(())
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Item>> {
        let item = sqlx::query_as::<_, Item>("SELECT * FROM items WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(item)
    }

    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Item>> {
        let item = sqlx::query_as::<_, Item>("SELECT * FROM items WHERE sku = ?1")
            .bind(sku.trim())
            .fetch_optional(&self.pool)
            .await?;
        Ok(item)
    }

    /// Barcode scan lookup; inactive items are not sellable.
    pub async fn get_by_barcode(&self, barcode: &str) -> DbResult<Option<Item>> {
        let item = sqlx::query_as::<_, Item>(
            "SELECT * FROM items WHERE barcode = ?1 AND is_active = 1",
        )
        .bind(barcode)
        .fetch_optional(&self.pool)
        .await?;
        Ok(item)
    }

    /// Case-insensitive search on SKU and name.
    pub async fn search(&self, query: &str, limit: u32) -> DbResult<Vec<Item>> {
        let query = query.trim();
        debug!(query = %query, limit = %limit, "Searching items");

        if query.is_empty() {
            return self.list_active(limit).await;
        }

        let pattern = format!("%{}%", query);
        let items = sqlx::query_as::<_, Item>(
            r#"
            SELECT * FROM items
            WHERE is_active = 1 AND (sku LIKE ?1 OR name LIKE ?1)
            ORDER BY name
            LIMIT ?2
            "#,
        )
        .bind(&pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    pub async fn list_active(&self, limit: u32) -> DbResult<Vec<Item>> {
        let items = sqlx::query_as::<_, Item>(
            "SELECT * FROM items WHERE is_active = 1 ORDER BY name LIMIT ?1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }

    /// Changes the default rates used for new documents.
    pub async fn update_rates(
        &self,
        id: &str,
        sale_rate: Money,
        purchase_rate: Money,
        gst_rate: Percent,
    ) -> DbResult<()> {
        validate_rate(sale_rate)?;
        validate_rate(purchase_rate)?;
        validate_percent("gst_rate", gst_rate)?;

        let result = sqlx::query(
            r#"
            UPDATE items SET sale_rate = ?2, purchase_rate = ?3, gst_rate = ?4, updated_at = ?5
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(sale_rate)
        .bind(purchase_rate)
        .bind(gst_rate)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Item", id));
        }
        Ok(())
    }

    /// Soft delete: the item stays referenced by past documents.
    pub async fn deactivate(&self, id: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE items SET is_active = 0, updated_at = ?2 WHERE id = ?1")
            .bind(id)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Item", id));
        }
        Ok(())
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM items")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

/// Loads an item inside a transaction.
pub async fn fetch_item(conn: &mut SqliteConnection, id: &str) -> DbResult<Item> {
    sqlx::query_as::<_, Item>("SELECT * FROM items WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| DbError::not_found("Item", id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    fn toor_dal() -> NewItem {
        NewItem::new("DAL-TOOR-1", "Toor Dal 1kg", Money::from_rupees(160), Percent::from_bps(500))
            .purchase_rate(Money::from_rupees(140))
            .unit("kg")
    }

    #[tokio::test]
    async fn test_create_and_lookup() {
        let db = db().await;
        let item = db.items().create(toor_dal()).await.unwrap();

        let by_id = db.items().get_by_id(&item.id).await.unwrap().unwrap();
        assert_eq!(by_id.sku, "DAL-TOOR-1");
        assert_eq!(by_id.sale_rate, Money::from_rupees(160));
        assert_eq!(by_id.gst_rate, Percent::from_bps(500));
        assert!(by_id.is_active);

        let by_sku = db.items().get_by_sku("DAL-TOOR-1").await.unwrap();
        assert_eq!(by_sku.map(|i| i.id), Some(item.id));
        assert_eq!(db.items().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_sku_rejected() {
        let db = db().await;
        db.items().create(toor_dal()).await.unwrap();

        let err = db.items().create(toor_dal()).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { ref field, .. } if field == "sku"));
    }

    #[tokio::test]
    async fn test_invalid_item_rejected() {
        let db = db().await;
        let bad = NewItem::new("has space", "Thing", Money::from_rupees(1), Percent::zero());
        assert!(db.items().create(bad).await.unwrap_err().is_validation());

        let negative = NewItem::new("NEG", "Thing", Money::from_paise(-1), Percent::zero());
        assert!(db.items().create(negative).await.unwrap_err().is_validation());
    }

    #[tokio::test]
    async fn test_gst_above_one_hundred_percent_rejected() {
        let db = db().await;
        let bad = NewItem::new("GST-150", "Thing", Money::from_rupees(10), Percent::from_bps(15_000));
        assert!(db.items().create(bad).await.unwrap_err().is_validation());
        assert_eq!(db.items().count().await.unwrap(), 0);

        let item = db.items().create(toor_dal()).await.unwrap();
        let err = db
            .items()
            .update_rates(&item.id, Money::from_rupees(160), Money::from_rupees(140), Percent::from_bps(10_001))
            .await
            .unwrap_err();
        assert!(err.is_validation());
        let unchanged = db.items().get_by_id(&item.id).await.unwrap().unwrap();
        assert_eq!(unchanged.gst_rate, Percent::from_bps(500));
    }

    #[tokio::test]
    async fn test_search_update_and_deactivate() {
        let db = db().await;
        let item = db.items().create(toor_dal()).await.unwrap();

        assert_eq!(db.items().search("toor", 10).await.unwrap().len(), 1);
        assert_eq!(db.items().search("", 10).await.unwrap().len(), 1);

        db.items()
            .update_rates(&item.id, Money::from_rupees(170), Money::from_rupees(150), Percent::from_bps(500))
            .await
            .unwrap();
        let updated = db.items().get_by_id(&item.id).await.unwrap().unwrap();
        assert_eq!(updated.sale_rate, Money::from_rupees(170));

        db.items().deactivate(&item.id).await.unwrap();
        assert!(db.items().search("toor", 10).await.unwrap().is_empty());
        assert!(matches!(
            db.items().deactivate("missing").await,
            Err(DbError::NotFound { .. })
        ));
    }
}
