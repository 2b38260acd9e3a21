//! # Batch Repository
//!
//! Persistence for inventory batches and the atomic half of the Batch Stock
//! Allocator. Planning (FEFO order, pre-check) is pure and lives in
//! `kirana_core::stock`; this module turns a plan into guarded writes.
//!
//! ## Deduction Unit of Work
//! ```text
//! BEGIN
//!   SELECT batches WHERE item_id = ? AND quantity > 0
//!   plan_deduction(..)              ── short? ──► InsufficientStock, ROLLBACK
//!   for each step:
//!     UPDATE inventory_batches
//!        SET quantity = quantity - take, version = version + 1
//!      WHERE id = ? AND version = ? AND quantity >= take
//!     0 rows? ──► ConcurrentModification, ROLLBACK (earlier steps undone)
//! COMMIT
//! ```
//!
//! Concurrent checkouts of the same item serialize on the version column,
//! or earlier on SQLite itself: a transaction whose snapshot went stale is
//! refused with `SQLITE_BUSY_SNAPSHOT`, which surfaces as the same
//! `ConcurrentModification`. Either way the loser wrote nothing and can be
//! retried from scratch.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use kirana_core::stock::{
    fefo_order, plan_best_effort, plan_deduction, total_available, DeductionPlan, InventoryBatch,
    RestockRequest,
};
use kirana_core::validation::{validate_quantity, validate_rate};
use kirana_core::Money;

use super::new_id;
use crate::error::{DbError, DbResult};

#[derive(Debug, Clone)]
pub struct BatchRepository {
    pool: SqlitePool,
}

impl BatchRepository {
    pub fn new(pool: SqlitePool) -> Self {
        BatchRepository { pool }
    }

    /// Creates a `Normal` batch for goods received outside a purchase
    /// invoice (opening stock, stock adjustment).
    pub async fn receive(
        &self,
        item_id: &str,
        quantity: i64,
        purchase_rate: Money,
        expiry_date: Option<NaiveDate>,
        source_ref: Option<String>,
    ) -> DbResult<InventoryBatch> {
        validate_quantity(quantity)?;
        validate_rate(purchase_rate)?;

        let batch = InventoryBatch::received(
            new_id(),
            item_id,
            quantity,
            purchase_rate,
            expiry_date,
            source_ref,
            Utc::now(),
        );

        let mut conn = self.pool.acquire().await?;
        insert_batch(&mut conn, &batch).await?;
        Ok(batch)
    }

    /// Puts returned goods back as a brand-new `Returned` batch.
    pub async fn restock_return(&self, request: RestockRequest) -> DbResult<InventoryBatch> {
        let mut conn = self.pool.acquire().await?;
        restock_in(&mut conn, request, Utc::now()).await
    }

    /// All batches of an item, depleted ones included, in FEFO order.
    pub async fn list_for_item(&self, item_id: &str) -> DbResult<Vec<InventoryBatch>> {
        let mut batches = sqlx::query_as::<_, InventoryBatch>(
            "SELECT * FROM inventory_batches WHERE item_id = ?1",
        )
        .bind(item_id)
        .fetch_all(&self.pool)
        .await?;
        fefo_order(&mut batches);
        Ok(batches)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<InventoryBatch>> {
        let batch = sqlx::query_as::<_, InventoryBatch>("SELECT * FROM inventory_batches WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(batch)
    }

    /// Sum of quantity over the item's batches.
    pub async fn available_stock(&self, item_id: &str) -> DbResult<i64> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(quantity), 0) FROM inventory_batches WHERE item_id = ?1",
        )
        .bind(item_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }

    /// Deducts exactly `quantity` units in FEFO order, or nothing.
    ///
    /// ## Errors
    /// - `CoreError::InsufficientStock` if the item's batches hold less
    /// - `DbError::ConcurrentModification` if a batch changed after it was read
    /// - `ValidationError` if `quantity <= 0`
    pub async fn deduct(&self, item_id: &str, quantity: i64) -> DbResult<DeductionPlan> {
        let mut tx = self.pool.begin().await?;
        let plan = deduct_in(&mut tx, item_id, quantity).await?;
        tx.commit().await?;

        info!(item_id = %item_id, quantity, batches = plan.steps.len(), "Stock deducted");
        Ok(plan)
    }

    /// Deducts what is available, up to `quantity`, reporting the rest as
    /// `shortfall` on the returned plan.
    pub async fn deduct_available(&self, item_id: &str, quantity: i64) -> DbResult<DeductionPlan> {
        let mut tx = self.pool.begin().await?;
        let batches = load_active(&mut tx, item_id).await?;
        let plan = plan_best_effort(item_id, &batches, quantity)?;
        apply_plan_in(&mut tx, &plan).await?;
        tx.commit().await?;

        if !plan.is_complete() {
            warn!(
                item_id = %item_id,
                requested = quantity,
                shortfall = plan.shortfall,
                "Partial stock deduction"
            );
        }
        Ok(plan)
    }

    /// Applies a plan computed from an earlier read.
    ///
    /// Every step must still match the database (same version, enough
    /// quantity), otherwise nothing is written.
    pub async fn apply_plan(&self, plan: &DeductionPlan) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        apply_plan_in(&mut tx, plan).await?;
        tx.commit().await?;
        Ok(())
    }
}

// =============================================================================
// Transaction-scoped operations
// =============================================================================

/// Batches of `item_id` with stock left.
pub async fn load_active(conn: &mut SqliteConnection, item_id: &str) -> DbResult<Vec<InventoryBatch>> {
    let batches = sqlx::query_as::<_, InventoryBatch>(
        "SELECT * FROM inventory_batches WHERE item_id = ?1 AND quantity > 0",
    )
    .bind(item_id)
    .fetch_all(&mut *conn)
    .await?;

    debug!(
        item_id = %item_id,
        batches = batches.len(),
        available = total_available(item_id, &batches),
        "Loaded active batches"
    );
    Ok(batches)
}

pub async fn insert_batch(conn: &mut SqliteConnection, batch: &InventoryBatch) -> DbResult<()> {
    debug!(id = %batch.id, item_id = %batch.item_id, quantity = batch.quantity, status = ?batch.status, "Inserting batch");

    sqlx::query(
        r#"
        INSERT INTO inventory_batches (
            id, item_id, quantity, purchase_rate, status,
            expiry_date, source_ref, version, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(&batch.id)
    .bind(&batch.item_id)
    .bind(batch.quantity)
    .bind(batch.purchase_rate)
    .bind(batch.status)
    .bind(batch.expiry_date)
    .bind(&batch.source_ref)
    .bind(batch.version)
    .bind(batch.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// All-or-nothing FEFO deduction inside the caller's transaction.
pub async fn deduct_in(conn: &mut SqliteConnection, item_id: &str, quantity: i64) -> DbResult<DeductionPlan> {
    let batches = load_active(conn, item_id).await?;
    let plan = plan_deduction(item_id, &batches, quantity)?;
    apply_plan_in(conn, &plan).await?;
    Ok(plan)
}

/// Writes every step of `plan` with a version guard.
///
/// Stops at the first step whose row moved; the caller's transaction must
/// then be dropped so the earlier steps roll back.
pub async fn apply_plan_in(conn: &mut SqliteConnection, plan: &DeductionPlan) -> DbResult<()> {
    for step in &plan.steps {
        let result = sqlx::query(
            r#"
            UPDATE inventory_batches
            SET quantity = quantity - ?1, version = version + 1
            WHERE id = ?2 AND version = ?3 AND quantity >= ?1
            "#,
        )
        .bind(step.take)
        .bind(&step.batch_id)
        .bind(step.expected_version)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            warn!(
                batch_id = %step.batch_id,
                expected_version = step.expected_version,
                "Batch changed since it was read"
            );
            return Err(DbError::concurrent("inventory batch", &step.batch_id));
        }
    }
    Ok(())
}

/// Inserts a `Returned` batch for `request` inside the caller's transaction.
pub async fn restock_in(
    conn: &mut SqliteConnection,
    request: RestockRequest,
    at: DateTime<Utc>,
) -> DbResult<InventoryBatch> {
    validate_quantity(request.quantity)?;
    let batch = request.into_batch(new_id(), at)?;
    insert_batch(conn, &batch).await?;
    Ok(batch)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use crate::repository::item::NewItem;
    use kirana_core::stock::BatchStatus;
    use kirana_core::{CoreError, Percent};

    async fn setup() -> (Database, String) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let item = db
            .items()
            .create(NewItem::new("MILK-500", "Milk 500ml", Money::from_rupees(30), Percent::zero()))
            .await
            .unwrap();
        (db, item.id)
    }

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    async fn quantities(db: &Database, ids: &[&str]) -> Vec<i64> {
        let mut out = Vec::new();
        for id in ids {
            out.push(db.batches().get_by_id(id).await.unwrap().unwrap().quantity);
        }
        out
    }

    #[tokio::test]
    async fn test_fefo_deduction_across_batches() {
        let (db, item) = setup().await;
        let batches = db.batches();
        let june = batches.receive(&item, 5, Money::from_rupees(25), date(2026, 6, 30), None).await.unwrap();
        let none = batches.receive(&item, 5, Money::from_rupees(25), None, None).await.unwrap();
        let jan = batches.receive(&item, 5, Money::from_rupees(25), date(2026, 1, 31), None).await.unwrap();

        let plan = batches.deduct(&item, 7).await.unwrap();
        assert_eq!(plan.deducted, 7);
        assert_eq!(plan.steps[0].batch_id, jan.id);

        assert_eq!(quantities(&db, &[&jan.id, &june.id, &none.id]).await, vec![0, 3, 5]);
        assert_eq!(batches.available_stock(&item).await.unwrap(), 8);

        let jan_after = batches.get_by_id(&jan.id).await.unwrap().unwrap();
        assert_eq!(jan_after.version, 1);
    }

    #[tokio::test]
    async fn test_insufficient_stock_changes_nothing() {
        let (db, item) = setup().await;
        let a = db.batches().receive(&item, 2, Money::from_rupees(25), date(2026, 1, 1), None).await.unwrap();
        let b = db.batches().receive(&item, 3, Money::from_rupees(25), None, None).await.unwrap();

        let err = db.batches().deduct(&item, 6).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Core(CoreError::InsufficientStock { available: 5, requested: 6, .. })
        ));
        assert_eq!(quantities(&db, &[&a.id, &b.id]).await, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_exact_stock_depletes_everything() {
        let (db, item) = setup().await;
        db.batches().receive(&item, 2, Money::from_rupees(25), None, None).await.unwrap();
        db.batches().receive(&item, 3, Money::from_rupees(25), None, None).await.unwrap();

        db.batches().deduct(&item, 5).await.unwrap();
        assert_eq!(db.batches().available_stock(&item).await.unwrap(), 0);
        assert_eq!(db.batches().list_for_item(&item).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_non_positive_request_rejected() {
        let (db, item) = setup().await;
        db.batches().receive(&item, 2, Money::from_rupees(25), None, None).await.unwrap();
        assert!(db.batches().deduct(&item, 0).await.unwrap_err().is_validation());
        assert!(db.batches().deduct(&item, -3).await.unwrap_err().is_validation());
    }

    #[tokio::test]
    async fn test_stale_plan_rolls_back_every_step() {
        let (db, item) = setup().await;
        let a = db.batches().receive(&item, 5, Money::from_rupees(25), date(2026, 1, 1), None).await.unwrap();
        let b = db.batches().receive(&item, 5, Money::from_rupees(25), date(2026, 2, 1), None).await.unwrap();

        let snapshot = db.batches().list_for_item(&item).await.unwrap();
        let plan = plan_deduction(&item, &snapshot, 7).unwrap();
        assert_eq!(plan.steps.len(), 2);

        // Another checkout takes one unit from B after our read.
        sqlx::query("UPDATE inventory_batches SET quantity = quantity - 1, version = version + 1 WHERE id = ?1")
            .bind(&b.id)
            .execute(db.pool())
            .await
            .unwrap();

        let err = db.batches().apply_plan(&plan).await.unwrap_err();
        assert!(matches!(err, DbError::ConcurrentModification { ref id, .. } if *id == b.id));
        assert!(err.is_retryable());

        // Step one (A: 5 -> 0) was undone with the transaction.
        assert_eq!(quantities(&db, &[&a.id, &b.id]).await, vec![5, 4]);
    }

    #[tokio::test]
    async fn test_best_effort_reports_shortfall() {
        let (db, item) = setup().await;
        db.batches().receive(&item, 3, Money::from_rupees(25), None, None).await.unwrap();

        let plan = db.batches().deduct_available(&item, 5).await.unwrap();
        assert_eq!(plan.deducted, 3);
        assert_eq!(plan.shortfall, 2);
        assert!(!plan.is_complete());
        assert_eq!(db.batches().available_stock(&item).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_restock_creates_new_returned_batch() {
        let (db, item) = setup().await;
        let original = db.batches().receive(&item, 4, Money::from_rupees(25), date(2026, 5, 1), None).await.unwrap();

        let restocked = db
            .batches()
            .restock_return(RestockRequest {
                item_id: item.clone(),
                quantity: 2,
                purchase_rate: Money::from_rupees(25),
                source_ref: "RET:RET-20260301-0001".to_string(),
                expiry_date: None,
            })
            .await
            .unwrap();

        assert_ne!(restocked.id, original.id);
        assert_eq!(restocked.status, BatchStatus::Returned);
        assert_eq!(db.batches().available_stock(&item).await.unwrap(), 6);

        let stored = db.batches().get_by_id(&restocked.id).await.unwrap().unwrap();
        assert_eq!(stored.source_ref.as_deref(), Some("RET:RET-20260301-0001"));
        assert_eq!(quantities(&db, &[&original.id]).await, vec![4]);
    }

    /// File-backed database; the in-memory pool has a single connection.
    async fn file_db(tag: &str) -> (Database, std::path::PathBuf, String) {
        let path = std::env::temp_dir().join(format!("kirana-{tag}-{}.db", new_id()));
        let db = Database::new(DbConfig::new(&path).max_connections(4)).await.unwrap();
        let item = db
            .items()
            .create(NewItem::new("SOAP-1", "Soap", Money::from_rupees(40), Percent::from_bps(1800)))
            .await
            .unwrap();
        db.batches().receive(&item.id, 10, Money::from_rupees(30), None, None).await.unwrap();
        (db, path, item.id)
    }

    async fn remove(db: Database, path: std::path::PathBuf) {
        db.close().await;
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
        }
    }

    #[tokio::test]
    async fn test_interleaved_deduction_loser_gets_concurrent_modification() {
        let (db, path, item) = file_db("interleave").await;

        let mut first = db.pool().begin().await.unwrap();
        let mut second = db.pool().begin().await.unwrap();

        let seen_first = load_active(&mut first, &item).await.unwrap();
        let seen_second = load_active(&mut second, &item).await.unwrap();
        let plan_first = plan_deduction(&item, &seen_first, 3).unwrap();
        let plan_second = plan_deduction(&item, &seen_second, 3).unwrap();

        apply_plan_in(&mut first, &plan_first).await.unwrap();
        first.commit().await.unwrap();

        let err = apply_plan_in(&mut second, &plan_second).await.unwrap_err();
        assert!(matches!(err, DbError::ConcurrentModification { .. }), "got {err:?}");
        assert!(err.is_retryable());
        drop(second);

        // Only the winner's deduction landed; a fresh attempt succeeds.
        assert_eq!(db.batches().available_stock(&item).await.unwrap(), 7);
        db.batches().deduct(&item, 3).await.unwrap();
        assert_eq!(db.batches().available_stock(&item).await.unwrap(), 4);

        remove(db, path).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_deductions_never_oversell() {
        let (db, path, item) = file_db("race").await;

        // Round one: four checkouts read the same snapshot before anyone
        // writes, so exactly one may win.
        let barrier = std::sync::Arc::new(tokio::sync::Barrier::new(4));
        let mut handles = Vec::new();
        for _ in 0..4 {
            let pool = db.pool().clone();
            let item_id = item.clone();
            let barrier = barrier.clone();
            handles.push(tokio::spawn(async move {
                let mut tx = pool.begin().await?;
                let batches = load_active(&mut tx, &item_id).await?;
                let plan = plan_deduction(&item_id, &batches, 1)?;
                barrier.wait().await;
                apply_plan_in(&mut tx, &plan).await?;
                tx.commit().await?;
                Ok::<i64, DbError>(plan.deducted)
            }));
        }

        let mut sold = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(deducted) => sold += deducted,
                Err(e) => {
                    assert!(
                        matches!(e, DbError::ConcurrentModification { .. }),
                        "unexpected error: {e:?}"
                    );
                    assert!(e.is_retryable());
                    conflicts += 1;
                }
            }
        }
        assert_eq!(sold, 1);
        assert_eq!(conflicts, 3);

        // Round two: free-for-all through the repository, retrying conflicts.
        let mut handles = Vec::new();
        for _ in 0..4 {
            let repo = db.batches();
            let item_id = item.clone();
            handles.push(tokio::spawn(async move {
                let mut sold = 0;
                loop {
                    match repo.deduct(&item_id, 1).await {
                        Ok(plan) => sold += plan.deducted,
                        Err(e) if e.is_insufficient_stock() => break,
                        Err(e) => assert!(e.is_retryable(), "unexpected error: {e:?}"),
                    }
                }
                sold
            }));
        }
        for handle in handles {
            sold += handle.await.unwrap();
        }

        let left = db.batches().available_stock(&item).await.unwrap();
        assert_eq!(sold, 10);
        assert_eq!(left, 0);

        remove(db, path).await;
    }
}
