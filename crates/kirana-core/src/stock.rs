//! # Batch Stock Allocator
//!
//! Plans how a sale consumes stock held in several batches of one item.
//! Planning is pure; `kirana-db` executes a plan inside one transaction.
//!
//! ## FEFO (First-Expiry-First-Out)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Batches for "paracetamol-500"          Request: 7                      │
//! │                                                                         │
//! │   expiry 2025-01-01  qty 5   ──► take 5 ──► 0   (Depleted)              │
//! │   expiry 2025-06-01  qty 5   ──► take 2 ──► 3                           │
//! │   no expiry          qty 5   ──► untouched                              │
//! │                                                                         │
//! │  Soonest expiry first, batches without an expiry date last.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## All-or-nothing
//! [`plan_deduction`] sums what is available before producing a single step
//! and fails with [`CoreError::InsufficientStock`] on a shortfall.
//! [`plan_best_effort`] is the separately named variant that takes whatever
//! is there and reports the shortfall.
//!
//! ## Batch lifecycle
//! `Active (quantity > 0) → Depleted (quantity == 0)`. Quantities only go
//! down; returns always create a new batch via [`RestockRequest`].

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;

// =============================================================================
// Inventory Batch
// =============================================================================

/// Where a batch came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Received from a supplier.
    Normal,
    /// Restocked from a customer return.
    Returned,
}

/// Derived lifecycle state of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum BatchState {
    Active,
    Depleted,
}

/// A discrete lot of stock for one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InventoryBatch {
    pub id: String,
    pub item_id: String,
    /// Never negative.
    pub quantity: i64,
    pub purchase_rate: Money,
    pub status: BatchStatus,
    #[ts(as = "Option<String>")]
    pub expiry_date: Option<NaiveDate>,
    /// Document that created the batch (`PUR-...`, `RET:...`).
    pub source_ref: Option<String>,
    /// Optimistic-lock version, bumped on every quantity change.
    pub version: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl InventoryBatch {
    /// A fresh batch received against a purchase.
    pub fn received(
        id: impl Into<String>,
        item_id: impl Into<String>,
        quantity: i64,
        purchase_rate: Money,
        expiry_date: Option<NaiveDate>,
        source_ref: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        InventoryBatch {
            id: id.into(),
            item_id: item_id.into(),
            quantity,
            purchase_rate,
            status: BatchStatus::Normal,
            expiry_date,
            source_ref,
            version: 0,
            created_at,
        }
    }

    pub fn state(&self) -> BatchState {
        if self.quantity > 0 {
            BatchState::Active
        } else {
            BatchState::Depleted
        }
    }
}

/// Orders two batches for consumption: soonest expiry first, no expiry last,
/// then oldest first, then by id so the order is total.
pub fn fefo_cmp(a: &InventoryBatch, b: &InventoryBatch) -> Ordering {
    let by_expiry = match (a.expiry_date, b.expiry_date) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    by_expiry
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// Sorts batches into consumption order in place.
pub fn fefo_order(batches: &mut [InventoryBatch]) {
    batches.sort_by(fefo_cmp);
}

/// Total quantity across all batches of `item_id`.
pub fn total_available(item_id: &str, batches: &[InventoryBatch]) -> i64 {
    batches
        .iter()
        .filter(|b| b.item_id == item_id && b.quantity > 0)
        .map(|b| b.quantity)
        .sum()
}

// =============================================================================
// Deduction Plan
// =============================================================================

/// One batch touched by a deduction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DeductionStep {
    pub batch_id: String,
    /// Version observed when planning; the write must still see it.
    pub expected_version: i64,
    pub before: i64,
    pub take: i64,
    pub after: i64,
}

/// The outcome of planning a deduction for one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DeductionPlan {
    pub item_id: String,
    pub requested: i64,
    pub steps: Vec<DeductionStep>,
    pub deducted: i64,
    /// Zero for an all-or-nothing plan.
    pub shortfall: i64,
}

impl DeductionPlan {
    pub fn is_complete(&self) -> bool {
        self.shortfall == 0
    }

    /// Applies the plan to in-memory batches.
    ///
    /// Every step is checked before anything is written, so a stale snapshot
    /// leaves `batches` untouched.
    pub fn apply_to(&self, batches: &mut [InventoryBatch]) -> CoreResult<()> {
        let mut targets = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            let index = batches
                .iter()
                .position(|b| b.id == step.batch_id)
                .ok_or_else(|| CoreError::StaleBatch {
                    batch_id: step.batch_id.clone(),
                })?;
            let batch = &batches[index];
            if batch.version != step.expected_version || batch.quantity != step.before {
                return Err(CoreError::StaleBatch {
                    batch_id: step.batch_id.clone(),
                });
            }
            targets.push(index);
        }

        for (step, index) in self.steps.iter().zip(targets) {
            let batch = &mut batches[index];
            batch.quantity = step.after;
            batch.version += 1;
        }
        Ok(())
    }
}

fn require_positive(requested: i64) -> CoreResult<()> {
    if requested <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        }
        .into());
    }
    Ok(())
}

fn walk(item_id: &str, batches: &[InventoryBatch], requested: i64) -> DeductionPlan {
    let mut candidates: Vec<&InventoryBatch> = batches
        .iter()
        .filter(|b| b.item_id == item_id && b.quantity > 0)
        .collect();
    candidates.sort_by(|a, b| fefo_cmp(a, b));

    let mut remaining = requested;
    let mut steps = Vec::new();
    for batch in candidates {
        if remaining == 0 {
            break;
        }
        let take = batch.quantity.min(remaining);
        steps.push(DeductionStep {
            batch_id: batch.id.clone(),
            expected_version: batch.version,
            before: batch.quantity,
            take,
            after: batch.quantity - take,
        });
        remaining -= take;
    }

    DeductionPlan {
        item_id: item_id.to_string(),
        requested,
        steps,
        deducted: requested - remaining,
        shortfall: remaining,
    }
}

/// Plans an all-or-nothing FEFO deduction of `requested` units.
///
/// ```rust
/// use chrono::Utc;
/// use kirana_core::money::Money;
/// use kirana_core::stock::{plan_deduction, InventoryBatch};
///
/// let batch = InventoryBatch::received("b1", "soap", 4, Money::from_rupees(20), None, None, Utc::now());
/// assert!(plan_deduction("soap", &[batch.clone()], 3).is_ok());
/// assert!(plan_deduction("soap", &[batch], 5).is_err());
/// ```
pub fn plan_deduction(
    item_id: &str,
    batches: &[InventoryBatch],
    requested: i64,
) -> CoreResult<DeductionPlan> {
    require_positive(requested)?;

    let available = total_available(item_id, batches);
    if available < requested {
        return Err(CoreError::InsufficientStock {
            item_id: item_id.to_string(),
            available,
            requested,
        });
    }

    Ok(walk(item_id, batches, requested))
}

/// Plans a best-effort FEFO deduction: takes what is available and reports
/// the remainder in `shortfall`.
pub fn plan_best_effort(
    item_id: &str,
    batches: &[InventoryBatch],
    requested: i64,
) -> CoreResult<DeductionPlan> {
    require_positive(requested)?;
    Ok(walk(item_id, batches, requested))
}

// =============================================================================
// Restock
// =============================================================================

/// Puts returned goods back on the shelf as a brand-new `Returned` batch.
///
/// The allocator has no notion of how much was originally sold; callers cap
/// `quantity` with [`crate::returns`] first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RestockRequest {
    pub item_id: String,
    pub quantity: i64,
    pub purchase_rate: Money,
    pub source_ref: String,
    #[ts(as = "Option<String>")]
    pub expiry_date: Option<NaiveDate>,
}

impl RestockRequest {
    pub fn into_batch(self, id: impl Into<String>, created_at: DateTime<Utc>) -> CoreResult<InventoryBatch> {
        require_positive(self.quantity)?;
        Ok(InventoryBatch {
            id: id.into(),
            item_id: self.item_id,
            quantity: self.quantity,
            purchase_rate: self.purchase_rate,
            status: BatchStatus::Returned,
            expiry_date: self.expiry_date,
            source_ref: Some(self.source_ref),
            version: 0,
            created_at,
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn batch(id: &str, qty: i64, expiry: Option<(i32, u32, u32)>) -> InventoryBatch {
        InventoryBatch::received(
            id,
            "item-1",
            qty,
            Money::from_rupees(10),
            expiry.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
            None,
            Utc.with_ymd_and_hms(2024, 12, 1, 9, 0, 0).unwrap(),
        )
    }

    fn fefo_fixture() -> Vec<InventoryBatch> {
        vec![
            batch("no-expiry", 5, None),
            batch("june", 5, Some((2025, 6, 1))),
            batch("january", 5, Some((2025, 1, 1))),
        ]
    }

    fn quantity_of(batches: &[InventoryBatch], id: &str) -> i64 {
        batches.iter().find(|b| b.id == id).unwrap().quantity
    }

    #[test]
    fn test_fefo_scenario() {
        let mut batches = fefo_fixture();
        let plan = plan_deduction("item-1", &batches, 7).unwrap();

        assert_eq!(plan.deducted, 7);
        assert_eq!(plan.shortfall, 0);
        assert_eq!(plan.steps.len(), 2);
        assert_eq!(plan.steps[0].batch_id, "january");
        assert_eq!(plan.steps[1].batch_id, "june");

        plan.apply_to(&mut batches).unwrap();
        assert_eq!(quantity_of(&batches, "january"), 0);
        assert_eq!(quantity_of(&batches, "june"), 3);
        assert_eq!(quantity_of(&batches, "no-expiry"), 5);
        assert_eq!(batches.iter().find(|b| b.id == "january").unwrap().state(), BatchState::Depleted);
    }

    #[test]
    fn test_fefo_order_puts_no_expiry_last() {
        let mut batches = fefo_fixture();
        fefo_order(&mut batches);
        let ids: Vec<&str> = batches.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["january", "june", "no-expiry"]);
    }

    #[test]
    fn test_insufficient_stock_plans_nothing() {
        let batches = fefo_fixture();
        let err = plan_deduction("item-1", &batches, 16).unwrap_err();
        match err {
            CoreError::InsufficientStock { available, requested, .. } => {
                assert_eq!(available, 15);
                assert_eq!(requested, 16);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(batches, fefo_fixture());
    }

    #[test]
    fn test_exact_stock_depletes_everything() {
        let mut batches = fefo_fixture();
        let plan = plan_deduction("item-1", &batches, 15).unwrap();
        plan.apply_to(&mut batches).unwrap();
        assert!(batches.iter().all(|b| b.quantity == 0));
    }

    #[test]
    fn test_deducted_sums_to_request_for_every_size() {
        for requested in 1..=15 {
            let mut batches = fefo_fixture();
            let plan = plan_deduction("item-1", &batches, requested).unwrap();
            let taken: i64 = plan.steps.iter().map(|s| s.take).sum();
            assert_eq!(taken, requested);

            plan.apply_to(&mut batches).unwrap();
            assert!(batches.iter().all(|b| b.quantity >= 0));
            assert_eq!(total_available("item-1", &batches), 15 - requested);
        }
    }

    #[test]
    fn test_best_effort_reports_shortfall() {
        let batches = fefo_fixture();
        let plan = plan_best_effort("item-1", &batches, 20).unwrap();
        assert_eq!(plan.deducted, 15);
        assert_eq!(plan.shortfall, 5);
        assert!(!plan.is_complete());
    }

    #[test]
    fn test_other_items_and_empty_batches_ignored() {
        let mut other = batch("other", 50, Some((2024, 1, 1)));
        other.item_id = "item-2".to_string();
        let empty = batch("empty", 0, Some((2024, 1, 1)));
        let batches = vec![other, empty, batch("mine", 3, None)];

        let plan = plan_deduction("item-1", &batches, 3).unwrap();
        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].batch_id, "mine");
    }

    #[test]
    fn test_non_positive_request_rejected() {
        let batches = fefo_fixture();
        assert!(matches!(
            plan_deduction("item-1", &batches, 0),
            Err(CoreError::Validation(_))
        ));
        assert!(matches!(
            plan_best_effort("item-1", &batches, -2),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn test_stale_plan_leaves_batches_untouched() {
        let mut batches = fefo_fixture();
        let plan = plan_deduction("item-1", &batches, 7).unwrap();

        // Someone else sells 1 from the June batch first.
        batches.iter_mut().find(|b| b.id == "june").unwrap().quantity = 4;
        let snapshot = batches.clone();

        assert!(matches!(plan.apply_to(&mut batches), Err(CoreError::StaleBatch { .. })));
        assert_eq!(batches, snapshot);
    }

    #[test]
    fn test_restock_creates_returned_batch() {
        let request = RestockRequest {
            item_id: "item-1".to_string(),
            quantity: 2,
            purchase_rate: Money::from_rupees(8),
            source_ref: "RET:RET-20260301-0001".to_string(),
            expiry_date: None,
        };
        let restocked = request.into_batch("new-batch", Utc::now()).unwrap();

        assert_eq!(restocked.status, BatchStatus::Returned);
        assert_eq!(restocked.quantity, 2);
        assert_eq!(restocked.version, 0);
        assert_eq!(restocked.source_ref.as_deref(), Some("RET:RET-20260301-0001"));
    }
}
