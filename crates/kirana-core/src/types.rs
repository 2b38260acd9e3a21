//! # Domain Types
//!
//! Catalog, party and document types used throughout Kirana POS.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  Catalog            Documents                        Ledgers            │
//! │  ─────────          ──────────────────────────       ───────────────    │
//! │  Item               SalesInvoice + lines             InventoryBatch     │
//! │  Party              PurchaseInvoice + lines          CreditEntry        │
//! │  StoreProfile       SalesOrder + lines               CreditNote         │
//! │                     SalesReturn + lines                                 │
//! │                                                                         │
//! │  Every document header carries an InvoiceTotals computed by `tax`.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has a UUID `id` for relations and, where humans need one, a
//! business number (`INV-20260301-0001`, `sku`, ...).

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::{Money, Percent};
use crate::tax::{InvoiceTotals, LineItem, TaxJurisdiction};
use crate::DEFAULT_HOME_STATE;

// =============================================================================
// Store Profile
// =============================================================================

/// The seller's identity as printed on invoices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StoreProfile {
    pub name: String,
    /// Compared verbatim with counterparty states to pick the jurisdiction.
    pub home_state: String,
    pub gstin: Option<String>,
}

impl StoreProfile {
    pub fn new(name: impl Into<String>, home_state: impl Into<String>) -> Self {
        StoreProfile {
            name: name.into(),
            home_state: home_state.into(),
            gstin: None,
        }
    }

    /// Jurisdiction for a sale to, or purchase from, `counterparty_state`.
    pub fn jurisdiction_for(&self, counterparty_state: &str) -> TaxJurisdiction {
        TaxJurisdiction::determine(counterparty_state, &self.home_state)
    }
}

impl Default for StoreProfile {
    fn default() -> Self {
        StoreProfile::new("Kirana Store", DEFAULT_HOME_STATE)
    }
}

// =============================================================================
// Item
// =============================================================================

/// A catalog item.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Item {
    pub id: String,
    /// Stock Keeping Unit - business identifier.
    pub sku: String,
    pub barcode: Option<String>,
    pub name: String,
    /// Harmonized System of Nomenclature code printed on GST invoices.
    pub hsn_code: Option<String>,
    /// Selling unit ("pcs", "kg", "box").
    pub unit: String,
    pub sale_rate: Money,
    /// Last purchase rate; used to value restocked returns.
    pub purchase_rate: Money,
    pub gst_rate: Percent,
    /// Soft delete flag.
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// Builds a sale line at the catalog rate.
    pub fn sale_line(&self, quantity: i64, discount: Percent) -> LineItem {
        LineItem::new(self.id.clone(), quantity, self.sale_rate, discount, self.gst_rate)
    }
}

// =============================================================================
// Party
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PartyKind {
    Customer,
    Supplier,
}

/// A customer or supplier.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Party {
    pub id: String,
    pub name: String,
    pub kind: PartyKind,
    pub phone: Option<String>,
    pub state: String,
    pub gstin: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Payment / Refund Modes
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMode {
    Cash,
    Card,
    Upi,
    /// Nothing (or part) paid now; the balance goes to the credits ledger.
    Credit,
    /// Settled with a credit note issued on an earlier return.
    CreditNote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum RefundMode {
    Cash,
    CreditNote,
}

// =============================================================================
// Sales Invoice
// =============================================================================

/// A saved sales invoice header.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SalesInvoice {
    pub id: String,
    pub invoice_number: String,
    pub customer_id: Option<String>,
    pub customer_name: String,
    pub customer_state: String,
    pub jurisdiction: TaxJurisdiction,
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub totals: InvoiceTotals,
    pub amount_paid: Money,
    pub credit_note_redeemed: Money,
    pub payment_mode: PaymentMode,
    pub sales_order_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl SalesInvoice {
    /// What the customer still owes after cash and credit-note settlement.
    pub fn amount_due(&self) -> Money {
        (self.totals.total - self.amount_paid - self.credit_note_redeemed).clamp_non_negative()
    }

    /// Change handed back when the customer tendered more than the total.
    pub fn change_due(&self) -> Money {
        (self.amount_paid + self.credit_note_redeemed - self.totals.total).clamp_non_negative()
    }
}

/// A sales invoice line. Uses the snapshot pattern: sku and name are frozen.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SalesInvoiceLine {
    pub id: String,
    pub invoice_id: String,
    pub item_id: String,
    pub sku_snapshot: String,
    pub name_snapshot: String,
    pub quantity: i64,
    pub rate: Money,
    pub discount: Percent,
    pub gst_rate: Percent,
    pub taxable: Money,
    pub cgst: Money,
    pub sgst: Money,
    pub igst: Money,
    /// Units already taken back through returns.
    pub returned_quantity: i64,
    pub position: i64,
}

impl SalesInvoiceLine {
    pub fn as_line_item(&self) -> LineItem {
        LineItem::new(self.item_id.clone(), self.quantity, self.rate, self.discount, self.gst_rate)
    }

    pub fn returnable_quantity(&self) -> i64 {
        self.quantity - self.returned_quantity
    }
}

// =============================================================================
// Purchase Invoice
// =============================================================================

/// A supplier bill recorded on goods receipt.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PurchaseInvoice {
    pub id: String,
    pub purchase_number: String,
    pub supplier_id: String,
    /// The supplier's own bill number.
    pub supplier_invoice_ref: Option<String>,
    pub supplier_state: String,
    pub jurisdiction: TaxJurisdiction,
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub totals: InvoiceTotals,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PurchaseInvoiceLine {
    pub id: String,
    pub purchase_id: String,
    pub item_id: String,
    pub quantity: i64,
    pub rate: Money,
    pub discount: Percent,
    pub gst_rate: Percent,
    pub taxable: Money,
    #[ts(as = "Option<String>")]
    pub expiry_date: Option<NaiveDate>,
    /// The batch created when this line was received.
    pub batch_id: String,
    pub position: i64,
}

// =============================================================================
// Sales Order
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Booked, stock untouched.
    Open,
    /// Converted into a sales invoice.
    Fulfilled,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Open => "open",
            OrderStatus::Fulfilled => "fulfilled",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

/// A customer order booked ahead of invoicing. Orders never move stock.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SalesOrder {
    pub id: String,
    pub order_number: String,
    pub customer_id: Option<String>,
    pub customer_name: String,
    pub customer_state: String,
    pub jurisdiction: TaxJurisdiction,
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub totals: InvoiceTotals,
    pub status: OrderStatus,
    pub invoice_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SalesOrderLine {
    pub id: String,
    pub order_id: String,
    pub item_id: String,
    pub quantity: i64,
    pub rate: Money,
    pub discount: Percent,
    pub gst_rate: Percent,
    pub position: i64,
}

impl SalesOrderLine {
    pub fn as_line_item(&self) -> LineItem {
        LineItem::new(self.item_id.clone(), self.quantity, self.rate, self.discount, self.gst_rate)
    }
}

// =============================================================================
// Sales Return
// =============================================================================

/// A processed return against a sales invoice.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SalesReturn {
    pub id: String,
    pub return_number: String,
    pub invoice_id: String,
    pub refund_mode: RefundMode,
    /// Value of the goods taken back.
    #[cfg_attr(feature = "sqlx", sqlx(flatten))]
    pub totals: InvoiceTotals,
    /// Part of `totals.total` that cleared the invoice's open credit entry.
    pub credit_offset: Money,
    pub credit_note_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl SalesReturn {
    /// What goes back to the customer as cash or a credit note.
    pub fn refund_due(&self) -> Money {
        (self.totals.total - self.credit_offset).clamp_non_negative()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SalesReturnLine {
    pub id: String,
    pub return_id: String,
    pub invoice_line_id: String,
    pub item_id: String,
    pub quantity: i64,
    /// The `returned` batch the goods were restocked into.
    pub batch_id: String,
    pub position: i64,
}

// =============================================================================
// Unit Tests
// =============================================================================
