//! # Repository Module
//!
//! Database repository implementations for Kirana POS.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Caller                                                                 │
//! │       │  db.sales_invoices().save(draft)                                │
//! │       ▼                                                                 │
//! │  SalesInvoiceRepository ── BEGIN ─────────────────────────────┐         │
//! │       │  numbering::next_number(&mut tx, Invoice)             │         │
//! │       │  item::fetch_item(&mut tx, ..)                        │ one     │
//! │       │  batch::deduct_in(&mut tx, ..)                        │ tx      │
//! │       │  credit::insert_entry(&mut tx, ..)                    │         │
//! │       ▼                                                       │         │
//! │  COMMIT ◄─────────────────────────────────────────────────────┘         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ReceiptPrinter (outside the transaction)                               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Repositories own a `SqlitePool` for standalone calls. Work that must share
//! a transaction with other repositories is exposed as free functions taking
//! `&mut SqliteConnection`, so a workflow can compose them under one `BEGIN`.
//!
//! ## Available Repositories
//!
//! - [`item::ItemRepository`] - Catalog
//! - [`party::PartyRepository`] - Customers and suppliers
//! - [`batch::BatchRepository`] - Inventory batches and FEFO deduction
//! - [`sales_invoice::SalesInvoiceRepository`] - Billing
//! - [`purchase::PurchaseInvoiceRepository`] - Goods receipt
//! - [`order::SalesOrderRepository`] - Orders and fulfilment
//! - [`returns::ReturnRepository`] - Sales returns and credit notes
//! - [`credit::CreditRepository`] - Credits ledger

pub mod batch;
pub mod credit;
pub mod item;
pub mod numbering;
pub mod order;
pub mod party;
pub mod purchase;
pub mod returns;
pub mod sales_invoice;

/// Generates a new row ID.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
