//! # kirana-db: Database Layer for Kirana POS
//!
//! Persistence and document workflows for the Kirana back-office. SQLite via
//! sqlx; every document (invoice, purchase, order, return) is written in a
//! single transaction.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Kirana POS Data Flow                             │
//! │                                                                         │
//! │  Billing screen (save invoice)                                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    kirana-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐   │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │   │   │
//! │  │   │   (pool.rs)   │    │               │    │  (embedded)  │   │   │
//! │  │   │               │    │ SalesInvoice  │    │              │   │   │
//! │  │   │ SqlitePool    │◄───│ Purchase      │    │ 001_initial  │   │   │
//! │  │   │ StoreProfile  │    │ Batch, Return │    │              │   │   │
//! │  │   │ Printer       │    │ Order, Credit │    │              │   │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘   │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (kirana.db)                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool, store profile and printer wiring
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repositories and document workflows
//! - [`config`] - Environment configuration
//! - [`logging`] - Tracing subscriber bootstrap
//! - [`printer`] - Receipt printing after commit
//!
//! ## Usage
//!
//! ```rust,ignore
//! use kirana_db::{AppConfig, Database, InvoiceDraft, InvoiceLineDraft};
//! use kirana_core::{Money, PaymentMode};
//!
//! let config = AppConfig::from_env();
//! let db = Database::new(config.db_config()).await?.with_store(config.store_profile());
//!
//! let saved = db
//!     .sales_invoices()
//!     .save(InvoiceDraft::walk_in(
//!         vec![InvoiceLineDraft::new(&rice_id, 2)],
//!         Money::from_rupees(250),
//!         PaymentMode::Cash,
//!     ))
//!     .await?;
//! println!("{} change {}", saved.invoice.invoice_number, saved.invoice.change_due());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;
pub mod logging;
pub mod migrations;
pub mod pool;
pub mod printer;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use config::AppConfig;
pub use error::{DbError, DbResult};
pub use logging::init_tracing;
pub use pool::{Database, DbConfig};
pub use printer::TracingPrinter;

// Repository re-exports for convenience
pub use repository::batch::BatchRepository;
pub use repository::credit::CreditRepository;
pub use repository::item::{ItemRepository, NewItem};
pub use repository::order::{OrderDraft, SalesOrderRepository};
pub use repository::party::PartyRepository;
pub use repository::purchase::{PurchaseDraft, PurchaseInvoiceRepository, PurchaseLineDraft, SavedPurchase};
pub use repository::returns::{ReturnRepository, SavedReturn};
pub use repository::sales_invoice::{InvoiceDraft, InvoiceLineDraft, SalesInvoiceRepository, SavedInvoice};
