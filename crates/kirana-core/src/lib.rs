//! # kirana-core: Pure Business Logic for Kirana POS
//!
//! Every rupee that moves through the back-office is computed here. The crate
//! has zero I/O dependencies; persistence lives in `kirana-db`.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Kirana POS Architecture                          │
//! │                                                                         │
//! │  Sales Invoice ─┐  Sales Order ─┐  Purchase Invoice ─┐  Returns ─┐     │
//! │                 ▼               ▼                    ▼           ▼     │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │               ★ kirana-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐  │   │
//! │  │   │  money  │ │   tax   │ │  stock  │ │ returns │ │ credit  │  │   │
//! │  │   │ Money   │ │ GST     │ │ FEFO    │ │ clamps  │ │ ledger  │  │   │
//! │  │   │ Percent │ │ totals  │ │ planner │ │ refunds │ │ notes   │  │   │
//! │  │   └─────────┘ └─────────┘ └─────────┘ └─────────┘ └─────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  kirana-db (Database Layer)                     │   │
//! │  │         SQLite queries, migrations, transactional workflows     │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - `Money` in integer paise and `Percent` in basis points
//! - [`tax`] - Invoice Totals Engine (discount, CGST/SGST/IGST, round-off)
//! - [`stock`] - Batch Stock Allocator planning (FEFO)
//! - [`returns`] - Return quantity rules and refund totals
//! - [`credit`] - Credit ledger and credit note rules
//! - [`receipt`] - Receipt payload and the printer collaborator trait
//! - [`types`] - Catalog and document types
//! - [`validation`] - Input validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use kirana_core::money::{Money, Percent};
//! use kirana_core::tax::{compute_totals, LineItem, TaxJurisdiction};
//!
//! let items = vec![LineItem::new(
//!     "rice-5kg",
//!     2,
//!     Money::from_rupees(100),
//!     Percent::from_bps(1000), // 10% discount
//!     Percent::from_bps(1800), // 18% GST
//! )];
//!
//! let totals = compute_totals(&items, TaxJurisdiction::Intrastate);
//! assert_eq!(totals.taxable_amount, Money::from_rupees(180));
//! assert_eq!(totals.cgst, Money::from_paise(1620));
//! assert_eq!(totals.cgst, totals.sgst);
//! assert_eq!(totals.total, Money::from_rupees(212));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod credit;
pub mod error;
pub mod money;
pub mod receipt;
pub mod returns;
pub mod stock;
pub mod tax;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{Money, Percent};
pub use tax::{compute_totals, compute_totals_for, DocumentKind, InvoiceTotals, LineItem, TaxJurisdiction};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum quantity of a single line on any document.
///
/// Catches typing slips (10000 instead of 10) before they reach stock.
pub const MAX_ITEM_QUANTITY: i64 = 99_999;

/// Highest unit rate accepted on a document line (₹1 crore).
pub const MAX_ITEM_RATE: Money = Money::from_rupees(10_000_000);

/// Highest discount or GST rate accepted on a document line: 100%.
pub const MAX_LINE_PERCENT: Percent = Percent::from_bps(10_000);

/// Maximum number of lines on a single invoice, order or return.
pub const MAX_DOCUMENT_LINES: usize = 200;

/// Home state used when the store profile does not override it.
pub const DEFAULT_HOME_STATE: &str = "Maharashtra";
