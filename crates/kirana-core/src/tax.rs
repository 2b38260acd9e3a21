//! # Invoice Totals Engine
//!
//! One shared, pure computation used by sales invoices, sales orders,
//! purchase invoices and returns.
//!
//! ## Per-Line Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  quantity × rate ──────────────────────────► line subtotal              │
//! │  line subtotal × discount% ────────────────► line discount              │
//! │  line subtotal − line discount ────────────► line taxable ("amount")    │
//! │                                                                         │
//! │  Intrastate: CGST = SGST = taxable × (gst% / 2)    IGST = 0             │
//! │  Interstate: IGST = taxable × gst%                 CGST = SGST = 0      │
//! │                                                                         │
//! │  Σ lines ──► subtotal, discount, taxable, cgst, sgst, igst              │
//! │                                                                         │
//! │  Sales invoice only:                                                    │
//! │    raw = taxable + cgst + sgst + igst                                   │
//! │    total = raw rounded to the rupee (half away from zero)               │
//! │    round_off = total − raw                     (|round_off| ≤ ₹0.50)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each tax half is rounded to the paisa on its own, so `cgst == sgst` holds
//! exactly on every line and in aggregate.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::{Money, Percent};

// =============================================================================
// Jurisdiction
// =============================================================================

/// Whether the supply stays inside the seller's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TaxJurisdiction {
    /// Same state: tax split into CGST + SGST.
    Intrastate,
    /// Different state: tax charged as IGST.
    Interstate,
}

impl TaxJurisdiction {
    /// `Intrastate` iff the two state names are byte-for-byte equal.
    ///
    /// The comparison is case- and whitespace-sensitive.
    ///
    /// ```rust
    /// use kirana_core::tax::TaxJurisdiction;
    ///
    /// assert_eq!(TaxJurisdiction::determine("Karnataka", "Karnataka"), TaxJurisdiction::Intrastate);
    /// assert_eq!(TaxJurisdiction::determine("karnataka", "Karnataka"), TaxJurisdiction::Interstate);
    /// ```
    pub fn determine(counterparty_state: &str, seller_home_state: &str) -> Self {
        if counterparty_state == seller_home_state {
            TaxJurisdiction::Intrastate
        } else {
            TaxJurisdiction::Interstate
        }
    }
}

// =============================================================================
// Document Kind
// =============================================================================

/// The document a totals computation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    SalesInvoice,
    SalesOrder,
    PurchaseInvoice,
    Return,
}

impl DocumentKind {
    /// Only sales invoices round their grand total to the rupee.
    pub const fn rounds_total(&self) -> bool {
        matches!(self, DocumentKind::SalesInvoice)
    }
}

// =============================================================================
// Line Item
// =============================================================================

/// One line of an invoice, order or return, as entered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LineItem {
    pub item_id: String,
    pub quantity: i64,
    pub rate: Money,
    pub discount: Percent,
    pub gst_rate: Percent,
}

impl LineItem {
    pub fn new(
        item_id: impl Into<String>,
        quantity: i64,
        rate: Money,
        discount: Percent,
        gst_rate: Percent,
    ) -> Self {
        LineItem {
            item_id: item_id.into(),
            quantity,
            rate,
            discount,
            gst_rate,
        }
    }

    /// Computes this line's amounts under the given jurisdiction.
    pub fn breakdown(&self, jurisdiction: TaxJurisdiction) -> LineBreakdown {
        let subtotal = self.rate.multiply_quantity(self.quantity);
        let discount = subtotal.percent_of(self.discount);
        let taxable = subtotal - discount;

        let (cgst, sgst, igst) = match jurisdiction {
            TaxJurisdiction::Intrastate => {
                let half = taxable.half_percent_of(self.gst_rate);
                (half, half, Money::zero())
            }
            TaxJurisdiction::Interstate => {
                (Money::zero(), Money::zero(), taxable.percent_of(self.gst_rate))
            }
        };

        LineBreakdown {
            subtotal,
            discount,
            taxable,
            cgst,
            sgst,
            igst,
        }
    }
}

/// Computed amounts for a single line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LineBreakdown {
    pub subtotal: Money,
    pub discount: Money,
    pub taxable: Money,
    pub cgst: Money,
    pub sgst: Money,
    pub igst: Money,
}

impl LineBreakdown {
    /// CGST + SGST + IGST for this line.
    pub fn tax(&self) -> Money {
        self.cgst + self.sgst + self.igst
    }
}

// =============================================================================
// Invoice Totals
// =============================================================================

/// Document-level totals. Always recomputed from lines, never edited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InvoiceTotals {
    pub subtotal: Money,
    pub discount_amount: Money,
    pub taxable_amount: Money,
    pub cgst: Money,
    pub sgst: Money,
    pub igst: Money,
    /// Signed adjustment added to reach `total`. Zero unless rounded.
    pub round_off: Money,
    pub total: Money,
}

impl InvoiceTotals {
    /// CGST + SGST + IGST.
    pub fn tax_total(&self) -> Money {
        self.cgst + self.sgst + self.igst
    }

    /// Taxable amount plus tax, before any round-off.
    pub fn raw_total(&self) -> Money {
        self.taxable_amount + self.tax_total()
    }
}

/// Computes sales-invoice totals (with rupee rounding).
///
/// Pure: identical input always yields identical output.
///
/// ```rust
/// use kirana_core::money::Money;
/// use kirana_core::tax::{compute_totals, TaxJurisdiction};
///
/// let totals = compute_totals(&[], TaxJurisdiction::Interstate);
/// assert_eq!(totals.total, Money::zero());
/// ```
pub fn compute_totals(items: &[LineItem], jurisdiction: TaxJurisdiction) -> InvoiceTotals {
    compute_totals_for(DocumentKind::SalesInvoice, items, jurisdiction)
}

/// Computes totals for any document kind.
///
/// Sales orders, purchase invoices and returns skip the rounding step, so
/// their `round_off` is zero and `total` is the raw total.
pub fn compute_totals_for(
    kind: DocumentKind,
    items: &[LineItem],
    jurisdiction: TaxJurisdiction,
) -> InvoiceTotals {
    let mut totals = InvoiceTotals::default();

    for line in items.iter().map(|item| item.breakdown(jurisdiction)) {
        totals.subtotal += line.subtotal;
        totals.discount_amount += line.discount;
        totals.cgst += line.cgst;
        totals.sgst += line.sgst;
        totals.igst += line.igst;
    }
    totals.taxable_amount = totals.subtotal - totals.discount_amount;

    let raw = totals.raw_total();
    if kind.rounds_total() {
        totals.total = raw.round_to_rupee();
        totals.round_off = totals.total - raw;
    } else {
        totals.total = raw;
    }

    totals
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn line(qty: i64, rate_paise: i64, discount_bps: u32, gst_bps: u32) -> LineItem {
        LineItem::new(
            "item",
            qty,
            Money::from_paise(rate_paise),
            Percent::from_bps(discount_bps),
            Percent::from_bps(gst_bps),
        )
    }

    fn assert_balanced(t: &InvoiceTotals) {
        assert_eq!(t.total, t.taxable_amount + t.cgst + t.sgst + t.igst + t.round_off);
        assert!(t.round_off.paise().abs() <= 50, "round_off {} too large", t.round_off);
    }

    #[test]
    fn test_intrastate_scenario() {
        let totals = compute_totals(&[line(2, 10_000, 1000, 1800)], TaxJurisdiction::Intrastate);

        assert_eq!(totals.subtotal, Money::from_rupees(200));
        assert_eq!(totals.discount_amount, Money::from_rupees(20));
        assert_eq!(totals.taxable_amount, Money::from_rupees(180));
        assert_eq!(totals.tax_total(), Money::from_paise(3240));
        assert_eq!(totals.cgst, Money::from_paise(1620));
        assert_eq!(totals.sgst, Money::from_paise(1620));
        assert_eq!(totals.igst, Money::zero());
        assert_eq!(totals.total, Money::from_rupees(212));
        assert_eq!(totals.round_off, Money::from_paise(-40));
        assert_balanced(&totals);
    }

    #[test]
    fn test_interstate_scenario() {
        let totals = compute_totals(&[line(2, 10_000, 1000, 1800)], TaxJurisdiction::Interstate);

        assert_eq!(totals.igst, Money::from_paise(3240));
        assert_eq!(totals.cgst, Money::zero());
        assert_eq!(totals.sgst, Money::zero());
        assert_eq!(totals.total, Money::from_rupees(212));
        assert_balanced(&totals);
    }

    #[test]
    fn test_empty_items_are_all_zero() {
        for kind in [
            DocumentKind::SalesInvoice,
            DocumentKind::SalesOrder,
            DocumentKind::PurchaseInvoice,
            DocumentKind::Return,
        ] {
            let totals = compute_totals_for(kind, &[], TaxJurisdiction::Intrastate);
            assert_eq!(totals, InvoiceTotals::default());
        }
    }

    #[test]
    fn test_only_sales_invoice_rounds() {
        let items = [line(2, 10_000, 1000, 1800)];

        let invoice = compute_totals_for(DocumentKind::SalesInvoice, &items, TaxJurisdiction::Intrastate);
        let order = compute_totals_for(DocumentKind::SalesOrder, &items, TaxJurisdiction::Intrastate);
        let purchase = compute_totals_for(DocumentKind::PurchaseInvoice, &items, TaxJurisdiction::Intrastate);

        assert_eq!(invoice.total, Money::from_rupees(212));
        for unrounded in [order, purchase] {
            assert_eq!(unrounded.round_off, Money::zero());
            assert_eq!(unrounded.total, Money::from_paise(21240));
            assert_balanced(&unrounded);
        }
    }

    #[test]
    fn test_round_up_at_half_rupee() {
        // ₹100 at 0.5% IGST = ₹100.50 → ₹101
        let totals = compute_totals(&[line(1, 10_000, 0, 50)], TaxJurisdiction::Interstate);
        assert_eq!(totals.total, Money::from_rupees(101));
        assert_eq!(totals.round_off, Money::from_paise(50));
        assert_balanced(&totals);
    }

    #[test]
    fn test_cgst_equals_sgst_on_odd_paise() {
        // taxable ₹0.37 at 5%: full tax 1.85 paise, each half 0.925 → 1 paisa
        let items = [line(1, 37, 0, 500), line(3, 1_999, 750, 1200), line(7, 4_321, 0, 2800)];
        let totals = compute_totals(&items, TaxJurisdiction::Intrastate);

        for item in &items {
            let b = item.breakdown(TaxJurisdiction::Intrastate);
            assert_eq!(b.cgst, b.sgst);
            assert_eq!(b.igst, Money::zero());
        }
        assert_eq!(totals.cgst, totals.sgst);
        assert_balanced(&totals);
    }

    #[test]
    fn test_interstate_igst_is_sum_of_line_tax() {
        let items = [line(1, 37, 0, 500), line(3, 1_999, 750, 1200), line(7, 4_321, 0, 2800)];
        let totals = compute_totals(&items, TaxJurisdiction::Interstate);

        let line_tax: Money = items
            .iter()
            .map(|i| i.breakdown(TaxJurisdiction::Interstate).tax())
            .sum();
        assert_eq!(totals.igst, line_tax);
        assert_eq!(totals.cgst, Money::zero());
        assert_eq!(totals.sgst, Money::zero());
        assert_balanced(&totals);
    }

    #[test]
    fn test_taxable_is_subtotal_minus_discount() {
        let items = [line(3, 3_333, 333, 1800), line(1, 99, 5000, 0)];
        let totals = compute_totals(&items, TaxJurisdiction::Intrastate);

        let line_taxable: Money = items
            .iter()
            .map(|i| i.breakdown(TaxJurisdiction::Intrastate).taxable)
            .sum();
        assert_eq!(totals.taxable_amount, totals.subtotal - totals.discount_amount);
        assert_eq!(totals.taxable_amount, line_taxable);
    }

    #[test]
    fn test_out_of_range_percentages_propagate() {
        // 150% discount: taxable goes negative, no panic
        let totals = compute_totals(&[line(1, 10_000, 15_000, 1800)], TaxJurisdiction::Interstate);
        assert_eq!(totals.taxable_amount, Money::from_rupees(-50));
        assert_eq!(totals.igst, Money::from_rupees(-9));
        assert_eq!(totals.total, Money::from_rupees(-59));
        assert_balanced(&totals);
    }

    #[test]
    fn test_compute_totals_is_idempotent() {
        let items = vec![line(5, 12_345, 250, 1200), line(2, 999, 0, 500)];
        let first = compute_totals(&items, TaxJurisdiction::Intrastate);
        let second = compute_totals(&items, TaxJurisdiction::Intrastate);
        assert_eq!(first, second);
    }

    #[test]
    fn test_jurisdiction_is_exact_match() {
        assert_eq!(TaxJurisdiction::determine("Goa", "Goa"), TaxJurisdiction::Intrastate);
        assert_eq!(TaxJurisdiction::determine("Goa ", "Goa"), TaxJurisdiction::Interstate);
        assert_eq!(TaxJurisdiction::determine("GOA", "Goa"), TaxJurisdiction::Interstate);
    }
}
