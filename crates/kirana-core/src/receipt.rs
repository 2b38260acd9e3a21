//! # Receipt
//!
//! The payload handed to the receipt printer after a sales invoice is saved,
//! and the collaborator trait the printer implements. Formatting for paper
//! belongs to the printer, not here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;

use crate::money::{Money, Percent};
use crate::tax::InvoiceTotals;
use crate::types::{SalesInvoice, SalesInvoiceLine, StoreProfile};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReceiptLine {
    pub name: String,
    pub quantity: i64,
    pub rate: Money,
    pub discount: Percent,
    pub gst_rate: Percent,
    /// Taxable amount of the line.
    pub amount: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Receipt {
    pub store_name: String,
    pub store_gstin: Option<String>,
    pub invoice_number: String,
    pub customer_name: String,
    pub lines: Vec<ReceiptLine>,
    pub totals: InvoiceTotals,
    pub amount_paid: Money,
    pub credit_note_redeemed: Money,
    pub change_due: Money,
    pub amount_due: Money,
    #[ts(as = "String")]
    pub issued_at: DateTime<Utc>,
}

impl Receipt {
    pub fn from_invoice(store: &StoreProfile, invoice: &SalesInvoice, lines: &[SalesInvoiceLine]) -> Self {
        Receipt {
            store_name: store.name.clone(),
            store_gstin: store.gstin.clone(),
            invoice_number: invoice.invoice_number.clone(),
            customer_name: invoice.customer_name.clone(),
            lines: lines
                .iter()
                .map(|l| ReceiptLine {
                    name: l.name_snapshot.clone(),
                    quantity: l.quantity,
                    rate: l.rate,
                    discount: l.discount,
                    gst_rate: l.gst_rate,
                    amount: l.taxable,
                })
                .collect(),
            totals: invoice.totals,
            amount_paid: invoice.amount_paid,
            credit_note_redeemed: invoice.credit_note_redeemed,
            change_due: invoice.change_due(),
            amount_due: invoice.amount_due(),
            issued_at: invoice.created_at,
        }
    }

    pub fn to_json(&self) -> Result<String, PrintError> {
        serde_json::to_string(self).map_err(|e| PrintError::Encoding(e.to_string()))
    }
}

#[derive(Debug, Error)]
pub enum PrintError {
    #[error("Printer unavailable: {0}")]
    Unavailable(String),

    #[error("Receipt encoding failed: {0}")]
    Encoding(String),
}

/// The receipt-printing service.
///
/// Called after the invoice is committed; a failure here never undoes the
/// sale.
pub trait ReceiptPrinter: Send + Sync {
    fn print(&self, receipt: &Receipt) -> Result<(), PrintError>;
}

/// Printer that discards receipts (headless setups, tests).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPrinter;

impl ReceiptPrinter for NoopPrinter {
    fn print(&self, _receipt: &Receipt) -> Result<(), PrintError> {
        Ok(())
    }
}
