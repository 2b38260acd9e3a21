//! # Receipt Printing
//!
//! Receipts are printed after the invoice transaction commits. A printer
//! failure is logged and the sale stands.

use kirana_core::receipt::{PrintError, Receipt, ReceiptPrinter};
use tracing::{info, warn};

/// Printer that writes the receipt to the log as JSON.
///
/// The default for a `Database` until a real printer is wired in.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingPrinter;

impl ReceiptPrinter for TracingPrinter {
    fn print(&self, receipt: &Receipt) -> Result<(), PrintError> {
        let payload = receipt.to_json()?;
        info!(
            invoice_number = %receipt.invoice_number,
            total = %receipt.totals.total,
            lines = receipt.lines.len(),
            payload = %payload,
            "Receipt printed"
        );
        Ok(())
    }
}

/// Sends `receipt` to `printer`, logging instead of failing.
///
/// Returns whether the printer accepted it.
pub fn print_after_commit(printer: &dyn ReceiptPrinter, receipt: &Receipt) -> bool {
    match printer.print(receipt) {
        Ok(()) => true,
        Err(e) => {
            warn!(
                invoice_number = %receipt.invoice_number,
                error = %e,
                "Receipt printing failed; invoice remains saved"
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use kirana_core::{InvoiceTotals, Money};

    struct OfflinePrinter;

    impl ReceiptPrinter for OfflinePrinter {
        fn print(&self, _receipt: &Receipt) -> Result<(), PrintError> {
            Err(PrintError::Unavailable("paper out".to_string()))
        }
    }

    fn receipt() -> Receipt {
        Receipt {
            store_name: "Kirana Store".to_string(),
            store_gstin: None,
            invoice_number: "INV-20260301-0001".to_string(),
            customer_name: "Walk-in".to_string(),
            lines: Vec::new(),
            totals: InvoiceTotals::default(),
            amount_paid: Money::zero(),
            credit_note_redeemed: Money::zero(),
            change_due: Money::zero(),
            amount_due: Money::zero(),
            issued_at: Utc::now(),
        }
    }

    #[test]
    fn test_print_after_commit_reports_outcome() {
        assert!(print_after_commit(&TracingPrinter, &receipt()));
        assert!(!print_after_commit(&OfflinePrinter, &receipt()));
    }
}
