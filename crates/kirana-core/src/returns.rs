//! # Returns
//!
//! Turns a return request against a sales invoice into refund totals and
//! restock quantities. Composes the totals engine with the restock half of
//! the batch allocator.
//!
//! ```text
//! Invoice lines (sold, already returned)
//!        │
//!        ▼
//! plan_return(requests) ── over-return? ──► CoreError::OverReturn
//!        │
//!        ├──► refund totals  (compute_totals_for(Return, ...), no rounding)
//!        └──► restock lines  (one new `returned` batch each)
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::tax::{compute_totals_for, DocumentKind, InvoiceTotals, LineItem, TaxJurisdiction};
use crate::types::SalesInvoiceLine;
use crate::validation::validate_document_lines;

/// One line of a return request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReturnLineRequest {
    pub invoice_line_id: String,
    pub quantity: i64,
}

/// A validated return line, priced at the original sale terms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PlannedReturnLine {
    pub invoice_line_id: String,
    pub item_id: String,
    pub quantity: i64,
    pub line: LineItem,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReturnPlan {
    pub lines: Vec<PlannedReturnLine>,
    /// `refund.total` is what goes back to the customer.
    pub refund: InvoiceTotals,
}

/// Validates `requests` against the invoice and prices the refund.
///
/// A line may appear more than once in `requests`; the quantities add up
/// against the same returnable balance.
pub fn plan_return(
    sold: &[SalesInvoiceLine],
    requests: &[ReturnLineRequest],
    jurisdiction: TaxJurisdiction,
) -> CoreResult<ReturnPlan> {
    validate_document_lines(requests.len())?;

    let mut lines: Vec<PlannedReturnLine> = Vec::with_capacity(requests.len());
    for request in requests {
        if request.quantity <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "return quantity".to_string(),
            }
            .into());
        }

        let sold_line = sold
            .iter()
            .find(|l| l.id == request.invoice_line_id)
            .ok_or_else(|| CoreError::LineNotFound {
                document: "sales invoice".to_string(),
                line_id: request.invoice_line_id.clone(),
            })?;

        let already_planned: i64 = lines
            .iter()
            .filter(|l| l.invoice_line_id == request.invoice_line_id)
            .map(|l| l.quantity)
            .sum();
        let returnable = sold_line.returnable_quantity() - already_planned;
        if request.quantity > returnable {
            return Err(CoreError::OverReturn {
                line_id: request.invoice_line_id.clone(),
                returnable: returnable.max(0),
                requested: request.quantity,
            });
        }

        let mut line = sold_line.as_line_item();
        line.quantity = request.quantity;
        lines.push(PlannedReturnLine {
            invoice_line_id: sold_line.id.clone(),
            item_id: sold_line.item_id.clone(),
            quantity: request.quantity,
            line,
        });
    }

    let items: Vec<LineItem> = lines.iter().map(|l| l.line.clone()).collect();
    let refund = compute_totals_for(DocumentKind::Return, &items, jurisdiction);

    Ok(ReturnPlan { lines, refund })
}
