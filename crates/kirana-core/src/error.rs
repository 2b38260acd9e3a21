//! # Error Types
//!
//! Domain-specific error types for kirana-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  kirana-core errors (this file)                                        │
//! │  ├── CoreError        - Business rule violations                       │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  kirana-db errors (separate crate)                                     │
//! │  └── DbError          - Storage failures, optimistic-lock conflicts,   │
//! │                         and wrapped CoreErrors                         │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → caller (toast + abort)  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use crate::money::Money;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Requested deduction exceeds the stock held across all batches.
    ///
    /// ## User Workflow
    /// ```text
    /// Save Invoice (qty: 7)
    ///      │
    ///      ▼
    /// Sum batches: available=5
    ///      │
    ///      ▼
    /// InsufficientStock { item_id, available: 5, requested: 7 }
    ///      │
    ///      ▼
    /// No batch touched, invoice not saved
    /// ```
    #[error("Insufficient stock for {item_id}: available {available}, requested {requested}")]
    InsufficientStock {
        item_id: String,
        available: i64,
        requested: i64,
    },

    /// An in-memory batch no longer matches the snapshot a plan was built from.
    #[error("Batch {batch_id} changed since the deduction was planned")]
    StaleBatch { batch_id: String },

    /// A return line asks for more than is still returnable.
    #[error("Cannot return {requested} of line {line_id}: only {returnable} returnable")]
    OverReturn {
        line_id: String,
        returnable: i64,
        requested: i64,
    },

    /// A referenced document line does not exist on the document.
    #[error("Line {line_id} not found on {document}")]
    LineNotFound { document: String, line_id: String },

    /// A payment exceeds what is still owed on a credit entry.
    #[error("Payment of {requested} exceeds outstanding {outstanding}")]
    CreditExceeded { outstanding: Money, requested: Money },

    /// A redemption exceeds the remaining balance of a credit note.
    #[error("Credit note {note_number} has balance {balance}, cannot redeem {requested}")]
    CreditNoteExhausted {
        note_number: String,
        balance: Money,
        requested: Money,
    },

    /// The document is not in a state that allows the requested operation.
    #[error("{document} {id} is {status}, cannot perform operation")]
    InvalidStatus {
        document: String,
        id: String,
        status: String,
    },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors raised before any business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("{field} must be positive")]
    MustBePositive { field: String },

    #[error("{field} must not be negative")]
    MustNotBeNegative { field: String },

    /// Invalid format (non-finite number, malformed GSTIN, ...).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            item_id: "atta-10kg".to_string(),
            available: 5,
            requested: 7,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for atta-10kg: available 5, requested 7"
        );

        let err = CoreError::CreditExceeded {
            outstanding: Money::from_paise(5000),
            requested: Money::from_paise(6000),
        };
        assert_eq!(err.to_string(), "Payment of ₹60.00 exceeds outstanding ₹50.00");
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::Required {
            field: "sku".to_string(),
        };
        assert_eq!(validation_err.to_string(), "sku is required");

        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
