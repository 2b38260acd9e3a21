//! # Validation Module
//!
//! Input validation run before any totals are computed or rows written.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Layer 1: Back-office UI        clamps discount/GST inputs             │
//! │  Layer 2: THIS MODULE           rejects non-positive quantities,       │
//! │                                 negative rates, discount or GST over   │
//! │                                 100%, malformed GSTINs                 │
//! │  Layer 3: SQLite                CHECK (quantity >= 0), UNIQUE, FKs      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The totals engine itself never fails; these checks are what turn bad
//! input into a `ValidationError` instead of a nonsensical invoice.
//!
//! ```rust
//! use kirana_core::validation::{validate_sku, validate_quantity};
//!
//! validate_sku("ATTA-10KG").unwrap();
//! validate_quantity(5).unwrap();
//! ```

use crate::error::ValidationError;
use crate::money::{Money, Percent};
use crate::tax::LineItem;
use crate::{MAX_DOCUMENT_LINES, MAX_ITEM_QUANTITY, MAX_ITEM_RATE, MAX_LINE_PERCENT};

pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a SKU: 1-50 characters of letters, digits, `-` and `_`.
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::Required {
            field: "sku".to_string(),
        });
    }

    if sku.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 50,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

pub fn validate_item_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.len() > 200 {
        return Err(ValidationError::TooLong {
            field: "name".to_string(),
            max: 200,
        });
    }

    Ok(())
}

/// Validates a state name. Only emptiness is checked; the text is compared
/// verbatim for the jurisdiction, so it is not normalized here either.
pub fn validate_state_name(state: &str) -> ValidationResult<()> {
    if state.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "state".to_string(),
        });
    }
    Ok(())
}

/// Validates a GSTIN: 15 ASCII alphanumeric characters.
pub fn validate_gstin(gstin: &str) -> ValidationResult<()> {
    if gstin.len() != 15 || !gstin.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ValidationError::InvalidFormat {
            field: "gstin".to_string(),
            reason: "must be 15 letters or digits".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Quantity must be in `1..=MAX_ITEM_QUANTITY`.
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// A rate may be zero (free goods) but never negative, and at most
/// `MAX_ITEM_RATE`.
pub fn validate_rate(rate: Money) -> ValidationResult<()> {
    if rate.is_negative() {
        return Err(ValidationError::MustNotBeNegative {
            field: "rate".to_string(),
        });
    }
    if rate > MAX_ITEM_RATE {
        return Err(ValidationError::OutOfRange {
            field: "rate".to_string(),
            min: 0,
            max: MAX_ITEM_RATE.paise(),
        });
    }
    Ok(())
}

/// Discounts and GST rates are limited to `0..=100%`.
pub fn validate_percent(field: &str, percent: Percent) -> ValidationResult<()> {
    if percent > MAX_LINE_PERCENT {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_LINE_PERCENT.bps() as i64,
        });
    }
    Ok(())
}

pub fn validate_line_item(line: &LineItem) -> ValidationResult<()> {
    if line.item_id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "item_id".to_string(),
        });
    }
    validate_quantity(line.quantity)?;
    validate_rate(line.rate)?;
    validate_percent("discount", line.discount)?;
    validate_percent("gst_rate", line.gst_rate)
}

// =============================================================================
// Collection Validators
// =============================================================================

/// A document needs between 1 and `MAX_DOCUMENT_LINES` lines.
pub fn validate_document_lines(count: usize) -> ValidationResult<()> {
    if count == 0 {
        return Err(ValidationError::Required {
            field: "lines".to_string(),
        });
    }
    if count > MAX_DOCUMENT_LINES {
        return Err(ValidationError::OutOfRange {
            field: "lines".to_string(),
            min: 1,
            max: MAX_DOCUMENT_LINES as i64,
        });
    }
    Ok(())
}

/// Validates every line of a document.
pub fn validate_lines(lines: &[LineItem]) -> ValidationResult<()> {
    validate_document_lines(lines.len())?;
    lines.iter().try_for_each(validate_line_item)
}

// =============================================================================
// Unit Tests
// =============================================================================
