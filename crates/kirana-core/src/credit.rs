//! # Credits Ledger
//!
//! Rules for money owed by customers (credit entries) and money owed to
//! them (credit notes issued on returns).
//!
//! ```text
//! Sales invoice total ₹500, paid ₹200 ──► CreditEntry { due: 500-200 = 300 }
//!                                              │ record_payment(₹100)
//!                                              ▼
//!                                         outstanding ₹200 (Open)
//!
//! Return refund ₹212.40 (credit note) ──► CreditNote { balance: 212.40 }
//!                                              │ redeem(₹200) on next invoice
//!                                              ▼
//!                                         balance ₹12.40 (Open)
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;

// =============================================================================
// Credit Entry
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CreditStatus {
    Open,
    Settled,
}

/// An amount a customer still owes on one invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CreditEntry {
    pub id: String,
    pub invoice_id: String,
    pub party_id: String,
    pub amount_due: Money,
    pub amount_paid: Money,
    pub status: CreditStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl CreditEntry {
    pub fn outstanding(&self) -> Money {
        self.amount_due - self.amount_paid
    }

    /// Records a repayment. Rejects non-positive amounts and overpayment.
    pub fn apply_payment(&mut self, amount: Money) -> CoreResult<()> {
        if !amount.is_positive() {
            return Err(ValidationError::MustBePositive {
                field: "payment amount".to_string(),
            }
            .into());
        }
        let outstanding = self.outstanding();
        if amount > outstanding {
            return Err(CoreError::CreditExceeded {
                outstanding,
                requested: amount,
            });
        }

        self.amount_paid += amount;
        if self.outstanding().is_zero() {
            self.status = CreditStatus::Settled;
        }
        Ok(())
    }
}

/// Amount left on credit after an invoice is paid `paid` against `total`.
pub fn amount_on_credit(total: Money, paid: Money) -> Money {
    (total - paid).clamp_non_negative()
}

// =============================================================================
// Credit Note
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CreditNoteStatus {
    Open,
    Exhausted,
}

/// A refund instrument redeemable against future invoices up to its balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct CreditNote {
    pub id: String,
    pub note_number: String,
    pub party_id: Option<String>,
    pub return_id: String,
    pub amount: Money,
    pub balance: Money,
    pub status: CreditNoteStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl CreditNote {
    /// Consumes `amount` from the balance.
    pub fn redeem(&mut self, amount: Money) -> CoreResult<()> {
        if !amount.is_positive() {
            return Err(ValidationError::MustBePositive {
                field: "redemption amount".to_string(),
            }
            .into());
        }
        if self.status == CreditNoteStatus::Exhausted || amount > self.balance {
            return Err(CoreError::CreditNoteExhausted {
                note_number: self.note_number.clone(),
                balance: self.balance,
                requested: amount,
            });
        }

        self.balance -= amount;
        if self.balance.is_zero() {
            self.status = CreditNoteStatus::Exhausted;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(due: i64) -> CreditEntry {
        CreditEntry {
            id: "c1".to_string(),
            invoice_id: "inv-1".to_string(),
            party_id: "p1".to_string(),
            amount_due: Money::from_rupees(due),
            amount_paid: Money::zero(),
            status: CreditStatus::Open,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn note(balance: i64) -> CreditNote {
        CreditNote {
            id: "n1".to_string(),
            note_number: "CN-20260301-0001".to_string(),
            party_id: None,
            return_id: "r1".to_string(),
            amount: Money::from_rupees(balance),
            balance: Money::from_rupees(balance),
            status: CreditNoteStatus::Open,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_partial_then_full_payment_settles() {
        let mut credit = entry(300);
        credit.apply_payment(Money::from_rupees(100)).unwrap();
        assert_eq!(credit.outstanding(), Money::from_rupees(200));
        assert_eq!(credit.status, CreditStatus::Open);

        credit.apply_payment(Money::from_rupees(200)).unwrap();
        assert!(credit.outstanding().is_zero());
        assert_eq!(credit.status, CreditStatus::Settled);
    }

    #[test]
    fn test_overpayment_rejected() {
        let mut credit = entry(50);
        let err = credit.apply_payment(Money::from_rupees(60)).unwrap_err();
        assert!(matches!(err, CoreError::CreditExceeded { .. }));
        assert_eq!(credit.amount_paid, Money::zero());
    }

    #[test]
    fn test_zero_payment_rejected() {
        let mut credit = entry(50);
        assert!(matches!(
            credit.apply_payment(Money::zero()),
            Err(CoreError::Validation(_))
        ));
    }

    #[test]
    fn test_amount_on_credit() {
        assert_eq!(amount_on_credit(Money::from_rupees(500), Money::from_rupees(200)), Money::from_rupees(300));
        assert_eq!(amount_on_credit(Money::from_rupees(500), Money::from_rupees(600)), Money::zero());
    }

    #[test]
    fn test_credit_note_redeem_until_exhausted() {
        let mut cn = note(100);
        cn.redeem(Money::from_rupees(60)).unwrap();
        assert_eq!(cn.balance, Money::from_rupees(40));

        assert!(cn.redeem(Money::from_rupees(41)).is_err());
        cn.redeem(Money::from_rupees(40)).unwrap();
        assert_eq!(cn.status, CreditNoteStatus::Exhausted);
        assert!(cn.redeem(Money::from_paise(1)).is_err());
    }
}
