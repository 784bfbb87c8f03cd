//! Ledger error types.

use super::account::AccountId;
use super::holder::HolderId;
use thiserror::Error;

/// Result type used by ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Recoverable failures reported by the ledger.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LedgerError {
    /// Amount was negative, NaN or infinite.
    #[error("invalid amount")]
    InvalidAmount,

    /// Balance stayed below the requested amount for the whole wait window.
    #[error("insufficient funds")]
    InsufficientFunds,

    /// Transfer source and target are the same account.
    #[error("cannot transfer to the same account")]
    SameAccount,

    /// The account was closed before or during the operation.
    #[error("account closed")]
    AccountClosed,

    #[error("unknown account {0}")]
    UnknownAccount(AccountId),

    #[error("unknown holder {0}")]
    UnknownHolder(HolderId),
}

/// Reject negative and non-finite amounts.
pub(crate) fn validate_amount(amount: f64) -> LedgerResult<()> {
    if amount.is_finite() && amount >= 0.0 {
        Ok(())
    } else {
        Err(LedgerError::InvalidAmount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_amount() {
        assert!(validate_amount(0.0).is_ok());
        assert!(validate_amount(100.5).is_ok());
        assert_eq!(validate_amount(-0.01), Err(LedgerError::InvalidAmount));
        assert_eq!(validate_amount(f64::NAN), Err(LedgerError::InvalidAmount));
        assert_eq!(validate_amount(f64::INFINITY), Err(LedgerError::InvalidAmount));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(LedgerError::InsufficientFunds.to_string(), "insufficient funds");
        assert_eq!(
            LedgerError::UnknownAccount(AccountId(7)).to_string(),
            "unknown account 7"
        );
    }
}
