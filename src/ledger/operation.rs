//! Per-account operation log entries.

use super::account::AccountId;
use chrono::{DateTime, Utc};

/// Direction of a balance change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Deposit,
    Withdrawal,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Deposit => "deposit",
            OperationKind::Withdrawal => "withdrawal",
        }
    }
}

/// Lifecycle of an operation. Only `Pending` ever transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationStatus {
    Pending,
    Completed,
    Canceled,
}

impl OperationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Pending => "pending",
            OperationStatus::Completed => "completed",
            OperationStatus::Canceled => "canceled",
        }
    }
}

/// A single ledger action recorded on an account.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    kind: OperationKind,
    amount: f64,
    /// Other side of a transfer leg
    counterparty: Option<AccountId>,
    created_at: DateTime<Utc>,
    status: OperationStatus,
}

impl Operation {
    /// Create a pending operation stamped with the current time.
    pub fn pending(kind: OperationKind, amount: f64, counterparty: Option<AccountId>) -> Self {
        Self {
            kind,
            amount,
            counterparty,
            created_at: Utc::now(),
            status: OperationStatus::Pending,
        }
    }

    /// Create an operation that completed at creation time.
    pub fn completed(kind: OperationKind, amount: f64, counterparty: Option<AccountId>) -> Self {
        let mut op = Self::pending(kind, amount, counterparty);
        op.status = OperationStatus::Completed;
        op
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn counterparty(&self) -> Option<AccountId> {
        self.counterparty
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn status(&self) -> OperationStatus {
        self.status
    }

    /// Resolve a pending operation. Returns false if it was already resolved.
    pub(crate) fn resolve(&mut self, status: OperationStatus) -> bool {
        if self.status != OperationStatus::Pending || status == OperationStatus::Pending {
            return false;
        }
        self.status = status;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_resolves_once() {
        let mut op = Operation::pending(OperationKind::Withdrawal, 10.0, None);
        assert_eq!(op.status(), OperationStatus::Pending);

        assert!(op.resolve(OperationStatus::Canceled));
        assert_eq!(op.status(), OperationStatus::Canceled);

        // Terminal states never change
        assert!(!op.resolve(OperationStatus::Completed));
        assert_eq!(op.status(), OperationStatus::Canceled);
    }

    #[test]
    fn test_cannot_resolve_to_pending() {
        let mut op = Operation::pending(OperationKind::Deposit, 1.0, None);
        assert!(!op.resolve(OperationStatus::Pending));
    }

    #[test]
    fn test_completed() {
        let op = Operation::completed(OperationKind::Deposit, 5.5, Some(AccountId(2)));
        assert_eq!(op.kind(), OperationKind::Deposit);
        assert_eq!(op.amount(), 5.5);
        assert_eq!(op.counterparty(), Some(AccountId(2)));
        assert_eq!(op.status(), OperationStatus::Completed);
    }
}
