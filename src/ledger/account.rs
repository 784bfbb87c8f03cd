//! A single account: balance, operation log and the lock guarding them.
//!
//! Every account owns one mutex over its mutable state plus a condition
//! variable that is signalled whenever the balance grows or the account is
//! closed. Withdrawals wait on that condition variable (release, wait,
//! reacquire) until funds arrive or the deadline passes.
//!
//! Transfers take both account locks in ascending `AccountId` order, so two
//! transfers running in opposite directions can never deadlock. A transfer
//! that has to wait for funds waits holding only the sender's lock.

use super::error::{validate_amount, LedgerError, LedgerResult};
use super::holder::HolderId;
use super::operation::{Operation, OperationKind, OperationStatus};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// How long a withdrawal waits for funds before giving up.
pub const DEFAULT_WITHDRAW_TIMEOUT: Duration = Duration::from_secs(3);

/// Stable account identifier, also the canonical lock ordering key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AccountId(pub u64);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// State guarded by the account lock
#[derive(Debug)]
struct AccountState {
    balance: f64,
    closed_at: Option<DateTime<Utc>>,
    operations: Vec<Operation>,
}

impl AccountState {
    fn ensure_open(&self) -> LedgerResult<()> {
        if self.closed_at.is_some() {
            Err(LedgerError::AccountClosed)
        } else {
            Ok(())
        }
    }

    /// Append a pending operation and return its index in the log.
    fn begin(
        &mut self,
        kind: OperationKind,
        amount: f64,
        counterparty: Option<AccountId>,
    ) -> usize {
        self.operations
            .push(Operation::pending(kind, amount, counterparty));
        self.operations.len() - 1
    }

    fn finish(&mut self, index: usize, status: OperationStatus) {
        if let Some(op) = self.operations.get_mut(index) {
            op.resolve(status);
        }
    }

    fn credit(&mut self, amount: f64, counterparty: Option<AccountId>) {
        self.balance += amount;
        self.operations.push(Operation::completed(
            OperationKind::Deposit,
            amount,
            counterparty,
        ));
    }
}

/// Balance, close time and log read under a single lock acquisition.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountSnapshot {
    pub balance: f64,
    pub closed_at: Option<DateTime<Utc>>,
    pub operations: Vec<Operation>,
}

/// A bank account.
#[derive(Debug)]
pub struct Account {
    id: AccountId,
    holder: HolderId,
    opened_at: DateTime<Utc>,
    withdraw_timeout: Duration,
    state: Mutex<AccountState>,
    /// Signalled when the balance grows or the account closes
    funds: Condvar,
}

impl Account {
    pub(crate) fn new(id: AccountId, holder: HolderId, withdraw_timeout: Duration) -> Self {
        Self {
            id,
            holder,
            opened_at: Utc::now(),
            withdraw_timeout,
            state: Mutex::new(AccountState {
                balance: 0.0,
                closed_at: None,
                operations: Vec::new(),
            }),
            funds: Condvar::new(),
        }
    }

    pub fn id(&self) -> AccountId {
        self.id
    }

    pub fn holder(&self) -> HolderId {
        self.holder
    }

    pub fn opened_at(&self) -> DateTime<Utc> {
        self.opened_at
    }

    pub fn closed_at(&self) -> Option<DateTime<Utc>> {
        self.lock().closed_at
    }

    pub fn is_closed(&self) -> bool {
        self.closed_at().is_some()
    }

    /// Current balance.
    pub fn balance(&self) -> f64 {
        self.lock().balance
    }

    /// Snapshot of the operation log in chronological order.
    pub fn operations(&self) -> Vec<Operation> {
        self.lock().operations.clone()
    }

    /// Consistent view of all mutable state.
    pub fn snapshot(&self) -> AccountSnapshot {
        let state = self.lock();
        AccountSnapshot {
            balance: state.balance,
            closed_at: state.closed_at,
            operations: state.operations.clone(),
        }
    }

    /// Open account count and balance total over `accounts`, read while
    /// holding every account lock at once.
    ///
    /// Locks are taken in ascending id order like `lock_pair`, so a transfer
    /// is either fully counted or not at all.
    pub(crate) fn totals(accounts: &[Arc<Account>]) -> (usize, f64) {
        let mut ordered: Vec<&Account> = accounts.iter().map(Arc::as_ref).collect();
        ordered.sort_by_key(|a| a.id);

        let states: Vec<MutexGuard<'_, AccountState>> =
            ordered.iter().map(|a| a.lock()).collect();

        let open = states.iter().filter(|s| s.closed_at.is_none()).count();
        let total = states.iter().map(|s| s.balance).sum();
        (open, total)
    }

    /// Add `amount` to the balance and wake any waiting withdrawals.
    pub fn deposit(&self, amount: f64) -> LedgerResult<()> {
        validate_amount(amount)?;

        let balance = {
            let mut state = self.lock();
            state.ensure_open()?;
            state.credit(amount, None);
            state.balance
        };
        self.funds.notify_all();

        debug!(account = %self.id, amount, balance, "Deposit");
        Ok(())
    }

    /// Withdraw `amount`, waiting up to the account's timeout for funds.
    pub fn withdraw(&self, amount: f64) -> LedgerResult<()> {
        self.withdraw_until(amount, Instant::now() + self.withdraw_timeout)
    }

    /// Withdraw `amount`, waiting until `deadline` for funds.
    ///
    /// A deadline in the past checks the balance once without waiting.
    /// On failure the balance is untouched and the logged withdrawal is
    /// marked canceled.
    pub fn withdraw_until(&self, amount: f64, deadline: Instant) -> LedgerResult<()> {
        validate_amount(amount)?;

        let mut state = self.lock();
        state.ensure_open()?;
        let index = state.begin(OperationKind::Withdrawal, amount, None);

        let (mut state, outcome) = self.wait_for_funds(state, amount, deadline);
        match outcome {
            Ok(()) => {
                state.balance -= amount;
                state.finish(index, OperationStatus::Completed);
                debug!(account = %self.id, amount, balance = state.balance, "Withdrawal");
                Ok(())
            }
            Err(e) => {
                state.finish(index, OperationStatus::Canceled);
                warn!(account = %self.id, amount, balance = state.balance, error = %e, "Withdrawal failed");
                Err(e)
            }
        }
    }

    /// Move `amount` to `recipient`, waiting up to the account's timeout
    /// for funds.
    pub fn transfer(&self, recipient: &Account, amount: f64) -> LedgerResult<()> {
        self.transfer_until(recipient, amount, Instant::now() + self.withdraw_timeout)
    }

    /// Move `amount` to `recipient`, waiting until `deadline` for funds.
    ///
    /// Both balances change inside one critical section holding both locks.
    /// If the sender cannot cover the amount in time nothing is credited.
    pub fn transfer_until(
        &self,
        recipient: &Account,
        amount: f64,
        deadline: Instant,
    ) -> LedgerResult<()> {
        if std::ptr::eq(self, recipient) || self.id == recipient.id {
            return Err(LedgerError::SameAccount);
        }
        validate_amount(amount)?;
        recipient.lock().ensure_open()?;

        let index = {
            let mut state = self.lock();
            state.ensure_open()?;
            state.begin(OperationKind::Withdrawal, amount, Some(recipient.id))
        };

        match self.settle_transfer(recipient, amount, deadline, index) {
            Ok(()) => {
                recipient.funds.notify_all();
                debug!(from = %self.id, to = %recipient.id, amount, "Transfer");
                Ok(())
            }
            Err(e) => {
                warn!(from = %self.id, to = %recipient.id, amount, error = %e, "Transfer failed");
                Err(e)
            }
        }
    }

    /// Close the account. Waiting withdrawals are woken and fail.
    pub fn close(&self) -> LedgerResult<()> {
        {
            let mut state = self.lock();
            state.ensure_open()?;
            state.closed_at = Some(Utc::now());
        }
        self.funds.notify_all();

        debug!(account = %self.id, "Account closed");
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, AccountState> {
        // Critical sections never leave the state half-updated, so a
        // poisoned lock still guards consistent data.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lock this account and `other` in ascending id order.
    ///
    /// Returns `(self_guard, other_guard)` regardless of acquisition order.
    fn lock_pair<'a>(
        &'a self,
        other: &'a Account,
    ) -> (MutexGuard<'a, AccountState>, MutexGuard<'a, AccountState>) {
        if self.id < other.id {
            let mine = self.lock();
            let theirs = other.lock();
            (mine, theirs)
        } else {
            let theirs = other.lock();
            let mine = self.lock();
            (mine, theirs)
        }
    }

    /// Block on the funds condition until the balance covers `amount`,
    /// the account closes, or `deadline` passes.
    fn wait_for_funds<'a>(
        &'a self,
        mut state: MutexGuard<'a, AccountState>,
        amount: f64,
        deadline: Instant,
    ) -> (MutexGuard<'a, AccountState>, LedgerResult<()>) {
        loop {
            if state.closed_at.is_some() {
                return (state, Err(LedgerError::AccountClosed));
            }
            if state.balance >= amount {
                return (state, Ok(()));
            }

            let now = Instant::now();
            if now >= deadline {
                return (state, Err(LedgerError::InsufficientFunds));
            }

            // Spurious wakeups just loop back to the checks above
            let (guard, _) = self
                .funds
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            state = guard;
        }
    }

    fn settle_transfer(
        &self,
        recipient: &Account,
        amount: f64,
        deadline: Instant,
        index: usize,
    ) -> LedgerResult<()> {
        loop {
            {
                let state = self.lock();
                let (mut state, outcome) = self.wait_for_funds(state, amount, deadline);
                if let Err(e) = outcome {
                    state.finish(index, OperationStatus::Canceled);
                    return Err(e);
                }
            }

            let (mut sender, mut receiver) = self.lock_pair(recipient);

            if sender.closed_at.is_some() || receiver.closed_at.is_some() {
                sender.finish(index, OperationStatus::Canceled);
                return Err(LedgerError::AccountClosed);
            }

            if sender.balance >= amount {
                sender.balance -= amount;
                sender.finish(index, OperationStatus::Completed);
                receiver.credit(amount, Some(self.id));
                return Ok(());
            }

            // Funds were taken between the wait and the commit
            if Instant::now() >= deadline {
                sender.finish(index, OperationStatus::Canceled);
                return Err(LedgerError::InsufficientFunds);
            }
        }
    }
}
