//! Concurrent account ledger.
//!
//! The `Ledger` owns the holder arena and the account registry:
//! - Holders are stored in a slab and addressed by `HolderId`
//! - Accounts are shared as `Arc<Account>` and addressed by `AccountId`
//! - Ids are assigned monotonically starting at 1
//!
//! Registry locks are only held long enough to resolve an id; balance
//! operations run under the individual account locks.

mod account;
mod error;
mod holder;
mod operation;

pub use account::{Account, AccountId, DEFAULT_WITHDRAW_TIMEOUT};
pub use error::{LedgerError, LedgerResult};
pub use holder::{AccountHolder, HolderId};
pub use operation::{Operation, OperationKind, OperationStatus};

use slab::Slab;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use tracing::{debug, info};

/// Registry of holders and accounts.
pub struct Ledger {
    holders: RwLock<Slab<AccountHolder>>,
    accounts: RwLock<HashMap<AccountId, Arc<Account>>>,
    next_account_id: AtomicU64,
    /// Wait window applied to withdrawals and transfers
    withdraw_timeout: Duration,
}

impl Ledger {
    /// Create an empty ledger
    pub fn new(withdraw_timeout: Duration) -> Arc<Self> {
        info!(
            withdraw_timeout_ms = withdraw_timeout.as_millis() as u64,
            "Initializing ledger"
        );
        Arc::new(Self {
            holders: RwLock::new(Slab::new()),
            accounts: RwLock::new(HashMap::new()),
            next_account_id: AtomicU64::new(1),
            withdraw_timeout,
        })
    }

    /// Add a holder to the arena.
    pub fn register_holder(&self, last_name: &str, first_name: &str, credit_rating: i32) -> HolderId {
        let holder = AccountHolder::new(last_name, first_name, credit_rating);
        let id = HolderId(
            self.holders
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(holder),
        );
        debug!(holder = %id, last_name, first_name, credit_rating, "Registered holder");
        id
    }

    pub fn holder(&self, id: HolderId) -> Option<AccountHolder> {
        self.holders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id.0)
            .cloned()
    }

    /// Open a zero-balance account for an existing holder.
    pub fn open_account(&self, holder: HolderId) -> LedgerResult<Arc<Account>> {
        if !self
            .holders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(holder.0)
        {
            return Err(LedgerError::UnknownHolder(holder));
        }

        Ok(self.insert_account(holder))
    }

    /// Register a new holder and open an account for it.
    pub fn open_account_for(
        &self,
        last_name: &str,
        first_name: &str,
        credit_rating: i32,
    ) -> Arc<Account> {
        let holder = self.register_holder(last_name, first_name, credit_rating);
        self.insert_account(holder)
    }

    fn insert_account(&self, holder: HolderId) -> Arc<Account> {
        let id = AccountId(self.next_account_id.fetch_add(1, Ordering::SeqCst));
        let account = Arc::new(Account::new(id, holder, self.withdraw_timeout));
        self.accounts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, Arc::clone(&account));

        debug!(account = %id, holder = %holder, "Opened account");
        account
    }

    /// Look up an account by id.
    pub fn account(&self, id: AccountId) -> LedgerResult<Arc<Account>> {
        self.accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
            .ok_or(LedgerError::UnknownAccount(id))
    }

    pub fn deposit(&self, id: AccountId, amount: f64) -> LedgerResult<()> {
        self.account(id)?.deposit(amount)
    }

    /// Withdraw from an account. Blocks for up to the wait window.
    pub fn withdraw(&self, id: AccountId, amount: f64) -> LedgerResult<()> {
        self.account(id)?.withdraw(amount)
    }

    /// Transfer between two accounts. Blocks for up to the wait window.
    pub fn transfer(&self, from: AccountId, to: AccountId, amount: f64) -> LedgerResult<()> {
        if from == to {
            return Err(LedgerError::SameAccount);
        }
        let sender = self.account(from)?;
        let recipient = self.account(to)?;
        sender.transfer(&recipient, amount)
    }

    pub fn balance(&self, id: AccountId) -> LedgerResult<f64> {
        Ok(self.account(id)?.balance())
    }

    pub fn close(&self, id: AccountId) -> LedgerResult<()> {
        self.account(id)?.close()
    }

    /// Aggregate statistics across all accounts.
    ///
    /// Balances are summed with every account locked, so in-flight transfers
    /// never show up twice or not at all.
    pub fn stats(&self) -> LedgerStats {
        let accounts: Vec<Arc<Account>> = self
            .accounts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        let holder_count = self
            .holders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len();

        let (open_account_count, total_balance) = Account::totals(&accounts);

        LedgerStats {
            account_count: accounts.len(),
            open_account_count,
            holder_count,
            total_balance,
        }
    }
}

/// Ledger statistics
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerStats {
    pub account_count: usize,
    pub open_account_count: usize,
    pub holder_count: usize,
    pub total_balance: f64,
}
