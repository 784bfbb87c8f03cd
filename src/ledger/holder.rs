//! Account holder identity records.

use chrono::{DateTime, Utc};
use std::fmt;

/// Index of a holder in the ledger's holder arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HolderId(pub usize);

impl fmt::Display for HolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of the person owning one or more accounts.
///
/// Immutable once registered.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountHolder {
    last_name: String,
    first_name: String,
    credit_rating: i32,
    registered_at: DateTime<Utc>,
}

impl AccountHolder {
    pub fn new(last_name: &str, first_name: &str, credit_rating: i32) -> Self {
        Self {
            last_name: last_name.to_string(),
            first_name: first_name.to_string(),
            credit_rating,
            registered_at: Utc::now(),
        }
    }

    pub fn last_name(&self) -> &str {
        &self.last_name
    }

    pub fn first_name(&self) -> &str {
        &self.first_name
    }

    pub fn credit_rating(&self) -> i32 {
        self.credit_rating
    }

    pub fn registered_at(&self) -> DateTime<Utc> {
        self.registered_at
    }
}
