//! Protocol implementations.
//!
//! Each protocol has a parser module and a connection handler used by the
//! server.
//!
//! - `bank`: ledger commands (deposit, withdraw, balance, transfer, ...)
//! - `increment`: integer echo-increment, no ledger access

pub mod bank;
pub mod increment;
