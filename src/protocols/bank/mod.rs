//! Bank protocol implementation.
//!
//! Line-oriented text commands routed to the ledger. Requests end with
//! `\n` (an optional preceding `\r` is ignored); command names are
//! case-insensitive; every response line ends with `\r\n`.
//!
//! ## Protocol Format
//!
//! ```text
//! DEPOSIT <amount> [account]        -> Deposit successful.
//! WITHDRAW <amount> [account]       -> Withdrawal successful.
//! BALANCE [account]                 -> Balance: <amount>
//! TRANSFER <amount> <to> [from]     -> Transfer successful.
//! OPEN <last> <first> <rating>      -> Opened account <id>.
//! OPEN <holder_id>                  -> Opened account <id>.
//! CLOSE [account]                   -> Account closed.
//! INFO [account]                    -> STAT <name> <value> ... END
//! HISTORY [account]                 -> OP <seq> <kind> <amount> <status> <created> [peer] ... END
//! STATS                             -> STAT <name> <value> ... END
//! QUIT                              -> OK
//! ```
//!
//! Commands without an account address the house account opened at
//! startup. Unknown commands get `Invalid operation.`, malformed
//! arguments `CLIENT_ERROR <reason>`, ledger failures `ERROR <reason>`.
//!
//! `WITHDRAW` and `TRANSFER` may wait up to the configured window for
//! funds before answering.

pub mod handler;
pub mod parser;

pub use handler::handle_connection;
