//! Increment protocol implementation.
//!
//! The simplest possible request/response exchange:
//! - Client sends: `<integer>\r\n`
//! - Server responds: `<integer + 1>\r\n`
//!
//! Useful as a connectivity check that exercises parsing and a reply
//! without touching the ledger.
//!
//! ## Protocol Format
//!
//! ```text
//! Request:  41\r\n
//! Response: 42\r\n
//!
//! Request:  QUIT\r\n
//! Response: OK\r\n
//! ```
//!
//! Lines longer than 64 bytes are answered with `ERROR line too long` and
//! skipped up to the next newline.

pub mod handler;
pub mod parser;

pub use handler::handle_connection;
