//! Bank protocol connection handler.
//!
//! Reads request lines, routes them to the ledger, and writes one response
//! per request. Operations that may wait for funds run on the blocking pool.

use super::parser::{self, Command, ParseError, ParseResult, Response, MAX_LINE_LENGTH};
use crate::ledger::{AccountId, Ledger, LedgerError, LedgerResult};
use bytes::{Buf, BytesMut};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::task::JoinError;
use tracing::{trace, warn};

/// Read buffer size
const BUFFER_SIZE: usize = 4 * 1024;

/// Handle a single client connection.
///
/// Commands without an account argument address `house`.
pub async fn handle_connection<S>(
    mut stream: S,
    ledger: Arc<Ledger>,
    house: AccountId,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buffer = BytesMut::with_capacity(BUFFER_SIZE);
    // Skipping the remainder of an oversized line
    let mut discarding = false;

    loop {
        if discarding {
            match buffer.iter().position(|&b| b == b'\n') {
                Some(pos) => {
                    buffer.advance(pos + 1);
                    discarding = false;
                }
                None => {
                    buffer.clear();
                    if stream.read_buf(&mut buffer).await? == 0 {
                        return Ok(());
                    }
                    continue;
                }
            }
        }

        match parser::parse(&buffer) {
            ParseResult::Complete(command, consumed) => {
                buffer.advance(consumed);
                trace!(?command, "Processing command");

                if matches!(command, Command::Quit) {
                    stream.write_all(Response::ok()).await?;
                    return Ok(());
                }

                let response = execute_command(command, &ledger, house).await?;
                stream.write_all(&response).await?;
            }

            ParseResult::Error(e, consumed) => {
                buffer.advance(consumed);
                warn!(error = %e, "Parse error");

                let response = match e {
                    ParseError::UnknownCommand(_) => BytesMut::from(Response::invalid_operation()),
                    e => Response::client_error(&e.to_string()),
                };
                stream.write_all(&response).await?;
            }

            ParseResult::Incomplete => {
                // Line plus a trailing \r still without \n
                if buffer.len() > MAX_LINE_LENGTH + 1 {
                    warn!(buffered = buffer.len(), "Request line too long");
                    stream
                        .write_all(&Response::client_error(&ParseError::LineTooLong.to_string()))
                        .await?;
                    buffer.clear();
                    discarding = true;
                }

                let n = stream.read_buf(&mut buffer).await?;
                if n == 0 {
                    trace!("Connection closed by client");
                    return Ok(());
                }
            }
        }
    }
}

/// Execute a command against the ledger and build its response.
///
/// Ledger failures become `ERROR` responses; only a panicked blocking
/// task is reported as an error.
async fn execute_command(
    command: Command,
    ledger: &Arc<Ledger>,
    house: AccountId,
) -> Result<BytesMut, JoinError> {
    let result = match command {
        Command::Deposit { amount, account } => ledger
            .deposit(account.unwrap_or(house), amount)
            .map(|()| BytesMut::from(Response::deposited())),

        Command::Withdraw { amount, account } => {
            let id = account.unwrap_or(house);
            run_blocking(ledger, move |ledger| ledger.withdraw(id, amount))
                .await?
                .map(|()| BytesMut::from(Response::withdrawn()))
        }

        Command::Balance { account } => ledger
            .balance(account.unwrap_or(house))
            .map(Response::balance),

        Command::Transfer { amount, to, from } => {
            let from = from.unwrap_or(house);
            run_blocking(ledger, move |ledger| ledger.transfer(from, to, amount))
                .await?
                .map(|()| BytesMut::from(Response::transferred()))
        }

        Command::Open {
            last_name,
            first_name,
            credit_rating,
        } => {
            let account = ledger.open_account_for(&last_name, &first_name, credit_rating);
            Ok(Response::opened(account.id()))
        }

        Command::OpenForHolder { holder } => ledger
            .open_account(holder)
            .map(|account| Response::opened(account.id())),

        Command::Close { account } => ledger
            .close(account.unwrap_or(house))
            .map(|()| BytesMut::from(Response::closed())),

        Command::Info { account } => {
            ledger
                .account(account.unwrap_or(house))
                .and_then(|account| {
                    let holder = ledger
                        .holder(account.holder())
                        .ok_or(LedgerError::UnknownHolder(account.holder()))?;
                    Ok(Response::info(&account, &holder))
                })
        }

        Command::History { account } => ledger
            .account(account.unwrap_or(house))
            .map(|account| Response::history(&account.operations())),

        Command::Stats => Ok(Response::stats(&ledger.stats())),

        Command::Quit => Ok(BytesMut::from(Response::ok())),
    };

    Ok(result.unwrap_or_else(|e| Response::error(&e.to_string())))
}

/// Run a ledger call that may block waiting for funds.
async fn run_blocking<F>(ledger: &Arc<Ledger>, op: F) -> Result<LedgerResult<()>, JoinError>
where
    F: FnOnce(&Ledger) -> LedgerResult<()> + Send + 'static,
{
    let ledger = Arc::clone(ledger);
    tokio::task::spawn_blocking(move || op(&ledger)).await
}
