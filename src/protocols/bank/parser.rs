//! Bank protocol parser and response generator.

use crate::ledger::{Account, AccountHolder, AccountId, HolderId, LedgerStats, Operation};
use bytes::BytesMut;
use std::str;
use thiserror::Error;

/// Longest request line accepted, excluding the line ending.
pub const MAX_LINE_LENGTH: usize = 1024;

/// Parsed bank command. A missing account addresses the house account.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Deposit {
        amount: f64,
        account: Option<AccountId>,
    },
    Withdraw {
        amount: f64,
        account: Option<AccountId>,
    },
    Balance {
        account: Option<AccountId>,
    },
    Transfer {
        amount: f64,
        to: AccountId,
        from: Option<AccountId>,
    },
    Open {
        last_name: String,
        first_name: String,
        credit_rating: i32,
    },
    /// Another account for an already registered holder
    OpenForHolder {
        holder: HolderId,
    },
    Close {
        account: Option<AccountId>,
    },
    Info {
        account: Option<AccountId>,
    },
    History {
        account: Option<AccountId>,
    },
    Stats,
    Quit,
}

/// Request line errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("invalid UTF-8 in command")]
    InvalidUtf8,
    #[error("line too long")]
    LineTooLong,
    #[error("{0} requires {1}")]
    MissingArgument(&'static str, &'static str),
    #[error("too many arguments for {0}")]
    TooManyArguments(&'static str),
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("invalid account: {0}")]
    InvalidAccount(String),
    #[error("invalid holder: {0}")]
    InvalidHolder(String),
    #[error("invalid credit rating: {0}")]
    InvalidCreditRating(String),
    #[error("unknown command: {0}")]
    UnknownCommand(String),
}

/// Parse result
#[derive(Debug)]
pub enum ParseResult {
    /// Successfully parsed command with bytes consumed
    Complete(Command, usize),
    /// No complete line in the buffer yet
    Incomplete,
    /// Malformed line with bytes consumed
    Error(ParseError, usize),
}

/// Parse one request line from the front of `input`.
pub fn parse(input: &[u8]) -> ParseResult {
    let line_end = match find_lf(input) {
        Some(pos) => pos,
        None => return ParseResult::Incomplete,
    };
    let consumed = line_end + 1;

    let mut line = &input[..line_end];
    if line.last() == Some(&b'\r') {
        line = &line[..line.len() - 1];
    }

    if line.len() > MAX_LINE_LENGTH {
        return ParseResult::Error(ParseError::LineTooLong, consumed);
    }

    let line = match str::from_utf8(line) {
        Ok(s) => s,
        Err(_) => return ParseResult::Error(ParseError::InvalidUtf8, consumed),
    };

    match parse_line(line) {
        Ok(command) => ParseResult::Complete(command, consumed),
        Err(e) => ParseResult::Error(e, consumed),
    }
}

fn parse_line(line: &str) -> Result<Command, ParseError> {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let name = parts.first().map(|s| s.to_ascii_uppercase()).unwrap_or_default();
    let args = parts.get(1..).unwrap_or_default();

    match name.as_str() {
        "DEPOSIT" => {
            let (amount, account) = parse_amount_and_account("DEPOSIT", args)?;
            Ok(Command::Deposit { amount, account })
        }
        "WITHDRAW" => {
            let (amount, account) = parse_amount_and_account("WITHDRAW", args)?;
            Ok(Command::Withdraw { amount, account })
        }
        "BALANCE" => Ok(Command::Balance {
            account: parse_optional_account("BALANCE", args)?,
        }),
        "TRANSFER" => parse_transfer(args),
        "OPEN" => parse_open(args),
        "CLOSE" => Ok(Command::Close {
            account: parse_optional_account("CLOSE", args)?,
        }),
        "INFO" => Ok(Command::Info {
            account: parse_optional_account("INFO", args)?,
        }),
        "HISTORY" => Ok(Command::History {
            account: parse_optional_account("HISTORY", args)?,
        }),
        "STATS" => no_arguments("STATS", args, Command::Stats),
        "QUIT" => no_arguments("QUIT", args, Command::Quit),
        _ => Err(ParseError::UnknownCommand(name)),
    }
}

/// Format: <command> <amount> [account]
fn parse_amount_and_account(
    cmd: &'static str,
    args: &[&str],
) -> Result<(f64, Option<AccountId>), ParseError> {
    let amount = args
        .first()
        .ok_or(ParseError::MissingArgument(cmd, "an amount"))?;
    let amount = parse_amount(amount)?;
    let account = parse_optional_account(cmd, &args[1..])?;
    Ok((amount, account))
}

/// Format: TRANSFER <amount> <to> [from]
fn parse_transfer(args: &[&str]) -> Result<Command, ParseError> {
    if args.len() < 2 {
        return Err(ParseError::MissingArgument(
            "TRANSFER",
            "an amount and a target account",
        ));
    }
    let amount = parse_amount(args[0])?;
    let to = parse_account(args[1])?;
    let from = parse_optional_account("TRANSFER", &args[2..])?;
    Ok(Command::Transfer { amount, to, from })
}

/// Format: OPEN <last_name> <first_name> <credit_rating> | OPEN <holder_id>
fn parse_open(args: &[&str]) -> Result<Command, ParseError> {
    match args {
        [holder] => holder
            .parse::<usize>()
            .map(|id| Command::OpenForHolder {
                holder: HolderId(id),
            })
            .map_err(|_| ParseError::InvalidHolder(holder.to_string())),
        [last_name, first_name, rating] => {
            let credit_rating = rating
                .parse::<i32>()
                .map_err(|_| ParseError::InvalidCreditRating(rating.to_string()))?;
            Ok(Command::Open {
                last_name: last_name.to_string(),
                first_name: first_name.to_string(),
                credit_rating,
            })
        }
        [_, _, _, ..] => Err(ParseError::TooManyArguments("OPEN")),
        _ => Err(ParseError::MissingArgument(
            "OPEN",
            "last name, first name and credit rating",
        )),
    }
}

fn parse_optional_account(
    cmd: &'static str,
    args: &[&str],
) -> Result<Option<AccountId>, ParseError> {
    match args {
        [] => Ok(None),
        [account] => parse_account(account).map(Some),
        _ => Err(ParseError::TooManyArguments(cmd)),
    }
}

fn no_arguments(cmd: &'static str, args: &[&str], command: Command) -> Result<Command, ParseError> {
    if args.is_empty() {
        Ok(command)
    } else {
        Err(ParseError::TooManyArguments(cmd))
    }
}

/// Amounts are parsed as-is; range checks belong to the ledger.
fn parse_amount(s: &str) -> Result<f64, ParseError> {
    s.parse::<f64>()
        .map_err(|_| ParseError::InvalidAmount(s.to_string()))
}

fn parse_account(s: &str) -> Result<AccountId, ParseError> {
    s.parse::<u64>()
        .map(AccountId)
        .map_err(|_| ParseError::InvalidAccount(s.to_string()))
}

/// Find \n in buffer
fn find_lf(buffer: &[u8]) -> Option<usize> {
    buffer.iter().position(|&b| b == b'\n')
}

/// Response generator for the bank protocol
pub struct Response;

impl Response {
    pub fn deposited() -> &'static [u8] {
        b"Deposit successful.\r\n"
    }

    pub fn withdrawn() -> &'static [u8] {
        b"Withdrawal successful.\r\n"
    }

    pub fn transferred() -> &'static [u8] {
        b"Transfer successful.\r\n"
    }

    pub fn closed() -> &'static [u8] {
        b"Account closed.\r\n"
    }

    /// Reply to an unrecognized command
    pub fn invalid_operation() -> &'static [u8] {
        b"Invalid operation.\r\n"
    }

    pub fn ok() -> &'static [u8] {
        b"OK\r\n"
    }

    /// Balance with six decimal places
    pub fn balance(balance: f64) -> BytesMut {
        BytesMut::from(format!("Balance: {balance:.6}\r\n").as_bytes())
    }

    pub fn opened(account: AccountId) -> BytesMut {
        BytesMut::from(format!("Opened account {account}.\r\n").as_bytes())
    }

    pub fn stats(stats: &LedgerStats) -> BytesMut {
        let mut response = BytesMut::new();
        response.extend_from_slice(&Self::stat("accounts", &stats.account_count.to_string()));
        response.extend_from_slice(&Self::stat(
            "open_accounts",
            &stats.open_account_count.to_string(),
        ));
        response.extend_from_slice(&Self::stat("holders", &stats.holder_count.to_string()));
        response.extend_from_slice(&Self::stat(
            "total_balance",
            &format!("{:.6}", stats.total_balance),
        ));
        response.extend_from_slice(b"END\r\n");
        response
    }

    /// Account and holder details, from one snapshot of the account
    pub fn info(account: &Account, holder: &AccountHolder) -> BytesMut {
        let snapshot = account.snapshot();
        let closed = snapshot
            .closed_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());

        let mut response = BytesMut::new();
        response.extend_from_slice(&Self::stat("account", &account.id().to_string()));
        response.extend_from_slice(&Self::stat(
            "holder",
            &format!("{} {}", holder.last_name(), holder.first_name()),
        ));
        response.extend_from_slice(&Self::stat("holder_id", &account.holder().to_string()));
        response.extend_from_slice(&Self::stat(
            "credit_rating",
            &holder.credit_rating().to_string(),
        ));
        response.extend_from_slice(&Self::stat(
            "registered",
            &holder.registered_at().to_rfc3339(),
        ));
        response.extend_from_slice(&Self::stat("opened", &account.opened_at().to_rfc3339()));
        response.extend_from_slice(&Self::stat("closed", &closed));
        response.extend_from_slice(&Self::stat(
            "balance",
            &format!("{:.6}", snapshot.balance),
        ));
        response.extend_from_slice(&Self::stat(
            "operations",
            &snapshot.operations.len().to_string(),
        ));
        response.extend_from_slice(b"END\r\n");
        response
    }

    /// One `OP` line per logged operation, oldest first
    ///
    /// `OP <seq> <kind> <amount> <status> <created> [counterparty]`
    pub fn history(operations: &[Operation]) -> BytesMut {
        let mut response = BytesMut::new();
        for (seq, op) in operations.iter().enumerate() {
            let mut line = format!(
                "OP {} {} {:.6} {} {}",
                seq + 1,
                op.kind().as_str(),
                op.amount(),
                op.status().as_str(),
                op.created_at().to_rfc3339()
            );
            if let Some(counterparty) = op.counterparty() {
                line.push_str(&format!(" {counterparty}"));
            }
            line.push_str("\r\n");
            response.extend_from_slice(line.as_bytes());
        }
        response.extend_from_slice(b"END\r\n");
        response
    }

    fn stat(name: &str, value: &str) -> BytesMut {
        BytesMut::from(format!("STAT {name} {value}\r\n").as_bytes())
    }

    /// Ledger failure
    pub fn error(msg: &str) -> BytesMut {
        BytesMut::from(format!("ERROR {msg}\r\n").as_bytes())
    }

    /// Malformed request
    pub fn client_error(msg: &str) -> BytesMut {
        BytesMut::from(format!("CLIENT_ERROR {msg}\r\n").as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(input: &[u8]) -> (Command, usize) {
        match parse(input) {
            ParseResult::Complete(command, consumed) => (command, consumed),
            other => panic!("unexpected: {:?}", other),
        }
    }

    fn parse_err(input: &[u8]) -> ParseError {
        match parse(input) {
            ParseResult::Error(e, _) => e,
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_parse_deposit() {
        let (command, consumed) = parse_ok(b"DEPOSIT 100.50\r\n");
        assert_eq!(
            command,
            Command::Deposit {
                amount: 100.5,
                account: None
            }
        );
        assert_eq!(consumed, 16);

        let (command, _) = parse_ok(b"deposit 5 3\n");
        assert_eq!(
            command,
            Command::Deposit {
                amount: 5.0,
                account: Some(AccountId(3))
            }
        );
    }

    #[test]
    fn test_parse_withdraw() {
        let (command, consumed) = parse_ok(b"Withdraw 20\n");
        assert_eq!(
            command,
            Command::Withdraw {
                amount: 20.0,
                account: None
            }
        );
        assert_eq!(consumed, 12);
    }

    #[test]
    fn test_parse_balance() {
        assert_eq!(parse_ok(b"BALANCE\r\n").0, Command::Balance { account: None });
        assert_eq!(
            parse_ok(b"BALANCE 2\r\n").0,
            Command::Balance {
                account: Some(AccountId(2))
            }
        );
    }

    #[test]
    fn test_parse_transfer() {
        assert_eq!(
            parse_ok(b"TRANSFER 15 2\r\n").0,
            Command::Transfer {
                amount: 15.0,
                to: AccountId(2),
                from: None
            }
        );
        assert_eq!(
            parse_ok(b"TRANSFER 15 2 1\r\n").0,
            Command::Transfer {
                amount: 15.0,
                to: AccountId(2),
                from: Some(AccountId(1))
            }
        );
        assert!(matches!(
            parse_err(b"TRANSFER 15\r\n"),
            ParseError::MissingArgument("TRANSFER", _)
        ));
    }

    #[test]
    fn test_parse_open() {
        assert_eq!(
            parse_ok(b"OPEN Ivanov Ivan 700\r\n").0,
            Command::Open {
                last_name: "Ivanov".to_string(),
                first_name: "Ivan".to_string(),
                credit_rating: 700
            }
        );
        assert_eq!(
            parse_ok(b"OPEN 0\r\n").0,
            Command::OpenForHolder {
                holder: HolderId(0)
            }
        );
        assert_eq!(
            parse_err(b"OPEN Ivanov\r\n"),
            ParseError::InvalidHolder("Ivanov".to_string())
        );
        assert!(matches!(
            parse_err(b"OPEN Ivanov Ivan\r\n"),
            ParseError::MissingArgument("OPEN", _)
        ));
        assert_eq!(
            parse_err(b"OPEN Ivanov Ivan high\r\n"),
            ParseError::InvalidCreditRating("high".to_string())
        );
        assert_eq!(
            parse_err(b"OPEN a b 1 2\r\n"),
            ParseError::TooManyArguments("OPEN")
        );
    }

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(parse_ok(b"CLOSE\r\n").0, Command::Close { account: None });
        assert_eq!(
            parse_ok(b"info 3\r\n").0,
            Command::Info {
                account: Some(AccountId(3))
            }
        );
        assert_eq!(parse_ok(b"HISTORY\r\n").0, Command::History { account: None });
        assert_eq!(parse_ok(b"stats\r\n").0, Command::Stats);
        assert_eq!(parse_ok(b"QUIT\r\n").0, Command::Quit);
        assert_eq!(parse_err(b"QUIT now\r\n"), ParseError::TooManyArguments("QUIT"));
    }

    #[test]
    fn test_invalid_arguments() {
        assert_eq!(
            parse_err(b"DEPOSIT abc\r\n"),
            ParseError::InvalidAmount("abc".to_string())
        );
        assert_eq!(
            parse_err(b"DEPOSIT 1 -2\r\n"),
            ParseError::InvalidAccount("-2".to_string())
        );
        assert_eq!(
            parse_err(b"WITHDRAW 1 2 3\r\n"),
            ParseError::TooManyArguments("WITHDRAW")
        );
        assert!(matches!(
            parse_err(b"DEPOSIT\r\n"),
            ParseError::MissingArgument("DEPOSIT", _)
        ));
    }

    #[test]
    fn test_negative_amount_is_parsed() {
        // The ledger decides whether an amount is acceptable
        assert_eq!(
            parse_ok(b"DEPOSIT -5\r\n").0,
            Command::Deposit {
                amount: -5.0,
                account: None
            }
        );
    }

    #[test]
    fn test_unknown_command() {
        assert_eq!(
            parse_err(b"FOO 1\r\n"),
            ParseError::UnknownCommand("FOO".to_string())
        );
        assert_eq!(parse_err(b"\r\n"), ParseError::UnknownCommand(String::new()));
    }

    #[test]
    fn test_incomplete() {
        assert!(matches!(parse(b"DEPOSIT 10"), ParseResult::Incomplete));
        assert!(matches!(parse(b""), ParseResult::Incomplete));
    }

    #[test]
    fn test_line_too_long() {
        let mut line = vec![b'A'; MAX_LINE_LENGTH + 1];
        line.extend_from_slice(b"\r\n");
        match parse(&line) {
            ParseResult::Error(ParseError::LineTooLong, consumed) => {
                assert_eq!(consumed, line.len())
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_consumes_only_first_line() {
        let (command, consumed) = parse_ok(b"BALANCE\r\nDEPOSIT 1\r\n");
        assert_eq!(command, Command::Balance { account: None });
        assert_eq!(consumed, 9);
    }

    #[test]
    fn test_responses() {
        assert_eq!(&Response::balance(100.5)[..], b"Balance: 100.500000\r\n");
        assert_eq!(&Response::opened(AccountId(4))[..], b"Opened account 4.\r\n");
        assert_eq!(
            &Response::error("insufficient funds")[..],
            b"ERROR insufficient funds\r\n"
        );

        let stats = LedgerStats {
            account_count: 2,
            open_account_count: 1,
            holder_count: 2,
            total_balance: 3.25,
        };
        assert_eq!(
            &Response::stats(&stats)[..],
            b"STAT accounts 2\r\nSTAT open_accounts 1\r\nSTAT holders 2\r\nSTAT total_balance 3.250000\r\nEND\r\n"
                .as_slice()
        );
    }
}
