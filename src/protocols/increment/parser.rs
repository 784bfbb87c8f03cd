//! Increment protocol parser.

/// Parsed increment command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Reply with the value plus one.
    Increment(i64),
    /// Quit command.
    Quit,
}

/// Parse result.
#[derive(Debug)]
pub enum ParseResult {
    /// Successfully parsed command.
    Complete(Command),
    /// Line is not an integer.
    InvalidNumber,
}

/// Parse a single line (line ending already stripped or not).
pub fn parse(line: &str) -> ParseResult {
    let trimmed = line.trim();

    if trimmed.eq_ignore_ascii_case("QUIT") {
        return ParseResult::Complete(Command::Quit);
    }

    match trimmed.parse::<i64>() {
        Ok(value) => ParseResult::Complete(Command::Increment(value)),
        Err(_) => ParseResult::InvalidNumber,
    }
}

/// Format the reply to an increment request.
pub fn response_increment(value: i64) -> Vec<u8> {
    format!("{}\r\n", value.wrapping_add(1)).into_bytes()
}

/// Format an error response.
pub fn response_error() -> &'static [u8] {
    b"ERROR invalid number\r\n"
}

/// Response to a request line over the length limit.
pub fn response_line_too_long() -> &'static [u8] {
    b"ERROR line too long\r\n"
}
