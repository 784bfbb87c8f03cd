//! Increment protocol handler.

use super::parser::{self, Command, ParseResult};
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader,
};
use tracing::{trace, warn};

/// Longest request line accepted, excluding the line ending.
const MAX_LINE_LENGTH: usize = 64;

/// Most bytes read for one line: the limit plus `\r\n`.
const READ_LIMIT: u64 = MAX_LINE_LENGTH as u64 + 2;

/// Handle an increment protocol connection.
///
/// Reads one integer per line and answers with that integer plus one.
/// No ledger interaction.
pub async fn handle_connection<S>(stream: S) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(reader);
    let mut line = Vec::with_capacity(READ_LIMIT as usize);

    loop {
        line.clear();

        let n = (&mut reader)
            .take(READ_LIMIT)
            .read_until(b'\n', &mut line)
            .await?;
        if n == 0 {
            // EOF
            break;
        }

        if n as u64 == READ_LIMIT && line.last() != Some(&b'\n') {
            warn!(limit = MAX_LINE_LENGTH, "Request line too long");
            writer.write_all(parser::response_line_too_long()).await?;
            if !discard_line(&mut reader).await? {
                break;
            }
            continue;
        }

        let request = match std::str::from_utf8(&line) {
            Ok(request) => request,
            Err(_) => {
                writer.write_all(parser::response_error()).await?;
                continue;
            }
        };
        trace!(request = request.trim_end(), "Increment request");

        match parser::parse(request) {
            ParseResult::Complete(Command::Increment(value)) => {
                writer.write_all(&parser::response_increment(value)).await?;
            }
            ParseResult::Complete(Command::Quit) => {
                writer.write_all(b"OK\r\n").await?;
                break;
            }
            ParseResult::InvalidNumber => {
                writer.write_all(parser::response_error()).await?;
            }
        }
    }

    Ok(())
}

/// Skip input through the next newline. Returns `false` on EOF.
async fn discard_line<R>(reader: &mut R) -> std::io::Result<bool>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let (consumed, found) = {
            let available = reader.fill_buf().await?;
            if available.is_empty() {
                return Ok(false);
            }
            match available.iter().position(|&b| b == b'\n') {
                Some(pos) => (pos + 1, true),
                None => (available.len(), false),
            }
        };
        reader.consume(consumed);

        if found {
            return Ok(true);
        }
    }
}
