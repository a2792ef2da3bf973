//! Streaming RESP2 parser.
//!
//! [`parse`] takes a byte buffer and returns `Ok((RespValue, bytes_consumed))`,
//! `Err(Incomplete)` when more data is needed, or `Err(Protocol(…))` on
//! malformed input. Bulk strings are sliced out of the `Bytes` buffer
//! without copying.

use bytes::Bytes;
use memchr::memchr;

use crate::error::{RedbatchError, Result};
use crate::resp::types::RespValue;

/// Nesting limit for arrays. Replies from the commands this crate issues
/// are at most two levels deep (`EXEC` results containing arrays).
const MAX_DEPTH: usize = 32;

/// Parse one RESP value from the front of `buf`.
pub fn parse(buf: &Bytes) -> Result<(RespValue, usize)> {
    parse_at(buf, 0, 0)
}

/// Convenience wrapper: parse from a byte slice (copies into `Bytes` first).
pub fn parse_slice(buf: &[u8]) -> Result<(RespValue, usize)> {
    parse(&Bytes::copy_from_slice(buf))
}

fn parse_at(buf: &Bytes, pos: usize, depth: usize) -> Result<(RespValue, usize)> {
    if pos >= buf.len() {
        return Err(RedbatchError::Incomplete);
    }
    let (line, next) = read_line(buf, pos + 1)?;

    match buf[pos] {
        b'+' => Ok((RespValue::SimpleString(utf8(line, "simple string")?), next)),
        b'-' => Ok((RespValue::Error(utf8(line, "error")?), next)),
        b':' => Ok((RespValue::Integer(parse_int_from_bytes(line)?), next)),
        b'$' => {
            let len = parse_int_from_bytes(line)?;
            if len < 0 {
                return Ok((RespValue::Null, next));
            }
            let end = next
                .checked_add(len as usize)
                .filter(|end| *end <= usize::MAX - 2)
                .ok_or_else(|| RedbatchError::Protocol(format!("bulk length {len} too large")))?;
            if buf.len() < end + 2 {
                return Err(RedbatchError::Incomplete);
            }
            if &buf[end..end + 2] != b"\r\n" {
                return Err(RedbatchError::Protocol(
                    "bulk string not terminated by \\r\\n".into(),
                ));
            }
            Ok((RespValue::BulkString(buf.slice(next..end)), end + 2))
        }
        b'*' => {
            let count = parse_int_from_bytes(line)?;
            if count < 0 {
                return Ok((RespValue::Null, next));
            }
            if depth >= MAX_DEPTH {
                return Err(RedbatchError::Protocol(format!(
                    "array nesting deeper than {MAX_DEPTH}"
                )));
            }
            // Never trust the announced count for preallocation.
            let mut elements = Vec::with_capacity((count as usize).min(1024));
            let mut cursor = next;
            for _ in 0..count {
                let (value, end) = parse_at(buf, cursor, depth + 1)?;
                elements.push(value);
                cursor = end;
            }
            Ok((RespValue::Array(elements), cursor))
        }
        other => Err(RedbatchError::Protocol(format!(
            "unknown RESP type byte: 0x{other:02x}"
        ))),
    }
}

// ── Helpers ────────────────────────────────────────────────────────

/// Read the line starting at `buf[offset]` up to `\r\n`.
/// Returns `(line_bytes, index_after_crlf)`.
#[inline]
fn read_line(buf: &[u8], offset: usize) -> Result<(&[u8], usize)> {
    let cr = match memchr(b'\r', &buf[offset.min(buf.len())..]) {
        Some(rel) => offset + rel,
        None => return Err(RedbatchError::Incomplete),
    };
    match buf.get(cr + 1) {
        None => Err(RedbatchError::Incomplete),
        Some(b'\n') => Ok((&buf[offset..cr], cr + 2)),
        Some(_) => Err(RedbatchError::Protocol("expected \\n after \\r".into())),
    }
}

fn utf8(line: &[u8], what: &str) -> Result<String> {
    std::str::from_utf8(line)
        .map(str::to_string)
        .map_err(|e| RedbatchError::Protocol(format!("invalid UTF-8 in {what}: {e}")))
}

/// Parse a signed decimal integer without allocating.
fn parse_int_from_bytes(bytes: &[u8]) -> Result<i64> {
    let (negative, digits) = match bytes.first() {
        Some(b'-') => (true, &bytes[1..]),
        Some(b'+') => (false, &bytes[1..]),
        Some(_) => (false, bytes),
        None => return Err(RedbatchError::Protocol("empty integer".into())),
    };
    if digits.is_empty() {
        return Err(RedbatchError::Protocol("integer has no digits".into()));
    }

    // Accumulate as negative so i64::MIN parses without overflow.
    let mut n: i64 = 0;
    for &b in digits {
        if !b.is_ascii_digit() {
            return Err(RedbatchError::Protocol(format!(
                "invalid byte in integer: 0x{b:02x}"
            )));
        }
        n = n
            .checked_mul(10)
            .and_then(|n| n.checked_sub((b - b'0') as i64))
            .ok_or_else(|| RedbatchError::Protocol("integer overflow".into()))?;
    }
    if negative {
        Ok(n)
    } else {
        n.checked_neg()
            .ok_or_else(|| RedbatchError::Protocol("integer overflow".into()))
    }
}

// ── Tests ──────────────────────────────────────────────────────────
