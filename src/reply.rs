//! Provides a type representing a reply in the RESP-like protocol, and the decoder that reads
//! one reply out of a byte buffer.
//!
//! Replies are line oriented. The first byte of the first line tags the reply type:
//!
//! ```text
//! +OK\r\n                  status
//! -ERR no such key\r\n     error
//! :1000\r\n                integer
//! $5\r\nhello              bulk
//! *2\r\n$1\r\na$1\r\nb     array of bulks
//! ```

use atoi::FromRadix10SignedChecked;
use bytes::{Buf, Bytes};
use std::convert::TryInto;
use std::fmt;
use std::io::Cursor;
use std::num::TryFromIntError;
use std::string::FromUtf8Error;

/// A single decoded reply.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// `+` reply.
    Status(String),
    /// `:` reply.
    Integer(i64),
    /// `$` reply. `None` is the nil bulk.
    Bulk(Option<Bytes>),
    /// `*` reply. Every element is a bulk and may be nil on its own.
    Array(Vec<Option<Bytes>>),
    /// `-` reply, reported by the server.
    Error(String),
}

/// How a checked reply ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tail {
    /// The reply was terminated, or more data follows it in the buffer.
    Closed,
    /// The reply ends with a bulk payload at the very end of the buffer. Its `\r\n` may still
    /// arrive ahead of the next reply.
    OpenBulk,
}

/// Error encountered while decoding a reply.
#[derive(Debug)]
pub enum Error {
    /// Not enough data has been buffered to decode a whole reply.
    Incomplete,
    /// The buffered data is not a valid reply.
    Invalid(String),
}

const ERROR_INT_REPLY: &str = "Int reply is not a number";
const ERROR_ARRAY_LEN: &str = "MultiBulk reply expected a number";
const ERROR_BULK_PREFIX: &str = "Expecting Prefix '$'";
const ERROR_BULK_LEN: &str = "Bulk reply expected a non-negative length";
const ERROR_BULK_TOO_LONG: &str = "Bulk reply length exceeds 512 MiB";

/// Largest bulk payload accepted, the same ceiling as Redis' `proto-max-bulk-len` default.
pub const MAX_BULK_LEN: usize = 512 * 1024 * 1024;

/// Prefix of a server error line whose message should be unwrapped.
const ERR_PREFIX: &[u8] = b"-ERR ";

impl Reply {
    /// Checks if an entire reply can be decoded from `src`.
    ///
    /// On success the cursor is left right after the reply, so its position is the number of
    /// bytes the reply spans.
    pub fn check(src: &mut Cursor<&[u8]>) -> Result<Tail, Error> {
        let line = eat_line(src)?;

        match line.first() {
            Some(b'+') | Some(b'-') => Ok(Tail::Closed),
            Some(b':') => parse_decimal::<i64>(&line[1..])
                .map(|_| Tail::Closed)
                .ok_or_else(|| ERROR_INT_REPLY.into()),
            Some(b'*') => {
                let len = array_len(&line[1..])?;
                let mut tail = Tail::Closed;

                for _ in 0..len {
                    let header = eat_line(src)?;
                    tail = eat_bulk(src, header)?.1;
                }

                Ok(tail)
            }
            _ => eat_bulk(src, line).map(|(_, tail)| tail),
        }
    }

    /// Parses one reply from `src`.
    ///
    /// The buffer should be validated with `check()` first, otherwise `Incomplete` may be
    /// returned halfway through an array.
    pub fn parse(src: &mut Cursor<&[u8]>) -> Result<Reply, Error> {
        let line = eat_line(src)?;

        match line.first() {
            // "+OK\r\n"
            Some(b'+') => {
                let text = trim_end(&line[1..]).to_vec();
                Ok(Reply::Status(String::from_utf8(text)?))
            }
            // "-ERR message\r\n" or "-message\r\n"
            Some(b'-') => {
                let text = if line.starts_with(ERR_PREFIX) {
                    &line[ERR_PREFIX.len()..]
                } else {
                    &line[1..]
                };

                Ok(Reply::Error(String::from_utf8(trim(text).to_vec())?))
            }
            // ":1000\r\n"
            Some(b':') => parse_decimal(&line[1..])
                .map(Reply::Integer)
                .ok_or_else(|| ERROR_INT_REPLY.into()),
            // "*2\r\n$1\r\na$1\r\nb"
            //
            // Elements are always read as bulks, nested arrays are not part of the protocol.
            Some(b'*') => {
                let len = array_len(&line[1..])?;
                let mut out = Vec::with_capacity(len.min(1024));

                for _ in 0..len {
                    let header = eat_line(src)?;
                    let (data, _) = eat_bulk(src, header)?;
                    out.push(Some(Bytes::copy_from_slice(data)));
                }

                Ok(Reply::Array(out))
            }
            // "$5\r\nhello". Any other header ends up here and is rejected by `eat_bulk`.
            _ => {
                let (data, _) = eat_bulk(src, line)?;
                Ok(Reply::Bulk(Some(Bytes::copy_from_slice(data))))
            }
        }
    }
}

/// Reads the payload of a bulk whose header line is `header`.
///
/// The payload is not required to be followed by a line terminator. When one is already
/// buffered right after the payload it is consumed with it.
fn eat_bulk<'a>(src: &mut Cursor<&'a [u8]>, header: &[u8]) -> Result<(&'a [u8], Tail), Error> {
    let len = match header.split_first() {
        Some((b'$', rest)) => parse_decimal::<i64>(rest)
            .filter(|len| *len >= 0)
            .ok_or(ERROR_BULK_LEN)?,
        _ => return Err(ERROR_BULK_PREFIX.into()),
    };
    let len: usize = len.try_into()?;

    if len > MAX_BULK_LEN {
        return Err(ERROR_BULK_TOO_LONG.into());
    }

    if src.remaining() < len {
        return Err(Error::Incomplete);
    }

    let buf: &'a [u8] = *src.get_ref();
    let start = src.position() as usize;
    let data = &buf[start..start + len];
    src.advance(len);

    Ok((data, eat_terminator(src)?))
}

/// Consumes a `\r\n` or `\n` sitting at the cursor, if any.
fn eat_terminator(src: &mut Cursor<&[u8]>) -> Result<Tail, Error> {
    let n = match src.chunk() {
        [] => return Ok(Tail::OpenBulk),
        [b'\r', b'\n', ..] => 2,
        [b'\n', ..] => 1,
        // The `\n` may still be on its way.
        [b'\r'] => return Err(Error::Incomplete),
        _ => 0,
    };

    src.advance(n);
    Ok(Tail::Closed)
}

/// Returns the next line without its terminator and moves the cursor past it.
///
/// Lines end with `\r\n`. A bare `\n` is tolerated.
fn eat_line<'a>(src: &mut Cursor<&'a [u8]>) -> Result<&'a [u8], Error> {
    let buf: &'a [u8] = *src.get_ref();
    let start = src.position() as usize;

    match buf[start..].iter().position(|b| *b == b'\n') {
        Some(offset) => {
            let end = start + offset;
            src.set_position((end + 1) as u64);

            let line = &buf[start..end];
            Ok(line.strip_suffix(b"\r").unwrap_or(line))
        }
        None => Err(Error::Incomplete),
    }
}

fn array_len(text: &[u8]) -> Result<usize, Error> {
    let len = parse_decimal::<i64>(text)
        .filter(|len| *len >= 0)
        .ok_or(ERROR_ARRAY_LEN)?;

    Ok(len.try_into()?)
}

/// Parses a signed base-10 integer, ignoring surrounding whitespace. Trailing garbage is
/// rejected.
fn parse_decimal<I: FromRadix10SignedChecked>(text: &[u8]) -> Option<I> {
    let text = trim(text);

    if !text.iter().any(u8::is_ascii_digit) {
        return None;
    }

    match I::from_radix_10_signed_checked(text) {
        (Some(n), used) if used == text.len() => Some(n),
        _ => None,
    }
}

fn trim(text: &[u8]) -> &[u8] {
    let start = text
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(text.len());

    trim_end(&text[start..])
}

fn trim_end(text: &[u8]) -> &[u8] {
    let end = text
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(0, |i| i + 1);

    &text[..end]
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Incomplete => "stream ended early".fmt(fmt),
            Error::Invalid(msg) => msg.fmt(fmt),
        }
    }
}

impl From<String> for Error {
    fn from(src: String) -> Error {
        Error::Invalid(src)
    }
}

impl From<&str> for Error {
    fn from(src: &str) -> Error {
        src.to_string().into()
    }
}

impl From<FromUtf8Error> for Error {
    fn from(_src: FromUtf8Error) -> Error {
        "reply text is not valid UTF-8".into()
    }
}

impl From<TryFromIntError> for Error {
    fn from(_src: TryFromIntError) -> Error {
        "reply length does not fit in memory".into()
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Reply::Status(status) => status.fmt(fmt),
            Reply::Error(msg) => write!(fmt, "error: {}", msg),
            Reply::Integer(num) => num.fmt(fmt),
            Reply::Bulk(data) => fmt_bulk(data.as_ref(), fmt),
            Reply::Array(parts) => {
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(fmt, " ")?;
                    }
                    fmt_bulk(part.as_ref(), fmt)?;
                }

                Ok(())
            }
        }
    }
}

fn fmt_bulk(data: Option<&Bytes>, fmt: &mut fmt::Formatter) -> fmt::Result {
    use std::fmt::Display;
    use std::str;

    match data {
        Some(data) => match str::from_utf8(data) {
            Ok(string) => string.fmt(fmt),
            Err(_) => write!(fmt, "{:?}", data),
        },
        None => "(nil)".fmt(fmt),
    }
}
