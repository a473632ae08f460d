//! # RESP2 Encoding and Parsing
//!
//! Purpose: Frame outgoing commands and decode replies for both the data
//! pools and the sentinel queries.
//!
//! ## Design Principles
//! 1. **Top-Down Parsing**: Replies are decoded recursively, one frame per call.
//! 2. **Buffer Reuse**: Callers own the line buffer so hot paths avoid allocation.
//! 3. **Binary-Safe**: Bulk strings are kept as raw bytes until a caller asks
//!    for text.
//! 4. **Fail Fast**: Invalid framing is reported with the offending part.

use std::io::BufRead;

use crate::client::{ClientError, ClientResult};

/// Largest bulk string accepted, matching the server's own 512 MiB limit.
pub const MAX_BULK_LEN: usize = 512 * 1024 * 1024;

/// Largest element count accepted for one array frame.
pub const MAX_ARRAY_LEN: usize = 1 << 24;

/// Elements preallocated for an array before any of them has been read.
const ARRAY_PREALLOC: usize = 1024;

/// Decoded RESP2 reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    /// `+OK` style status replies.
    Simple(Vec<u8>),
    /// `-ERR ...` replies.
    Error(Vec<u8>),
    /// `:42` replies.
    Integer(i64),
    /// `$n` bulk strings, `None` for the null bulk.
    Bulk(Option<Vec<u8>>),
    /// `*n` arrays. A null array decodes as empty.
    Array(Vec<RespValue>),
}

impl RespValue {
    /// Returns the UTF-8 text of a status or non-null bulk reply.
    pub fn into_text(self) -> ClientResult<String> {
        let raw = match self {
            RespValue::Simple(raw) | RespValue::Bulk(Some(raw)) => raw,
            RespValue::Error(message) => return Err(ClientError::Server { message }),
            _ => return Err(ClientError::UnexpectedResponse),
        };
        String::from_utf8(raw).map_err(|_| ClientError::Protocol("reply is not valid utf-8"))
    }

    /// Decodes an array reply whose elements are all text.
    ///
    /// Integers, nulls and nested arrays are rejected rather than coerced, so
    /// callers can treat "not a list of strings" as a single failure case.
    pub fn into_strings(self) -> ClientResult<Vec<String>> {
        match self {
            RespValue::Array(items) => items.into_iter().map(RespValue::into_text).collect(),
            RespValue::Error(message) => Err(ClientError::Server { message }),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }
}

/// Appends `args` to `out` as a RESP2 array of bulk strings.
pub fn encode_command(args: &[&[u8]], out: &mut Vec<u8>) {
    write_header(out, b'*', args.len());
    for arg in args {
        write_header(out, b'$', arg.len());
        out.extend_from_slice(arg);
        out.extend_from_slice(b"\r\n");
    }
}

/// Reads exactly one reply frame from `reader`.
pub fn read_response<R: BufRead>(reader: &mut R, line_buf: &mut Vec<u8>) -> ClientResult<RespValue> {
    read_line(reader, line_buf)?;
    let (&marker, rest) = line_buf
        .split_first()
        .ok_or(ClientError::Protocol("empty reply line"))?;

    match marker {
        b'+' => Ok(RespValue::Simple(rest.to_vec())),
        b'-' => Ok(RespValue::Error(rest.to_vec())),
        b':' => parse_length(rest).map(RespValue::Integer),
        b'$' => {
            let len = parse_length(rest)?;
            read_bulk(reader, len)
        }
        b'*' => {
            let len = parse_length(rest)?;
            read_array(reader, len, line_buf)
        }
        _ => Err(ClientError::Protocol("unknown reply marker")),
    }
}

fn read_bulk<R: BufRead>(reader: &mut R, len: i64) -> ClientResult<RespValue> {
    if len < 0 {
        return Ok(RespValue::Bulk(None));
    }

    let len = usize::try_from(len)
        .ok()
        .filter(|&len| len <= MAX_BULK_LEN)
        .ok_or(ClientError::Protocol("bulk string length out of range"))?;
    let framed = len
        .checked_add(2)
        .ok_or(ClientError::Protocol("bulk string length out of range"))?;

    // Payload plus trailing CRLF in one read.
    let mut data = vec![0u8; framed];
    reader.read_exact(&mut data)?;
    if !data.ends_with(b"\r\n") {
        return Err(ClientError::Protocol("bulk string missing crlf"));
    }
    data.truncate(len);
    Ok(RespValue::Bulk(Some(data)))
}

fn read_array<R: BufRead>(
    reader: &mut R,
    len: i64,
    line_buf: &mut Vec<u8>,
) -> ClientResult<RespValue> {
    // Negative counts are the null array.
    let count = usize::try_from(len).unwrap_or(0);
    if count > MAX_ARRAY_LEN {
        return Err(ClientError::Protocol("array length out of range"));
    }
    // Elements arrive one by one; grow as they do.
    let mut items = Vec::with_capacity(count.min(ARRAY_PREALLOC));
    for _ in 0..count {
        items.push(read_response(reader, line_buf)?);
    }
    Ok(RespValue::Array(items))
}

fn read_line<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>) -> ClientResult<()> {
    buf.clear();
    if reader.read_until(b'\n', buf)? == 0 {
        return Err(ClientError::Protocol("connection closed mid-reply"));
    }
    if !buf.ends_with(b"\r\n") {
        return Err(ClientError::Protocol("reply line missing crlf"));
    }
    buf.truncate(buf.len() - 2);
    Ok(())
}

fn parse_length(data: &[u8]) -> ClientResult<i64> {
    std::str::from_utf8(data)
        .ok()
        .and_then(|text| text.parse::<i64>().ok())
        .ok_or(ClientError::Protocol("invalid integer in reply"))
}

fn write_header(out: &mut Vec<u8>, marker: u8, len: usize) {
    out.push(marker);
    out.extend_from_slice(len.to_string().as_bytes());
    out.extend_from_slice(b"\r\n");
}
