//! RESP encoding and decoding
//!
//! Only what a single request/reply exchange needs: commands go out as arrays
//! of bulk strings, replies are decoded from a buffered reader.

use std::io::{self, BufRead, Read};

/// Decoded RESP reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    /// Simple string (+OK\r\n)
    SimpleString(String),
    /// Error (-ERR message\r\n)
    Error(String),
    /// Integer (:1000\r\n)
    Integer(i64),
    /// Bulk string ($6\r\nfoobar\r\n)
    BulkString(Vec<u8>),
    /// Array (*2\r\n...)
    Array(Vec<RespValue>),
    /// Null bulk string or null array
    Null,
}

impl RespValue {
    pub fn is_error(&self) -> bool {
        matches!(self, RespValue::Error(_))
    }

    /// Textual content of a simple or bulk string
    pub fn into_string(self) -> Option<String> {
        match self {
            RespValue::SimpleString(s) => Some(s),
            RespValue::BulkString(b) => Some(String::from_utf8_lossy(&b).into_owned()),
            _ => None,
        }
    }
}

/// Encode a command as a RESP array of bulk strings
pub fn encode_command(args: &[&str]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(16 + args.iter().map(|a| a.len() + 16).sum::<usize>());
    buf.extend_from_slice(format!("*{}\r\n", args.len()).as_bytes());
    for arg in args {
        buf.extend_from_slice(format!("${}\r\n", arg.len()).as_bytes());
        buf.extend_from_slice(arg.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }
    buf
}

/// Largest bulk string accepted, matching the server's `proto-max-bulk-len`
pub const MAX_BULK_LEN: u64 = 512 * 1024 * 1024;

/// Largest array accepted at any level
pub const MAX_ARRAY_LEN: u64 = 1024 * 1024;

/// Deepest array nesting accepted
pub const MAX_DEPTH: usize = 32;

/// Longest type/length/simple-string line accepted
const MAX_LINE_LEN: u64 = 64 * 1024;

/// Decode the next RESP value from `reader`
///
/// Lengths announced by the peer are bounded before anything is read, and no
/// buffer is sized from them up front, so a hostile or unrelated server can
/// only produce an error.
pub fn decode<R: BufRead>(reader: &mut R) -> io::Result<RespValue> {
    decode_at(reader, 0)
}

fn decode_at<R: BufRead>(reader: &mut R, depth: usize) -> io::Result<RespValue> {
    let mut line = String::new();
    reader.by_ref().take(MAX_LINE_LEN).read_line(&mut line)?;

    if line.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "Connection closed",
        ));
    }
    if !line.ends_with('\n') {
        if line.len() as u64 >= MAX_LINE_LEN {
            return Err(invalid("RESP line too long"));
        }
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "Connection closed mid-line",
        ));
    }

    let line = line.trim_end_matches(&['\r', '\n'][..]);
    if line.is_empty() {
        return Err(invalid("Empty RESP line"));
    }

    let mut chars = line.chars();
    let type_char = chars.next().unwrap_or_default();
    let content = chars.as_str();

    match type_char {
        '+' => Ok(RespValue::SimpleString(content.to_string())),
        '-' => Ok(RespValue::Error(content.to_string())),
        ':' => content
            .parse()
            .map(RespValue::Integer)
            .map_err(|_| invalid("Invalid integer")),
        '$' => {
            let len: i64 = content
                .parse()
                .map_err(|_| invalid("Invalid bulk string length"))?;

            if len < 0 {
                return Ok(RespValue::Null);
            }
            let len = len as u64;
            if len > MAX_BULK_LEN {
                return Err(invalid(format!(
                    "Bulk string length {} exceeds {}",
                    len, MAX_BULK_LEN
                )));
            }

            let mut data = Vec::new();
            reader.by_ref().take(len).read_to_end(&mut data)?;
            if data.len() as u64 != len {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "Connection closed inside bulk string",
                ));
            }

            let mut crlf = [0u8; 2];
            reader.read_exact(&mut crlf)?;

            Ok(RespValue::BulkString(data))
        }
        '*' => {
            let count: i64 = content
                .parse()
                .map_err(|_| invalid("Invalid array length"))?;

            if count < 0 {
                return Ok(RespValue::Null);
            }
            let count = count as u64;
            if count > MAX_ARRAY_LEN {
                return Err(invalid(format!(
                    "Array length {} exceeds {}",
                    count, MAX_ARRAY_LEN
                )));
            }
            if depth >= MAX_DEPTH {
                return Err(invalid(format!("Arrays nested deeper than {}", MAX_DEPTH)));
            }

            let mut elements = Vec::with_capacity(count.min(64) as usize);
            for _ in 0..count {
                elements.push(decode_at(reader, depth + 1)?);
            }
            Ok(RespValue::Array(elements))
        }
        _ => Err(invalid(format!("Invalid RESP type byte: {}", type_char))),
    }
}

fn invalid(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}
