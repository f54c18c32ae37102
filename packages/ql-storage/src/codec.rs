//! Record serialization for scalar tuples.
//!
//! Each value is written as a 1-byte tag followed by its payload at
//! canonical width, big-endian:
//!
//! - `Null`: `0x00`
//! - `Bool`: `0x01` (false) or `0x02` (true)
//! - `Int`: `0x03` + 8 bytes i64
//! - `Uint`: `0x04` + 8 bytes u64
//! - `Float`: `0x05` + 8 bytes IEEE 754 f64
//! - `Complex`: `0x06` + 8 bytes real + 8 bytes imaginary
//! - `String`: `0x07` + 4 bytes length + UTF-8 bytes
//!
//! A record is the concatenation of its encoded values; the empty record is
//! zero bytes long.

use std::cmp::Ordering;

use crate::error::{Result, StorageError};
use crate::types::{widen, Complex128, Value};

mod tags {
    pub const NULL: u8 = 0x00;
    pub const FALSE: u8 = 0x01;
    pub const TRUE: u8 = 0x02;
    pub const INT: u8 = 0x03;
    pub const UINT: u8 = 0x04;
    pub const FLOAT: u8 = 0x05;
    pub const COMPLEX: u8 = 0x06;
    pub const STRING: u8 = 0x07;
}

/// Encodes a tuple of values into one record.
pub fn encode(values: &[Value]) -> Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(values.len() * 9);
    for value in values {
        encode_to(value, &mut buf)?;
    }
    Ok(buf)
}

fn encode_to(value: &Value, buf: &mut Vec<u8>) -> Result<()> {
    match widen(value.clone()) {
        Value::Null => buf.push(tags::NULL),
        Value::Bool(false) => buf.push(tags::FALSE),
        Value::Bool(true) => buf.push(tags::TRUE),
        Value::Int64(v) => {
            buf.push(tags::INT);
            buf.extend_from_slice(&v.to_be_bytes());
        }
        Value::Uint64(v) => {
            buf.push(tags::UINT);
            buf.extend_from_slice(&v.to_be_bytes());
        }
        Value::Float64(v) => {
            buf.push(tags::FLOAT);
            buf.extend_from_slice(&v.to_bits().to_be_bytes());
        }
        Value::Complex128(v) => {
            buf.push(tags::COMPLEX);
            buf.extend_from_slice(&v.re.to_bits().to_be_bytes());
            buf.extend_from_slice(&v.im.to_bits().to_be_bytes());
        }
        Value::String(s) => {
            buf.push(tags::STRING);
            let len = u32::try_from(s.len())
                .map_err(|_| StorageError::RecordTooLarge { len: s.len() })?;
            buf.extend_from_slice(&len.to_be_bytes());
            buf.extend_from_slice(s.as_bytes());
        }
        other => {
            return Err(StorageError::InternalInvariantViolation(format!(
                "value of kind {} survived widening",
                other.kind_name()
            )))
        }
    }
    Ok(())
}

/// Decodes a record into canonical-width values.
pub fn decode(bytes: &[u8]) -> Result<Vec<Value>> {
    let mut values = Vec::new();
    let mut reader = Reader { bytes, pos: 0 };
    while !reader.is_empty() {
        values.push(reader.value()?);
    }
    Ok(values)
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn is_empty(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).filter(|end| *end <= self.bytes.len());
        let end = end.ok_or_else(|| {
            StorageError::CorruptRecord(format!(
                "truncated value at offset {} (need {} bytes, have {})",
                self.pos,
                n,
                self.bytes.len() - self.pos
            ))
        })?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u64(&mut self) -> Result<u64> {
        let mut out = [0u8; 8];
        out.copy_from_slice(self.take(8)?);
        Ok(u64::from_be_bytes(out))
    }

    fn value(&mut self) -> Result<Value> {
        let tag_offset = self.pos;
        let tag = self.take(1)?[0];
        let value = match tag {
            tags::NULL => Value::Null,
            tags::FALSE => Value::Bool(false),
            tags::TRUE => Value::Bool(true),
            tags::INT => Value::Int64(self.u64()? as i64),
            tags::UINT => Value::Uint64(self.u64()?),
            tags::FLOAT => Value::Float64(f64::from_bits(self.u64()?)),
            tags::COMPLEX => {
                let re = f64::from_bits(self.u64()?);
                let im = f64::from_bits(self.u64()?);
                Value::Complex128(Complex128::new(re, im))
            }
            tags::STRING => {
                let mut len = [0u8; 4];
                len.copy_from_slice(self.take(4)?);
                let len = u32::from_be_bytes(len) as usize;
                let raw = self.take(len)?;
                let s = std::str::from_utf8(raw).map_err(|e| {
                    StorageError::CorruptRecord(format!("invalid UTF-8 string: {}", e))
                })?;
                Value::String(s.to_string())
            }
            other => {
                return Err(StorageError::CorruptRecord(format!(
                    "unknown tag 0x{:02x} at offset {}",
                    other, tag_offset
                )))
            }
        };
        Ok(value)
    }
}

/// Orders two encoded records by their decoded tuples.
///
/// Null sorts before bool, bool before numbers, numbers before complex
/// values, complex values before strings. Integers, unsigned integers and
/// floats compare by numeric value. On an equal prefix the shorter tuple
/// sorts first.
pub fn collate(a: &[u8], b: &[u8]) -> Result<Ordering> {
    let a = decode(a)?;
    let b = decode(b)?;
    for (x, y) in a.iter().zip(&b) {
        match compare_values(x, y) {
            Ordering::Equal => continue,
            other => return Ok(other),
        }
    }
    Ok(a.len().cmp(&b.len()))
}

/// Descending counterpart of [`collate`].
pub fn collate_desc(a: &[u8], b: &[u8]) -> Result<Ordering> {
    collate(a, b).map(Ordering::reverse)
}

fn rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Int64(_) | Value::Uint64(_) | Value::Float64(_) => 2,
        Value::Complex128(_) => 3,
        _ => 4,
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Int64(x), Value::Int64(y)) => x.cmp(y),
        (Value::Uint64(x), Value::Uint64(y)) => x.cmp(y),
        (Value::Float64(x), Value::Float64(y)) => x.total_cmp(y),
        (Value::Int64(x), Value::Uint64(y)) => compare_int_uint(*x, *y),
        (Value::Uint64(x), Value::Int64(y)) => compare_int_uint(*y, *x).reverse(),
        (Value::Int64(x), Value::Float64(y)) => (*x as f64).total_cmp(y),
        (Value::Float64(x), Value::Int64(y)) => x.total_cmp(&(*y as f64)),
        (Value::Uint64(x), Value::Float64(y)) => (*x as f64).total_cmp(y),
        (Value::Float64(x), Value::Uint64(y)) => x.total_cmp(&(*y as f64)),
        (Value::Complex128(x), Value::Complex128(y)) => {
            x.re.total_cmp(&y.re).then(x.im.total_cmp(&y.im))
        }
        (Value::String(x), Value::String(y)) => x.as_bytes().cmp(y.as_bytes()),
        _ => rank(a).cmp(&rank(b)),
    }
}

fn compare_int_uint(x: i64, y: u64) -> Ordering {
    if x < 0 {
        Ordering::Less
    } else {
        (x as u64).cmp(&y)
    }
}
