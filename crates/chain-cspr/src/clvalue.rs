//! Typed contract arguments and their byte serialization.
//!
//! Only the value kinds the subscription contract needs are supported. The
//! layout follows Casper's `bytesrepr` (all integers little-endian):
//!
//! ```text
//! RuntimeArgs:
//!   count                 u32
//!   entries[]:
//!     name                u32 len || utf8
//!     value               CLValue
//!
//! CLValue:
//!   inner_len             u32
//!   inner                 inner_len bytes
//!   cl_type               tag u8 (ByteArray: tag || u32 len)
//! ```

use std::fmt;
use std::str::FromStr;

use serde_json::{json, Value};

use crate::error::CsprError;

const CL_TYPE_U64: u8 = 5;
const CL_TYPE_U512: u8 = 8;
const CL_TYPE_STRING: u8 = 10;
const CL_TYPE_BYTE_ARRAY: u8 = 15;

/// Largest U512 magnitude in bytes.
const U512_MAX_BYTES: usize = 64;

// ---------------------------------------------------------------------------
// U512
// ---------------------------------------------------------------------------

/// An unsigned integer of up to 512 bits, kept as minimal little-endian bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct U512 {
    le_bytes: Vec<u8>,
}

impl U512 {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn is_zero(&self) -> bool {
        self.le_bytes.is_empty()
    }

    /// Sum of two values, `None` when the result no longer fits in 512 bits.
    pub fn checked_add(&self, other: &U512) -> Option<U512> {
        let len = self.le_bytes.len().max(other.le_bytes.len());
        let mut out = Vec::with_capacity(len + 1);
        let mut carry = 0u16;
        for i in 0..len {
            let a = self.le_bytes.get(i).copied().unwrap_or(0);
            let b = other.le_bytes.get(i).copied().unwrap_or(0);
            let sum = u16::from(a) + u16::from(b) + carry;
            out.push((sum & 0xff) as u8);
            carry = sum >> 8;
        }
        if carry > 0 {
            out.push(carry as u8);
        }
        if out.len() > U512_MAX_BYTES {
            return None;
        }
        Some(Self { le_bytes: out })
    }

    fn from_le_bytes(bytes: &[u8]) -> Result<Self, CsprError> {
        let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
        if end > U512_MAX_BYTES {
            return Err(CsprError::Encoding("value exceeds 512 bits".into()));
        }
        Ok(Self {
            le_bytes: bytes[..end].to_vec(),
        })
    }

    /// `len u8 || magnitude`, zero encodes as a single `0x00`.
    fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + self.le_bytes.len());
        out.push(self.le_bytes.len() as u8);
        out.extend_from_slice(&self.le_bytes);
        out
    }
}

impl FromStr for U512 {
    type Err = CsprError;

    /// Parse a base-10 digit string.
    fn from_str(digits: &str) -> Result<Self, Self::Err> {
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CsprError::Encoding(format!(
                "expected decimal digits for U512, got {digits:?}"
            )));
        }

        let mut le: Vec<u8> = Vec::new();
        for digit in digits.bytes() {
            let mut carry = u32::from(digit - b'0');
            for byte in le.iter_mut() {
                let v = u32::from(*byte) * 10 + carry;
                *byte = (v & 0xff) as u8;
                carry = v >> 8;
            }
            while carry > 0 {
                le.push((carry & 0xff) as u8);
                carry >>= 8;
            }
            if le.len() > U512_MAX_BYTES {
                return Err(CsprError::Encoding("value exceeds 512 bits".into()));
            }
        }

        Ok(Self { le_bytes: le })
    }
}

impl From<u64> for U512 {
    fn from(value: u64) -> Self {
        let bytes = value.to_le_bytes();
        let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
        Self {
            le_bytes: bytes[..end].to_vec(),
        }
    }
}

impl fmt::Display for U512 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return f.write_str("0");
        }

        // Repeated division by 10 over the big-endian magnitude.
        let mut be: Vec<u8> = self.le_bytes.iter().rev().copied().collect();
        let mut digits = Vec::new();
        while !be.is_empty() {
            let mut remainder = 0u32;
            for byte in be.iter_mut() {
                let acc = (remainder << 8) | u32::from(*byte);
                *byte = (acc / 10) as u8;
                remainder = acc % 10;
            }
            digits.push(b'0' + remainder as u8);
            let first_nonzero = be.iter().position(|&b| b != 0).unwrap_or(be.len());
            be.drain(..first_nonzero);
        }
        digits.reverse();
        f.write_str(&String::from_utf8_lossy(&digits))
    }
}

// ---------------------------------------------------------------------------
// CLValue
// ---------------------------------------------------------------------------

/// A typed contract argument value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CLValue {
    U64(u64),
    U512(U512),
    String(String),
    ByteArray(Vec<u8>),
}

impl CLValue {
    /// Build a U512 value from a base-10 digit string.
    pub fn u512(digits: &str) -> Result<Self, CsprError> {
        Ok(CLValue::U512(digits.parse()?))
    }

    pub fn string(value: impl Into<String>) -> Self {
        CLValue::String(value.into())
    }

    fn inner_bytes(&self) -> Vec<u8> {
        match self {
            CLValue::U64(v) => v.to_le_bytes().to_vec(),
            CLValue::U512(v) => v.to_bytes(),
            CLValue::String(s) => encode_string(s),
            CLValue::ByteArray(bytes) => bytes.clone(),
        }
    }

    fn cl_type_bytes(&self) -> Vec<u8> {
        match self {
            CLValue::U64(_) => vec![CL_TYPE_U64],
            CLValue::U512(_) => vec![CL_TYPE_U512],
            CLValue::String(_) => vec![CL_TYPE_STRING],
            CLValue::ByteArray(bytes) => {
                let mut out = vec![CL_TYPE_BYTE_ARRAY];
                out.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
                out
            }
        }
    }

    /// Serialize as `u32 len || inner || cl_type`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let inner = self.inner_bytes();
        let cl_type = self.cl_type_bytes();
        let mut out = Vec::with_capacity(4 + inner.len() + cl_type.len());
        out.extend_from_slice(&(inner.len() as u32).to_le_bytes());
        out.extend_from_slice(&inner);
        out.extend_from_slice(&cl_type);
        out
    }

    /// JSON form: `{"cl_type": .., "bytes": hex, "parsed": ..}`.
    pub fn to_json(&self) -> Value {
        let (cl_type, parsed) = match self {
            CLValue::U64(v) => (json!("U64"), json!(v)),
            CLValue::U512(v) => (json!("U512"), json!(v.to_string())),
            CLValue::String(s) => (json!("String"), json!(s)),
            CLValue::ByteArray(bytes) => (
                json!({ "ByteArray": bytes.len() }),
                json!(hex::encode(bytes)),
            ),
        };
        json!({
            "cl_type": cl_type,
            "bytes": hex::encode(self.inner_bytes()),
            "parsed": parsed,
        })
    }

    fn read(reader: &mut ByteReader<'_>) -> Result<Self, CsprError> {
        let inner_len = reader.read_u32()? as usize;
        let inner = reader.read_slice(inner_len)?;
        let tag = reader.read_u8()?;

        match tag {
            CL_TYPE_U64 => {
                let bytes: [u8; 8] = inner.try_into().map_err(|_| {
                    CsprError::Encoding(format!("U64 needs 8 bytes, got {inner_len}"))
                })?;
                Ok(CLValue::U64(u64::from_le_bytes(bytes)))
            }
            CL_TYPE_U512 => {
                let (len, magnitude) = inner
                    .split_first()
                    .ok_or_else(|| CsprError::Encoding("empty U512".into()))?;
                if usize::from(*len) != magnitude.len() {
                    return Err(CsprError::Encoding(format!(
                        "U512 length byte {len} does not match {} bytes",
                        magnitude.len()
                    )));
                }
                Ok(CLValue::U512(U512::from_le_bytes(magnitude)?))
            }
            CL_TYPE_STRING => {
                let mut inner_reader = ByteReader::new(inner);
                let s = inner_reader.read_string()?;
                inner_reader.finish()?;
                Ok(CLValue::String(s))
            }
            CL_TYPE_BYTE_ARRAY => {
                let declared = reader.read_u32()? as usize;
                if declared != inner_len {
                    return Err(CsprError::Encoding(format!(
                        "ByteArray declares {declared} bytes, carries {inner_len}"
                    )));
                }
                Ok(CLValue::ByteArray(inner.to_vec()))
            }
            other => Err(CsprError::Encoding(format!("unsupported cl_type tag {other}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// RuntimeArgs
// ---------------------------------------------------------------------------

/// Named contract arguments in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RuntimeArgs {
    entries: Vec<(String, CLValue)>,
}

impl RuntimeArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an argument. An existing name keeps its position and gets the
    /// new value.
    pub fn insert(&mut self, name: impl Into<String>, value: CLValue) {
        let name = name.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&CLValue> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(self.entries.len() as u32).to_le_bytes());
        for (name, value) in &self.entries {
            out.extend_from_slice(&encode_string(name));
            out.extend_from_slice(&value.to_bytes());
        }
        out
    }

    /// Decode arguments produced by [`RuntimeArgs::to_bytes`]. Trailing bytes
    /// are an error.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CsprError> {
        let mut reader = ByteReader::new(bytes);
        let count = reader.read_u32()?;
        let mut args = RuntimeArgs::new();
        for _ in 0..count {
            let name = reader.read_string()?;
            let value = CLValue::read(&mut reader)?;
            args.entries.push((name, value));
        }
        reader.finish()?;
        Ok(args)
    }

    /// JSON form: `[[name, value], ..]`.
    pub fn to_json(&self) -> Value {
        Value::Array(
            self.entries
                .iter()
                .map(|(name, value)| json!([name, value.to_json()]))
                .collect(),
        )
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub(crate) fn encode_string(s: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + s.len());
    out.extend_from_slice(&(s.len() as u32).to_le_bytes());
    out.extend_from_slice(s.as_bytes());
    out
}

struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn read_slice(&mut self, len: usize) -> Result<&'a [u8], CsprError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or_else(|| {
                CsprError::Encoding(format!(
                    "unexpected end of input at offset {} (wanted {len} bytes)",
                    self.pos
                ))
            })?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8, CsprError> {
        Ok(self.read_slice(1)?[0])
    }

    fn read_u32(&mut self) -> Result<u32, CsprError> {
        let bytes: [u8; 4] = self
            .read_slice(4)?
            .try_into()
            .map_err(|_| CsprError::Encoding("short u32".into()))?;
        Ok(u32::from_le_bytes(bytes))
    }

    fn read_string(&mut self) -> Result<String, CsprError> {
        let len = self.read_u32()? as usize;
        let bytes = self.read_slice(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| CsprError::Encoding(format!("invalid utf-8: {e}")))
    }

    fn finish(&self) -> Result<(), CsprError> {
        if self.pos != self.data.len() {
            return Err(CsprError::Encoding(format!(
                "{} trailing bytes",
                self.data.len() - self.pos
            )));
        }
        Ok(())
    }
}
