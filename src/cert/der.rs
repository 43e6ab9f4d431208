//! A small DER encoder for the values carried by certificate extensions.
//!
//! [`DerNode`] is a tree of the handful of ASN.1 types the extensions need.
//! Every node knows its encoded length without being encoded, so a
//! `SEQUENCE` header can be written before its children.
//!
//! ```
//! use keyblob::cert::der::DerNode;
//!
//! let node = DerNode::Sequence(vec![DerNode::Boolean(true), DerNode::Integer(vec![0x05])]);
//! assert_eq!(node.encode(), [0x30, 0x06, 0x01, 0x01, 0xFF, 0x02, 0x01, 0x05]);
//! assert_eq!(node.encoded_len(), 8);
//! ```

use core::fmt;

use der::Tag;
use time::{OffsetDateTime, UtcOffset};

use crate::Result;
use crate::error::KeyFileError;

/// A UTC timestamp that fits the four-digit year of `GeneralizedTime`.
///
/// Rendered as `yyyyMMddHHmmss[.fff]Z` with trailing zero fraction digits
/// dropped.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeneralizedTime(OffsetDateTime);

impl GeneralizedTime {
    pub fn new(time: OffsetDateTime) -> Result<Self> {
        let utc = time.to_offset(UtcOffset::UTC);
        if !(0..=9999).contains(&utc.year()) {
            return Err(KeyFileError::InvalidInput(format!(
                "Year {} cannot be encoded as a GeneralizedTime",
                utc.year()
            )));
        }
        Ok(Self(utc))
    }

    pub fn as_datetime(&self) -> OffsetDateTime {
        self.0
    }

    /// Number of fractional characters, including the dot.
    fn fraction_len(&self) -> usize {
        match self.0.millisecond() {
            0 => 0,
            ms if ms % 100 == 0 => 2,
            ms if ms % 10 == 0 => 3,
            _ => 4,
        }
    }

    fn len(&self) -> usize {
        "yyyyMMddHHmmss".len() + self.fraction_len() + 1
    }
}

impl TryFrom<OffsetDateTime> for GeneralizedTime {
    type Error = KeyFileError;

    fn try_from(time: OffsetDateTime) -> Result<Self> {
        Self::new(time)
    }
}

impl fmt::Display for GeneralizedTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = &self.0;
        write!(
            f,
            "{:04}{:02}{:02}{:02}{:02}{:02}",
            t.year(),
            u8::from(t.month()),
            t.day(),
            t.hour(),
            t.minute(),
            t.second()
        )?;
        let fraction = format!("{:03}", t.millisecond());
        let fraction = fraction.trim_end_matches('0');
        if !fraction.is_empty() {
            write!(f, ".{fraction}")?;
        }
        f.write_str("Z")
    }
}

impl fmt::Debug for GeneralizedTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GeneralizedTime({self})")
    }
}

/// One DER value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DerNode {
    Boolean(bool),
    /// Two's-complement bytes in little-endian host order. They are reversed
    /// on output and otherwise written as given.
    Integer(Vec<u8>),
    /// Whole octets of bits; the unused-bits count is always zero.
    BitString(Vec<u8>),
    OctetString(Vec<u8>),
    /// Children are encoded in order.
    Sequence(Vec<DerNode>),
    GeneralizedTime(GeneralizedTime),
}

impl DerNode {
    /// An `INTEGER` holding `value` in the fewest two's-complement octets.
    pub fn integer(value: i64) -> Self {
        let mut bytes = value.to_le_bytes().to_vec();
        while bytes.len() > 1 {
            let top = bytes[bytes.len() - 1];
            let next_sign = bytes[bytes.len() - 2] & 0x80;
            let redundant = (top == 0x00 && next_sign == 0) || (top == 0xFF && next_sign != 0);
            if !redundant {
                break;
            }
            bytes.pop();
        }
        DerNode::Integer(bytes)
    }

    pub fn generalized_time(time: OffsetDateTime) -> Result<Self> {
        Ok(DerNode::GeneralizedTime(GeneralizedTime::new(time)?))
    }

    pub fn tag(&self) -> Tag {
        match self {
            DerNode::Boolean(_) => Tag::Boolean,
            DerNode::Integer(_) => Tag::Integer,
            DerNode::BitString(_) => Tag::BitString,
            DerNode::OctetString(_) => Tag::OctetString,
            DerNode::Sequence(_) => Tag::Sequence,
            DerNode::GeneralizedTime(_) => Tag::GeneralizedTime,
        }
    }

    /// Length of the contents octets.
    pub fn content_len(&self) -> usize {
        match self {
            DerNode::Boolean(_) => 1,
            DerNode::Integer(bytes) | DerNode::OctetString(bytes) => bytes.len(),
            DerNode::BitString(bits) => bits.len() + 1,
            DerNode::Sequence(children) => children.iter().map(DerNode::encoded_len).sum(),
            DerNode::GeneralizedTime(time) => time.len(),
        }
    }

    /// Length of the complete tag-length-value encoding.
    pub fn encoded_len(&self) -> usize {
        let content = self.content_len();
        1 + length_octets(content) + content
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.encode_into(&mut out);
        out
    }

    /// Appends the encoding of this node to `out`.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.push(u8::from(self.tag()));
        write_length(out, self.content_len());
        match self {
            DerNode::Boolean(value) => out.push(if *value { 0xFF } else { 0x00 }),
            DerNode::Integer(bytes) => out.extend(bytes.iter().rev()),
            DerNode::BitString(bits) => {
                out.push(0x00);
                out.extend_from_slice(bits);
            }
            DerNode::OctetString(bytes) => out.extend_from_slice(bytes),
            DerNode::Sequence(children) => {
                for child in children {
                    child.encode_into(out);
                }
            }
            DerNode::GeneralizedTime(time) => out.extend_from_slice(time.to_string().as_bytes()),
        }
    }
}

impl From<bool> for DerNode {
    fn from(value: bool) -> Self {
        DerNode::Boolean(value)
    }
}

impl From<i64> for DerNode {
    fn from(value: i64) -> Self {
        DerNode::integer(value)
    }
}

fn length_octets(len: usize) -> usize {
    if len < 0x80 {
        1
    } else {
        1 + significant_bytes(len)
    }
}

fn significant_bytes(len: usize) -> usize {
    (usize::BITS - len.leading_zeros()).div_ceil(8) as usize
}

fn write_length(out: &mut Vec<u8>, len: usize) {
    if len < 0x80 {
        out.push(len as u8);
        return;
    }
    let count = significant_bytes(len);
    out.push(0x80 | count as u8);
    out.extend_from_slice(&len.to_be_bytes()[size_of::<usize>() - count..]);
}
