//! Decoded event values.

use std::fmt;

use alloy_primitives::Address;

/// A single decoded ABI value.
///
/// Integers are kept as decimal digit strings so that amounts of any width
/// can go straight into [`crate::amount`] without a lossy numeric hop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedValue {
    /// Unsigned integer of any width, decimal digits.
    Uint(String),
    /// Signed integer of any width, decimal digits with optional `-`.
    Int(String),
    Bool(bool),
    Address(Address),
    /// `bytes1` .. `bytes32`, and the keccak hash standing in for a
    /// reference type in an indexed position.
    FixedBytes(Vec<u8>),
    Bytes(Vec<u8>),
    Str(String),
    Array(Vec<DecodedValue>),
    Tuple(Vec<DecodedValue>),
}

impl DecodedValue {
    /// The digit string of an unsigned integer, ready for amount conversion.
    pub fn as_units(&self) -> Option<&str> {
        match self {
            DecodedValue::Uint(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_address(&self) -> Option<Address> {
        match self {
            DecodedValue::Address(a) => Some(*a),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DecodedValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            DecodedValue::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for DecodedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodedValue::Uint(v) | DecodedValue::Int(v) => write!(f, "{v}"),
            DecodedValue::Bool(v) => write!(f, "{v}"),
            DecodedValue::Address(a) => write!(f, "{a}"),
            DecodedValue::FixedBytes(b) | DecodedValue::Bytes(b) => {
                write!(f, "0x{}", hex::encode(b))
            }
            DecodedValue::Str(s) => write!(f, "{s}"),
            DecodedValue::Array(v) | DecodedValue::Tuple(v) => {
                let parts: Vec<_> = v.iter().map(|x| x.to_string()).collect();
                write!(f, "[{}]", parts.join(", "))
            }
        }
    }
}
