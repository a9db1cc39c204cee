//! `LogDecoder`: turns a [`RawLog`] into a [`DecodedEvent`].
//!
//! topics[0] selects the signature; topics[1..] carry indexed params, one
//! 32-byte word each; `data` carries the non-indexed params as one
//! ABI-encoded parameter list.

use alloy_core::dyn_abi::{DynSolType, DynSolValue};
use alloy_primitives::B256;
use vitalwatch_core::{
    error::{DecodeError, SignatureError},
    event::{DecodedEvent, RawLog},
    types::DecodedValue,
};

use crate::normalizer;
use crate::signature::{IndexLayout, ParamSpec, SignatureTable};

/// Decodes logs against a fixed signature table.
#[derive(Debug, Clone)]
pub struct LogDecoder {
    table: SignatureTable,
}

impl LogDecoder {
    pub fn new(table: SignatureTable) -> Self {
        Self { table }
    }

    /// Build the table from signature strings.
    pub fn from_signatures<S: AsRef<str>>(signatures: &[S]) -> Result<Self, SignatureError> {
        Ok(Self::new(SignatureTable::build(signatures)?))
    }

    pub fn table(&self) -> &SignatureTable {
        &self.table
    }

    /// Decode one log. Fails with `UnknownEvent` if topics[0] is not in the table.
    pub fn decode(&self, raw: &RawLog) -> Result<DecodedEvent, DecodeError> {
        let hash = raw.signature_hash().ok_or(DecodeError::MissingSignature)?;
        let sig = self
            .table
            .get(hash)
            .ok_or(DecodeError::UnknownEvent { hash: *hash })?;
        let topics = &raw.topics[1..];
        let params = sig.params();

        let values = match sig.layout() {
            IndexLayout::Prefix => {
                if topics.len() > params.len() {
                    return Err(DecodeError::TopicCountMismatch {
                        event: sig.canonical().to_string(),
                        expected: params.len() + 1,
                        got: raw.topics.len(),
                    });
                }
                let (indexed, rest) = params.split_at(topics.len());
                let mut values = Vec::with_capacity(params.len());
                for (topic, param) in topics.iter().zip(indexed) {
                    values.push(decode_topic(topic, &param.ty)?);
                }
                values.extend(decode_data(&raw.data, rest.iter())?);
                values
            }
            IndexLayout::Explicit => {
                let expected = sig.expected_topics().unwrap_or(1);
                if raw.topics.len() != expected {
                    return Err(DecodeError::TopicCountMismatch {
                        event: sig.canonical().to_string(),
                        expected,
                        got: raw.topics.len(),
                    });
                }
                let mut from_topics = topics.iter();
                let mut from_data =
                    decode_data(&raw.data, params.iter().filter(|p| !p.indexed))?.into_iter();
                let mut values = Vec::with_capacity(params.len());
                for param in params {
                    let value = if param.indexed {
                        let topic = from_topics.next().ok_or_else(|| short(sig.canonical()))?;
                        decode_topic(topic, &param.ty)?
                    } else {
                        from_data.next().ok_or_else(|| short(sig.canonical()))?
                    };
                    values.push(value);
                }
                values
            }
        };

        tracing::trace!(event = sig.name(), values = values.len(), "decoded log");

        Ok(DecodedEvent {
            address: raw.address,
            name: sig.name().to_string(),
            values,
            block_number: raw.block_number,
            transaction_hash: raw.transaction_hash,
        })
    }
}

fn short(event: &str) -> DecodeError {
    DecodeError::AbiDecodeFailed {
        reason: format!("{event}: fewer values than declared parameters"),
    }
}

/// Decode a single indexed topic.
///
/// Value types are stored in the word directly. Reference types (string,
/// bytes, arrays, tuples) are stored as the keccak-256 of their encoding,
/// which cannot be reversed, so the raw word is returned instead.
fn decode_topic(topic: &B256, ty: &DynSolType) -> Result<DecodedValue, DecodeError> {
    match ty {
        DynSolType::String
        | DynSolType::Bytes
        | DynSolType::Array(_)
        | DynSolType::FixedArray(..)
        | DynSolType::Tuple(_) => return Ok(DecodedValue::FixedBytes(topic.to_vec())),
        _ => {}
    }

    ty.abi_decode(topic.as_slice())
        .map(normalizer::normalize)
        .map_err(|e| DecodeError::AbiDecodeFailed {
            reason: format!("topic as {}: {e}", ty.sol_type_name()),
        })
}

/// Decode the data blob as one parameter list of the given types.
fn decode_data<'a>(
    data: &[u8],
    params: impl Iterator<Item = &'a ParamSpec>,
) -> Result<Vec<DecodedValue>, DecodeError> {
    let types: Vec<DynSolType> = params.map(|p| p.ty.clone()).collect();
    if types.is_empty() {
        return Ok(Vec::new());
    }

    let decoded = DynSolType::Tuple(types)
        .abi_decode_params(data)
        .map_err(|e| DecodeError::AbiDecodeFailed {
            reason: format!("data: {e}"),
        })?;

    Ok(match decoded {
        DynSolValue::Tuple(vals) => vals.into_iter().map(normalizer::normalize).collect(),
        other => vec![normalizer::normalize(other)],
    })
}
