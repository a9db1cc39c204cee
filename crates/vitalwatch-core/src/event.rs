//! Raw and decoded log records.

use alloy_primitives::{Address, Bytes, B256};

use crate::types::DecodedValue;

/// A log as delivered by the node. Transient: decoded immediately and dropped.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawLog {
    /// Contract that emitted the log.
    pub address: Address,
    /// topics[0] is the event signature hash; the rest are indexed params.
    pub topics: Vec<B256>,
    /// ABI-encoded non-indexed params.
    pub data: Bytes,
    pub block_number: Option<u64>,
    pub transaction_hash: Option<B256>,
    pub log_index: Option<u64>,
    /// Set by the node when a reorg retracts a previously delivered log.
    pub removed: bool,
}

impl RawLog {
    /// topics[0], if present.
    pub fn signature_hash(&self) -> Option<&B256> {
        self.topics.first()
    }
}

/// A decoded log, handed to a log handler and then discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedEvent {
    pub address: Address,
    /// Event name, e.g. `"Transfer"`.
    pub name: String,
    /// Decoded parameter values.
    pub values: Vec<DecodedValue>,
    pub block_number: Option<u64>,
    pub transaction_hash: Option<B256>,
}

impl DecodedEvent {
    pub fn value(&self, index: usize) -> Option<&DecodedValue> {
        self.values.get(index)
    }
}
