//! Converting `eth_subscription` payloads into typed records.

use alloy_primitives::{Address, Bytes, B256};
use serde_json::Value;
use vitalwatch_core::{error::DecodeError, event::RawLog};

/// Block number from a `newHeads` header.
pub fn block_number(header: &Value) -> Result<u64, DecodeError> {
    let number = header
        .get("number")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("header has no number"))?;
    hex_u64(number).ok_or_else(|| invalid(format!("bad block number '{number}'")))
}

/// A log object from a `logs` subscription.
pub fn raw_log(result: &Value) -> Result<RawLog, DecodeError> {
    let address: Address = result
        .get("address")
        .and_then(Value::as_str)
        .ok_or_else(|| invalid("log has no address"))?
        .parse()
        .map_err(|e| invalid(format!("bad address: {e}")))?;

    let topics = result
        .get("topics")
        .and_then(Value::as_array)
        .ok_or_else(|| invalid("log has no topics"))?
        .iter()
        .map(|t| {
            t.as_str()
                .and_then(|s| s.parse::<B256>().ok())
                .ok_or_else(|| invalid(format!("bad topic {t}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let data_hex = result.get("data").and_then(Value::as_str).unwrap_or("0x");
    let data = hex::decode(data_hex.strip_prefix("0x").unwrap_or(data_hex))
        .map_err(|e| invalid(format!("bad data: {e}")))?;

    Ok(RawLog {
        address,
        topics,
        data: Bytes::from(data),
        block_number: result
            .get("blockNumber")
            .and_then(Value::as_str)
            .and_then(hex_u64),
        transaction_hash: result
            .get("transactionHash")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok()),
        log_index: result
            .get("logIndex")
            .and_then(Value::as_str)
            .and_then(hex_u64),
        removed: result
            .get("removed")
            .and_then(Value::as_bool)
            .unwrap_or(false),
    })
}

fn hex_u64(s: &str) -> Option<u64> {
    u64::from_str_radix(s.strip_prefix("0x").unwrap_or(s), 16).ok()
}

fn invalid(reason: impl Into<String>) -> DecodeError {
    DecodeError::InvalidRawLog {
        reason: reason.into(),
    }
}
