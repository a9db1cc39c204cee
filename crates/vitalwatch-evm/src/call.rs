//! Calldata encoding and return-data decoding for read-only contract calls.
//!
//! Only what `eth_call` needs: a selector computed from the function
//! signature, the arguments ABI-encoded as a parameter list, and the
//! output decoded against the declared return types.

use alloy_core::dyn_abi::{DynSolType, DynSolValue};
use vitalwatch_core::{error::DecodeError, types::DecodedValue};

use crate::{fingerprint, normalizer};

/// `selector(signature) ++ abi_encode_params(args)`.
///
/// `signature` is the canonical function signature, e.g. `"balanceOf(address)"`.
pub fn encode_call(signature: &str, args: &[DynSolValue]) -> Vec<u8> {
    let mut calldata = fingerprint::selector(signature).to_vec();
    if !args.is_empty() {
        calldata.extend_from_slice(&DynSolValue::Tuple(args.to_vec()).abi_encode_params());
    }
    calldata
}

/// Decode call output against the declared return types.
pub fn decode_output(returns: &[DynSolType], data: &[u8]) -> Result<Vec<DecodedValue>, DecodeError> {
    if returns.is_empty() {
        return Ok(Vec::new());
    }
    // A call to an address without code succeeds with empty output.
    if data.is_empty() {
        return Err(DecodeError::AbiDecodeFailed {
            reason: "empty return data".into(),
        });
    }

    let decoded = DynSolType::Tuple(returns.to_vec())
        .abi_decode_params(data)
        .map_err(|e| DecodeError::AbiDecodeFailed {
            reason: format!("return data: {e}"),
        })?;

    Ok(match decoded {
        DynSolValue::Tuple(vals) => vals.into_iter().map(normalizer::normalize).collect(),
        other => vec![normalizer::normalize(other)],
    })
}
