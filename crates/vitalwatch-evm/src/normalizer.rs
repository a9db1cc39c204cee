//! Converts alloy `DynSolValue` into [`DecodedValue`].

use alloy_core::dyn_abi::DynSolValue;
use vitalwatch_core::types::DecodedValue;

/// Convert a decoded `DynSolValue`.
pub fn normalize(val: DynSolValue) -> DecodedValue {
    match val {
        DynSolValue::Bool(b) => DecodedValue::Bool(b),

        DynSolValue::Int(i, _bits) => DecodedValue::Int(i.to_string()),

        DynSolValue::Uint(u, _bits) => DecodedValue::Uint(u.to_string()),

        // The word is always 32 bytes; `size` is the declared width.
        DynSolValue::FixedBytes(word, size) => DecodedValue::FixedBytes(word[..size].to_vec()),

        DynSolValue::Bytes(b) => DecodedValue::Bytes(b),

        DynSolValue::String(s) => DecodedValue::Str(s),

        DynSolValue::Address(a) => DecodedValue::Address(a),

        DynSolValue::Array(vals) | DynSolValue::FixedArray(vals) => {
            DecodedValue::Array(vals.into_iter().map(normalize).collect())
        }

        DynSolValue::Tuple(fields) => {
            DecodedValue::Tuple(fields.into_iter().map(normalize).collect())
        }

        DynSolValue::Function(f) => DecodedValue::Bytes(f.to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, B256, I256, U256};

    #[test]
    fn uint256_beyond_u128_keeps_all_digits() {
        let v = normalize(DynSolValue::Uint(U256::MAX, 256));
        assert_eq!(
            v.as_units(),
            Some("115792089237316195423570985008687907853269984665640564039457584007913129639935")
        );
    }

    #[test]
    fn negative_int() {
        let v = normalize(DynSolValue::Int(I256::try_from(-42i64).unwrap(), 24));
        assert_eq!(v, DecodedValue::Int("-42".into()));
    }

    #[test]
    fn fixed_bytes_are_trimmed_to_width() {
        let mut word = B256::ZERO;
        word[0] = 0xab;
        word[1] = 0xcd;
        let v = normalize(DynSolValue::FixedBytes(word, 2));
        assert_eq!(v, DecodedValue::FixedBytes(vec![0xab, 0xcd]));
    }

    #[test]
    fn address_passes_through() {
        let addr: Address = "0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045".parse().unwrap();
        assert_eq!(normalize(DynSolValue::Address(addr)), DecodedValue::Address(addr));
    }
}
