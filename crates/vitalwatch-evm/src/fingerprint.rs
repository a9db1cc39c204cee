//! keccak-256 hashing of canonical signatures.
//!
//! An event's topic[0] is `keccak256("Name(type1,type2,...)")`; a function
//! selector is the first four bytes of the same hash over the function
//! signature.

use alloy_primitives::B256;
use tiny_keccak::{Hasher, Keccak};

/// keccak-256 of the canonical signature text.
pub fn signature_hash(signature: &str) -> B256 {
    let mut hasher = Keccak::v256();
    let mut output = [0u8; 32];
    hasher.update(signature.as_bytes());
    hasher.finalize(&mut output);
    B256::from(output)
}

/// First four bytes of [`signature_hash`].
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = signature_hash(signature);
    let mut out = [0u8; 4];
    out.copy_from_slice(&hash[..4]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn erc20_transfer_hash() {
        let hash = signature_hash("Transfer(address,address,uint256)");
        assert_eq!(
            hash.to_string(),
            "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef"
        );
    }

    #[test]
    fn erc20_approval_hash() {
        let hash = signature_hash("Approval(address,address,uint256)");
        assert_eq!(
            hash.to_string(),
            "0x8c5be1e5ebec7d5bd14f71427d1e84f3dd0314c0f7b2291e5b200ac8c7c3b925"
        );
    }

    #[test]
    fn well_known_selectors() {
        assert_eq!(selector("balanceOf(address)"), [0x70, 0xa0, 0x82, 0x31]);
        assert_eq!(selector("totalSupply()"), [0x18, 0x16, 0x0d, 0xdd]);
        assert_eq!(selector("decimals()"), [0x31, 0x3c, 0xe5, 0x67]);
    }
}
