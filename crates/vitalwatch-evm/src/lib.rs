//! # vitalwatch-evm
//!
//! EVM-side encoding for VitalWatch, built on `alloy-core`:
//!
//! - [`signature`]: parses `"Name(type,...)"` strings into a hash-keyed table
//! - [`decoder`]: decodes raw logs against that table
//! - [`call`]: encodes `eth_call` calldata and decodes its output
//!
//! ## Log layout
//! - topics[0] → keccak-256 of the canonical signature
//! - topics[1..] → indexed parameters, one 32-byte word each
//! - `data` → non-indexed parameters, ABI-encoded as one parameter list

pub mod call;
pub mod decoder;
pub mod fingerprint;
pub mod normalizer;
pub mod signature;

pub use alloy_core::dyn_abi::{DynSolType, DynSolValue};
pub use decoder::LogDecoder;
pub use signature::{EventSignature, IndexLayout, ParamSpec, SignatureTable};
