//! # vitalwatch-core
//!
//! Shared primitives for the VitalWatch crates:
//!
//! - [`amount`]: lossless conversion between base-unit integers ("units")
//!   and human decimal strings ("coins"), with no floating point anywhere
//! - [`event`]: raw and decoded log records
//! - [`types`]: the decoded value type handed to event handlers
//! - [`error`]: the error taxonomy shared by every layer

pub mod amount;
pub mod error;
pub mod event;
pub mod types;

pub use amount::{to_coins, to_units, Amount};
pub use error::{AmountError, DecodeError, HandlerError, SignatureError};
pub use event::{DecodedEvent, RawLog};
pub use types::DecodedValue;
