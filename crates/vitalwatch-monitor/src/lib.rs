//! # vitalwatch-monitor
//!
//! Read-only contract queries for growth lending tokens, the periodic
//! collateralization check, and the Telegram notifier it reports through.
//!
//! Queries go over any [`vitalwatch_rpc::RpcTransport`], usually an
//! [`vitalwatch_rpc::HttpRpcClient`].

pub mod contract;
pub mod error;
pub mod notifier;
pub mod token;
pub mod vitals;

pub use contract::ContractCaller;
pub use error::MonitorError;
pub use notifier::{Notifier, TelegramNotifier};
pub use token::{Erc20Token, LendingToken, ReserveToken};
pub use vitals::{check_vitals, collateralization_ratio, report_line, Vitals, VitalsMonitor};
