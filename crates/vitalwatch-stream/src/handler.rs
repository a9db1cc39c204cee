//! Block and log handler traits.
//!
//! Both are implemented for plain async closures, so
//! `subscriber.subscribe_blocks(|n| async move { ... })` works without a
//! wrapper type.

use std::future::Future;

use async_trait::async_trait;
use vitalwatch_core::{error::HandlerError, event::DecodedEvent};

/// Called once per new block header, in arrival order.
#[async_trait]
pub trait BlockHandler: Send + Sync + 'static {
    async fn on_block(&self, number: u64) -> Result<(), HandlerError>;
}

/// Called once per decoded log, in arrival order.
#[async_trait]
pub trait LogHandler: Send + Sync + 'static {
    async fn on_log(&self, event: DecodedEvent) -> Result<(), HandlerError>;
}

#[async_trait]
impl<F, Fut> BlockHandler for F
where
    F: Fn(u64) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn on_block(&self, number: u64) -> Result<(), HandlerError> {
        self(number).await
    }
}

#[async_trait]
impl<F, Fut> LogHandler for F
where
    F: Fn(DecodedEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn on_log(&self, event: DecodedEvent) -> Result<(), HandlerError> {
        self(event).await
    }
}
