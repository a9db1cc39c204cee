//! `EventSubscriber`: block and log subscriptions with typed handlers.
//!
//! Each subscription gets one task that drains its notification channel and
//! calls the handler sequentially. Handler errors and undecodable payloads
//! are reported to the supervisor's failure policy, and the task stops
//! without calling the handler again if the policy aborts. Logs whose
//! signature is not in the table are dropped.

use alloy_primitives::B256;
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use vitalwatch_evm::{LogDecoder, SignatureTable};
use vitalwatch_rpc::{ConnectionHandle, Disposition, Failure, SubscriptionKey};

use crate::error::StreamError;
use crate::handler::{BlockHandler, LogHandler};
use crate::parse;

const NEW_HEADS: &str = "newHeads";
const LOGS: &str = "logs";

/// Opens subscriptions over a supervised connection.
#[derive(Clone)]
pub struct EventSubscriber {
    handle: ConnectionHandle,
}

impl EventSubscriber {
    pub fn new(handle: ConnectionHandle) -> Self {
        Self { handle }
    }

    /// `eth_subscribe("newHeads")`; the handler gets each header's number.
    pub async fn subscribe_blocks<H: BlockHandler>(
        &self,
        handler: H,
    ) -> Result<Subscription, StreamError> {
        let (key, mut rx) = self.handle.subscribe(NEW_HEADS, vec![]).await?;
        tracing::info!(%key, "subscribed to new blocks");

        let reporter = self.handle.clone();
        let task = tokio::spawn(async move {
            while let Some(header) = rx.recv().await {
                let result = match parse::block_number(&header) {
                    Ok(number) => handler.on_block(number).await.map_err(|e| e.to_string()),
                    Err(e) => Err(e.to_string()),
                };
                if let Err(reason) = result {
                    if reporter.report(Failure::handler(NEW_HEADS, reason)).await == Disposition::Abort {
                        break;
                    }
                }
            }
        });

        Ok(self.subscription(key, NEW_HEADS, task))
    }

    /// `eth_subscribe("logs", {topics: [[hash, ...]]})` for every signature
    /// in the list; the handler gets each decoded log.
    ///
    /// Fails before subscribing if the signatures do not form a valid table.
    pub async fn subscribe_logs<S, H>(
        &self,
        signatures: &[S],
        handler: H,
    ) -> Result<Subscription, StreamError>
    where
        S: AsRef<str>,
        H: LogHandler,
    {
        let table = SignatureTable::build(signatures)?;
        let filter = topic_filter(table.hashes());
        let decoder = LogDecoder::new(table);

        let (key, mut rx) = self.handle.subscribe(LOGS, vec![filter]).await?;
        tracing::info!(%key, events = decoder.table().len(), "subscribed to logs");

        let reporter = self.handle.clone();
        let task = tokio::spawn(async move {
            while let Some(result) = rx.recv().await {
                if let Err(reason) = dispatch_log(&decoder, &handler, &result).await {
                    if reporter.report(Failure::handler(LOGS, reason)).await == Disposition::Abort {
                        break;
                    }
                }
            }
        });

        Ok(self.subscription(key, LOGS, task))
    }

    fn subscription(&self, key: SubscriptionKey, kind: &'static str, task: JoinHandle<()>) -> Subscription {
        Subscription {
            key,
            kind,
            handle: self.handle.clone(),
            task,
        }
    }
}

/// Decode one log and hand it over. `Ok` also covers logs that are skipped.
async fn dispatch_log<H: LogHandler>(
    decoder: &LogDecoder,
    handler: &H,
    result: &Value,
) -> Result<(), String> {
    let raw = parse::raw_log(result).map_err(|e| e.to_string())?;
    if raw.removed {
        tracing::debug!(block = ?raw.block_number, "skipping removed log");
        return Ok(());
    }
    match decoder.decode(&raw) {
        Ok(event) => handler.on_log(event).await.map_err(|e| e.to_string()),
        Err(e) if e.is_unknown_event() => {
            tracing::debug!(address = %raw.address, error = %e, "dropping log");
            Ok(())
        }
        Err(e) => Err(e.to_string()),
    }
}

fn topic_filter(hashes: &[B256]) -> Value {
    let topics: Vec<String> = hashes
        .iter()
        .map(|h| format!("0x{}", hex::encode(h)))
        .collect();
    json!({ "topics": [topics] })
}

/// A live subscription. Dropping it leaves the subscription running; call
/// [`cancel`](Self::cancel) to stop it.
pub struct Subscription {
    key: SubscriptionKey,
    kind: &'static str,
    handle: ConnectionHandle,
    task: JoinHandle<()>,
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("kind", &self.kind)
            .finish()
    }
}

impl Subscription {
    pub fn key(&self) -> SubscriptionKey {
        self.key
    }

    /// `"newHeads"` or `"logs"`.
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// `eth_unsubscribe`, then wait for in-flight handler calls to finish.
    ///
    /// A node error or a `false` result is returned here and has already been
    /// ruled on by the supervisor's failure policy.
    pub async fn cancel(self) -> Result<(), StreamError> {
        let result = self.handle.unsubscribe(self.key).await;
        if let Err(e) = self.task.await {
            tracing::warn!(key = %self.key, error = %e, "subscription task failed");
        }
        tracing::info!(key = %self.key, kind = self.kind, ok = result.is_ok(), "subscription cancelled");
        Ok(result?)
    }
}
