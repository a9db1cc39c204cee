//! Connection supervisor: keeps one JSON-RPC connection alive.
//!
//! ```text
//! Disconnected --run()--> Connecting --open--> Connected
//!                             ^                   |
//!                             +------ ended ------+
//!                                                 |
//!                    error, policy says Abort --> Terminated(reason)
//! ```
//!
//! A [`Supervisor`] owns the connection, the pending-request table and the
//! [`SubscriptionRegistry`]. Callers drive it through cloneable
//! [`ConnectionHandle`]s. On every reconnect a fresh [`Link`] is requested
//! from the [`Connector`] and every registered subscription is re-issued.
//! There is no backoff and no retry limit on "ended"; an "error" (including
//! a failed connect) goes to the [`FailurePolicy`].

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};

use crate::error::{Failure, TransportError};
use crate::link::{Connector, Link, LinkEvent};
use crate::policy::{Disposition, FailurePolicy};
use crate::request::{Incoming, JsonRpcError, JsonRpcRequest};
use crate::subscriptions::{SubscriptionDescriptor, SubscriptionKey, SubscriptionRegistry};
use crate::transport::RpcTransport;

/// Where the supervisor is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Terminated(String),
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Terminated(reason) => write!(f, "terminated: {reason}"),
        }
    }
}

type Reply<T> = oneshot::Sender<Result<T, TransportError>>;

/// Sent from handles to the supervisor task.
enum Command {
    Call {
        method: String,
        params: Vec<Value>,
        reply: Reply<Value>,
    },
    Subscribe {
        descriptor: SubscriptionDescriptor,
        sender: mpsc::UnboundedSender<Value>,
        reply: Reply<SubscriptionKey>,
    },
    Unsubscribe {
        key: SubscriptionKey,
        reply: Reply<()>,
    },
    Report {
        failure: Failure,
        ruling: oneshot::Sender<Disposition>,
    },
}

/// A request on the wire, waiting for its response.
enum Pending {
    Call(Reply<Value>),
    /// `reply` is `None` when the subscribe is a re-issue after reconnect.
    Subscribe {
        key: SubscriptionKey,
        reply: Option<Reply<SubscriptionKey>>,
    },
    /// `reply` is `None` for cleanup of a subscription cancelled mid-flight.
    Unsubscribe {
        server_id: String,
        reply: Option<Reply<()>>,
    },
}

/// Why the serve loop stopped.
enum Exit {
    Reconnect,
    Abort(Failure),
    /// Every handle was dropped.
    Shutdown,
}

pub struct Supervisor {
    connector: Box<dyn Connector>,
    policy: Box<dyn FailurePolicy>,
    commands: mpsc::UnboundedReceiver<Command>,
    state: watch::Sender<ConnectionState>,
    registry: SubscriptionRegistry,
    pending: HashMap<u64, Pending>,
    /// Subscribe replies whose connection ended before the node answered.
    unconfirmed: HashMap<SubscriptionKey, Reply<SubscriptionKey>>,
    /// Cancels waiting on an in-flight re-subscribe and its cleanup unsubscribe.
    cancelled: HashMap<SubscriptionKey, Reply<()>>,
    next_id: u64,
}

impl Supervisor {
    /// Create a supervisor and its first handle. Nothing connects until
    /// [`run`](Self::run) is polled.
    pub fn new(
        connector: impl Connector,
        policy: impl FailurePolicy,
    ) -> (Self, ConnectionHandle) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let handle = ConnectionHandle {
            commands: cmd_tx,
            state: state_rx,
            url: Arc::from(connector.url()),
        };
        let supervisor = Self {
            connector: Box::new(connector),
            policy: Box::new(policy),
            commands: cmd_rx,
            state: state_tx,
            registry: SubscriptionRegistry::new(),
            pending: HashMap::new(),
            unconfirmed: HashMap::new(),
            cancelled: HashMap::new(),
            next_id: 0,
        };
        (supervisor, handle)
    }

    /// Connect and serve until terminated or every handle is dropped.
    ///
    /// Returns the failure the policy ruled fatal.
    pub async fn run(mut self) -> Result<(), Failure> {
        let url = self.connector.url().to_string();
        loop {
            self.set_state(ConnectionState::Connecting);

            let link = match self.connector.connect().await {
                Ok(link) => link,
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "connect failed");
                    if let ControlFlow::Break(Exit::Abort(f)) = self.rule(Failure::Transport(e)) {
                        return Err(self.terminate(f));
                    }
                    tokio::task::yield_now().await;
                    continue;
                }
            };

            tracing::info!(url = %url, "connected");
            self.set_state(ConnectionState::Connected);
            self.resubscribe(&link);

            match self.serve(link).await {
                Exit::Reconnect => {
                    tracing::warn!(url = %url, "connection lost, reconnecting");
                    self.drop_connection();
                }
                Exit::Abort(f) => return Err(self.terminate(f)),
                Exit::Shutdown => {
                    tracing::info!(url = %url, "all handles dropped, shutting down");
                    self.set_state(ConnectionState::Disconnected);
                    return Ok(());
                }
            }
        }
    }

    async fn serve(&mut self, mut link: Link) -> Exit {
        loop {
            let flow = tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => self.on_command(cmd, &link),
                    None => ControlFlow::Break(Exit::Shutdown),
                },
                event = link.inbound.recv() => match event {
                    Some(LinkEvent::Text(text)) => self.on_text(&text, &link),
                    Some(LinkEvent::Ended) | None => ControlFlow::Break(Exit::Reconnect),
                    Some(LinkEvent::Error(reason)) => {
                        tracing::warn!(error = %reason, "connection error");
                        match self.rule(Failure::Transport(TransportError::WebSocket(reason))) {
                            ControlFlow::Continue(()) => ControlFlow::Break(Exit::Reconnect),
                            abort => abort,
                        }
                    }
                },
            };
            if let ControlFlow::Break(exit) = flow {
                return exit;
            }
        }
    }

    fn on_command(&mut self, cmd: Command, link: &Link) -> ControlFlow<Exit> {
        match cmd {
            Command::Call {
                method,
                params,
                reply,
            } => {
                let id = self.next_id();
                self.pending.insert(id, Pending::Call(reply));
                send(link, &JsonRpcRequest::new(id, method, params));
            }
            Command::Subscribe {
                descriptor,
                sender,
                reply,
            } => {
                let key = self.registry.register(descriptor.clone(), sender);
                self.issue_subscribe(link, key, &descriptor, Some(reply));
            }
            Command::Unsubscribe { key, reply } => {
                if !self.registry.contains(key) {
                    let _ = reply.send(Err(TransportError::Unsubscribe {
                        subscription: key.to_string(),
                        reason: "unknown subscription".into(),
                    }));
                    return ControlFlow::Continue(());
                }
                let server_id = self.registry.server_id(key).map(str::to_owned);
                self.registry.remove(key);
                match server_id {
                    Some(server_id) => self.issue_unsubscribe(link, server_id, Some(reply)),
                    // The re-issue is still in flight; answer once its id is released.
                    None if self.resubscribing(key) => {
                        self.cancelled.insert(key, reply);
                    }
                    // Nothing is live on the node.
                    None => {
                        let _ = reply.send(Ok(()));
                    }
                }
            }
            Command::Report { failure, ruling } => {
                let disposition = self.policy.on_failure(&failure);
                let _ = ruling.send(disposition);
                if disposition == Disposition::Abort {
                    return ControlFlow::Break(Exit::Abort(failure));
                }
            }
        }
        ControlFlow::Continue(())
    }

    fn on_text(&mut self, text: &str, link: &Link) -> ControlFlow<Exit> {
        match Incoming::parse(text) {
            Some(Incoming::Notification(note)) => {
                let id = note.params.subscription;
                if !self.registry.dispatch(&id, note.params.result) {
                    tracing::debug!(subscription = %id, "notification for unknown subscription");
                }
                ControlFlow::Continue(())
            }
            Some(Incoming::Response(resp)) => {
                let pending = resp.id.as_number().and_then(|id| self.pending.remove(&id));
                match pending {
                    Some(pending) => self.on_response(pending, resp.into_result(), link),
                    None => {
                        tracing::debug!(id = %resp.id, "response to unknown request");
                        ControlFlow::Continue(())
                    }
                }
            }
            None => {
                tracing::debug!("ignoring unrecognised message");
                ControlFlow::Continue(())
            }
        }
    }

    fn on_response(
        &mut self,
        pending: Pending,
        result: Result<Value, JsonRpcError>,
        link: &Link,
    ) -> ControlFlow<Exit> {
        match pending {
            Pending::Call(reply) => {
                let _ = reply.send(result.map_err(TransportError::Rpc));
            }

            Pending::Subscribe { key, reply } => match result {
                Ok(Value::String(server_id)) => {
                    if self.registry.bind(key, server_id.clone()) {
                        tracing::debug!(%key, subscription = %server_id, "subscribed");
                        if let Some(reply) = reply {
                            let _ = reply.send(Ok(key));
                        }
                    } else {
                        // Cancelled while the subscribe was in flight.
                        let reply = self.cancelled.remove(&key);
                        self.issue_unsubscribe(link, server_id, reply);
                    }
                }
                other => {
                    let err = match other {
                        Err(e) => TransportError::Rpc(e),
                        Ok(v) => TransportError::Other(format!("unexpected subscription id {v}")),
                    };
                    match reply {
                        Some(reply) => {
                            self.registry.remove(key);
                            let _ = reply.send(Err(err));
                        }
                        None => {
                            if let Some(cancel) = self.cancelled.remove(&key) {
                                tracing::debug!(%key, error = %err, "re-subscribe of a cancelled subscription failed");
                                let _ = cancel.send(Ok(()));
                                return ControlFlow::Continue(());
                            }
                            tracing::warn!(%key, error = %err, "re-subscribe failed");
                            return self.rule(Failure::Transport(err));
                        }
                    }
                }
            },

            Pending::Unsubscribe { server_id, reply } => {
                let reason = match result {
                    Ok(Value::Bool(true)) => None,
                    Ok(other) => Some(format!("node returned {other}")),
                    Err(e) => Some(e.to_string()),
                };
                match (reason, reply) {
                    (None, Some(reply)) => {
                        let _ = reply.send(Ok(()));
                    }
                    (None, None) => {}
                    (Some(reason), Some(reply)) => {
                        let _ = reply.send(Err(TransportError::Unsubscribe {
                            subscription: server_id.clone(),
                            reason: reason.clone(),
                        }));
                        return self.rule(Failure::Transport(TransportError::Unsubscribe {
                            subscription: server_id,
                            reason,
                        }));
                    }
                    (Some(reason), None) => {
                        tracing::warn!(subscription = %server_id, %reason, "cleanup unsubscribe failed");
                        return self.rule(Failure::Transport(TransportError::Unsubscribe {
                            subscription: server_id,
                            reason,
                        }));
                    }
                }
            }
        }
        ControlFlow::Continue(())
    }

    /// Ask the policy. `Break(Abort)` means stop.
    fn rule(&self, failure: Failure) -> ControlFlow<Exit> {
        match self.policy.on_failure(&failure) {
            Disposition::Abort => ControlFlow::Break(Exit::Abort(failure)),
            Disposition::Continue => ControlFlow::Continue(()),
        }
    }

    fn resubscribe(&mut self, link: &Link) {
        let descriptors = self.registry.descriptors();
        if descriptors.is_empty() {
            return;
        }
        tracing::info!(count = descriptors.len(), "re-issuing subscriptions");
        for (key, descriptor) in descriptors {
            let reply = self.unconfirmed.remove(&key);
            self.issue_subscribe(link, key, &descriptor, reply);
        }
    }

    fn resubscribing(&self, key: SubscriptionKey) -> bool {
        self.pending
            .values()
            .any(|p| matches!(p, Pending::Subscribe { key: k, reply: None } if *k == key))
    }

    fn issue_subscribe(
        &mut self,
        link: &Link,
        key: SubscriptionKey,
        descriptor: &SubscriptionDescriptor,
        reply: Option<Reply<SubscriptionKey>>,
    ) {
        let id = self.next_id();
        self.pending.insert(id, Pending::Subscribe { key, reply });
        send(
            link,
            &JsonRpcRequest::subscribe(id, &descriptor.kind, &descriptor.params),
        );
    }

    fn issue_unsubscribe(&mut self, link: &Link, server_id: String, reply: Option<Reply<()>>) {
        let id = self.next_id();
        let req = JsonRpcRequest::unsubscribe(id, &server_id);
        self.pending.insert(id, Pending::Unsubscribe { server_id, reply });
        send(link, &req);
    }

    /// The connection is gone: fail in-flight calls and forget node ids.
    /// Subscriptions stay registered and are re-issued on the next connect.
    fn drop_connection(&mut self) {
        for (_, pending) in self.pending.drain() {
            match pending {
                Pending::Call(reply) => {
                    let _ = reply.send(Err(TransportError::Ended));
                }
                Pending::Subscribe {
                    key,
                    reply: Some(reply),
                } => {
                    self.unconfirmed.insert(key, reply);
                }
                Pending::Subscribe { key, reply: None } => {
                    if let Some(cancel) = self.cancelled.remove(&key) {
                        let _ = cancel.send(Ok(()));
                    }
                }
                // The node-side subscription died with the connection.
                Pending::Unsubscribe { reply, .. } => {
                    if let Some(reply) = reply {
                        let _ = reply.send(Ok(()));
                    }
                }
            }
        }
        self.registry.clear_bindings();
    }

    fn terminate(&mut self, failure: Failure) -> Failure {
        let reason = failure.to_string();
        tracing::error!(url = %self.connector.url(), %reason, "supervisor terminated");

        for (_, pending) in self.pending.drain() {
            match pending {
                Pending::Call(reply) => {
                    let _ = reply.send(Err(TransportError::Terminated));
                }
                Pending::Subscribe { reply, .. } => {
                    if let Some(reply) = reply {
                        let _ = reply.send(Err(TransportError::Terminated));
                    }
                }
                Pending::Unsubscribe { reply, .. } => {
                    if let Some(reply) = reply {
                        let _ = reply.send(Err(TransportError::Terminated));
                    }
                }
            }
        }
        for (_, reply) in self.unconfirmed.drain() {
            let _ = reply.send(Err(TransportError::Terminated));
        }
        for (_, reply) in self.cancelled.drain() {
            let _ = reply.send(Err(TransportError::Terminated));
        }
        // Closes every subscription stream.
        self.registry = SubscriptionRegistry::new();

        self.set_state(ConnectionState::Terminated(reason));
        failure
    }

    fn set_state(&self, state: ConnectionState) {
        tracing::debug!(%state, "connection state");
        self.state.send_replace(state);
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

fn send(link: &Link, req: &JsonRpcRequest) {
    match serde_json::to_string(req) {
        Ok(text) => {
            if !link.send(text) {
                // The link's close event is already queued; the request is
                // failed when it is processed.
                tracing::debug!(method = %req.method, "link closed before send");
            }
        }
        Err(e) => tracing::error!(method = %req.method, error = %e, "request not serializable"),
    }
}

/// Cloneable handle to a running [`Supervisor`].
#[derive(Clone)]
pub struct ConnectionHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    url: Arc<str>,
}

impl ConnectionHandle {
    /// `eth_subscribe(kind, ...params)`. The returned receiver keeps
    /// receiving across reconnects until the subscription is cancelled or
    /// the supervisor terminates.
    pub async fn subscribe(
        &self,
        kind: &str,
        params: Vec<Value>,
    ) -> Result<(SubscriptionKey, mpsc::UnboundedReceiver<Value>), TransportError> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (reply, response) = oneshot::channel();
        self.send(Command::Subscribe {
            descriptor: SubscriptionDescriptor {
                kind: kind.to_string(),
                params,
            },
            sender,
            reply,
        })?;
        let key = response.await.map_err(|_| TransportError::Terminated)??;
        Ok((key, receiver))
    }

    /// `eth_unsubscribe`. A node error or a `false` result is returned here
    /// and also ruled on by the supervisor's policy.
    pub async fn unsubscribe(&self, key: SubscriptionKey) -> Result<(), TransportError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Unsubscribe { key, reply })?;
        response.await.map_err(|_| TransportError::Terminated)?
    }

    /// Hand a failure to the supervisor's policy and wait for its ruling.
    ///
    /// A supervisor that has already terminated rules `Abort`.
    pub async fn report(&self, failure: Failure) -> Disposition {
        let (ruling, response) = oneshot::channel();
        if let Err(mpsc::error::SendError(Command::Report { failure, .. })) =
            self.commands.send(Command::Report { failure, ruling })
        {
            tracing::debug!(error = %failure, "failure reported after termination");
            return Disposition::Abort;
        }
        response.await.unwrap_or(Disposition::Abort)
    }

    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    fn send(&self, cmd: Command) -> Result<(), TransportError> {
        self.commands
            .send(cmd)
            .map_err(|_| TransportError::Terminated)
    }
}

#[async_trait]
impl RpcTransport for ConnectionHandle {
    async fn request(&self, method: &str, params: Vec<Value>) -> Result<Value, TransportError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Call {
            method: method.to_string(),
            params,
            reply,
        })?;
        response.await.map_err(|_| TransportError::Terminated)?
    }

    fn url(&self) -> &str {
        &self.url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{memory, MemoryNode};
    use crate::policy::{FailFast, LogAndContinue};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::task::JoinHandle;

    fn start(
        policy: impl FailurePolicy,
    ) -> (ConnectionHandle, MemoryNode, JoinHandle<Result<(), Failure>>) {
        let (connector, node) = memory("memory://node");
        let (supervisor, handle) = Supervisor::new(connector, policy);
        let task = tokio::spawn(supervisor.run());
        (handle, node, task)
    }

    fn spawn_request(
        handle: &ConnectionHandle,
        method: &'static str,
    ) -> JoinHandle<Result<Value, TransportError>> {
        let handle = handle.clone();
        tokio::spawn(async move { handle.request(method, vec![]).await })
    }

    fn spawn_subscribe(
        handle: &ConnectionHandle,
    ) -> JoinHandle<Result<(SubscriptionKey, mpsc::UnboundedReceiver<Value>), TransportError>> {
        let handle = handle.clone();
        tokio::spawn(async move { handle.subscribe("newHeads", vec![]).await })
    }

    #[tokio::test]
    async fn request_round_trip() {
        let (handle, mut node, _task) = start(FailFast);
        let mut session = node.accept().await.unwrap();

        let call = spawn_request(&handle, "eth_blockNumber");
        let req = session.next_request().await.unwrap();
        assert_eq!(req.method, "eth_blockNumber");
        session.reply(&req.id, json!("0x10"));

        assert_eq!(call.await.unwrap().unwrap(), json!("0x10"));
        assert_eq!(handle.state(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn node_error_reply_is_returned_not_fatal() {
        let (handle, mut node, task) = start(FailFast);
        let mut session = node.accept().await.unwrap();

        let call = spawn_request(&handle, "eth_call");
        let req = session.next_request().await.unwrap();
        session.reply_error(&req.id, -32000, "execution reverted");

        assert!(matches!(
            call.await.unwrap(),
            Err(TransportError::Rpc(e)) if e.code == -32000
        ));
        assert!(!task.is_finished());
    }

    #[tokio::test]
    async fn ended_connection_reconnects_exactly_once() {
        let (handle, mut node, task) = start(FailFast);
        let mut first = node.accept().await.unwrap();

        let call = spawn_request(&handle, "eth_blockNumber");
        first.next_request().await.unwrap();
        first.end();

        assert!(matches!(call.await.unwrap(), Err(TransportError::Ended)));

        let mut second = node.accept().await.unwrap();
        let call = spawn_request(&handle, "eth_chainId");
        let req = second.next_request().await.unwrap();
        second.reply(&req.id, json!("0x1"));
        assert_eq!(call.await.unwrap().unwrap(), json!("0x1"));

        assert_eq!(node.attempts(), 2);
        assert!(node.try_accept().is_none());
        assert!(!task.is_finished());
    }

    #[tokio::test]
    async fn error_signal_terminates_under_fail_fast() {
        let (handle, mut node, task) = start(FailFast);
        let first = node.accept().await.unwrap();
        first.fail("connection reset by peer");

        let result = task.await.unwrap();
        assert!(matches!(
            result,
            Err(Failure::Transport(TransportError::WebSocket(_)))
        ));
        assert!(matches!(handle.state(), ConnectionState::Terminated(_)));
        assert_eq!(node.attempts(), 1);
        assert!(matches!(
            handle.request("eth_chainId", vec![]).await,
            Err(TransportError::Terminated)
        ));
    }

    #[tokio::test]
    async fn refused_connect_is_an_error_signal() {
        let (handle, node, task) = start(FailFast);
        node.refuse_next("connection refused");

        assert!(task.await.unwrap().is_err());
        assert_eq!(node.attempts(), 1);
        assert!(matches!(handle.state(), ConnectionState::Terminated(_)));
    }

    #[tokio::test]
    async fn log_and_continue_reconnects_after_error() {
        let (_handle, mut node, task) = start(LogAndContinue);
        let first = node.accept().await.unwrap();
        first.fail("connection reset by peer");

        let _second = node.accept().await.unwrap();
        assert_eq!(node.attempts(), 2);
        assert!(!task.is_finished());
    }

    #[tokio::test]
    async fn subscriptions_survive_reconnect() {
        let (handle, mut node, _task) = start(FailFast);
        let mut first = node.accept().await.unwrap();

        let sub = spawn_subscribe(&handle);
        let req = first.next_request().await.unwrap();
        assert_eq!(req.method, "eth_subscribe");
        assert_eq!(req.params, vec![json!("newHeads")]);
        first.reply(&req.id, json!("0xa"));
        let (_key, mut rx) = sub.await.unwrap().unwrap();

        first.notify("0xa", json!({"number": "0x1"}));
        assert_eq!(rx.recv().await.unwrap()["number"], "0x1");

        first.end();
        let mut second = node.accept().await.unwrap();
        let req = second.next_request().await.unwrap();
        assert_eq!(req.method, "eth_subscribe");
        assert_eq!(req.params, vec![json!("newHeads")]);
        second.reply(&req.id, json!("0xb"));

        // The old id is dead; only the re-bound one is delivered.
        second.notify("0xa", json!({"number": "0x2"}));
        second.notify("0xb", json!({"number": "0x3"}));
        assert_eq!(rx.recv().await.unwrap()["number"], "0x3");
    }

    #[tokio::test]
    async fn subscribe_in_flight_waits_for_the_next_connection() {
        let (handle, mut node, _task) = start(FailFast);
        let mut first = node.accept().await.unwrap();

        let sub = spawn_subscribe(&handle);
        first.next_request().await.unwrap();
        first.end();

        let mut second = node.accept().await.unwrap();
        let req = second.next_request().await.unwrap();
        second.reply(&req.id, json!("0xc"));

        let (_key, mut rx) = sub.await.unwrap().unwrap();
        second.notify("0xc", json!("hello"));
        assert_eq!(rx.recv().await.unwrap(), json!("hello"));
    }

    async fn subscribed(
        handle: &ConnectionHandle,
        node: &mut MemoryNode,
    ) -> (crate::memory::MemorySession, SubscriptionKey) {
        let mut session = node.accept().await.unwrap();
        let sub = spawn_subscribe(handle);
        let req = session.next_request().await.unwrap();
        session.reply(&req.id, json!("0xa"));
        let (key, _rx) = sub.await.unwrap().unwrap();
        (session, key)
    }

    #[tokio::test]
    async fn rejected_unsubscribe_is_returned_and_ruled_on() {
        let failures = Arc::new(AtomicUsize::new(0));
        let counter = failures.clone();
        let policy = move |_: &Failure| {
            counter.fetch_add(1, Ordering::SeqCst);
            Disposition::Continue
        };
        let (handle, mut node, _task) = start(policy);
        let (mut session, key) = subscribed(&handle, &mut node).await;

        let unsub = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.unsubscribe(key).await })
        };
        let req = session.next_request().await.unwrap();
        assert_eq!(req.method, "eth_unsubscribe");
        assert_eq!(req.params, vec![json!("0xa")]);
        session.reply(&req.id, json!(false));

        assert!(matches!(
            unsub.await.unwrap(),
            Err(TransportError::Unsubscribe { .. })
        ));
        assert_eq!(failures.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn rejected_unsubscribe_terminates_under_fail_fast() {
        let (handle, mut node, task) = start(FailFast);
        let (mut session, key) = subscribed(&handle, &mut node).await;

        let unsub = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.unsubscribe(key).await })
        };
        let req = session.next_request().await.unwrap();
        session.reply_error(&req.id, -32000, "subscription not found");

        assert!(unsub.await.unwrap().is_err());
        assert!(matches!(
            task.await.unwrap(),
            Err(Failure::Transport(TransportError::Unsubscribe { .. }))
        ));
    }

    #[tokio::test]
    async fn successful_unsubscribe() {
        let (handle, mut node, _task) = start(FailFast);
        let (mut session, key) = subscribed(&handle, &mut node).await;

        let unsub = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.unsubscribe(key).await })
        };
        let req = session.next_request().await.unwrap();
        session.reply(&req.id, json!(true));
        unsub.await.unwrap().unwrap();

        assert!(matches!(
            handle.unsubscribe(key).await,
            Err(TransportError::Unsubscribe { .. })
        ));
    }

    /// Subscribe on a first session, end it, and return the second session
    /// with the re-subscribe still unanswered.
    async fn resubscribing(
        handle: &ConnectionHandle,
        node: &mut MemoryNode,
    ) -> (crate::memory::MemorySession, JsonRpcRequest, SubscriptionKey) {
        let (first, key) = subscribed(handle, node).await;
        first.end();
        let mut second = node.accept().await.unwrap();
        let resubscribe = second.next_request().await.unwrap();
        assert_eq!(resubscribe.method, "eth_subscribe");
        (second, resubscribe, key)
    }

    #[tokio::test]
    async fn cancel_during_resubscribe_waits_for_the_cleanup() {
        let (handle, mut node, task) = start(FailFast);
        let (mut second, resubscribe, key) = resubscribing(&handle, &mut node).await;

        let unsub = handle.unsubscribe(key);
        tokio::pin!(unsub);
        assert!(futures::poll!(&mut unsub).is_pending());
        // Commands are handled in order, so the cancel is in once this is on the wire.
        let _call = spawn_request(&handle, "eth_chainId");
        assert_eq!(second.next_request().await.unwrap().method, "eth_chainId");

        second.reply(&resubscribe.id, json!("0xb"));
        let cleanup = second.next_request().await.unwrap();
        assert_eq!(cleanup.method, "eth_unsubscribe");
        assert_eq!(cleanup.params, vec![json!("0xb")]);
        assert!(futures::poll!(&mut unsub).is_pending());

        second.reply(&cleanup.id, json!(true));
        unsub.await.unwrap();
        assert!(!task.is_finished());
    }

    #[tokio::test]
    async fn rejected_cleanup_after_cancel_terminates_under_fail_fast() {
        let (handle, mut node, task) = start(FailFast);
        let (mut second, resubscribe, key) = resubscribing(&handle, &mut node).await;

        let unsub = handle.unsubscribe(key);
        tokio::pin!(unsub);
        assert!(futures::poll!(&mut unsub).is_pending());
        let _call = spawn_request(&handle, "eth_chainId");
        assert_eq!(second.next_request().await.unwrap().method, "eth_chainId");

        second.reply(&resubscribe.id, json!("0xb"));
        let cleanup = second.next_request().await.unwrap();
        assert_eq!(cleanup.method, "eth_unsubscribe");
        second.reply(&cleanup.id, json!(false));

        assert!(matches!(
            unsub.await,
            Err(TransportError::Unsubscribe { .. })
        ));
        assert!(matches!(
            task.await.unwrap(),
            Err(Failure::Transport(TransportError::Unsubscribe { .. }))
        ));
    }

    #[tokio::test]
    async fn reported_handler_failure_terminates_under_fail_fast() {
        let (handle, mut node, task) = start(FailFast);
        let _session = node.accept().await.unwrap();

        assert_eq!(
            handle.report(Failure::handler("logs", "bad event")).await,
            Disposition::Abort
        );
        assert!(matches!(
            task.await.unwrap(),
            Err(Failure::Handler { .. })
        ));
    }

    #[tokio::test]
    async fn dropping_every_handle_shuts_down() {
        let (handle, mut node, task) = start(FailFast);
        let _session = node.accept().await.unwrap();
        let mut state = handle.watch_state();
        state
            .wait_for(|s| *s == ConnectionState::Connected)
            .await
            .unwrap();

        drop(handle);
        task.await.unwrap().unwrap();
        assert_eq!(*state.borrow(), ConnectionState::Disconnected);
    }
}
