//! Message plumbing between HTTP exchanges and a session's dispatcher.
//!
//! Each session owns two in-memory channels. Inbound client messages go
//! through one FIFO channel to the rmcp service. Outbound server messages are
//! read by a pump task, which hands replies to the exchange waiting on that
//! request id and fans every other message out to `GET /mcp` listeners.

use std::fmt;
use std::sync::{Arc, Weak};

use dashmap::{DashMap, mapref::entry::Entry};
use futures::{StreamExt, channel::mpsc};
use miette::Diagnostic;
use rmcp::model::{ClientJsonRpcMessage, ServerJsonRpcMessage};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{broadcast, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::{CloseReason, Session, SessionId};

/// Buffered unsolicited messages per session before slow listeners lag.
const NOTIFICATION_BUFFER: usize = 64;

/// Failures while handing a message to a session.
#[derive(Error, Diagnostic, Debug, Clone, PartialEq, Eq)]
pub enum ExchangeError {
    #[error("{0}")]
    #[diagnostic(code(superthread_mcp::session::malformed))]
    Malformed(String),

    #[error("request id {0} is already in flight on this session")]
    #[diagnostic(code(superthread_mcp::session::duplicate_request))]
    DuplicateRequest(MessageKey),

    #[error("session is closed")]
    #[diagnostic(code(superthread_mcp::session::closed))]
    Closed,
}

/// JSON-RPC id in canonical JSON form, so `1` and `"1"` stay distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageKey(String);

impl MessageKey {
    fn from_id(id: &Value) -> Option<Self> {
        match id {
            Value::String(_) | Value::Number(_) => Some(Self(id.to_string())),
            _ => None,
        }
    }
}

impl fmt::Display for MessageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What kind of JSON-RPC message the client sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundKind {
    /// Expects a reply carrying the same id.
    Request(MessageKey),
    Notification,
    /// The client answering a server-initiated request.
    Response,
}

/// One parsed client message, ready for delivery.
#[derive(Debug)]
pub struct InboundMessage {
    kind: InboundKind,
    initialize: bool,
    message: ClientJsonRpcMessage,
}

impl InboundMessage {
    /// Parse an HTTP body holding exactly one JSON-RPC 2.0 message.
    pub fn parse(body: &[u8]) -> Result<Self, ExchangeError> {
        let raw: Value =
            serde_json::from_slice(body).map_err(|e| ExchangeError::Malformed(e.to_string()))?;

        let Value::Object(fields) = &raw else {
            return Err(ExchangeError::Malformed(
                "expected a single JSON-RPC message object".to_string(),
            ));
        };

        if fields.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
            return Err(ExchangeError::Malformed(
                "missing or unsupported jsonrpc version".to_string(),
            ));
        }

        let method = fields.get("method").and_then(Value::as_str);
        let id = fields.get("id").and_then(MessageKey::from_id);

        let kind = match (method, id) {
            (Some(_), Some(key)) => InboundKind::Request(key),
            (Some(_), None) => InboundKind::Notification,
            (None, Some(_)) => InboundKind::Response,
            (None, None) => {
                return Err(ExchangeError::Malformed(
                    "message has neither a method nor an id".to_string(),
                ));
            }
        };

        let initialize = method == Some("initialize")
            && matches!(kind, InboundKind::Request(_))
            && fields.get("params").is_some_and(Value::is_object);

        let message = serde_json::from_value(raw)
            .map_err(|e| ExchangeError::Malformed(format!("invalid MCP message: {e}")))?;

        Ok(Self {
            kind,
            initialize,
            message,
        })
    }

    pub fn kind(&self) -> &InboundKind {
        &self.kind
    }

    /// True for a well-formed `initialize` request, the only message that
    /// may open a new session.
    pub fn is_initialize(&self) -> bool {
        self.initialize
    }

    pub fn expects_reply(&self) -> bool {
        matches!(self.kind, InboundKind::Request(_))
    }
}

/// The dispatcher's ends of the session channels.
pub(crate) struct DispatcherLink {
    pub outbound: mpsc::UnboundedSender<ServerJsonRpcMessage>,
    pub inbound: mpsc::UnboundedReceiver<ClientJsonRpcMessage>,
}

type Waiters = DashMap<MessageKey, oneshot::Sender<Value>>;

/// The session's ends of the channels.
pub(crate) struct SessionChannel {
    inbound: mpsc::UnboundedSender<ClientJsonRpcMessage>,
    waiters: Arc<Waiters>,
    notifications: broadcast::Sender<Value>,
}

impl SessionChannel {
    /// Build both channel ends and start the outbound pump. The pump stops
    /// when `signal` fires or the dispatcher drops its sender.
    pub(crate) fn open(id: SessionId, signal: CancellationToken) -> (Self, DispatcherLink) {
        let (inbound_tx, inbound_rx) = mpsc::unbounded();
        let (outbound_tx, outbound_rx) = mpsc::unbounded();
        let (notifications, _) = broadcast::channel(NOTIFICATION_BUFFER);
        let waiters = Arc::new(Waiters::new());

        tokio::spawn(pump(
            id,
            outbound_rx,
            Arc::clone(&waiters),
            notifications.clone(),
            signal,
        ));

        let channel = Self {
            inbound: inbound_tx,
            waiters,
            notifications,
        };
        let link = DispatcherLink {
            outbound: outbound_tx,
            inbound: inbound_rx,
        };
        (channel, link)
    }

    /// Queue a client message for the dispatcher. Requests return the
    /// receiver their reply will arrive on.
    pub(crate) fn deliver(
        &self,
        message: InboundMessage,
    ) -> Result<Option<oneshot::Receiver<Value>>, ExchangeError> {
        let InboundMessage { kind, message, .. } = message;

        let reply = match &kind {
            InboundKind::Request(key) => {
                let (tx, rx) = oneshot::channel();
                match self.waiters.entry(key.clone()) {
                    Entry::Occupied(_) => return Err(ExchangeError::DuplicateRequest(key.clone())),
                    Entry::Vacant(slot) => {
                        slot.insert(tx);
                    }
                }
                Some(rx)
            }
            InboundKind::Notification | InboundKind::Response => None,
        };

        if self.inbound.unbounded_send(message).is_err() {
            if let InboundKind::Request(key) = &kind {
                self.waiters.remove(key);
            }
            return Err(ExchangeError::Closed);
        }

        Ok(reply)
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<Value> {
        self.notifications.subscribe()
    }

    /// Stop accepting client messages. The dispatcher sees end-of-stream.
    pub(crate) fn close(&self) {
        self.inbound.close_channel();
    }
}

async fn pump(
    id: SessionId,
    mut outbound: mpsc::UnboundedReceiver<ServerJsonRpcMessage>,
    waiters: Arc<Waiters>,
    notifications: broadcast::Sender<Value>,
    signal: CancellationToken,
) {
    loop {
        let message = tokio::select! {
            _ = signal.cancelled() => break,
            next = outbound.next() => match next {
                Some(message) => message,
                None => break,
            },
        };

        let value = match serde_json::to_value(&message) {
            Ok(value) => value,
            Err(e) => {
                error!(session_id = %id, error = %e, "failed to encode server message");
                continue;
            }
        };

        route(&id, value, &waiters, &notifications);
    }

    // Dropping the senders wakes every exchange still waiting on a reply
    waiters.clear();
    debug!(session_id = %id, "outbound pump stopped");
}

fn route(id: &SessionId, value: Value, waiters: &Waiters, notifications: &broadcast::Sender<Value>) {
    let reply_key = if value.get("method").is_none() {
        value.get("id").and_then(MessageKey::from_id)
    } else {
        None
    };

    match reply_key {
        Some(key) => match waiters.remove(&key) {
            Some((_, waiter)) => {
                if waiter.send(value).is_err() {
                    debug!(session_id = %id, request_id = %key, "exchange gone before its reply");
                }
            }
            None => warn!(session_id = %id, request_id = %key, "reply for an unknown request"),
        },
        None => {
            // No listener is not an error; the message is simply dropped
            let _ = notifications.send(value);
        }
    }
}

/// Closes its session if dropped while armed.
///
/// Held across the await of an exchange. If the client tears down the
/// connection, the handler future (or response stream) is dropped with the
/// guard still armed, which closes the session.
pub struct ExchangeGuard {
    session: Weak<Session>,
    armed: bool,
}

impl ExchangeGuard {
    pub fn arm(session: &Arc<Session>) -> Self {
        Self {
            session: Arc::downgrade(session),
            armed: true,
        }
    }

    /// The exchange completed; dropping the guard is now harmless.
    pub fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ExchangeGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Some(session) = self.session.upgrade() {
            session.close(CloseReason::ClientDisconnected);
        }
    }
}
