//! MCP sessions.
//!
//! A session binds one client-held id to one tool dispatcher for its whole
//! life. Every close trigger (client disconnect, `DELETE /mcp`, process
//! shutdown, the dispatcher stopping) cancels the same per-session signal;
//! the registry's supervisor task turns that signal into exactly one
//! close-then-evict.

mod exchange;
pub mod registry;


use std::borrow::Borrow;
use std::fmt;
use std::sync::OnceLock;

use rmcp::ServerHandler;
use serde_json::Value;
use tokio::sync::{broadcast, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::auth::BearerToken;

pub use exchange::{ExchangeError, ExchangeGuard, InboundKind, InboundMessage, MessageKey};
pub use registry::SessionRegistry;

use exchange::{DispatcherLink, SessionChannel};

/// A tool dispatcher that can be bound to a session.
///
/// `shutdown` is called exactly once when the session closes and must abort
/// any backend work still in flight.
pub trait ToolDispatcher: ServerHandler + Clone {
    fn shutdown(&self);
}

/// Opaque session identifier, sent to clients in the `mcp-session-id` header.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl Borrow<str> for SessionId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, MCP handshake not yet complete.
    Initializing,
    Active,
    /// Terminal.
    Closed,
}

impl SessionState {
    pub fn can_transition_to(self, next: SessionState) -> bool {
        matches!(
            (self, next),
            (Self::Initializing, Self::Active)
                | (Self::Initializing, Self::Closed)
                | (Self::Active, Self::Closed)
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Initializing => "initializing",
            Self::Active => "active",
            Self::Closed => "closed",
        })
    }
}

/// What closed a session. Only the first trigger is recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    ClientDisconnected,
    Terminated,
    Shutdown,
    DispatcherStopped,
    HandshakeFailed,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ClientDisconnected => "client disconnected",
            Self::Terminated => "terminated by client",
            Self::Shutdown => "server shutdown",
            Self::DispatcherStopped => "dispatcher stopped",
            Self::HandshakeFailed => "handshake failed",
        })
    }
}

/// One live client session.
pub struct Session {
    id: SessionId,
    state: watch::Sender<SessionState>,
    credential: Vec<u8>,
    signal: CancellationToken,
    close_reason: OnceLock<CloseReason>,
    channel: SessionChannel,
}

impl Session {
    /// Build a session and start its outbound pump. The returned link is the
    /// dispatcher's side of the message channels.
    pub(crate) fn open(
        id: SessionId,
        token: &BearerToken,
        signal: CancellationToken,
    ) -> (Self, DispatcherLink) {
        let (channel, link) = SessionChannel::open(id.clone(), signal.clone());
        let (state, _) = watch::channel(SessionState::Initializing);

        let session = Self {
            id,
            state,
            credential: token.fingerprint(),
            signal,
            close_reason: OnceLock::new(),
            channel,
        };
        (session, link)
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Not closed and no close trigger has fired yet.
    pub fn is_live(&self) -> bool {
        self.state() != SessionState::Closed && !self.signal.is_cancelled()
    }

    /// Whether `token` is the credential this session was created with.
    pub fn is_bound_to(&self, token: &BearerToken) -> bool {
        self.credential == token.fingerprint()
    }

    pub fn close_reason(&self) -> Option<CloseReason> {
        self.close_reason.get().copied()
    }

    /// Mark the handshake complete. Returns false if the session was not
    /// initializing.
    pub(crate) fn activate(&self) -> bool {
        let activated = self.transition(SessionState::Active);
        if activated {
            debug!(session_id = %self.id, "session active");
        }
        activated
    }

    /// Fire the close signal. Idempotent; the first reason wins.
    pub fn close(&self, reason: CloseReason) {
        if self.close_reason.set(reason).is_ok() {
            debug!(session_id = %self.id, %reason, "session close requested");
        }
        self.signal.cancel();
    }

    /// Resolves once the session has been closed and evicted.
    pub async fn closed(&self) {
        let mut state = self.state.subscribe();
        let _ = state.wait_for(|s| *s == SessionState::Closed).await;
    }

    /// Token cancelled by any close trigger.
    pub fn signal(&self) -> CancellationToken {
        self.signal.clone()
    }

    /// Hand a client message to the dispatcher.
    pub fn deliver(
        &self,
        message: InboundMessage,
    ) -> Result<Option<oneshot::Receiver<Value>>, ExchangeError> {
        if !self.is_live() {
            return Err(ExchangeError::Closed);
        }
        self.channel.deliver(message)
    }

    /// Listen for unsolicited server messages.
    pub fn subscribe(&self) -> broadcast::Receiver<Value> {
        self.channel.subscribe()
    }

    /// Enter the terminal state and stop feeding the dispatcher.
    pub(crate) fn finish(&self) {
        self.transition(SessionState::Closed);
        self.channel.close();
    }

    fn transition(&self, next: SessionState) -> bool {
        self.state.send_if_modified(|state| {
            if state.can_transition_to(next) {
                *state = next;
                true
            } else {
                false
            }
        })
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("close_reason", &self.close_reason())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transitions() {
        use SessionState::*;
        assert!(Initializing.can_transition_to(Active));
        assert!(Initializing.can_transition_to(Closed));
        assert!(Active.can_transition_to(Closed));
        assert!(!Active.can_transition_to(Initializing));
        assert!(!Closed.can_transition_to(Active));
        assert!(!Closed.can_transition_to(Closed));
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let a = SessionId::generate();
        let b = SessionId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_keeps_first_reason() {
        let (session, _link) = Session::open(
            SessionId::generate(),
            &BearerToken::new("t1"),
            CancellationToken::new(),
        );

        session.close(CloseReason::Terminated);
        session.close(CloseReason::Shutdown);

        assert_eq!(session.close_reason(), Some(CloseReason::Terminated));
        assert!(session.signal().is_cancelled());
        assert!(!session.is_live());
    }

    #[tokio::test]
    async fn test_activate_then_finish() {
        let (session, _link) = Session::open(
            SessionId::generate(),
            &BearerToken::new("t1"),
            CancellationToken::new(),
        );

        assert_eq!(session.state(), SessionState::Initializing);
        assert!(session.activate());
        assert!(!session.activate());
        assert_eq!(session.state(), SessionState::Active);

        session.finish();
        assert_eq!(session.state(), SessionState::Closed);
        session.closed().await;
    }

    #[tokio::test]
    async fn test_credential_binding() {
        let (session, _link) = Session::open(
            SessionId::generate(),
            &BearerToken::new("t1"),
            CancellationToken::new(),
        );
        assert!(session.is_bound_to(&BearerToken::new("t1")));
        assert!(!session.is_bound_to(&BearerToken::new("t2")));
    }

    #[tokio::test]
    async fn test_deliver_after_close_is_rejected() {
        let (session, _link) = Session::open(
            SessionId::generate(),
            &BearerToken::new("t1"),
            CancellationToken::new(),
        );
        session.close(CloseReason::Terminated);

        let message = InboundMessage::parse(
            br#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
        )
        .unwrap();
        assert_eq!(session.deliver(message).unwrap_err(), ExchangeError::Closed);
    }
}
