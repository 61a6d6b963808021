//! Process-wide table of live sessions.

use std::sync::{Arc, Weak};

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::join_all;
use rmcp::ServiceExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::exchange::DispatcherLink;
use super::{CloseReason, Session, SessionId, ToolDispatcher};
use crate::auth::BearerToken;

/// Live sessions keyed by id.
///
/// Every key maps to a session that has not yet been evicted. Removal happens
/// only in [`SessionRegistry::evict`], which the session's supervisor calls
/// once its close signal fires.
pub struct SessionRegistry {
    sessions: DashMap<SessionId, Arc<Session>>,
    shutdown: CancellationToken,
}

impl SessionRegistry {
    /// `shutdown` is the parent of every session's close signal.
    pub fn new(shutdown: CancellationToken) -> Self {
        Self {
            sessions: DashMap::new(),
            shutdown,
        }
    }

    /// Register a new session bound to `token` and start its dispatcher.
    pub fn create<D: ToolDispatcher>(
        self: &Arc<Self>,
        dispatcher: D,
        token: &BearerToken,
    ) -> Arc<Session> {
        loop {
            let id = SessionId::generate();
            let Entry::Vacant(slot) = self.sessions.entry(id.clone()) else {
                warn!(session_id = %id, "session id collision, regenerating");
                continue;
            };

            let (session, link) = Session::open(id, token, self.shutdown.child_token());
            let session = Arc::new(session);
            slot.insert(Arc::clone(&session));

            spawn_dispatcher(&session, dispatcher.clone(), link);
            self.spawn_supervisor(&session, dispatcher);

            info!(session_id = %session.id(), "session created");
            return session;
        }
    }

    /// Look up a live session.
    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .filter(|session| session.is_live())
    }

    /// Trigger close for `id`. Returns false if no live session has that id.
    pub fn close(&self, id: &str, reason: CloseReason) -> bool {
        match self.get(id) {
            Some(session) => {
                session.close(reason);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Close every session and wait until each has been evicted.
    pub async fn shutdown(&self) {
        let sessions: Vec<Arc<Session>> = self
            .sessions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        info!(count = sessions.len(), "closing all sessions");
        for session in &sessions {
            session.close(CloseReason::Shutdown);
        }
        self.shutdown.cancel();

        join_all(sessions.iter().map(|session| session.closed())).await;
    }

    fn spawn_supervisor<D: ToolDispatcher>(self: &Arc<Self>, session: &Arc<Session>, hook: D) {
        let registry = Arc::downgrade(self);
        let id = session.id().clone();
        let signal = session.signal();

        tokio::spawn(async move {
            signal.cancelled().await;
            hook.shutdown();
            match registry.upgrade() {
                Some(registry) => registry.evict(&id),
                None => debug!(session_id = %id, "registry gone before eviction"),
            }
        });
    }

    fn evict(&self, id: &SessionId) {
        if let Some((_, session)) = self.sessions.remove(id) {
            session.finish();
            let reason = session.close_reason().unwrap_or(CloseReason::Shutdown);
            info!(session_id = %id, %reason, "session closed");
        }
    }
}

/// Run the dispatcher as an rmcp service over the session's channels.
///
/// The handshake completing moves the session to active. Whatever ends the
/// service, the session's close signal is fired afterwards.
fn spawn_dispatcher<D: ToolDispatcher>(session: &Arc<Session>, dispatcher: D, link: DispatcherLink) {
    let signal = session.signal();
    let session: Weak<Session> = Arc::downgrade(session);

    tokio::spawn(async move {
        let transport = (link.outbound, link.inbound);

        let served = tokio::select! {
            _ = signal.cancelled() => None,
            served = dispatcher.serve(transport) => Some(served),
        };

        let reason = match served {
            Some(Ok(running)) => {
                if let Some(session) = session.upgrade() {
                    session.activate();
                }
                match running.waiting().await {
                    Ok(quit) => debug!(?quit, "dispatcher service stopped"),
                    Err(e) => warn!(error = %e, "dispatcher task failed"),
                }
                CloseReason::DispatcherStopped
            }
            Some(Err(e)) => {
                warn!(error = %e, "MCP handshake failed");
                CloseReason::HandshakeFailed
            }
            None => return,
        };

        match session.upgrade() {
            Some(session) => session.close(reason),
            None => signal.cancel(),
        }
    });
}
