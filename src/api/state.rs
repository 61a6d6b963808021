//! Application state for the MCP server.

use std::sync::Arc;

use crate::backend::ApiClient;
use crate::session::SessionRegistry;

/// Shared application state.
///
/// Holds the session registry and the backend client every new dispatcher
/// is built with. Cloning is cheap; clones share both.
#[derive(Clone)]
pub struct AppState {
    sessions: Arc<SessionRegistry>,
    client: ApiClient,
}

impl AppState {
    pub fn new(sessions: Arc<SessionRegistry>, client: ApiClient) -> Self {
        Self { sessions, client }
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }
}
