//! The slices of Superthread payloads this server reads.
//!
//! Everything else is passed through to the agent as raw JSON.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `GET /users/me` response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CurrentUser {
    #[serde(default)]
    pub user: UserProfile,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserProfile {
    pub id: Option<String>,
    #[serde(default)]
    pub teams: Vec<TeamRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TeamRef {
    pub id: String,
}

impl CurrentUser {
    /// IDs of every team (workspace) the user belongs to.
    pub fn team_ids(&self) -> Vec<String> {
        self.user.teams.iter().map(|t| t.id.clone()).collect()
    }
}

/// One object in a search result list. Fields beyond `id` and `title` are
/// preserved so they can be echoed back verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `GET /{team}/search` response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchResults {
    pub cursor: Option<String>,
    pub count: Option<u64>,
    pub boards: Option<Vec<SearchHit>>,
    pub cards: Option<Vec<SearchHit>>,
    pub pages: Option<Vec<SearchHit>>,
    pub projects: Option<Vec<SearchHit>>,
    pub epics: Option<Vec<SearchHit>>,
    pub notes: Option<Vec<SearchHit>>,
}

/// `GET /{team}/boards/{id}` wraps the board in an envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct BoardEnvelope {
    pub board: Value,
}
