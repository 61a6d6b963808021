//! Tool implementations, grouped by Superthread entity.
//!
//! Each tool is a plain async function over an [`ApiClient`] and the
//! session's bearer token. The rmcp wiring lives in [`super::server`].

pub mod boards;
pub mod cards;
pub mod projects;
pub mod user;


use std::collections::HashSet;

use miette::Diagnostic;
use serde_json::Value;
use thiserror::Error;

use crate::auth::BearerToken;
use crate::backend::models::SearchHit;
use crate::backend::{ApiClient, BackendError, SearchObjectType, SearchOptions, search};

/// Tool-level failures. These become `isError` results, never protocol
/// errors, so the session survives them.
#[derive(Error, Diagnostic, Debug)]
pub enum ToolError {
    #[error(transparent)]
    #[diagnostic(code(superthread_mcp::tools::backend))]
    Backend(#[from] BackendError),

    #[error("{0}")]
    #[diagnostic(code(superthread_mcp::tools::invalid_arguments))]
    InvalidArguments(String),

    #[error("{0}")]
    #[diagnostic(code(superthread_mcp::tools::not_found))]
    NotFound(String),

    #[error("Error fetching {what} IDs for team {team_id}: {source}")]
    #[diagnostic(code(superthread_mcp::tools::team_search))]
    TeamSearch {
        what: &'static str,
        team_id: String,
        source: BackendError,
    },

    #[error("Tool call cancelled because the session closed")]
    #[diagnostic(code(superthread_mcp::tools::cancelled))]
    Cancelled,
}

impl From<serde_json::Error> for ToolError {
    fn from(e: serde_json::Error) -> Self {
        Self::Backend(e.into())
    }
}

pub type ToolResult = Result<ToolOutput, ToolError>;

/// What a successful tool call returns to the agent.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutput {
    Json(Value),
    Message(String),
}

impl ToolOutput {
    /// Render as the text of the single content item. JSON is pretty-printed;
    /// an empty backend body renders as `null`.
    pub fn into_text(self) -> String {
        match self {
            Self::Json(value) => {
                serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
            }
            Self::Message(message) => message,
        }
    }
}

impl From<Option<Value>> for ToolOutput {
    fn from(body: Option<Value>) -> Self {
        Self::Json(body.unwrap_or(Value::Null))
    }
}

/// Search each of the caller's teams for `kind` objects matching `query`.
///
/// Hits are deduplicated by id; each is paired with the first team it was
/// found in. A failing team search aborts the whole lookup.
pub(crate) async fn find_in_teams(
    client: &ApiClient,
    token: &BearerToken,
    query: &str,
    kind: SearchObjectType,
) -> Result<Vec<(String, SearchHit)>, ToolError> {
    let what = match kind {
        SearchObjectType::Boards => "board",
        SearchObjectType::Cards => "card",
        SearchObjectType::Pages => "page",
        SearchObjectType::Projects => "project",
    };

    let mut seen = HashSet::new();
    let mut found = Vec::new();

    for team_id in user::team_ids(client, token).await? {
        let options = SearchOptions::new(query).with_types(vec![kind]);
        let results = search(client, &team_id, token, &options)
            .await
            .map_err(|source| ToolError::TeamSearch {
                what,
                team_id: team_id.clone(),
                source,
            })?;

        let hits = match kind {
            SearchObjectType::Boards => results.boards,
            SearchObjectType::Cards => results.cards,
            SearchObjectType::Pages => results.pages,
            SearchObjectType::Projects => results.projects,
        };

        for hit in hits.unwrap_or_default() {
            if seen.insert(hit.id.clone()) {
                found.push((team_id.clone(), hit));
            }
        }
    }

    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_output_is_pretty_printed() {
        let text = ToolOutput::Json(serde_json::json!({"id": "b1"})).into_text();
        assert_eq!(text, "{\n  \"id\": \"b1\"\n}");
    }

    #[test]
    fn test_empty_body_renders_null() {
        assert_eq!(ToolOutput::from(None).into_text(), "null");
    }

    #[test]
    fn test_team_search_message() {
        let err = ToolError::TeamSearch {
            what: "board",
            team_id: "team1".into(),
            source: BackendError::MissingToken,
        };
        assert!(
            err.to_string()
                .starts_with("Error fetching board IDs for team team1: ")
        );
    }
}
