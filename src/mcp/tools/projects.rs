//! Project (epic) tools.

use std::collections::HashSet;

use rmcp::{schemars, schemars::JsonSchema};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use super::{ToolOutput, ToolResult, user};
use crate::auth::BearerToken;
use crate::backend::{ApiClient, RequestOptions, SearchOptions, search};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ListProjectsParams {
    #[schemars(
        description = "Use the get_me tool first to get the team IDs available. If needed, confirm with the user which team they want to use."
    )]
    pub team_id: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct GetProjectParams {
    #[schemars(description = "Search query for the project name or description")]
    pub query: String,
    #[schemars(description = "Whether to return only exact matches (default: false)")]
    pub exact_match: Option<bool>,
}

pub async fn list_projects(
    client: &ApiClient,
    token: &BearerToken,
    params: ListProjectsParams,
) -> ToolResult {
    let projects = client
        .request(
            &format!("/{}/epics", params.team_id),
            token,
            RequestOptions::get(),
        )
        .await?;
    Ok(projects.into())
}

/// Search every team for matching projects.
///
/// Unlike the board and card lookups, a team whose search fails is skipped
/// rather than failing the call. With `exact_match`, only projects whose
/// title equals the query (ignoring case) are kept.
pub async fn get_project(
    client: &ApiClient,
    token: &BearerToken,
    params: GetProjectParams,
) -> ToolResult {
    let exact = params.exact_match.unwrap_or(false);
    let wanted = params.query.to_lowercase();

    let mut seen = HashSet::new();
    let mut projects = Vec::new();

    for team_id in user::team_ids(client, token).await? {
        let results = match search(client, &team_id, token, &SearchOptions::new(&params.query)).await
        {
            Ok(results) => results,
            Err(e) => {
                debug!(%team_id, error = %e, "project search failed, skipping team");
                continue;
            }
        };

        for project in results.epics.unwrap_or_default() {
            if !seen.insert(project.id.clone()) {
                continue;
            }
            let matches = !exact
                || project
                    .title
                    .as_deref()
                    .is_some_and(|title| title.to_lowercase() == wanted);
            if matches {
                projects.push(project);
            }
        }
    }

    Ok(ToolOutput::Json(json!({
        "query": params.query,
        "found_projects": projects.len(),
        "projects": projects,
    })))
}
