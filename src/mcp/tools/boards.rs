//! Board tools.

use std::collections::BTreeMap;

use rmcp::{schemars, schemars::JsonSchema};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ToolError, ToolOutput, ToolResult, find_in_teams};
use crate::auth::BearerToken;
use crate::backend::models::BoardEnvelope;
use crate::backend::{ApiClient, RequestOptions, SearchObjectType};

const DEFAULT_LAYOUT: &str = "board";

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BoardListSpec {
    #[schemars(description = "List title")]
    pub title: String,
    #[schemars(description = "List description")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[schemars(description = "List icon")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[schemars(description = "List behavior (e.g., \"backlog\")")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub behavior: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BoardMemberSpec {
    #[schemars(description = "User ID")]
    pub user_id: String,
    #[schemars(description = "User role (e.g., \"admin\")")]
    pub role: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CreateBoardParams {
    #[schemars(
        description = "Use the get_me tool first to get the team IDs available. If needed, confirm with the user which team they want to use."
    )]
    #[serde(skip_serializing)]
    pub team_id: String,
    #[schemars(description = "Board title")]
    pub title: String,
    #[schemars(description = "Project ID to associate the board with")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[schemars(description = "Board description/content")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[schemars(description = "Board icon")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[schemars(description = "Board color")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[schemars(description = "Board layout (defaults to \"board\")")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layout: Option<String>,
    #[schemars(description = "Initial lists to create for the board")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lists: Option<Vec<BoardListSpec>>,
    #[schemars(description = "Initial members to add to the board")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub members: Option<Vec<BoardMemberSpec>>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct UpdateBoardParams {
    #[schemars(
        description = "Use the get_me tool first to get the team IDs available. If needed, confirm with the user which team they want to use."
    )]
    #[serde(skip_serializing)]
    pub team_id: String,
    #[schemars(description = "Use the get_board tool to retrieve the board ID")]
    #[serde(skip_serializing)]
    pub board_id: String,
    #[schemars(description = "Project ID to associate the board with")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[schemars(description = "Board title")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[schemars(description = "Board description/content")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[schemars(description = "Board icon")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[schemars(description = "Board color")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[schemars(description = "Array of image URLs")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_urls: Option<Vec<String>>,
    #[schemars(description = "Thumbnail image URL")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    #[schemars(description = "Archive/unarchive the board")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived: Option<bool>,
    #[schemars(description = "Position/ordering of the board")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
    #[schemars(description = "Version control system mappings")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vcs_mapping: Option<BTreeMap<String, Value>>,
    #[schemars(description = "Board layout")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layout: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ListBoardsParams {
    #[schemars(description = "Use the get_me tool to get the team ID")]
    pub team_id: String,
    #[schemars(description = "Project ID")]
    pub project_id: String,
    #[schemars(description = "Filter for bookmarked boards")]
    pub bookmarked: Option<bool>,
    #[schemars(description = "Filter for archived boards")]
    pub archived: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct GetBoardParams {
    #[schemars(description = "Board title or identifier to search for")]
    pub query: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct DeleteBoardParams {
    #[schemars(
        description = "Use the get_me tool first to get the team IDs available. If needed, confirm with the user which team they want to use."
    )]
    pub team_id: String,
    #[schemars(description = "Use the get_board tool to retrieve the board ID")]
    pub board_id: String,
}

pub async fn create_board(
    client: &ApiClient,
    token: &BearerToken,
    mut params: CreateBoardParams,
) -> ToolResult {
    params
        .layout
        .get_or_insert_with(|| DEFAULT_LAYOUT.to_string());
    let body = serde_json::to_value(&params)?;

    let board = client
        .request(
            &format!("/{}/boards", params.team_id),
            token,
            RequestOptions::post(body),
        )
        .await?;
    Ok(board.into())
}

pub async fn update_board(
    client: &ApiClient,
    token: &BearerToken,
    params: UpdateBoardParams,
) -> ToolResult {
    let body = serde_json::to_value(&params)?;
    let board = client
        .request(
            &format!("/{}/boards/{}", params.team_id, params.board_id),
            token,
            RequestOptions::patch(body),
        )
        .await?;
    Ok(board.into())
}

pub async fn list_boards(
    client: &ApiClient,
    token: &BearerToken,
    params: ListBoardsParams,
) -> ToolResult {
    let mut options = RequestOptions::get().with_query("project_id", &params.project_id);
    if let Some(bookmarked) = params.bookmarked {
        options = options.with_query("bookmarked", bookmarked);
    }
    if let Some(archived) = params.archived {
        options = options.with_query("archived", archived);
    }

    let boards = client
        .request(&format!("/{}/boards", params.team_id), token, options)
        .await?;
    Ok(boards.into())
}

/// Find boards by title or id across all of the caller's teams and fetch
/// each one in full.
pub async fn get_board(client: &ApiClient, token: &BearerToken, params: GetBoardParams) -> ToolResult {
    let hits = find_in_teams(client, token, &params.query, SearchObjectType::Boards).await?;
    if hits.is_empty() {
        return Err(ToolError::NotFound("No boards found".to_string()));
    }

    let mut boards = Vec::with_capacity(hits.len());
    for (team_id, hit) in hits {
        let envelope: BoardEnvelope = client
            .request_as(
                &format!("/{team_id}/boards/{}", hit.id),
                token,
                RequestOptions::get(),
            )
            .await?;
        boards.push(envelope.board);
    }

    Ok(ToolOutput::Json(Value::Array(boards)))
}

pub async fn delete_board(
    client: &ApiClient,
    token: &BearerToken,
    params: DeleteBoardParams,
) -> ToolResult {
    client
        .request(
            &format!("/{}/boards/{}", params.team_id, params.board_id),
            token,
            RequestOptions::delete(),
        )
        .await?;
    Ok(ToolOutput::Message("Board deleted successfully".to_string()))
}
