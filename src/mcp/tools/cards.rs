//! Card tools.

use rmcp::{schemars, schemars::JsonSchema};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ToolError, ToolOutput, ToolResult, find_in_teams};
use crate::auth::BearerToken;
use crate::backend::{ApiClient, RequestOptions, SearchObjectType};

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CreateCardParams {
    #[schemars(
        description = "Use the get_me tool first to get the team IDs available. If needed, confirm with the user which team they want to use."
    )]
    #[serde(skip_serializing)]
    pub team_id: String,
    #[schemars(description = "Card title")]
    pub title: String,
    #[schemars(description = "List ID where the card will be placed")]
    pub list_id: String,
    #[schemars(
        description = "Board ID (required if sprint_id not provided). Use get_board tool to get the board ID from a board name"
    )]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub board_id: Option<String>,
    #[schemars(description = "Sprint ID (required if board_id not provided)")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sprint_id: Option<String>,
    #[schemars(description = "Card description")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[schemars(description = "Project ID")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[schemars(description = "Owner user ID")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[schemars(description = "Priority level")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[schemars(description = "Estimate in story points")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimate: Option<f64>,
    #[schemars(description = "Start date as Unix timestamp")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<i64>,
    #[schemars(description = "Due date as Unix timestamp")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<i64>,
    #[schemars(description = "Parent card ID")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_card_id: Option<String>,
    #[schemars(description = "Epic ID")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epic_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct GetCardParams {
    #[schemars(
        description = "Card title or identifier to search for. If the identifier contains a prefix (eg. ENG-123), remove the prefix and search by ID"
    )]
    pub query: String,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct UpdateCardParams {
    #[schemars(description = "Team/workspace ID")]
    #[serde(skip_serializing)]
    pub team_id: String,
    #[schemars(description = "Use the get_card tool to retrieve the card ID")]
    #[serde(skip_serializing)]
    pub card_id: String,
    #[schemars(description = "Card title")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[schemars(description = "Board ID")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub board_id: Option<String>,
    #[schemars(description = "List ID")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_id: Option<String>,
    #[schemars(description = "Project ID")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[schemars(description = "Sprint ID")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sprint_id: Option<String>,
    #[schemars(description = "Owner user ID")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[schemars(description = "Start date as Unix timestamp")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<i64>,
    #[schemars(description = "Due date as Unix timestamp")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<i64>,
    #[schemars(description = "Position in list")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<i64>,
    #[schemars(description = "Priority level")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[schemars(description = "Estimate in story points")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimate: Option<f64>,
    #[schemars(description = "Archive/unarchive the card")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct DeleteCardParams {
    #[schemars(description = "Team/workspace ID")]
    pub team_id: String,
    #[schemars(description = "Use the get_card tool to retrieve the card ID")]
    pub card_id: String,
}

/// A card lives either on a board or in a sprint, so one of the two ids
/// must be given.
pub async fn create_card(
    client: &ApiClient,
    token: &BearerToken,
    mut params: CreateCardParams,
) -> ToolResult {
    // Empty ids count as absent
    params.board_id = params.board_id.filter(|id| !id.is_empty());
    params.sprint_id = params.sprint_id.filter(|id| !id.is_empty());
    if params.board_id.is_none() && params.sprint_id.is_none() {
        return Err(ToolError::InvalidArguments(
            "Either board_id or sprint_id must be provided".to_string(),
        ));
    }

    let body = serde_json::to_value(&params)?;
    let card = client
        .request(
            &format!("/{}/cards", params.team_id),
            token,
            RequestOptions::post(body),
        )
        .await?;
    Ok(card.into())
}

/// Find cards by title or id across all of the caller's teams and fetch
/// each one in full.
pub async fn get_card(client: &ApiClient, token: &BearerToken, params: GetCardParams) -> ToolResult {
    let hits = find_in_teams(client, token, &params.query, SearchObjectType::Cards).await?;
    if hits.is_empty() {
        return Err(ToolError::NotFound("No cards found".to_string()));
    }

    let mut cards = Vec::with_capacity(hits.len());
    for (team_id, hit) in hits {
        let card = client
            .request(
                &format!("/{team_id}/cards/{}", hit.id),
                token,
                RequestOptions::get(),
            )
            .await?;
        cards.push(card.unwrap_or(Value::Null));
    }

    Ok(ToolOutput::Json(Value::Array(cards)))
}

pub async fn update_card(
    client: &ApiClient,
    token: &BearerToken,
    params: UpdateCardParams,
) -> ToolResult {
    let body = serde_json::to_value(&params)?;
    let card = client
        .request(
            &format!("/{}/cards/{}", params.team_id, params.card_id),
            token,
            RequestOptions::patch(body),
        )
        .await?;
    Ok(card.into())
}

pub async fn delete_card(
    client: &ApiClient,
    token: &BearerToken,
    params: DeleteCardParams,
) -> ToolResult {
    client
        .request(
            &format!("/{}/cards/{}", params.team_id, params.card_id),
            token,
            RequestOptions::delete(),
        )
        .await?;
    Ok(ToolOutput::Message("Card deleted successfully".to_string()))
}
