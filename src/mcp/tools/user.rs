//! Current-user tools.

use rmcp::{schemars, schemars::JsonSchema};
use serde::{Deserialize, Serialize};

use super::{ToolOutput, ToolResult};
use crate::auth::BearerToken;
use crate::backend::models::CurrentUser;
use crate::backend::{ApiClient, BackendResult, RequestOptions};

const ME: &str = "/users/me";

#[derive(Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct UpdateMeParams {
    #[schemars(description = "First name")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[schemars(description = "Last name")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[schemars(description = "Display name")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[schemars(description = "Profile image URL")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,
    #[schemars(description = "Timezone ID")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone_id: Option<String>,
    #[schemars(description = "Locale")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

pub async fn get_me(client: &ApiClient, token: &BearerToken) -> ToolResult {
    let user = client.request(ME, token, RequestOptions::get()).await?;
    Ok(user.into())
}

/// Only the profile fields the caller actually set are sent.
pub async fn update_me(
    client: &ApiClient,
    token: &BearerToken,
    params: UpdateMeParams,
) -> ToolResult {
    let body = serde_json::to_value(&params)?;
    let user = client
        .request(ME, token, RequestOptions::patch(body))
        .await?;
    Ok(ToolOutput::from(user))
}

/// Every team the token's user belongs to, in the order the API lists them.
pub(crate) async fn team_ids(client: &ApiClient, token: &BearerToken) -> BackendResult<Vec<String>> {
    let me: CurrentUser = client.request_as(ME, token, RequestOptions::get()).await?;
    Ok(me.team_ids())
}
