//! MCP tool dispatcher for one Superthread user.

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::tools::{
    ToolError, ToolResult,
    boards::{self, CreateBoardParams, DeleteBoardParams, GetBoardParams, ListBoardsParams, UpdateBoardParams},
    cards::{self, CreateCardParams, DeleteCardParams, GetCardParams, UpdateCardParams},
    projects::{self, GetProjectParams, ListProjectsParams},
    user::{self, UpdateMeParams},
};
use crate::auth::BearerToken;
use crate::backend::ApiClient;
use crate::session::ToolDispatcher;

/// Tool dispatcher bound to one bearer token.
///
/// A session creates exactly one of these and keeps it until close. Clones
/// share the shutdown signal, so shutting down any clone aborts backend calls
/// in flight on all of them.
#[derive(Clone)]
pub struct SuperthreadServer {
    client: ApiClient,
    token: BearerToken,
    shutdown: CancellationToken,
    tool_router: ToolRouter<Self>,
}

impl SuperthreadServer {
    pub fn new(client: ApiClient, token: BearerToken) -> Self {
        Self {
            client,
            token,
            shutdown: CancellationToken::new(),
            tool_router: Self::tool_router(),
        }
    }

    pub fn router(&self) -> &ToolRouter<Self> {
        &self.tool_router
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Run one tool body, racing it against shutdown, and wrap the outcome.
    /// Tool failures are reported in the result, never as protocol errors.
    async fn dispatch(
        &self,
        tool: &'static str,
        work: impl Future<Output = ToolResult>,
    ) -> Result<CallToolResult, McpError> {
        let outcome = tokio::select! {
            _ = self.shutdown.cancelled() => Err(ToolError::Cancelled),
            outcome = work => outcome,
        };

        match outcome {
            Ok(output) => {
                debug!(tool, "tool call succeeded");
                Ok(CallToolResult::success(vec![Content::text(
                    output.into_text(),
                )]))
            }
            Err(e) => {
                warn!(tool, error = %e, "tool call failed");
                Ok(CallToolResult::error(vec![Content::text(e.to_string())]))
            }
        }
    }
}

#[tool_router]
impl SuperthreadServer {
    #[tool(
        description = "Fetches detailed information about the current user, including profile details, teams, locale, and other metadata"
    )]
    pub async fn get_me(&self) -> Result<CallToolResult, McpError> {
        self.dispatch("get_me", user::get_me(&self.client, &self.token))
            .await
    }

    #[tool(
        description = "Updates the current user profile fields such as name, profile image, timezone, and company information"
    )]
    pub async fn update_me(
        &self,
        Parameters(params): Parameters<UpdateMeParams>,
    ) -> Result<CallToolResult, McpError> {
        self.dispatch(
            "update_me",
            user::update_me(&self.client, &self.token, params),
        )
        .await
    }

    #[tool(description = "Creates a new board within a specified workspace (team_id)")]
    pub async fn create_board(
        &self,
        Parameters(params): Parameters<CreateBoardParams>,
    ) -> Result<CallToolResult, McpError> {
        self.dispatch(
            "create_board",
            boards::create_board(&self.client, &self.token, params),
        )
        .await
    }

    #[tool(description = "Updates an existing board within a specified workspace (team_id)")]
    pub async fn update_board(
        &self,
        Parameters(params): Parameters<UpdateBoardParams>,
    ) -> Result<CallToolResult, McpError> {
        self.dispatch(
            "update_board",
            boards::update_board(&self.client, &self.token, params),
        )
        .await
    }

    #[tool(description = "Fetches a list of all boards within a specified workspace (team_id)")]
    pub async fn list_boards(
        &self,
        Parameters(params): Parameters<ListBoardsParams>,
    ) -> Result<CallToolResult, McpError> {
        self.dispatch(
            "list_boards",
            boards::list_boards(&self.client, &self.token, params),
        )
        .await
    }

    #[tool(
        description = "Fetches detailed information about a specific board identified by its unique ID within a workspace (team_id)"
    )]
    pub async fn get_board(
        &self,
        Parameters(params): Parameters<GetBoardParams>,
    ) -> Result<CallToolResult, McpError> {
        self.dispatch(
            "get_board",
            boards::get_board(&self.client, &self.token, params),
        )
        .await
    }

    #[tool(
        description = "Deletes a specific board, identified by its board_id, within the specified workspace (team_id)"
    )]
    pub async fn delete_board(
        &self,
        Parameters(params): Parameters<DeleteBoardParams>,
    ) -> Result<CallToolResult, McpError> {
        self.dispatch(
            "delete_board",
            boards::delete_board(&self.client, &self.token, params),
        )
        .await
    }

    #[tool(
        description = "Create a new card in a specified team and board. Ask the user which team and board the card should be created in"
    )]
    pub async fn create_card(
        &self,
        Parameters(params): Parameters<CreateCardParams>,
    ) -> Result<CallToolResult, McpError> {
        self.dispatch(
            "create_card",
            cards::create_card(&self.client, &self.token, params),
        )
        .await
    }

    #[tool(
        description = "Fetches detailed information about a specific card by its title or ID (minus the prefix)"
    )]
    pub async fn get_card(
        &self,
        Parameters(params): Parameters<GetCardParams>,
    ) -> Result<CallToolResult, McpError> {
        self.dispatch(
            "get_card",
            cards::get_card(&self.client, &self.token, params),
        )
        .await
    }

    #[tool(description = "Update a card's attributes or archive/unarchive it")]
    pub async fn update_card(
        &self,
        Parameters(params): Parameters<UpdateCardParams>,
    ) -> Result<CallToolResult, McpError> {
        self.dispatch(
            "update_card",
            cards::update_card(&self.client, &self.token, params),
        )
        .await
    }

    #[tool(
        description = "Deletes a specific card, identified by its card_id, within the specified workspace (team_id)"
    )]
    pub async fn delete_card(
        &self,
        Parameters(params): Parameters<DeleteCardParams>,
    ) -> Result<CallToolResult, McpError> {
        self.dispatch(
            "delete_card",
            cards::delete_card(&self.client, &self.token, params),
        )
        .await
    }

    #[tool(description = "Fetches a list of all projects (epics) in a team")]
    pub async fn list_projects(
        &self,
        Parameters(params): Parameters<ListProjectsParams>,
    ) -> Result<CallToolResult, McpError> {
        self.dispatch(
            "list_projects",
            projects::list_projects(&self.client, &self.token, params),
        )
        .await
    }

    #[tool(description = "Fetches detailed information about a specific project")]
    pub async fn get_project(
        &self,
        Parameters(params): Parameters<GetProjectParams>,
    ) -> Result<CallToolResult, McpError> {
        self.dispatch(
            "get_project",
            projects::get_project(&self.client, &self.token, params),
        )
        .await
    }
}

#[tool_handler]
impl ServerHandler for SuperthreadServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo::new(
            ServerCapabilities::builder()
                .enable_tools()
                .enable_logging()
                .build(),
        )
        .with_instructions(
            "Superthread MCP Server - Manage boards, cards, projects and your user profile. \
             Call get_me first to discover the team IDs other tools need.",
        )
    }
}

impl ToolDispatcher for SuperthreadServer {
    fn shutdown(&self) {
        self.shutdown.cancel();
    }
}
