//! Superthread MCP server.
//!
//! Exposes the Superthread project-management API as MCP tools over the
//! Streamable HTTP transport. Each authenticated client gets its own session,
//! bound to one tool dispatcher that carries the client's bearer token.

pub mod api;
pub mod auth;
pub mod backend;
pub mod mcp;
pub mod session;
