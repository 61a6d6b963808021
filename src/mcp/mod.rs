//! Model Context Protocol (MCP) tool dispatcher
//!
//! [`SuperthreadServer`] is an rmcp `ServerHandler` exposing the Superthread
//! tool catalog for one bearer token. The session layer runs one instance per
//! session over in-memory channels.
//!
//! - **server**: rmcp wiring, tool registration and result wrapping
//! - **tools**: the tool bodies, one module per entity (user, boards, cards,
//!   projects)

pub mod server;
pub mod tools;


pub use server::SuperthreadServer;
