mod mcp;
mod system;

pub use mcp::{SESSION_ID_HEADER, delete_mcp, get_mcp, post_mcp};
pub use system::health;
