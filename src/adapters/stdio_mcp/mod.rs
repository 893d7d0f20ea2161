//! stdio-transport MCP server adapter.

pub mod server;

pub use server::{RegisteredTool, StdioMcpServer};
