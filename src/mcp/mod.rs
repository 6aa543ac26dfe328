//! MCP (Model Context Protocol) Server Implementation
//!
//! JSON-RPC 2.0 over stdio exposing the document QA flows as tools.

#[cfg(test)]
mod tests;

pub mod errors;
pub mod protocol;
pub mod server;
pub mod tools;

pub use errors::{ErrorHandler, McpError, McpResult};
pub use server::{ConnectionState, McpServer, MessageHandler, ToolHandler};
pub use tools::register_qa_tools;
