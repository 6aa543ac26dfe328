//! MCP Tools Implementation
//!
//! Tool definitions and handlers exposing the document QA flows.

use crate::mcp::errors::{ErrorHandler, McpError, McpResult};
use crate::mcp::protocol::*;
use crate::mcp::server::{McpServer, ToolHandler};
use crate::qa::{AskRequest, QaService};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

type Arguments = HashMap<String, Value>;

fn required_str<'a>(tool: &str, args: &'a Arguments, name: &str) -> McpResult<&'a str> {
    args.get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| McpError::InvalidToolParameters {
            tool: tool.to_string(),
            message: format!("Missing required parameter: {}", name),
        })
}

fn optional_str<'a>(tool: &str, args: &'a Arguments, name: &str) -> McpResult<Option<&'a str>> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_str()
            .map(Some)
            .ok_or_else(|| McpError::InvalidToolParameters {
                tool: tool.to_string(),
                message: format!("Parameter {} must be a string", name),
            }),
    }
}

fn optional_integer(tool: &str, args: &Arguments, name: &str) -> McpResult<Option<i64>> {
    match args.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_i64()
            .map(Some)
            .ok_or_else(|| McpError::InvalidToolParameters {
                tool: tool.to_string(),
                message: format!("Parameter {} must be an integer", name),
            }),
    }
}

/// Ingest document text into a new session
pub struct UploadDocumentHandler {
    service: Arc<QaService>,
}

impl UploadDocumentHandler {
    pub const NAME: &'static str = "upload_document";

    #[inline]
    pub fn new(service: Arc<QaService>) -> Self {
        Self { service }
    }

    #[inline]
    pub fn tool_definition() -> Tool {
        Tool {
            name: Self::NAME.to_string(),
            description: Some(
                "Split document text into chunks, embed them and open a question session"
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "filename": {
                        "type": "string",
                        "description": "Name reported for the document"
                    },
                    "text": {
                        "type": "string",
                        "description": "Extracted document text"
                    },
                    "path": {
                        "type": "string",
                        "description": "Optional: Read the text from this UTF-8 file instead"
                    }
                },
                "required": ["filename"],
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl ToolHandler for UploadDocumentHandler {
    #[inline]
    async fn handle(&self, params: CallToolParams) -> Result<CallToolResult> {
        let args = params.arguments.unwrap_or_default();
        let filename = required_str(Self::NAME, &args, "filename")?;

        let text = match (
            optional_str(Self::NAME, &args, "text")?,
            optional_str(Self::NAME, &args, "path")?,
        ) {
            (Some(text), None) => text.to_string(),
            (None, Some(path)) => match tokio::fs::read_to_string(path).await {
                Ok(text) => text,
                Err(e) => {
                    return Ok(ErrorHandler::tool_error(Self::NAME, &e.into()));
                }
            },
            _ => {
                return Err(McpError::InvalidToolParameters {
                    tool: Self::NAME.to_string(),
                    message: "Provide exactly one of text or path".to_string(),
                }
                .into());
            }
        };

        debug!("Uploading {} ({} bytes)", filename, text.len());

        match self.service.upload(filename, &text).await {
            Ok(summary) => Ok(CallToolResult::json(&serde_json::to_value(summary)?)?),
            Err(e) => Ok(ErrorHandler::tool_error(Self::NAME, &e)),
        }
    }
}

/// Answer a question from a session's chunks
pub struct AskQuestionHandler {
    service: Arc<QaService>,
}

impl AskQuestionHandler {
    pub const NAME: &'static str = "ask_question";

    #[inline]
    pub fn new(service: Arc<QaService>) -> Self {
        Self { service }
    }

    #[inline]
    pub fn tool_definition() -> Tool {
        Tool {
            name: Self::NAME.to_string(),
            description: Some(
                "Answer a question using the most relevant chunks of an uploaded document"
                    .to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "session_id": {
                        "type": "string",
                        "description": "Session returned by upload_document"
                    },
                    "question": {
                        "type": "string",
                        "description": "Natural-language question"
                    },
                    "top_k": {
                        "type": "integer",
                        "description": "Number of chunks used as context (default: 4)"
                    }
                },
                "required": ["session_id", "question"],
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl ToolHandler for AskQuestionHandler {
    #[inline]
    async fn handle(&self, params: CallToolParams) -> Result<CallToolResult> {
        let args = params.arguments.unwrap_or_default();
        let request = AskRequest {
            session_id: required_str(Self::NAME, &args, "session_id")?.to_string(),
            question: required_str(Self::NAME, &args, "question")?.to_string(),
            top_k: optional_integer(Self::NAME, &args, "top_k")?,
        };

        match self.service.ask(&request).await {
            Ok(response) => Ok(CallToolResult::json(&serde_json::to_value(response)?)?),
            Err(e) => Ok(ErrorHandler::tool_error(Self::NAME, &e)),
        }
    }
}

/// Rank a session's chunks without generating an answer
pub struct SearchDocumentHandler {
    service: Arc<QaService>,
}

impl SearchDocumentHandler {
    pub const NAME: &'static str = "search_document";

    #[inline]
    pub fn new(service: Arc<QaService>) -> Self {
        Self { service }
    }

    #[inline]
    pub fn tool_definition() -> Tool {
        Tool {
            name: Self::NAME.to_string(),
            description: Some(
                "Return the chunks of an uploaded document most similar to a query".to_string(),
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "session_id": {
                        "type": "string",
                        "description": "Session returned by upload_document"
                    },
                    "query": {
                        "type": "string",
                        "description": "Search query"
                    },
                    "top_k": {
                        "type": "integer",
                        "description": "Maximum number of results (default: 4)"
                    }
                },
                "required": ["session_id", "query"],
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl ToolHandler for SearchDocumentHandler {
    #[inline]
    async fn handle(&self, params: CallToolParams) -> Result<CallToolResult> {
        let args = params.arguments.unwrap_or_default();
        let session_id = required_str(Self::NAME, &args, "session_id")?;
        let query = required_str(Self::NAME, &args, "query")?;
        let top_k = optional_integer(Self::NAME, &args, "top_k")?;

        let ranked = match self.service.validate_top_k(top_k) {
            Ok(top_k) => self.service.search(session_id, query, top_k).await,
            Err(e) => Err(e),
        };

        match ranked {
            Ok(results) => {
                let results: Vec<Value> = results
                    .into_iter()
                    .map(|result| {
                        json!({
                            "rank": result.rank_index,
                            "chunk_id": result.chunk.id,
                            "chunk_index": result.chunk_index,
                            "score": result.similarity,
                            "start_offset": result.chunk.start_offset,
                            "end_offset": result.chunk.end_offset,
                            "text": result.chunk.text,
                        })
                    })
                    .collect();
                Ok(CallToolResult::json(&json!({ "results": results }))?)
            }
            Err(e) => Ok(ErrorHandler::tool_error(Self::NAME, &e)),
        }
    }
}

/// Drop a session before it expires
pub struct DeleteSessionHandler {
    service: Arc<QaService>,
}

impl DeleteSessionHandler {
    pub const NAME: &'static str = "delete_session";

    #[inline]
    pub fn new(service: Arc<QaService>) -> Self {
        Self { service }
    }

    #[inline]
    pub fn tool_definition() -> Tool {
        Tool {
            name: Self::NAME.to_string(),
            description: Some("Delete an uploaded document session".to_string()),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "session_id": {
                        "type": "string",
                        "description": "Session to delete"
                    }
                },
                "required": ["session_id"],
                "additionalProperties": false
            }),
        }
    }
}

#[async_trait]
impl ToolHandler for DeleteSessionHandler {
    #[inline]
    async fn handle(&self, params: CallToolParams) -> Result<CallToolResult> {
        let args = params.arguments.unwrap_or_default();
        let session_id = required_str(Self::NAME, &args, "session_id")?;

        let deleted = self.service.delete_session(session_id);
        Ok(CallToolResult::json(&json!({
            "session_id": session_id,
            "deleted": deleted,
        }))?)
    }
}

/// Register every QA tool on `server`
#[inline]
pub async fn register_qa_tools(server: &McpServer, service: &Arc<QaService>) {
    server
        .register_tool(
            UploadDocumentHandler::tool_definition(),
            UploadDocumentHandler::new(Arc::clone(service)),
        )
        .await;
    server
        .register_tool(
            AskQuestionHandler::tool_definition(),
            AskQuestionHandler::new(Arc::clone(service)),
        )
        .await;
    server
        .register_tool(
            SearchDocumentHandler::tool_definition(),
            SearchDocumentHandler::new(Arc::clone(service)),
        )
        .await;
    server
        .register_tool(
            DeleteSessionHandler::tool_definition(),
            DeleteSessionHandler::new(Arc::clone(service)),
        )
        .await;
}
