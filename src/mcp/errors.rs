//! MCP Error Handling
//!
//! Protocol-level failures become JSON-RPC error responses. Failures of the
//! QA flows themselves are reported inside a tool result with `isError` set,
//! so the calling model can read them.

use crate::QaError;
use crate::mcp::protocol::*;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// MCP-specific errors that can occur during server operation
#[derive(Error, Debug)]
pub enum McpError {
    #[error("Protocol version not supported: {version}. Supported versions: {supported:?}")]
    UnsupportedProtocolVersion {
        version: String,
        supported: Vec<String>,
    },

    #[error("Tool not found: {name}")]
    ToolNotFound { name: String },

    #[error("Invalid tool parameters for {tool}: {message}")]
    InvalidToolParameters { tool: String, message: String },

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    #[error("Internal server error: {message}")]
    InternalError { message: String },

    #[error("JSON-RPC parse error: {message}")]
    ParseError { message: String },

    #[error("Method not found: {method}")]
    MethodNotFound { method: String },

    #[error("Invalid parameters: {message}")]
    InvalidParameters { message: String },
}

impl McpError {
    /// Convert MCP error to JSON-RPC error
    #[inline]
    pub fn to_jsonrpc_error(&self) -> JsonRpcError {
        match self {
            Self::UnsupportedProtocolVersion { version, supported } => JsonRpcError::new(
                mcp_error_codes::INVALID_PROTOCOL_VERSION,
                format!(
                    "Unsupported protocol version: {}. Supported: {}",
                    version,
                    supported.join(", ")
                ),
                None,
            ),
            Self::ToolNotFound { name } => JsonRpcError::new(
                mcp_error_codes::TOOL_NOT_FOUND,
                format!("Tool not found: {}", name),
                None,
            ),
            Self::InvalidToolParameters { tool, message } => JsonRpcError::new(
                error_codes::INVALID_PARAMS,
                format!("Invalid parameters for tool '{}': {}", tool, message),
                None,
            ),
            Self::InvalidRequest { message } => {
                JsonRpcError::new(error_codes::INVALID_REQUEST, message.clone(), None)
            }
            Self::InternalError { message } => {
                JsonRpcError::new(error_codes::INTERNAL_ERROR, message.clone(), None)
            }
            Self::ParseError { message } => {
                JsonRpcError::new(error_codes::PARSE_ERROR, message.clone(), None)
            }
            Self::MethodNotFound { method } => JsonRpcError::new(
                error_codes::METHOD_NOT_FOUND,
                format!("Method not found: {}", method),
                None,
            ),
            Self::InvalidParameters { message } => {
                JsonRpcError::new(error_codes::INVALID_PARAMS, message.clone(), None)
            }
        }
    }

    /// Create error response message
    #[inline]
    pub fn to_error_response(&self, id: Option<RequestId>) -> JsonRpcMessage {
        let error = self.to_jsonrpc_error();
        let error_response = JsonRpcErrorResponse::new(error, id);
        JsonRpcMessage::ErrorResponse(error_response)
    }

    /// Log the error with appropriate level
    #[inline]
    pub fn log(&self) {
        match self {
            Self::ParseError { .. }
            | Self::InvalidRequest { .. }
            | Self::InvalidParameters { .. }
            | Self::InvalidToolParameters { .. }
            | Self::UnsupportedProtocolVersion { .. } => {
                warn!("Client error: {}", self);
            }
            Self::ToolNotFound { .. } | Self::MethodNotFound { .. } => {
                warn!("Not found error: {}", self);
            }
            Self::InternalError { .. } => {
                error!("Server error: {}", self);
            }
        }
    }
}

/// Error handler utility for consistent error processing
pub struct ErrorHandler;

impl ErrorHandler {
    /// Handle any error and convert to appropriate JSON-RPC response
    #[inline]
    pub fn handle_error(error: &anyhow::Error, id: Option<RequestId>) -> JsonRpcMessage {
        if let Some(mcp_error) = error.downcast_ref::<McpError>() {
            mcp_error.log();
            return mcp_error.to_error_response(id);
        }

        error!("Unexpected error: {}", error);
        let internal_error = McpError::InternalError {
            message: error.to_string(),
        };
        internal_error.to_error_response(id)
    }

    /// Report a failed QA operation as an error tool result
    #[inline]
    pub fn tool_error(tool: &str, error: &QaError) -> CallToolResult {
        if error.is_client_error() {
            warn!("Tool '{}' rejected request: {}", tool, error);
        } else {
            error!("Tool '{}' failed: {}", tool, error);
        }

        let body = json!({
            "error": error.to_string(),
            "status": error.http_status(),
        });
        CallToolResult::json(&body)
            .map(|result| CallToolResult {
                is_error: Some(true),
                ..result
            })
            .unwrap_or_else(|_| CallToolResult::error(error.to_string()))
    }
}

/// Result type for MCP operations
pub type McpResult<T> = Result<T, McpError>;

impl From<serde_json::Error> for McpError {
    #[inline]
    fn from(error: serde_json::Error) -> Self {
        Self::ParseError {
            message: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_not_found_error() {
        let error = McpError::ToolNotFound {
            name: "test_tool".to_string(),
        };

        let jsonrpc_error = error.to_jsonrpc_error();
        assert_eq!(jsonrpc_error.code, mcp_error_codes::TOOL_NOT_FOUND);
        assert!(jsonrpc_error.message.contains("test_tool"));
    }

    #[test]
    fn invalid_protocol_version_error() {
        let error = McpError::UnsupportedProtocolVersion {
            version: "invalid".to_string(),
            supported: vec!["2025-06-18".to_string()],
        };

        let jsonrpc_error = error.to_jsonrpc_error();
        assert_eq!(
            jsonrpc_error.code,
            mcp_error_codes::INVALID_PROTOCOL_VERSION
        );
        assert!(jsonrpc_error.message.contains("invalid"));
        assert!(jsonrpc_error.message.contains("2025-06-18"));
    }

    #[test]
    fn error_response_creation() {
        let error = McpError::InternalError {
            message: "test error".to_string(),
        };

        let response = error.to_error_response(Some(RequestId::String("test".to_string())));

        let JsonRpcMessage::ErrorResponse(err_resp) = response else {
            panic!("Expected error response");
        };
        assert_eq!(err_resp.error.code, error_codes::INTERNAL_ERROR);
        assert!(err_resp.error.message.contains("test error"));
    }

    #[test]
    fn handle_error_downcasts_mcp_errors() {
        let error = anyhow::Error::new(McpError::InvalidToolParameters {
            tool: "ask_question".to_string(),
            message: "missing question".to_string(),
        });

        let JsonRpcMessage::ErrorResponse(response) =
            ErrorHandler::handle_error(&error, Some(RequestId::Number(3)))
        else {
            panic!("Expected error response");
        };
        assert_eq!(response.error.code, error_codes::INVALID_PARAMS);
        assert_eq!(response.id, Some(RequestId::Number(3)));

        let JsonRpcMessage::ErrorResponse(response) =
            ErrorHandler::handle_error(&anyhow::anyhow!("disk on fire"), None)
        else {
            panic!("Expected error response");
        };
        assert_eq!(response.error.code, error_codes::INTERNAL_ERROR);
    }

    #[test]
    fn tool_error_carries_status() {
        let result =
            ErrorHandler::tool_error("ask_question", &QaError::SessionNotFound("abc".to_string()));

        assert_eq!(result.is_error, Some(true));
        let body: serde_json::Value =
            serde_json::from_str(result.text().expect("has text")).expect("text is json");
        assert_eq!(body["status"], 404);
        assert!(
            body["error"]
                .as_str()
                .expect("error is a string")
                .contains("abc")
        );
    }
}
