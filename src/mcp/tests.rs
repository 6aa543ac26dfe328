//! MCP tool and server tests

use super::protocol::*;
use super::tools::*;
use super::*;
use crate::config::Config;
use crate::providers::{EmbeddingProvider, ProviderError, Providers, TextGenerator};
use crate::qa::QaService;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;

struct VowelEmbedder;

#[async_trait]
impl EmbeddingProvider for VowelEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let count = |c: char| text.chars().filter(|x| *x == c).count() as f32;
        Ok(vec![count('a'), count('e')])
    }

    fn model_name(&self) -> &str {
        "vowels"
    }
}

struct EchoGenerator;

#[async_trait]
impl TextGenerator for EchoGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        Ok(format!("prompt had {} chars", prompt.chars().count()))
    }

    fn model_name(&self) -> &str {
        "echo"
    }
}

fn service() -> Arc<QaService> {
    let mut config = Config::default();
    config.provider.embedding_dimension = 2;
    config.chunking.chunk_size = 10;
    config.chunking.overlap = 2;
    Arc::new(QaService::new(
        &config,
        Providers {
            embedder: Arc::new(VowelEmbedder),
            generator: Arc::new(EchoGenerator),
        },
    ))
}

fn call(name: &str, arguments: Value) -> CallToolParams {
    let arguments: HashMap<String, Value> =
        serde_json::from_value(arguments).expect("arguments are an object");
    CallToolParams {
        name: name.to_string(),
        arguments: Some(arguments),
    }
}

fn body(result: &CallToolResult) -> Value {
    serde_json::from_str(result.text().expect("result has text")).expect("result text is json")
}

async fn upload(service: &Arc<QaService>) -> String {
    let result = UploadDocumentHandler::new(Arc::clone(service))
        .handle(call(
            "upload_document",
            json!({"filename": "notes.txt", "text": "aaaa aaaa eeee eeee aeae aeae"}),
        ))
        .await
        .expect("upload should run");
    assert_eq!(result.is_error, Some(false));
    body(&result)["session_id"]
        .as_str()
        .expect("session id is a string")
        .to_string()
}

#[test]
fn tool_definitions_declare_required_parameters() {
    let cases = [
        (UploadDocumentHandler::tool_definition(), vec!["filename"]),
        (
            AskQuestionHandler::tool_definition(),
            vec!["session_id", "question"],
        ),
        (
            SearchDocumentHandler::tool_definition(),
            vec!["session_id", "query"],
        ),
        (DeleteSessionHandler::tool_definition(), vec!["session_id"]),
    ];

    for (tool, required) in cases {
        let schema = &tool.input_schema;
        assert_eq!(schema["type"], "object");
        let listed: Vec<&str> = schema["required"]
            .as_array()
            .expect("has required array")
            .iter()
            .filter_map(Value::as_str)
            .collect();
        assert_eq!(listed, required, "required parameters of {}", tool.name);
        let properties = schema["properties"].as_object().expect("has properties");
        for name in required {
            assert!(properties.contains_key(name));
        }
    }
}

#[tokio::test]
async fn upload_then_ask() {
    let service = service();
    let session_id = upload(&service).await;

    let result = AskQuestionHandler::new(Arc::clone(&service))
        .handle(call(
            "ask_question",
            json!({"session_id": session_id, "question": "eee?", "top_k": 2}),
        ))
        .await
        .expect("ask should run");

    assert_eq!(result.is_error, Some(false));
    let response = body(&result);
    assert_eq!(response["used_model"], "echo");
    assert_eq!(response["sources"].as_array().map(Vec::len), Some(2));
    assert!(response["answer"].as_str().is_some());
}

#[tokio::test]
async fn ask_unknown_session_is_tool_error() {
    let result = AskQuestionHandler::new(service())
        .handle(call(
            "ask_question",
            json!({"session_id": "nope", "question": "hello?"}),
        ))
        .await
        .expect("ask should run");

    assert_eq!(result.is_error, Some(true));
    assert_eq!(body(&result)["status"], 404);
}

#[tokio::test]
async fn ask_missing_question_is_invalid_params() {
    let error = AskQuestionHandler::new(service())
        .handle(call("ask_question", json!({"session_id": "abc"})))
        .await
        .expect_err("missing question should fail");

    assert!(matches!(
        error.downcast_ref::<McpError>(),
        Some(McpError::InvalidToolParameters { .. })
    ));
}

#[tokio::test]
async fn ask_rejects_non_integer_top_k() {
    let error = AskQuestionHandler::new(service())
        .handle(call(
            "ask_question",
            json!({"session_id": "abc", "question": "q", "top_k": "four"}),
        ))
        .await
        .expect_err("string top_k should fail");

    assert!(error.to_string().contains("top_k"));
}

#[tokio::test]
async fn search_returns_ranked_chunks() {
    let service = service();
    let session_id = upload(&service).await;

    let result = SearchDocumentHandler::new(Arc::clone(&service))
        .handle(call(
            "search_document",
            json!({"session_id": session_id, "query": "aaaa", "top_k": 3}),
        ))
        .await
        .expect("search should run");

    let response = body(&result);
    let results = response["results"].as_array().expect("results array");
    assert_eq!(results.len(), 3);
    assert_eq!(results[0]["rank"], 0);
    assert_eq!(results[0]["chunk_id"], "chunk_0");
}

#[tokio::test]
async fn search_rejects_out_of_range_top_k() {
    let service = service();
    let session_id = upload(&service).await;

    let result = SearchDocumentHandler::new(Arc::clone(&service))
        .handle(call(
            "search_document",
            json!({"session_id": session_id, "query": "a", "top_k": 0}),
        ))
        .await
        .expect("search should run");

    assert_eq!(result.is_error, Some(true));
    assert_eq!(body(&result)["status"], 400);
}

#[tokio::test]
async fn delete_reports_whether_removed() {
    let service = service();
    let session_id = upload(&service).await;
    let handler = DeleteSessionHandler::new(Arc::clone(&service));

    let first = handler
        .handle(call("delete_session", json!({"session_id": session_id})))
        .await
        .expect("delete should run");
    let second = handler
        .handle(call("delete_session", json!({"session_id": session_id})))
        .await
        .expect("delete should run");

    assert_eq!(body(&first)["deleted"], true);
    assert_eq!(body(&second)["deleted"], false);
}

#[tokio::test]
async fn upload_requires_exactly_one_source() {
    let handler = UploadDocumentHandler::new(service());

    let neither = handler
        .handle(call("upload_document", json!({"filename": "a.txt"})))
        .await;
    assert!(neither.is_err());

    let both = handler
        .handle(call(
            "upload_document",
            json!({"filename": "a.txt", "text": "x", "path": "/tmp/x"}),
        ))
        .await;
    assert!(both.is_err());
}

#[tokio::test]
async fn upload_from_path() {
    let dir = tempfile::TempDir::new().expect("should create temp dir");
    let path = dir.path().join("doc.txt");
    std::fs::write(&path, "aaaa eeee aaaa").expect("should write file");

    let result = UploadDocumentHandler::new(service())
        .handle(call(
            "upload_document",
            json!({"filename": "doc.txt", "path": path.to_string_lossy()}),
        ))
        .await
        .expect("upload should run");

    assert_eq!(result.is_error, Some(false));
    assert_eq!(body(&result)["num_chunks"], 2);

    let missing = UploadDocumentHandler::new(service())
        .handle(call(
            "upload_document",
            json!({"filename": "gone.txt", "path": dir.path().join("gone.txt").to_string_lossy()}),
        ))
        .await
        .expect("upload should run");
    assert_eq!(missing.is_error, Some(true));
}

async fn server() -> Arc<McpServer> {
    let server = McpServer::new("doc-qa".to_string(), "test".to_string());
    register_qa_tools(&server, &service()).await;
    Arc::new(server)
}

/// Feed newline-delimited requests through the server and collect the replies
async fn exchange(server: Arc<McpServer>, lines: &[Value]) -> Vec<Value> {
    let input: String = lines.iter().map(|line| format!("{line}\n")).collect();
    let mut output = Vec::new();

    server
        .serve(input.as_bytes(), &mut output)
        .await
        .expect("server should run");

    String::from_utf8(output)
        .expect("output is utf-8")
        .lines()
        .map(|line| serde_json::from_str(line).expect("each reply is json"))
        .collect()
}

#[tokio::test]
async fn handshake_and_tool_listing() {
    let server = server().await;
    let replies = exchange(
        Arc::clone(&server),
        &[
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {
                "protocolVersion": MCP_VERSION,
                "capabilities": {},
                "clientInfo": {"name": "test-client", "version": "1.0"}
            }}),
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}),
        ],
    )
    .await;

    assert_eq!(replies.len(), 2);
    assert_eq!(replies[0]["id"], 1);
    assert_eq!(replies[0]["result"]["serverInfo"]["name"], "doc-qa");
    let names: Vec<&str> = replies[1]["result"]["tools"]
        .as_array()
        .expect("tools array")
        .iter()
        .filter_map(|tool| tool["name"].as_str())
        .collect();
    assert_eq!(
        names,
        vec![
            "ask_question",
            "delete_session",
            "search_document",
            "upload_document"
        ]
    );
    assert_eq!(server.connection_state().await, ConnectionState::Closed);
}

#[tokio::test]
async fn protocol_errors_use_jsonrpc_codes() {
    let replies = exchange(
        server().await,
        &[
            json!({"jsonrpc": "2.0", "id": 1, "method": "resources/list"}),
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/call", "params": {"name": "nope", "arguments": {}}}),
            json!({"jsonrpc": "2.0", "id": 3, "method": "initialize", "params": {
                "protocolVersion": "1999-01-01",
                "capabilities": {},
                "clientInfo": {"name": "old", "version": "0"}
            }}),
            json!({"jsonrpc": "1.0", "id": 4, "method": "ping"}),
            json!({"jsonrpc": "2.0", "id": 5, "method": "ping"}),
        ],
    )
    .await;

    assert_eq!(replies[0]["error"]["code"], error_codes::METHOD_NOT_FOUND);
    assert_eq!(replies[1]["error"]["code"], mcp_error_codes::TOOL_NOT_FOUND);
    assert_eq!(
        replies[2]["error"]["code"],
        mcp_error_codes::INVALID_PROTOCOL_VERSION
    );
    assert_eq!(replies[3]["error"]["code"], error_codes::INVALID_REQUEST);
    assert_eq!(replies[4]["result"], json!({}));
}

#[tokio::test]
async fn malformed_json_is_parse_error() {
    let server = server().await;
    let mut output = Vec::new();

    server
        .serve(&b"{not json\n"[..], &mut output)
        .await
        .expect("server should run");

    let reply: Value = serde_json::from_slice(&output).expect("reply is json");
    assert_eq!(reply["error"]["code"], error_codes::PARSE_ERROR);
    assert_eq!(reply["id"], Value::Null);
}

#[tokio::test]
async fn tool_call_round_trip_over_transport() {
    let replies = exchange(
        server().await,
        &[json!({"jsonrpc": "2.0", "id": "up", "method": "tools/call", "params": {
            "name": "upload_document",
            "arguments": {"filename": "a.txt", "text": "aaa eee"}
        }})],
    )
    .await;

    assert_eq!(replies[0]["id"], "up");
    assert_eq!(replies[0]["result"]["isError"], false);
    let text = replies[0]["result"]["content"][0]["text"]
        .as_str()
        .expect("text content");
    let summary: Value = serde_json::from_str(text).expect("summary is json");
    assert_eq!(summary["num_chunks"], 1);
    assert_eq!(summary["filename"], "a.txt");
}
