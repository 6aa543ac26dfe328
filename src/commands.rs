use anyhow::{Context, Result};
use console::style;
use dialoguer::Input;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::{Config, ProviderMode};
use crate::mcp::{McpServer, register_qa_tools};
use crate::providers::{OllamaClient, build_providers};
use crate::qa::{AskRequest, AskResponse, QaService, UploadSummary};

/// Load configuration and wire up the QA service for it
#[inline]
pub fn build_service(config: &Config) -> Result<Arc<QaService>> {
    let providers =
        build_providers(&config.provider).context("Failed to initialize providers")?;
    Ok(Arc::new(QaService::new(config, providers)))
}

/// Read a plain-text document from disk
#[inline]
pub async fn read_document(path: &Path) -> Result<(String, String)> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read document: {}", path.display()))?;
    let filename = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned());
    Ok((filename, text))
}

async fn upload_file(service: &QaService, path: &Path) -> Result<UploadSummary> {
    let (filename, text) = read_document(path).await?;
    let summary = service
        .upload(&filename, &text)
        .await
        .context("Failed to ingest document")?;

    println!(
        "📄 {} ingested: {} chunks from ~{} characters",
        style(&summary.filename).cyan(),
        summary.num_chunks,
        summary.approx_chars
    );
    if summary.fallback_chunks > 0 {
        println!(
            "{}",
            style(format!(
                "⚠ {} chunks could not be embedded and will never match a question",
                summary.fallback_chunks
            ))
            .yellow()
        );
    }

    Ok(summary)
}

fn print_answer(response: &AskResponse) {
    println!();
    println!("{}", response.answer.trim());
    println!();
    println!(
        "{}",
        style(format!(
            "Sources ({} via {}, {} ms):",
            response.sources.len(),
            response.used_model,
            response.latency_ms
        ))
        .dim()
    );
    for source in &response.sources {
        println!(
            "  {} {:.3}  {}",
            style(&source.chunk_id).cyan(),
            source.score,
            source.snippet.replace('\n', " ")
        );
    }
}

/// Answer a single question about a text file
#[inline]
pub async fn ask_file(path: &Path, question: String, top_k: Option<i64>) -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    let service = build_service(&config)?;

    let summary = upload_file(&service, path).await?;
    let response = service
        .ask(&AskRequest {
            session_id: summary.session_id,
            question,
            top_k,
        })
        .await
        .context("Failed to answer question")?;

    print_answer(&response);
    Ok(())
}

/// Ask repeated questions about a text file until an empty line
#[inline]
pub async fn chat(path: &Path, top_k: Option<i64>) -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    let service = build_service(&config)?;

    let summary = upload_file(&service, path).await?;
    println!("Ask questions about the document. Submit an empty line to quit.");

    loop {
        let question: String = Input::new()
            .with_prompt("Question")
            .allow_empty(true)
            .interact_text()?;
        if question.trim().is_empty() {
            break;
        }

        let request = AskRequest {
            session_id: summary.session_id.clone(),
            question,
            top_k,
        };
        match service.ask(&request).await {
            Ok(response) => print_answer(&response),
            Err(e) if e.is_client_error() => {
                println!("{}", style(e.to_string()).yellow());
                if service.session(&summary.session_id).is_err() {
                    println!("The session has expired; run the command again to re-ingest.");
                    break;
                }
            }
            Err(e) => {
                error!("Question failed: {}", e);
                println!("{}", style(format!("Error: {}", e)).red());
            }
        }
    }

    service.delete_session(&summary.session_id);
    Ok(())
}

/// Start the MCP server on stdio
#[inline]
pub async fn serve_mcp() -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;
    info!(
        "Starting MCP server ({} provider at {})",
        config.provider.mode, config.provider.endpoint
    );

    if config.provider.mode == ProviderMode::Ollama {
        let provider = config.provider.clone();
        let health =
            tokio::task::spawn_blocking(move || OllamaClient::new(&provider)?.health_check())
                .await?;
        match health {
            Ok(()) => info!(
                "Ollama reachable with models {} and {}",
                config.provider.embedding_model, config.provider.generation_model
            ),
            Err(e) => {
                warn!("Ollama is not ready, uploads will store zero vectors: {}", e);
                eprintln!("Warning: Ollama may not be ready. Use 'doc-qa config' to update connection settings.");
            }
        }
    }

    let service = build_service(&config)?;
    let server = Arc::new(McpServer::new(
        "doc-qa".to_string(),
        env!("CARGO_PKG_VERSION").to_string(),
    ));
    register_qa_tools(&server, &service).await;

    info!(
        "MCP server initialized with tools: {}",
        server.tool_names().await.join(", ")
    );

    tokio::select! {
        result = Arc::clone(&server).serve_stdio() => {
            if let Err(e) = result {
                error!("MCP server error: {}", e);
                return Err(e);
            }
            info!("MCP server stopped normally");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received interrupt signal, shutting down");
        }
    }

    Ok(())
}
