use clap::{Parser, Subcommand};
use doc_qa::Result;
use doc_qa::commands::{ask_file, chat, serve_mcp};
use doc_qa::config::{run_interactive_config, show_config};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "doc-qa")]
#[command(about = "Ask questions about documents with embedding retrieval, or serve them over MCP")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the model provider and session settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Ingest a text file and answer one question about it
    Ask {
        /// UTF-8 text file to ingest
        file: PathBuf,
        /// Question to answer
        question: String,
        /// Number of chunks used as context
        #[arg(long)]
        top_k: Option<i64>,
    },
    /// Ingest a text file and answer questions interactively
    Chat {
        /// UTF-8 text file to ingest
        file: PathBuf,
        /// Number of chunks used as context
        #[arg(long)]
        top_k: Option<i64>,
    },
    /// Start MCP server on stdio
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout carries MCP traffic when serving
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                run_interactive_config()?;
            }
        }
        Commands::Ask {
            file,
            question,
            top_k,
        } => {
            ask_file(&file, question, top_k).await?;
        }
        Commands::Chat { file, top_k } => {
            chat(&file, top_k).await?;
        }
        Commands::Serve => {
            serve_mcp().await?;
        }
    }

    Ok(())
}
