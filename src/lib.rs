use thiserror::Error;

pub use providers::ProviderError;

pub type Result<T> = std::result::Result<T, QaError>;

#[derive(Error, Debug)]
pub enum QaError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Session not found or expired: {0}")]
    SessionNotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl QaError {
    /// Status code an HTTP-style front end should answer with for this error
    #[inline]
    pub fn http_status(&self) -> u16 {
        match self {
            Self::SessionNotFound(_) => 404,
            Self::Validation(_) => 400,
            Self::Provider(_) => 502,
            Self::Config(_) | Self::Io(_) | Self::Other(_) => 500,
        }
    }

    /// Whether the caller, not the server, is at fault
    #[inline]
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.http_status())
    }
}

pub mod commands;
pub mod config;
pub mod ingestion;
pub mod mcp;
pub mod providers;
pub mod qa;
pub mod retrieval;
pub mod session;
pub mod vector;
