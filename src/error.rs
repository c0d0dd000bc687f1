use thiserror::Error;

use crate::domain::SourceId;

#[derive(Error, Debug)]
pub enum ReconError {
    #[error("Source '{source_id}' unavailable: {reason}")]
    SourceUnavailable { source_id: SourceId, reason: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTML extraction failed: {0}")]
    Html(String),

    #[error("Dataset version '{0}' already exists")]
    VersionExists(String),

    #[error("Dataset version '{0}' not found")]
    VersionNotFound(String),

    #[error("Invalid dataset version: {0}")]
    InvalidVersion(String),
}

impl ReconError {
    pub fn source_unavailable(source_id: SourceId, reason: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            source_id,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ReconError>;
