use crate::rerank::RerankError;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Filterer
#[derive(Error, Debug)]
pub enum FiltererError {
    /// Structurally invalid filter input or request payload
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// An external collaborator (LLM, search service, record store) failed
    #[error("{service} failed: {message}")]
    Collaborator { service: String, message: String },

    /// Reranking errors
    #[error("Rerank error: {0}")]
    Rerank(#[from] RerankError),
}

impl FiltererError {
    pub fn collaborator(service: impl Into<String>, message: impl ToString) -> Self {
        Self::Collaborator {
            service: service.into(),
            message: message.to_string(),
        }
    }
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for Filterer operations
pub type Result<T> = std::result::Result<T, FiltererError>;
