//! Configuration management for Filterer
//!
//! Loads the TOML configuration, applies `FILTERER_SECTION__KEY` environment
//! overrides and validates the result before anything uses it.

use crate::error::{FiltererError, Result};
use crate::filters::{default_filter_mapping, FilterMapping};
use crate::rerank::DEFAULT_CHUNK_SIZE;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

mod validator;

pub use validator::ConfigValidator;

pub const SCHEMA_VERSION: &str = "1.0.0";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    #[serde(default)]
    pub filters: FiltersConfig,
    #[serde(default)]
    pub rerank: RerankConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Filter merge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FiltersConfig {
    /// Extracted filter name -> storage filter name
    pub default_mapping: FilterMapping,
}

impl Default for FiltersConfig {
    fn default() -> Self {
        Self {
            default_mapping: default_filter_mapping(),
        }
    }
}

/// Batched reranking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankConfig {
    pub chunk_size: usize,
    pub max_concurrent_chunks: usize,
    /// Per-chunk deadline, e.g. "30s" or "500ms"
    pub chunk_timeout: String,
}

impl RerankConfig {
    pub fn chunk_timeout(&self) -> Result<Duration> {
        parse_duration(&self.chunk_timeout).ok_or_else(|| FiltererError::InvalidConfigValue {
            path: "rerank.chunk_timeout".to_string(),
            message: format!("Invalid duration format: {}", self.chunk_timeout),
        })
    }
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_concurrent_chunks: 4,
            chunk_timeout: "30s".to_string(),
        }
    }
}

/// Request pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Candidates kept for metadata fetch and reranking
    pub top_n: usize,
    /// Minimum detector confidence before a query is translated
    pub language_confidence: f64,
    /// Language queries are translated into
    pub target_language: String,
    pub default_country_code: String,
    pub default_city_code: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            top_n: 30,
            language_confidence: 0.7,
            target_language: "en".to_string(),
            default_country_code: "es".to_string(),
            default_city_code: "vlc".to_string(),
        }
    }
}

/// Parse "500ms", "30s", "2m", "1h" or a bare number of seconds
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    let (number, unit) = match s.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => s.split_at(idx),
        None => (s, "s"),
    };

    let value: u64 = number.parse().ok()?;
    match unit {
        "ms" => Some(Duration::from_millis(value)),
        "s" => Some(Duration::from_secs(value)),
        "m" => value.checked_mul(60).map(Duration::from_secs),
        "h" => value.checked_mul(3600).map(Duration::from_secs),
        _ => None,
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(FiltererError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| FiltererError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        // Apply environment variable overrides
        config.apply_env_overrides();

        // Validate configuration
        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Load from `path`, or fall back to validated defaults when no path is given
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let default_path = Self::default_path()?;
                if default_path.exists() {
                    Self::load(&default_path)
                } else {
                    let mut config = Self::default();
                    config.apply_env_overrides();
                    ConfigValidator::validate(&config)?;
                    Ok(config)
                }
            }
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| FiltererError::Io {
                source: e,
                context: format!("Failed to create config directory: {:?}", parent),
            })?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| FiltererError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: FILTERER_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("FILTERER_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        let invalid = |expected: &str| FiltererError::InvalidConfigValue {
            path: path.to_string(),
            message: format!("Cannot parse '{}' as {}", value, expected),
        };

        match path {
            "RERANK__CHUNK_SIZE" => {
                self.rerank.chunk_size = value.parse().map_err(|_| invalid("integer"))?;
            }
            "RERANK__MAX_CONCURRENT_CHUNKS" => {
                self.rerank.max_concurrent_chunks =
                    value.parse().map_err(|_| invalid("integer"))?;
            }
            "RERANK__CHUNK_TIMEOUT" => {
                self.rerank.chunk_timeout = value.to_string();
            }
            "PIPELINE__TOP_N" => {
                self.pipeline.top_n = value.parse().map_err(|_| invalid("integer"))?;
            }
            "PIPELINE__LANGUAGE_CONFIDENCE" => {
                self.pipeline.language_confidence =
                    value.parse().map_err(|_| invalid("number"))?;
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| FiltererError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("filterer").join("config.toml"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meta: MetaConfig {
                schema_version: SCHEMA_VERSION.to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            filters: FiltersConfig::default(),
            rerank: RerankConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}
