//! External collaborators the pipeline sequences.
//!
//! Implementations live outside this crate (LLM chains, vector index,
//! HTTP filter service, object store); tests provide in-memory ones.

use super::event::{FilterData, SearchParams};
use super::records::Business;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Detected language of a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageGuess {
    /// ISO 639-1 code
    pub language: String,
    /// Normalized probability in [0, 1]
    pub confidence: f64,
}

#[async_trait]
pub trait QueryTranslator: Send + Sync {
    fn detect_language(&self, text: &str) -> LanguageGuess;

    async fn translate(&self, text: &str, target_language: &str) -> Result<String>;
}

/// Nearest vocabulary terms (cuisines, business types) for a query
#[async_trait]
pub trait VocabularyLookup: Send + Sync {
    async fn lookup(&self, query: &str) -> Result<Vec<String>>;
}

/// Grounding passed to the extraction model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionContext {
    pub question: String,
    pub available_cuisines: Vec<String>,
    pub available_business_types: Vec<String>,
}

/// Structured-output filter extraction
#[async_trait]
pub trait FilterExtractor: Send + Sync {
    async fn extract(&self, context: &ExtractionContext) -> Result<Map<String, Value>>;
}

/// Metadata filter service
#[async_trait]
pub trait SearchService: Send + Sync {
    async fn search(&self, body: &FilterData, params: &SearchParams) -> Result<Vec<Business>>;
}

/// Vector similarity over a fixed set of ids
#[async_trait]
pub trait SimilarityService: Send + Sync {
    async fn similar(&self, ids: &[String], query: &str, city_code: &str)
        -> Result<Vec<Business>>;
}

/// Fetches per-business metadata documents
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn fetch_metadata(
        &self,
        business: &Business,
        country_code: &str,
        city_code: &str,
    ) -> Result<Option<Value>>;
}
