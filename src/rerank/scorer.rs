//! Scoring collaborator contract

use super::RerankError;
use ahash::AHashMap;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A candidate as presented to the scorer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringItem {
    pub id: String,
    /// Formatted description (see `format_business_metadata`)
    pub description: String,
}

impl ScoringItem {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
        }
    }
}

/// Relevance score for one candidate, in `[0, 10]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub business_id: String,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl CandidateScore {
    pub fn new(business_id: impl Into<String>, score: f64) -> Self {
        Self {
            business_id: business_id.into(),
            score,
            reason: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Structured-output shape returned by the scoring LLM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreBatch {
    pub business_scores: Vec<CandidateScore>,
}

/// Scores one chunk of candidates against a query
#[async_trait]
pub trait Scorer: Send + Sync {
    /// Return one score per item of `chunk`
    async fn score(
        &self,
        query: &str,
        chunk: &[ScoringItem],
    ) -> Result<Vec<CandidateScore>, RerankError>;

    /// Get the name of this scorer
    fn name(&self) -> &str;
}

/// Scorer backed by a fixed score table.
///
/// Items missing from the table are omitted from the response, which the
/// batch reranker reports as an integrity failure for that chunk.
pub struct StaticScorer {
    scores: AHashMap<String, CandidateScore>,
}

impl StaticScorer {
    pub fn new(scores: impl IntoIterator<Item = CandidateScore>) -> Self {
        Self {
            scores: scores
                .into_iter()
                .map(|s| (s.business_id.clone(), s))
                .collect(),
        }
    }

    /// Accepts either `{"business_scores": [...]}` or a bare array
    pub fn from_json(json: &str) -> Result<Self, RerankError> {
        if let Ok(batch) = serde_json::from_str::<ScoreBatch>(json) {
            return Ok(Self::new(batch.business_scores));
        }

        let scores: Vec<CandidateScore> = serde_json::from_str(json)
            .map_err(|e| RerankError::InvalidInput(format!("Invalid score table: {}", e)))?;
        Ok(Self::new(scores))
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

#[async_trait]
impl Scorer for StaticScorer {
    async fn score(
        &self,
        _query: &str,
        chunk: &[ScoringItem],
    ) -> Result<Vec<CandidateScore>, RerankError> {
        Ok(chunk
            .iter()
            .filter_map(|item| self.scores.get(&item.id).cloned())
            .collect())
    }

    fn name(&self) -> &str {
        "static"
    }
}
