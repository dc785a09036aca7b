/// Chunked, concurrent scoring with a deterministic global merge
use super::scorer::{CandidateScore, Scorer, ScoringItem};
use super::RerankError;
use crate::config::RerankConfig;
use ahash::{AHashMap, AHashSet};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Candidates per scoring call
pub const DEFAULT_CHUNK_SIZE: usize = 5;

/// Inclusive score bounds accepted from the scorer
pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 10.0;

/// A validated score with the candidate's original input position
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedScore {
    pub business_id: String,
    pub score: f64,
    pub reason: Option<String>,
    /// Index in the input list, used as the tie-break key
    pub position: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RerankStatus {
    /// Every chunk was scored
    Complete,
    /// Some chunks failed; their candidates are absent
    Partial,
    /// No chunk was scored
    Failed,
}

/// A chunk whose scores were discarded
#[derive(Debug, Clone)]
pub struct ChunkFailure {
    pub chunk_index: usize,
    pub ids: Vec<String>,
    pub error: RerankError,
}

/// One rejected answer entry, or an id the scorer left out
#[derive(Debug, Clone, PartialEq)]
pub struct IntegrityViolation {
    pub chunk_index: usize,
    pub business_id: String,
    pub message: String,
}

impl fmt::Display for IntegrityViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "chunk {}: {} '{}'",
            self.chunk_index, self.message, self.business_id
        )
    }
}

/// Result of one reranking invocation
#[derive(Debug, Clone)]
pub struct RerankOutcome {
    /// Scores sorted by score descending, then input position
    pub ranked: Vec<RankedScore>,
    pub failed_chunks: Vec<ChunkFailure>,
    /// Entries dropped from chunks that still produced scores
    pub integrity_violations: Vec<IntegrityViolation>,
    /// Input ids with no accepted score, in input order
    pub unscored: Vec<String>,
    pub total_chunks: usize,
    pub duration_ms: u64,
}

impl RerankOutcome {
    fn empty() -> Self {
        Self {
            ranked: Vec::new(),
            failed_chunks: Vec::new(),
            integrity_violations: Vec::new(),
            unscored: Vec::new(),
            total_chunks: 0,
            duration_ms: 0,
        }
    }

    pub fn status(&self) -> RerankStatus {
        if self.total_chunks > 0 && self.failed_chunks.len() == self.total_chunks {
            RerankStatus::Failed
        } else if self.failed_chunks.is_empty() && self.integrity_violations.is_empty() {
            RerankStatus::Complete
        } else {
            RerankStatus::Partial
        }
    }

    /// Ids left out of the ranking, whether their chunk failed or only their entry
    pub fn unscored_ids(&self) -> impl Iterator<Item = &str> {
        self.unscored.iter().map(String::as_str)
    }

    /// The ranked scores, or an error when nothing could be scored
    pub fn into_ranked(self) -> Result<Vec<RankedScore>, RerankError> {
        match self.status() {
            RerankStatus::Failed => Err(RerankError::AllChunksFailed {
                chunks: self.total_chunks,
                last_error: self
                    .failed_chunks
                    .last()
                    .map(|f| f.error.to_string())
                    .unwrap_or_default(),
            }),
            _ => Ok(self.ranked),
        }
    }
}

/// Split `items` into consecutive chunks of at most `size`
pub fn chunk_items(items: &[ScoringItem], size: usize) -> Vec<Vec<ScoringItem>> {
    items
        .chunks(size.max(1))
        .map(|chunk| chunk.to_vec())
        .collect()
}

/// Sort descending by score; equal scores keep input order
pub fn sort_ranked(ranked: &mut [RankedScore]) {
    ranked.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.position.cmp(&b.position))
    });
}

/// Check one chunk response against the chunk it answers.
///
/// Unknown ids, repeated ids and out-of-range scores are dropped and reported
/// alongside missing ids. The chunk fails only when no valid score remains.
fn validate_chunk(
    chunk_index: usize,
    chunk: &[ScoringItem],
    scores: Vec<CandidateScore>,
    positions: &AHashMap<String, usize>,
) -> Result<(Vec<RankedScore>, Vec<IntegrityViolation>), RerankError> {
    let violation = |business_id: &str, message: String| IntegrityViolation {
        chunk_index,
        business_id: business_id.to_string(),
        message,
    };

    let expected: AHashSet<&str> = chunk.iter().map(|item| item.id.as_str()).collect();
    let mut seen: AHashSet<String> = AHashSet::with_capacity(scores.len());
    let mut ranked = Vec::with_capacity(scores.len());
    let mut violations = Vec::new();

    for score in scores {
        if !expected.contains(score.business_id.as_str()) {
            violations.push(violation(&score.business_id, "unexpected id".to_string()));
            continue;
        }
        if !seen.insert(score.business_id.clone()) {
            violations.push(violation(&score.business_id, "duplicate id".to_string()));
            continue;
        }
        if !score.score.is_finite() || !(MIN_SCORE..=MAX_SCORE).contains(&score.score) {
            violations.push(violation(
                &score.business_id,
                format!("score {} outside [{}, {}] for", score.score, MIN_SCORE, MAX_SCORE),
            ));
            continue;
        }

        let position = positions
            .get(&score.business_id)
            .copied()
            .unwrap_or(usize::MAX);

        ranked.push(RankedScore {
            business_id: score.business_id,
            score: score.score,
            reason: score.reason,
            position,
        });
    }

    // Chunk order keeps the report deterministic
    for item in chunk {
        if !seen.contains(&item.id) {
            violations.push(violation(&item.id, "missing id".to_string()));
        }
    }

    if ranked.is_empty() {
        let detail: Vec<String> = violations.iter().map(ToString::to_string).collect();
        return Err(RerankError::Integrity {
            chunk: chunk_index,
            message: format!("no valid scores ({})", detail.join("; ")),
        });
    }

    Ok((ranked, violations))
}

type ChunkResult = (usize, Result<Vec<CandidateScore>, RerankError>);

/// Reranker that fans chunks out to a [`Scorer`] and merges the answers
///
/// - at most `max_concurrent` scoring calls run at once
/// - each call is bounded by `chunk_timeout`; late calls are dropped
/// - a failed chunk removes only its own candidates from the ranking
pub struct BatchReranker {
    scorer: Arc<dyn Scorer>,
    chunk_size: usize,
    max_concurrent: usize,
    chunk_timeout: Duration,
}

impl BatchReranker {
    /// Create a new batch reranker
    ///
    /// # Arguments
    /// * `scorer` - Scoring collaborator
    /// * `chunk_size` - Candidates per scoring call
    /// * `max_concurrent` - Maximum scoring calls in flight
    /// * `chunk_timeout` - Deadline for a single scoring call
    pub fn new(
        scorer: Arc<dyn Scorer>,
        chunk_size: usize,
        max_concurrent: usize,
        chunk_timeout: Duration,
    ) -> Self {
        Self {
            scorer,
            chunk_size: chunk_size.max(1),
            max_concurrent: max_concurrent.max(1),
            chunk_timeout,
        }
    }

    pub fn from_config(
        scorer: Arc<dyn Scorer>,
        config: &RerankConfig,
    ) -> crate::error::Result<Self> {
        Ok(Self::new(
            scorer,
            config.chunk_size,
            config.max_concurrent_chunks,
            config.chunk_timeout()?,
        ))
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn scorer_name(&self) -> &str {
        self.scorer.name()
    }

    /// Score `items` against `query` and merge all chunk answers.
    ///
    /// Returns an error only for invalid input (empty query, duplicate ids).
    /// Chunk failures are reported through [`RerankOutcome::status`].
    pub async fn rerank(
        &self,
        query: &str,
        items: Vec<ScoringItem>,
    ) -> Result<RerankOutcome, RerankError> {
        let start = Instant::now();

        if query.trim().is_empty() {
            return Err(RerankError::InvalidInput(
                "Query cannot be empty".to_string(),
            ));
        }

        let mut positions: AHashMap<String, usize> = AHashMap::with_capacity(items.len());
        for (position, item) in items.iter().enumerate() {
            if positions.insert(item.id.clone(), position).is_some() {
                return Err(RerankError::InvalidInput(format!(
                    "Duplicate candidate id '{}'",
                    item.id
                )));
            }
        }

        if items.is_empty() {
            return Ok(RerankOutcome::empty());
        }

        let chunks = chunk_items(&items, self.chunk_size);
        let total_chunks = chunks.len();

        info!(
            "Reranking {} candidates in {} chunks with scorer '{}'",
            items.len(),
            total_chunks,
            self.scorer.name()
        );

        let query: Arc<str> = Arc::from(query);
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut tasks: JoinSet<ChunkResult> = JoinSet::new();

        for (chunk_index, chunk) in chunks.iter().enumerate() {
            let scorer = Arc::clone(&self.scorer);
            let semaphore = Arc::clone(&semaphore);
            let query = Arc::clone(&query);
            let chunk = chunk.clone();
            let deadline = self.chunk_timeout;

            tasks.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => return (chunk_index, Err(RerankError::Scoring(e.to_string()))),
                };

                let result = match tokio::time::timeout(deadline, scorer.score(&query, &chunk)).await
                {
                    Ok(result) => result,
                    Err(_) => Err(RerankError::Timeout {
                        chunk: chunk_index,
                        timeout_ms: deadline.as_millis() as u64,
                    }),
                };

                (chunk_index, result)
            });
        }

        let mut ranked: Vec<RankedScore> = Vec::with_capacity(items.len());
        let mut failed_chunks: Vec<ChunkFailure> = Vec::new();
        let mut integrity_violations: Vec<IntegrityViolation> = Vec::new();
        let mut settled: AHashSet<usize> = AHashSet::with_capacity(total_chunks);

        while let Some(joined) = tasks.join_next().await {
            let (chunk_index, result) = match joined {
                Ok(done) => done,
                Err(e) => {
                    // The chunk index is recovered below from the unsettled set
                    warn!("Scoring task aborted: {}", e);
                    continue;
                }
            };
            settled.insert(chunk_index);

            let chunk = &chunks[chunk_index];
            match result.and_then(|scores| validate_chunk(chunk_index, chunk, scores, &positions))
            {
                Ok((scores, violations)) => {
                    debug!("Chunk {} scored {} candidates", chunk_index, scores.len());
                    for violation in &violations {
                        warn!("Integrity violation in {}", violation);
                    }
                    ranked.extend(scores);
                    integrity_violations.extend(violations);
                }
                Err(error) => {
                    warn!("Chunk {} failed: {}", chunk_index, error);
                    failed_chunks.push(ChunkFailure {
                        chunk_index,
                        ids: chunk.iter().map(|item| item.id.clone()).collect(),
                        error,
                    });
                }
            }
        }

        for (chunk_index, chunk) in chunks.iter().enumerate() {
            if !settled.contains(&chunk_index) {
                failed_chunks.push(ChunkFailure {
                    chunk_index,
                    ids: chunk.iter().map(|item| item.id.clone()).collect(),
                    error: RerankError::Join(format!("chunk {} task did not complete", chunk_index)),
                });
            }
        }

        sort_ranked(&mut ranked);
        failed_chunks.sort_by_key(|f| f.chunk_index);
        integrity_violations.sort_by_key(|v| v.chunk_index);

        let scored: AHashSet<&str> = ranked.iter().map(|r| r.business_id.as_str()).collect();
        let unscored: Vec<String> = items
            .iter()
            .filter(|item| !scored.contains(item.id.as_str()))
            .map(|item| item.id.clone())
            .collect();

        let outcome = RerankOutcome {
            ranked,
            failed_chunks,
            integrity_violations,
            unscored,
            total_chunks,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        info!(
            "Reranking finished: {:?}, {} scored, {}/{} chunks failed, {} dropped entries, {}ms",
            outcome.status(),
            outcome.ranked.len(),
            outcome.failed_chunks.len(),
            total_chunks,
            outcome.integrity_violations.len(),
            outcome.duration_ms
        );

        Ok(outcome)
    }
}
