//! Batched LLM reranking
//!
//! Candidates are scored in fixed-size chunks by an external [`Scorer`],
//! chunk answers are validated, and the union is merged into one global
//! ranking. Failed chunks shrink the ranking instead of padding it.

mod apply;
mod batch;
mod format;
mod scorer;

pub use apply::{apply_scores, Rerankable};
pub use batch::{
    chunk_items, sort_ranked, BatchReranker, ChunkFailure, IntegrityViolation, RankedScore,
    RerankOutcome, RerankStatus, DEFAULT_CHUNK_SIZE, MAX_SCORE, MIN_SCORE,
};
pub use format::format_business_metadata;
pub use scorer::{CandidateScore, ScoreBatch, Scorer, ScoringItem, StaticScorer};

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum RerankError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Scoring failed: {0}")]
    Scoring(String),

    #[error("Chunk {chunk} timed out after {timeout_ms}ms")]
    Timeout { chunk: usize, timeout_ms: u64 },

    #[error("Chunk {chunk} integrity violation: {message}")]
    Integrity { chunk: usize, message: String },

    #[error("Could not rerank: all {chunks} chunks failed (last error: {last_error})")]
    AllChunksFailed { chunks: usize, last_error: String },

    #[error("Scoring task failed: {0}")]
    Join(String),
}
