//! Filterer - filter extraction merge engine and batched reranker
//!
//! Normalizes filters extracted from natural-language business queries,
//! merges them into caller filters without overriding explicit choices, and
//! reranks candidates by fanning scoring calls out in fixed-size chunks.

pub mod cli;
pub mod config;
pub mod error;
pub mod filters;
pub mod pipeline;
pub mod rerank;

pub use error::{FiltererError, Result};
