//! Applying merged scores back onto candidate records

use super::batch::RankedScore;
use ahash::AHashMap;

/// A record that can carry a rerank score
pub trait Rerankable {
    /// Identifier the scorer saw, if the record has one
    fn rerank_id(&self) -> Option<&str>;

    fn rerank_score(&self) -> Option<f64>;

    fn set_rerank(&mut self, score: f64, reason: Option<String>);
}

/// Annotate records with their scores and sort them descending.
///
/// Records without a score are dropped, never given a default.
/// Equal scores keep the records' input order.
pub fn apply_scores<T: Rerankable>(records: Vec<T>, ranked: &[RankedScore]) -> Vec<T> {
    let by_id: AHashMap<&str, &RankedScore> = ranked
        .iter()
        .map(|score| (score.business_id.as_str(), score))
        .collect();

    let mut scored: Vec<T> = records
        .into_iter()
        .filter_map(|mut record| {
            let score = by_id.get(record.rerank_id()?)?;
            record.set_rerank(score.score, score.reason.clone());
            Some(record)
        })
        .collect();

    scored.sort_by(|a, b| {
        let a = a.rerank_score().unwrap_or(f64::NEG_INFINITY);
        let b = b.rerank_score().unwrap_or(f64::NEG_INFINITY);
        b.total_cmp(&a)
    });

    scored
}
