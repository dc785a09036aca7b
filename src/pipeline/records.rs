// Candidate business records and the list operations applied between services

use crate::rerank::{format_business_metadata, Rerankable, ScoringItem};
use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A candidate business as returned by the search and similarity services
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Business {
    pub id: String,

    /// Similarity score, replaced by the rerank score once reranked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,

    /// Scorer's rationale for the rerank score
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,

    /// Everything else the services attach, kept verbatim
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Business {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            score: None,
            reason: None,
            metadata: None,
            fields: Map::new(),
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// `business_id` inside the fetched metadata
    pub fn business_id(&self) -> Option<&str> {
        self.metadata.as_ref()?.get("business_id")?.as_str()
    }

    /// Extend `self` with `other`; values present in `other` win
    pub fn overlay(mut self, other: Business) -> Business {
        self.id = other.id;
        if other.score.is_some() {
            self.score = other.score;
        }
        if other.reason.is_some() {
            self.reason = other.reason;
        }
        if other.metadata.is_some() {
            self.metadata = other.metadata;
        }
        self.fields.extend(other.fields);
        self
    }

    /// Keep only the named fields; `id` and `metadata` always survive
    pub fn project(&self, keep: &AHashSet<&str>) -> Business {
        Business {
            id: self.id.clone(),
            score: self.score.filter(|_| keep.contains("score")),
            reason: self.reason.clone().filter(|_| keep.contains("reason")),
            metadata: self.metadata.clone(),
            fields: self
                .fields
                .iter()
                .filter(|(key, _)| keep.contains(key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
        }
    }
}

impl Rerankable for Business {
    fn rerank_id(&self) -> Option<&str> {
        self.business_id().or(Some(self.id.as_str()))
    }

    fn rerank_score(&self) -> Option<f64> {
        self.score
    }

    fn set_rerank(&mut self, score: f64, reason: Option<String>) {
        self.score = Some(score);
        self.reason = reason;
    }
}

/// Keep every `secondary` record, extended with the `primary` record of the same id
pub fn merge_records_by_id(primary: Vec<Business>, secondary: Vec<Business>) -> Vec<Business> {
    let lookup: AHashMap<String, Business> = primary
        .into_iter()
        .map(|record| (record.id.clone(), record))
        .collect();

    secondary
        .into_iter()
        .map(|record| match lookup.get(&record.id) {
            Some(base) => base.clone().overlay(record),
            None => record,
        })
        .collect()
}

/// Sort by score descending (missing = 0) and split after the first `n`
pub fn split_by_score(mut records: Vec<Business>, n: usize) -> (Vec<Business>, Vec<Business>) {
    records.sort_by(|a, b| {
        let a = a.score.unwrap_or(0.0);
        let b = b.score.unwrap_or(0.0);
        b.total_cmp(&a)
    });

    let rest = records.split_off(n.min(records.len()));
    (records, rest)
}

/// Present records to the scorer; records without metadata are described from `{}`
pub fn scoring_items(records: &[Business]) -> Vec<ScoringItem> {
    let empty = Value::Object(Map::new());
    records
        .iter()
        .filter_map(|record| {
            let id = record.rerank_id()?;
            let metadata = record.metadata.as_ref().unwrap_or(&empty);
            Some(ScoringItem::new(id, format_business_metadata(metadata)))
        })
        .collect()
}

/// Apply a caller's field selection to every record
pub fn project_fields(records: &[Business], fields: &[String]) -> Vec<Business> {
    let keep: AHashSet<&str> = fields.iter().map(String::as_str).collect();
    records.iter().map(|record| record.project(&keep)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_business_deserializes_extra_fields() {
        let record: Business = serde_json::from_value(json!({
            "id": "b1",
            "score": 0.8,
            "processed_daterange_001": "2024",
            "name": "Trattoria"
        }))
        .unwrap();

        assert_eq!(record.score, Some(0.8));
        assert_eq!(record.fields["name"], json!("Trattoria"));
        assert!(record.metadata.is_none());
    }

    #[test]
    fn test_merge_records_by_id_secondary_wins() {
        let primary = vec![
            Business::new("a").with_field("name", "A").with_field("city", "vlc"),
            Business::new("z").with_field("name", "Z"),
        ];
        let secondary = vec![
            Business::new("a").with_score(0.9).with_field("name", "A2"),
            Business::new("b").with_score(0.5),
        ];

        let merged = merge_records_by_id(primary, secondary);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].fields["name"], json!("A2"));
        assert_eq!(merged[0].fields["city"], json!("vlc"));
        assert_eq!(merged[0].score, Some(0.9));
        assert_eq!(merged[1].id, "b");
    }

    #[test]
    fn test_split_by_score() {
        let records = vec![
            Business::new("low").with_score(0.1),
            Business::new("none"),
            Business::new("high").with_score(0.9),
            Business::new("mid").with_score(0.5),
        ];

        let (top, rest) = split_by_score(records, 2);

        let top: Vec<&str> = top.iter().map(|b| b.id.as_str()).collect();
        let rest: Vec<&str> = rest.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(top, vec!["high", "mid"]);
        assert_eq!(rest, vec!["low", "none"]);
    }

    #[test]
    fn test_split_by_score_short_list() {
        let (top, rest) = split_by_score(vec![Business::new("a")], 30);
        assert_eq!(top.len(), 1);
        assert!(rest.is_empty());
    }

    #[test]
    fn test_project_fields_keeps_id_and_metadata() {
        let mut record = Business::new("a")
            .with_score(0.3)
            .with_field("name", "A")
            .with_field("phone", "123");
        record.metadata = Some(json!({"business_id": "a"}));

        let projected = project_fields(&[record], &["name".to_string()]);

        assert_eq!(projected[0].id, "a");
        assert!(projected[0].metadata.is_some());
        assert!(projected[0].score.is_none());
        assert_eq!(projected[0].fields.len(), 1);
        assert!(projected[0].fields.contains_key("name"));
    }

    #[test]
    fn test_scoring_items_use_metadata_id() {
        let mut with_meta = Business::new("row-1");
        with_meta.metadata = Some(json!({"business_id": "biz-1", "business_summary": "Cosy bistro"}));
        let bare = Business::new("row-2");

        let items = scoring_items(&[with_meta, bare]);

        assert_eq!(items[0].id, "biz-1");
        assert!(items[0].description.contains("Cosy bistro"));
        assert_eq!(items[1].id, "row-2");
        assert!(items[1].description.contains("No summary available."));
    }

    #[test]
    fn test_rerank_id_prefers_metadata() {
        let mut record = Business::new("row-1");
        assert_eq!(record.rerank_id(), Some("row-1"));

        record.metadata = Some(json!({"business_id": "biz-9"}));
        assert_eq!(record.rerank_id(), Some("biz-9"));
    }
}
