//! Integration tests for the request pipeline
//!
//! All collaborators are in-memory fakes; each records what it was called with.

use async_trait::async_trait;
use filterer::config::Config;
use filterer::error::{FiltererError, Result};
use filterer::pipeline::{
    Business, Collaborators, ExtractionContext, FilterData, FilterEvent, FilterExtractor,
    FiltererPipeline, LanguageGuess, QueryTranslator, RecordStore, SearchParams, SearchService,
    SimilarityService, VocabularyLookup,
};
use filterer::rerank::{CandidateScore, RerankError, RerankStatus, Scorer, ScoringItem};
use serde_json::{json, Map, Value};
use std::sync::{Arc, Mutex};

struct FakeTranslator {
    guess: LanguageGuess,
    translations: Mutex<Vec<String>>,
}

#[async_trait]
impl QueryTranslator for FakeTranslator {
    fn detect_language(&self, _text: &str) -> LanguageGuess {
        self.guess.clone()
    }

    async fn translate(&self, text: &str, target_language: &str) -> Result<String> {
        self.translations.lock().unwrap().push(text.to_string());
        Ok(format!("[{}] {}", target_language, text))
    }
}

struct FakeVocabulary(Vec<&'static str>);

#[async_trait]
impl VocabularyLookup for FakeVocabulary {
    async fn lookup(&self, _query: &str) -> Result<Vec<String>> {
        Ok(self.0.iter().map(|s| s.to_string()).collect())
    }
}

struct FakeExtractor {
    output: Map<String, Value>,
    seen: Mutex<Option<ExtractionContext>>,
}

#[async_trait]
impl FilterExtractor for FakeExtractor {
    async fn extract(&self, context: &ExtractionContext) -> Result<Map<String, Value>> {
        *self.seen.lock().unwrap() = Some(context.clone());
        Ok(self.output.clone())
    }
}

struct FakeSearch {
    results: Vec<Business>,
    seen: Mutex<Option<(FilterData, SearchParams)>>,
}

#[async_trait]
impl SearchService for FakeSearch {
    async fn search(&self, body: &FilterData, params: &SearchParams) -> Result<Vec<Business>> {
        *self.seen.lock().unwrap() = Some((body.clone(), params.clone()));
        Ok(self.results.clone())
    }
}

/// Scores every id by its position in the reversed input
struct FakeSimilarity {
    seen_query: Mutex<Option<String>>,
}

#[async_trait]
impl SimilarityService for FakeSimilarity {
    async fn similar(
        &self,
        ids: &[String],
        query: &str,
        _city_code: &str,
    ) -> Result<Vec<Business>> {
        *self.seen_query.lock().unwrap() = Some(query.to_string());
        Ok(ids
            .iter()
            .enumerate()
            .map(|(i, id)| Business::new(id.clone()).with_score(i as f64 / 10.0))
            .collect())
    }
}

struct FakeRecords;

#[async_trait]
impl RecordStore for FakeRecords {
    async fn fetch_metadata(
        &self,
        business: &Business,
        _country_code: &str,
        _city_code: &str,
    ) -> Result<Option<Value>> {
        Ok(Some(json!({
            "business_id": business.id,
            "business_summary": format!("Summary of {}", business.id),
        })))
    }
}

struct FailingRecords;

#[async_trait]
impl RecordStore for FailingRecords {
    async fn fetch_metadata(
        &self,
        _business: &Business,
        _country_code: &str,
        _city_code: &str,
    ) -> Result<Option<Value>> {
        Err(FiltererError::collaborator("record store", "bucket unavailable"))
    }
}

/// Scores `r<n>` as `n`; fails every chunk, or only chunks holding `fail_with`
struct FakeScorer {
    fail: bool,
    fail_with: Option<&'static str>,
    seen_query: Mutex<Option<String>>,
}

#[async_trait]
impl Scorer for FakeScorer {
    async fn score(
        &self,
        query: &str,
        chunk: &[ScoringItem],
    ) -> std::result::Result<Vec<CandidateScore>, RerankError> {
        *self.seen_query.lock().unwrap() = Some(query.to_string());
        let poisoned = self
            .fail_with
            .is_some_and(|id| chunk.iter().any(|item| item.id == id));
        if self.fail || poisoned {
            return Err(RerankError::Scoring("quota exceeded".to_string()));
        }
        Ok(chunk
            .iter()
            .map(|item| {
                let n: f64 = item.id.trim_start_matches('r').parse().unwrap();
                CandidateScore::new(item.id.clone(), n)
            })
            .collect())
    }

    fn name(&self) -> &str {
        "fake"
    }
}

struct Harness {
    translator: Arc<FakeTranslator>,
    extractor: Arc<FakeExtractor>,
    search: Arc<FakeSearch>,
    similarity: Arc<FakeSimilarity>,
    scorer: Arc<FakeScorer>,
    records: Arc<dyn RecordStore>,
}

impl Harness {
    fn new(results: usize) -> Self {
        Self {
            translator: Arc::new(FakeTranslator {
                guess: LanguageGuess {
                    language: "en".to_string(),
                    confidence: 0.99,
                },
                translations: Mutex::new(Vec::new()),
            }),
            extractor: Arc::new(FakeExtractor {
                output: json!({
                    "cuisine_type": ["Italian"],
                    "max_price": 30,
                    "food_score": 8,
                    "search_type": "Around",
                    "sort_by": "rating"
                })
                .as_object()
                .cloned()
                .unwrap(),
                seen: Mutex::new(None),
            }),
            search: Arc::new(FakeSearch {
                results: (0..results)
                    .map(|i| Business::new(format!("r{}", i)).with_field("name", format!("R{}", i)))
                    .collect(),
                seen: Mutex::new(None),
            }),
            similarity: Arc::new(FakeSimilarity {
                seen_query: Mutex::new(None),
            }),
            scorer: Arc::new(FakeScorer {
                fail: false,
                fail_with: None,
                seen_query: Mutex::new(None),
            }),
            records: Arc::new(FakeRecords),
        }
    }

    fn pipeline(&self, config: &Config) -> FiltererPipeline {
        let collaborators = Collaborators {
            translator: self.translator.clone(),
            cuisine_lookup: Arc::new(FakeVocabulary(vec!["Italian", "Pizza"])),
            business_type_lookup: Arc::new(FakeVocabulary(vec!["Restaurant"])),
            extractor: self.extractor.clone(),
            search: self.search.clone(),
            similarity: self.similarity.clone(),
            records: self.records.clone(),
            scorer: self.scorer.clone(),
        };
        FiltererPipeline::new(config, collaborators).unwrap()
    }
}

fn event(query: &str) -> FilterEvent {
    FilterEvent::from_value(json!({
        "filter_data": {
            "natural_query": query,
            "filters": {
                "max_price": {"value": 20, "type": "less_equal_than"},
                "processed_refined_cuisine_types_001": {"value": [], "type": "contains"}
            }
        },
        "city_code": "vlc"
    }))
    .unwrap()
}

fn ids(records: &[Business]) -> Vec<&str> {
    records.iter().map(|r| r.id.as_str()).collect()
}

#[tokio::test]
async fn test_full_request() {
    let harness = Harness::new(6);
    let mut config = Config::default();
    config.pipeline.top_n = 4;
    config.rerank.chunk_size = 2;
    let pipeline = harness.pipeline(&config);

    let response = pipeline.handle(event("cheap italian")).await.unwrap();

    assert_eq!(response.status_code, 200);
    assert_eq!(response.rerank_status, Some(RerankStatus::Complete));

    // Extraction body is the raw extraction output
    let body: Value = serde_json::from_str(&response.body).unwrap();
    assert_eq!(body["search_type"], json!("Around"));

    // Search got merged filters and params derived from the extraction
    let (sent, params) = harness.search.seen.lock().unwrap().clone().unwrap();
    let filters = sent.filters.unwrap();
    assert_eq!(filters["max_price"]["value"], json!(20));
    assert_eq!(
        filters["processed_refined_cuisine_types_001"]["value"],
        json!(["Italian"])
    );
    assert_eq!(
        filters["processed_food_score_001"],
        json!({"value": 8, "type": "greater_equal"})
    );
    assert!(!filters.contains_key("sort_by"));
    assert_eq!(params.filter_type, "around");

    // Similarity scored r5 highest, so the top 4 are r5..r2; rerank sorts them by n
    assert_eq!(ids(&response.recommended_result), vec!["r5", "r4", "r3", "r2"]);
    assert_eq!(ids(&response.rest_result), vec!["r1", "r0"]);
    assert_eq!(response.recommended_result[0].score, Some(5.0));
    assert!(response.recommended_result[0].metadata.is_some());
    assert_eq!(
        response.recommended_result[0].fields["name"],
        json!("R5")
    );
    assert!(harness.translator.translations.lock().unwrap().is_empty());
    println!("✓ Full request: {} recommended", response.recommended_result.len());
}

#[tokio::test]
async fn test_translated_query_is_used_downstream() {
    let mut harness = Harness::new(3);
    harness.translator = Arc::new(FakeTranslator {
        guess: LanguageGuess {
            language: "es".to_string(),
            confidence: 0.95,
        },
        translations: Mutex::new(Vec::new()),
    });
    let pipeline = harness.pipeline(&Config::default());

    pipeline.handle(event("cena barata")).await.unwrap();

    let expected = "[en] cena barata";
    let context = harness.extractor.seen.lock().unwrap().clone().unwrap();
    assert_eq!(context.question, expected);
    assert_eq!(context.available_cuisines, vec!["Italian", "Pizza"]);
    assert_eq!(
        harness.similarity.seen_query.lock().unwrap().as_deref(),
        Some(expected)
    );
    assert_eq!(
        harness.scorer.seen_query.lock().unwrap().as_deref(),
        Some(expected)
    );
}

#[tokio::test]
async fn test_low_confidence_skips_translation() {
    let mut harness = Harness::new(1);
    harness.translator = Arc::new(FakeTranslator {
        guess: LanguageGuess {
            language: "es".to_string(),
            confidence: 0.4,
        },
        translations: Mutex::new(Vec::new()),
    });
    let pipeline = harness.pipeline(&Config::default());

    let extraction = pipeline.extract_filters("pizza").await.unwrap();

    assert!(!extraction.translated);
    assert_eq!(extraction.working_query, "pizza");
    assert!(harness.translator.translations.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_rerank_failure_keeps_original_order() {
    let mut harness = Harness::new(5);
    harness.scorer = Arc::new(FakeScorer {
        fail: true,
        fail_with: None,
        seen_query: Mutex::new(None),
    });
    let mut config = Config::default();
    config.rerank.chunk_size = 2;
    let pipeline = harness.pipeline(&config);

    let response = pipeline.handle(event("pizza")).await.unwrap();

    assert_eq!(response.rerank_status, Some(RerankStatus::Failed));
    // Similarity order, untouched
    assert_eq!(
        ids(&response.recommended_result),
        vec!["r4", "r3", "r2", "r1", "r0"]
    );
    assert_eq!(response.recommended_result[0].score, Some(0.4));
}

#[tokio::test]
async fn test_partial_rerank_returns_scored_subset() {
    let mut harness = Harness::new(7);
    harness.scorer = Arc::new(FakeScorer {
        fail: false,
        fail_with: Some("r0"),
        seen_query: Mutex::new(None),
    });
    let pipeline = harness.pipeline(&Config::default());

    let response = pipeline.handle(event("pizza")).await.unwrap();

    // Default chunks of 5: [r6..r2] scores, [r1, r0] fails
    assert_eq!(response.rerank_status, Some(RerankStatus::Partial));
    assert_eq!(
        ids(&response.recommended_result),
        vec!["r6", "r5", "r4", "r3", "r2"]
    );
    assert!(response
        .recommended_result
        .iter()
        .all(|r| r.score.is_some()));
    assert_eq!(response.recommended_result[0].score, Some(6.0));
    assert!(response.rest_result.is_empty());
}

#[tokio::test]
async fn test_empty_search_results() {
    let harness = Harness::new(0);
    let pipeline = harness.pipeline(&Config::default());

    let response = pipeline.handle(event("pizza")).await.unwrap();

    assert!(response.recommended_result.is_empty());
    assert!(response.rest_result.is_empty());
    assert!(response.rerank_status.is_none());
    assert!(harness.similarity.seen_query.lock().unwrap().is_none());
}

#[tokio::test]
async fn test_global_fields_projection() {
    let harness = Harness::new(3);
    let pipeline = harness.pipeline(&Config::default());

    let mut request = event("pizza");
    request.filter_data.global_fields = Some(vec!["score".to_string()]);

    let response = pipeline.handle(request).await.unwrap();

    for record in &response.recommended_result {
        assert!(record.metadata.is_some());
        assert!(record.fields.is_empty());
        assert!(record.score.is_some());
    }
}

#[tokio::test]
async fn test_missing_query_is_rejected() {
    let harness = Harness::new(1);
    let pipeline = harness.pipeline(&Config::default());

    let request = FilterEvent::from_value(json!({"filter_data": {"natural_query": " "}})).unwrap();
    let err = pipeline.handle(request).await.unwrap_err();

    assert!(matches!(err, FiltererError::Validation(_)));
}

#[tokio::test]
async fn test_record_store_errors_propagate() {
    let mut harness = Harness::new(2);
    harness.records = Arc::new(FailingRecords);
    let pipeline = harness.pipeline(&Config::default());

    let err = pipeline.handle(event("pizza")).await.unwrap_err();

    assert!(matches!(err, FiltererError::Collaborator { .. }));
}

#[test]
fn test_prepare_filters_respects_caller() {
    let harness = Harness::new(0);
    let pipeline = harness.pipeline(&Config::default());

    let existing = json!({
        "business_type": {"value": "", "type": "equals"},
        "processed_refined_business_types_001": {"value": ["Bar"], "type": "contains"}
    })
    .as_object()
    .cloned()
    .unwrap();
    let extracted = json!({"business_type": ["Restaurant"], "overall_score": 7})
        .as_object()
        .cloned()
        .unwrap();

    let filters = pipeline.prepare_filters(&existing, &extracted).unwrap();

    assert_eq!(
        filters["processed_refined_business_types_001"]["value"],
        json!(["Bar"])
    );
    // Empty caller slot stays empty and is cleaned away
    assert!(!filters.contains_key("business_type"));
    assert_eq!(filters["processed_avg_score_001"]["value"], json!(7));
}
