//! Request pipeline
//!
//! Sequences translation, vocabulary lookup, filter extraction, the filter
//! merge engine, search, similarity and the batched reranker. Reranking
//! failures never fail a request: the pre-rerank order is returned instead.

mod collaborators;
mod event;
mod records;

pub use collaborators::{
    ExtractionContext, FilterExtractor, LanguageGuess, QueryTranslator, RecordStore,
    SearchService, SimilarityService, VocabularyLookup,
};
pub use event::{Coordinates, FilterData, FilterEvent, FilterResponse, SearchParams};
pub use records::{
    merge_records_by_id, project_fields, scoring_items, split_by_score, Business,
};

use crate::config::{Config, PipelineConfig};
use crate::error::{FiltererError, Result};
use crate::filters::FilterService;
use crate::rerank::{apply_scores, BatchReranker, RerankStatus, Scorer};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, error, info, warn, Instrument};
use uuid::Uuid;

/// External services used by the pipeline
#[derive(Clone)]
pub struct Collaborators {
    pub translator: Arc<dyn QueryTranslator>,
    pub cuisine_lookup: Arc<dyn VocabularyLookup>,
    pub business_type_lookup: Arc<dyn VocabularyLookup>,
    pub extractor: Arc<dyn FilterExtractor>,
    pub search: Arc<dyn SearchService>,
    pub similarity: Arc<dyn SimilarityService>,
    pub records: Arc<dyn RecordStore>,
    pub scorer: Arc<dyn Scorer>,
}

/// Output of the extraction stage
#[derive(Debug, Clone)]
pub struct Extraction {
    /// Translated query when translation ran, else the original
    pub working_query: String,
    pub translated: bool,
    pub cuisines: Vec<String>,
    pub business_types: Vec<String>,
    /// Raw extraction output, routing fields included
    pub filters: Map<String, Value>,
}

pub struct FiltererPipeline {
    collaborators: Collaborators,
    filter_service: FilterService,
    reranker: BatchReranker,
    config: PipelineConfig,
}

impl FiltererPipeline {
    pub fn new(config: &Config, collaborators: Collaborators) -> Result<Self> {
        let reranker = BatchReranker::from_config(collaborators.scorer.clone(), &config.rerank)?;

        Ok(Self {
            filter_service: FilterService::from_config(&config.filters),
            reranker,
            config: config.pipeline.clone(),
            collaborators,
        })
    }

    pub fn filter_service(&self) -> &FilterService {
        &self.filter_service
    }

    /// Translate if needed, ground with vocabulary, extract raw filters
    pub async fn extract_filters(&self, query: &str) -> Result<Extraction> {
        let guess = self.collaborators.translator.detect_language(query);
        debug!(
            "Detected language '{}' (confidence {:.2})",
            guess.language, guess.confidence
        );

        let should_translate = guess.language != self.config.target_language
            && guess.confidence >= self.config.language_confidence;

        let working_query = if should_translate {
            let translated = self
                .collaborators
                .translator
                .translate(query, &self.config.target_language)
                .await?;
            info!("Translated query from '{}'", guess.language);
            translated
        } else {
            query.to_string()
        };

        let cuisines = self.collaborators.cuisine_lookup.lookup(&working_query).await?;
        let business_types = self
            .collaborators
            .business_type_lookup
            .lookup(&working_query)
            .await?;
        debug!(
            "Vocabulary: {} cuisines, {} business types",
            cuisines.len(),
            business_types.len()
        );

        let context = ExtractionContext {
            question: working_query.clone(),
            available_cuisines: cuisines.clone(),
            available_business_types: business_types.clone(),
        };
        let filters = self.collaborators.extractor.extract(&context).await?;
        info!("Extracted filter keys: {:?}", filters.keys().collect::<Vec<_>>());

        Ok(Extraction {
            working_query,
            translated: should_translate,
            cuisines,
            business_types,
            filters,
        })
    }

    /// Normalize extracted filters, fill caller gaps, drop empty slots
    pub fn prepare_filters(
        &self,
        existing: &Map<String, Value>,
        extracted: &Map<String, Value>,
    ) -> Result<Map<String, Value>> {
        let service = &self.filter_service;

        let processed =
            service.process_extracted_filters(extracted, Some(service.default_mapping()))?;
        debug!("Processed extracted filters: {:?}", processed);

        let merged = service.merge_filters(existing, &processed, None)?;
        let cleaned = FilterService::clean_empty_filters(&merged)?;
        info!("Final filters: {} entries", cleaned.len());

        Ok(cleaned)
    }

    /// Rerank `recommended`, falling back to the incoming order when nothing could be scored
    pub async fn rerank_recommended(
        &self,
        recommended: Vec<Business>,
        query: &str,
    ) -> (Vec<Business>, RerankStatus) {
        if recommended.is_empty() {
            return (recommended, RerankStatus::Complete);
        }

        let items = scoring_items(&recommended);
        let outcome = match self.reranker.rerank(query, items).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Could not rerank: {}", e);
                return (recommended, RerankStatus::Failed);
            }
        };

        let status = outcome.status();
        match status {
            RerankStatus::Failed => {
                let err = outcome.into_ranked().err();
                error!(
                    "Could not rerank, keeping original order: {}",
                    err.map(|e| e.to_string()).unwrap_or_default()
                );
                (recommended, status)
            }
            RerankStatus::Partial => {
                warn!(
                    "Partial rerank: dropping unscored candidates {:?} ({} failed chunks, {} integrity violations)",
                    outcome.unscored_ids().collect::<Vec<_>>(),
                    outcome.failed_chunks.len(),
                    outcome.integrity_violations.len()
                );
                (apply_scores(recommended, &outcome.ranked), status)
            }
            RerankStatus::Complete => {
                info!("Places successfully sorted");
                (apply_scores(recommended, &outcome.ranked), status)
            }
        }
    }

    async fn attach_metadata(
        &self,
        mut records: Vec<Business>,
        country_code: &str,
        city_code: &str,
    ) -> Result<Vec<Business>> {
        for record in records.iter_mut() {
            record.metadata = self
                .collaborators
                .records
                .fetch_metadata(record, country_code, city_code)
                .await?;
        }
        Ok(records)
    }

    /// Handle one filter request end to end
    pub async fn handle(&self, event: FilterEvent) -> Result<FilterResponse> {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("filter_request", %request_id);
        self.handle_inner(request_id, event).instrument(span).await
    }

    async fn handle_inner(&self, request_id: Uuid, event: FilterEvent) -> Result<FilterResponse> {
        let query = event.query()?.to_string();
        info!("Handling query: {}", query);

        let extraction = self.extract_filters(&query).await?;
        let body = serde_json::to_string(&extraction.filters).map_err(|e| FiltererError::Json {
            source: e,
            context: "Failed to render extracted filters".to_string(),
        })?;

        let country_code = event
            .country_code
            .clone()
            .unwrap_or_else(|| self.config.default_country_code.clone());
        let params = SearchParams::resolve(
            event.filter_type.as_deref(),
            event.city_code.as_deref(),
            &country_code,
            &extraction.filters,
        );

        let filters = self.prepare_filters(&event.existing_filters(), &extraction.filters)?;

        let mut search_body = event.filter_data.clone();
        search_body.filters = Some(filters);

        debug!("Calling search service with params {:?}", params);
        let results = self.collaborators.search.search(&search_body, &params).await?;
        if results.is_empty() {
            info!("No results from search service");
            return Ok(FilterResponse {
                request_id,
                status_code: 200,
                body,
                recommended_result: Vec::new(),
                rest_result: Vec::new(),
                rerank_status: None,
            });
        }

        let city_code = event
            .city_code
            .clone()
            .unwrap_or_else(|| self.config.default_city_code.clone());
        let ids: Vec<String> = results.iter().map(|r| r.id.clone()).collect();
        let matches = self
            .collaborators
            .similarity
            .similar(&ids, &extraction.working_query, &city_code)
            .await?;
        let results = merge_records_by_id(results, matches);

        let (recommended, mut rest) = split_by_score(results, self.config.top_n);
        let mut recommended = self
            .attach_metadata(recommended, &country_code, &city_code)
            .await?;

        if let Some(fields) = &event.filter_data.global_fields {
            let mut fields = fields.clone();
            for required in ["id", "metadata"] {
                if !fields.iter().any(|f| f == required) {
                    fields.push(required.to_string());
                }
            }
            recommended = project_fields(&recommended, &fields);
            rest = project_fields(&rest, &fields);
        }

        let (recommended, rerank_status) = self
            .rerank_recommended(recommended, &extraction.working_query)
            .await;

        Ok(FilterResponse {
            request_id,
            status_code: 200,
            body,
            recommended_result: recommended,
            rest_result: rest,
            rerank_status: Some(rerank_status),
        })
    }
}
