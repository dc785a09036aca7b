/// Filter service: bridges loosely-typed LLM extraction output and the
/// canonical `{value, type}` contract expected by the search service.
use super::model::{is_routing_field, FilterKind, FilterMapping, FilterSet, FilterValue};
use crate::config::FiltersConfig;
use crate::error::Result;
use serde_json::{Map, Value};
use tracing::debug;

/// Suffix marking a numeric score field in extraction output
pub const SCORE_SUFFIX: &str = "_score";

pub const MAX_PRICE_FIELD: &str = "max_price";
pub const MIN_PRICE_FIELD: &str = "min_price";

/// Storage name for an extracted score field: `food_score` -> `processed_food_score_001`
pub fn score_field_destination(key: &str) -> Option<String> {
    let stem = key.strip_suffix(SCORE_SUFFIX)?;
    Some(format!("processed_{}{}_001", stem, SCORE_SUFFIX))
}

/// Mapping applied to extraction output before it meets caller filters
pub fn default_filter_mapping() -> FilterMapping {
    [
        ("cuisine_type", "processed_refined_cuisine_types_001"),
        ("business_type", "processed_refined_business_types_001"),
        ("processed_overall_score_001", "processed_avg_score_001"),
    ]
    .into_iter()
    .map(|(from, to)| (from.to_string(), to.to_string()))
    .collect()
}

/// Stateless apart from its default key mapping
#[derive(Debug, Clone)]
pub struct FilterService {
    default_mapping: FilterMapping,
}

impl FilterService {
    pub fn new(default_mapping: FilterMapping) -> Self {
        Self { default_mapping }
    }

    pub fn from_config(config: &FiltersConfig) -> Self {
        Self::new(config.default_mapping.clone())
    }

    pub fn default_mapping(&self) -> &FilterMapping {
        &self.default_mapping
    }

    /// Tag raw values by shape.
    ///
    /// - null: dropped
    /// - number: `less_equal_than` for `max_price`, `greater_equal` for `min_price` and scores
    /// - array: `contains`
    /// - anything else: unchanged
    pub fn transform_filter_values(filters: &Map<String, Value>) -> Map<String, Value> {
        let mut transformed = Map::new();

        for (key, value) in filters {
            let tagged = match value {
                Value::Null => continue,
                Value::Number(_) => {
                    let kind = match key.as_str() {
                        MAX_PRICE_FIELD => FilterKind::LessEqualThan,
                        MIN_PRICE_FIELD => FilterKind::GreaterEqual,
                        // scores and any other numeric threshold
                        _ => FilterKind::GreaterEqual,
                    };
                    FilterValue::new(value.clone(), kind).to_value()
                }
                Value::Array(_) => FilterValue::new(value.clone(), FilterKind::Contains).to_value(),
                other => other.clone(),
            };
            transformed.insert(key.clone(), tagged);
        }

        transformed
    }

    /// Derive storage names for every `*_score` key
    pub fn generate_score_mapping(filters: &Map<String, Value>) -> FilterMapping {
        filters
            .keys()
            .filter_map(|key| score_field_destination(key).map(|dest| (key.clone(), dest)))
            .collect()
    }

    /// Turn raw extraction output into filters ready for merging.
    ///
    /// Mapping precedence on key collision: additional > generated score > default.
    pub fn process_extracted_filters(
        &self,
        extracted: &Map<String, Value>,
        additional_mapping: Option<&FilterMapping>,
    ) -> Result<Map<String, Value>> {
        let transformed = Self::transform_filter_values(extracted);
        let score_mapping = Self::generate_score_mapping(extracted);

        let mut final_mapping = self.default_mapping.clone();
        final_mapping.extend(score_mapping);
        if let Some(additional) = additional_mapping {
            final_mapping.extend(additional.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        debug!(
            "Processing {} extracted filters with {} mapping rules",
            transformed.len(),
            final_mapping.len()
        );

        let filters = FilterSet::from_map(&transformed)?;
        let mapped = if final_mapping.is_empty() {
            filters
        } else {
            filters.apply_mapping(&final_mapping)
        };

        let mut result = mapped.to_map();
        result.retain(|key, _| !is_routing_field(key));

        Ok(result)
    }

    /// Fill empty or missing caller filters from extracted ones.
    /// A missing or empty mapping falls back to the service default.
    pub fn merge_filters(
        &self,
        existing: &Map<String, Value>,
        extracted: &Map<String, Value>,
        mapping: Option<&FilterMapping>,
    ) -> Result<Map<String, Value>> {
        let existing = FilterSet::from_map(existing)?;
        let extracted = FilterSet::from_map(extracted)?;

        let mapping = match mapping {
            Some(mapping) if !mapping.is_empty() => mapping,
            _ => &self.default_mapping,
        };
        let merged = existing.overwrite_empty_with(&extracted, Some(mapping));

        debug!(
            "Merged filters: {} existing + {} extracted -> {}",
            existing.len(),
            extracted.len(),
            merged.len()
        );

        Ok(merged.to_map())
    }

    pub fn apply_mapping_only(
        filters: &Map<String, Value>,
        mapping: &FilterMapping,
    ) -> Result<Map<String, Value>> {
        Ok(FilterSet::from_map(filters)?.apply_mapping(mapping).to_map())
    }

    pub fn clean_empty_filters(filters: &Map<String, Value>) -> Result<Map<String, Value>> {
        Ok(FilterSet::from_map(filters)?.remove_empty_filters().to_map())
    }

    pub fn empty_filter_keys(filters: &Map<String, Value>) -> Result<Vec<String>> {
        Ok(FilterSet::from_map(filters)?.empty_keys())
    }
}

impl Default for FilterService {
    fn default() -> Self {
        Self::new(default_filter_mapping())
    }
}
