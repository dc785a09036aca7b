//! Request and response models at the service boundary

use super::records::Business;
use crate::error::{FiltererError, Result};
use crate::rerank::RerankStatus;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// Caller payload; also the body forwarded to the search service
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterData {
    #[serde(default)]
    pub natural_query: Option<String>,
    #[serde(default)]
    pub filters: Option<Map<String, Value>>,
    #[serde(default)]
    pub global_fields: Option<Vec<String>>,
    #[serde(default)]
    pub location: Option<Coordinates>,
    #[serde(default)]
    pub radius: Option<u32>,
}

/// Incoming filter request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterEvent {
    pub filter_data: FilterData,
    #[serde(default)]
    pub filter_type: Option<String>,
    #[serde(default)]
    pub city_code: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
}

impl FilterEvent {
    pub fn from_value(raw: Value) -> Result<Self> {
        serde_json::from_value(raw)
            .map_err(|e| FiltererError::Validation(format!("Invalid filter event: {}", e)))
    }

    /// The natural-language query; required
    pub fn query(&self) -> Result<&str> {
        match self.filter_data.natural_query.as_deref().map(str::trim) {
            Some(query) if !query.is_empty() => Ok(query),
            _ => Err(FiltererError::Validation(
                "filter_data.natural_query is required".to_string(),
            )),
        }
    }

    /// Caller filters, empty when absent
    pub fn existing_filters(&self) -> Map<String, Value> {
        self.filter_data.filters.clone().unwrap_or_default()
    }
}

/// Query parameters sent alongside the search body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    pub filter_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
}

impl SearchParams {
    /// Explicit `filter_type` wins; otherwise the extracted `search_type`, default "around".
    /// City searches carry the city and country codes.
    pub fn resolve(
        filter_type: Option<&str>,
        city_code: Option<&str>,
        country_code: &str,
        extracted: &Map<String, Value>,
    ) -> Self {
        match filter_type {
            Some(filter_type) => {
                let filter_type = filter_type.to_lowercase();
                let is_city = filter_type == "city";
                Self {
                    filter_type,
                    city_code: city_code.filter(|_| is_city).map(str::to_string),
                    country_code: is_city.then(|| country_code.to_string()),
                }
            }
            None => Self {
                filter_type: extracted
                    .get("search_type")
                    .and_then(Value::as_str)
                    .unwrap_or("around")
                    .to_lowercase(),
                city_code: None,
                country_code: None,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FilterResponse {
    pub request_id: Uuid,
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    /// Extracted filters as JSON text
    pub body: String,
    pub recommended_result: Vec<Business>,
    pub rest_result: Vec<Business>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerank_status: Option<RerankStatus>,
}
