// Canonical filter representation and the empty-slot-filling merge

use crate::error::{FiltererError, Result};
use ahash::AHashSet;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Query-shaping directives that are never storage filters
pub const ROUTING_FIELDS: [&str; 4] = ["sort_by", "search_type", "place", "keywords"];

/// Source filter name -> destination filter name
pub type FilterMapping = BTreeMap<String, String>;

pub fn is_routing_field(key: &str) -> bool {
    ROUTING_FIELDS.contains(&key)
}

/// Comparison semantics applied downstream by the search service
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FilterKind {
    Equals,
    Contains,
    GreaterEqual,
    LessEqualThan,
    IsIn,
    /// Any tag the search service understands that we do not interpret
    Other(String),
}

impl FilterKind {
    pub fn as_str(&self) -> &str {
        match self {
            FilterKind::Equals => "equals",
            FilterKind::Contains => "contains",
            FilterKind::GreaterEqual => "greater_equal",
            FilterKind::LessEqualThan => "less_equal_than",
            FilterKind::IsIn => "is_in",
            FilterKind::Other(tag) => tag,
        }
    }
}

impl From<&str> for FilterKind {
    fn from(tag: &str) -> Self {
        match tag {
            "equals" => FilterKind::Equals,
            "contains" => FilterKind::Contains,
            "greater_equal" => FilterKind::GreaterEqual,
            "less_equal_than" => FilterKind::LessEqualThan,
            "is_in" => FilterKind::IsIn,
            other => FilterKind::Other(other.to_string()),
        }
    }
}

impl From<String> for FilterKind {
    fn from(tag: String) -> Self {
        FilterKind::from(tag.as_str())
    }
}

impl From<FilterKind> for String {
    fn from(kind: FilterKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single typed search constraint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterValue {
    pub value: Value,
    #[serde(rename = "type")]
    pub kind: FilterKind,
}

impl FilterValue {
    pub fn new(value: impl Into<Value>, kind: FilterKind) -> Self {
        Self {
            value: value.into(),
            kind,
        }
    }

    /// Empty regardless of `kind`: null, `[]`, `{}` or a blank string
    pub fn is_empty(&self) -> bool {
        match &self.value {
            Value::Null => true,
            Value::Array(items) => items.is_empty(),
            Value::Object(fields) => fields.is_empty(),
            Value::String(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn to_value(&self) -> Value {
        let mut fields = Map::new();
        fields.insert("value".to_string(), self.value.clone());
        fields.insert("type".to_string(), Value::String(self.kind.to_string()));
        Value::Object(fields)
    }
}

/// One slot of a [`FilterSet`]
#[derive(Debug, Clone, PartialEq)]
pub enum FilterEntry {
    /// `{value, type}` shaped entry
    Typed(FilterValue),
    /// Any other shape, preserved as-is
    Raw(Value),
}

impl FilterEntry {
    /// Parse one raw entry. Objects carrying a `value` must also carry a string `type`.
    pub fn parse(key: &str, raw: &Value) -> Result<Self> {
        let Value::Object(fields) = raw else {
            return Ok(FilterEntry::Raw(raw.clone()));
        };

        match (fields.get("value"), fields.get("type")) {
            (Some(value), Some(Value::String(tag))) => Ok(FilterEntry::Typed(FilterValue {
                value: value.clone(),
                kind: FilterKind::from(tag.as_str()),
            })),
            (Some(_), Some(other)) => Err(FilterError::NonStringType {
                key: key.to_string(),
                found: other.to_string(),
            }
            .into()),
            (Some(_), None) => Err(FilterError::MissingType {
                key: key.to_string(),
            }
            .into()),
            (None, _) => Ok(FilterEntry::Raw(raw.clone())),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            FilterEntry::Typed(value) => value.is_empty(),
            FilterEntry::Raw(Value::Object(fields)) => fields.is_empty(),
            FilterEntry::Raw(_) => false,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            FilterEntry::Typed(value) => value.to_value(),
            FilterEntry::Raw(raw) => raw.clone(),
        }
    }

    pub fn as_typed(&self) -> Option<&FilterValue> {
        match self {
            FilterEntry::Typed(value) => Some(value),
            FilterEntry::Raw(_) => None,
        }
    }
}

impl From<FilterValue> for FilterEntry {
    fn from(value: FilterValue) -> Self {
        FilterEntry::Typed(value)
    }
}

/// Structural problems in raw filter input
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("filters must be a JSON object, got {found}")]
    NotAnObject { found: &'static str },

    #[error("filter '{key}' has a value but no type")]
    MissingType { key: String },

    #[error("filter '{key}' has a non-string type: {found}")]
    NonStringType { key: String, found: String },
}

impl From<FilterError> for FiltererError {
    fn from(err: FilterError) -> Self {
        FiltererError::Validation(err.to_string())
    }
}

/// JSON type name used in error messages
pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// The full collection of named constraints for one search request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSet {
    entries: BTreeMap<String, FilterEntry>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a raw JSON value, which must be an object
    pub fn from_value(raw: &Value) -> Result<Self> {
        match raw {
            Value::Object(fields) => Self::from_map(fields),
            other => Err(FilterError::NotAnObject {
                found: json_kind(other),
            }
            .into()),
        }
    }

    /// Build from a raw mapping, dropping routing fields
    pub fn from_map(raw: &Map<String, Value>) -> Result<Self> {
        let mut entries = BTreeMap::new();

        for (key, value) in raw {
            if is_routing_field(key) {
                continue;
            }
            entries.insert(key.clone(), FilterEntry::parse(key, value)?);
        }

        Ok(Self { entries })
    }

    pub fn to_map(&self) -> Map<String, Value> {
        self.entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.to_value()))
            .collect()
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.to_map())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&FilterEntry> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FilterEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn insert(&mut self, key: impl Into<String>, entry: FilterEntry) -> Option<FilterEntry> {
        self.entries.insert(key.into(), entry)
    }

    /// Set a typed filter in place
    pub fn update_filter(&mut self, key: impl Into<String>, value: impl Into<Value>, kind: FilterKind) {
        self.entries
            .insert(key.into(), FilterEntry::Typed(FilterValue::new(value, kind)));
    }

    /// Names of empty typed entries and empty raw objects
    pub fn empty_keys(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.is_empty())
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Rename keys through `mapping`; unmapped keys are kept.
    /// When two keys land on the same destination the later one (key order) wins.
    pub fn apply_mapping(&self, mapping: &FilterMapping) -> FilterSet {
        let entries = self
            .entries
            .iter()
            .map(|(key, entry)| {
                let mapped = mapping.get(key).unwrap_or(key);
                (mapped.clone(), entry.clone())
            })
            .collect();

        FilterSet { entries }
    }

    /// Fill missing or empty slots of `self` from `source`.
    ///
    /// `source` keys are renamed through `mapping` first. Non-empty values in
    /// `self` are never replaced, and empty source values are never copied.
    pub fn overwrite_empty_with(
        &self,
        source: &FilterSet,
        mapping: Option<&FilterMapping>,
    ) -> FilterSet {
        let mut result = self.clone();

        let mapped_source = match mapping {
            Some(mapping) if !mapping.is_empty() => source.apply_mapping(mapping),
            _ => source.clone(),
        };

        let empty_keys: AHashSet<String> = result.empty_keys().into_iter().collect();

        for (key, entry) in mapped_source.entries {
            if entry.is_empty() {
                continue;
            }

            if empty_keys.contains(&key) || !result.entries.contains_key(&key) {
                result.entries.insert(key, entry);
            }
        }

        result
    }

    pub fn remove_empty_filters(&self) -> FilterSet {
        let entries = self
            .entries
            .iter()
            .filter(|(_, entry)| !entry.is_empty())
            .map(|(key, entry)| (key.clone(), entry.clone()))
            .collect();

        FilterSet { entries }
    }
}

impl FromIterator<(String, FilterEntry)> for FilterSet {
    fn from_iter<I: IntoIterator<Item = (String, FilterEntry)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}
