//! Filter model and merge engine
//!
//! Normalizes caller-supplied and LLM-extracted filters into one canonical
//! `FilterSet` and reconciles them with an empty-slot-filling merge.

mod model;
mod service;

pub use model::{
    is_routing_field, json_kind, FilterEntry, FilterError, FilterKind, FilterMapping, FilterSet,
    FilterValue, ROUTING_FIELDS,
};
pub use service::{
    default_filter_mapping, score_field_destination, FilterService, MAX_PRICE_FIELD,
    MIN_PRICE_FIELD, SCORE_SUFFIX,
};
