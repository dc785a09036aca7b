// Candidate metadata -> scorer prompt text

use serde_json::Value;

fn display(value: Option<&Value>, default: &str) -> String {
    match value {
        None | Some(Value::Null) => default.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn string_items(values: &[Value]) -> Vec<String> {
    values
        .iter()
        .filter_map(|v| match v {
            Value::String(s) => Some(s.clone()),
            Value::Null => None,
            other => Some(other.to_string()),
        })
        .collect()
}

/// Cuisine list stored either as `{"main_cuisine_types": [...]}` or a bare array
fn cuisine_types(metadata: &Value) -> Vec<String> {
    match metadata.get("cuisine_type") {
        Some(Value::Object(fields)) => match fields.get("main_cuisine_types") {
            Some(Value::Array(items)) => string_items(items),
            _ => Vec::new(),
        },
        Some(Value::Array(items)) => string_items(items),
        _ => Vec::new(),
    }
}

/// Dish lists stored either as an array or as an object keyed by dish name
fn dish_names(metadata: &Value, field: &str) -> Vec<String> {
    match metadata.get(field) {
        Some(Value::Object(fields)) => fields.keys().cloned().collect(),
        Some(Value::Array(items)) => string_items(items),
        _ => Vec::new(),
    }
}

fn joined_or(items: Vec<String>, default: &str) -> String {
    if items.is_empty() {
        default.to_string()
    } else {
        items.join(", ")
    }
}

/// Render business metadata as the text block the scoring model reads
pub fn format_business_metadata(metadata: &Value) -> String {
    let business_id = display(metadata.get("business_id"), "N/A");
    let summary = display(metadata.get("business_summary"), "No summary available.");
    let cuisines = joined_or(cuisine_types(metadata), "Not specified");
    let price_range = display(metadata.get("price_range"), "Not specified");
    let min_price = display(metadata.get("min_price"), "N/A");
    let max_price = display(metadata.get("max_price"), "N/A");
    let must_try = joined_or(dish_names(metadata, "must_try"), "None listed");
    let must_avoid = joined_or(dish_names(metadata, "must_avoid"), "None listed");

    format!(
        "Business ID: {}\n\
         Summary: {}\n\
         Cuisine Types: {}\n\
         Price Range: {} (Min: €{}, Max: €{})\n\
         Must-Try Dishes: {}\n\
         Must-Avoid Items: {}\n",
        business_id, summary, cuisines, price_range, min_price, max_price, must_try, must_avoid
    )
}
