//! Recovery chain for specialist outputs handed to `create_plan`.
//!
//! Strict JSON first, then the first embedded object of a known shape, then the raw text wrapped
//! as `{"content": raw}`. Non-empty input is never dropped.
use super::*;

use std::sync::OnceLock;

use regex::Regex;

fn known_shape() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(
                r#"(?s)\{\s*"(?:activities|recipes|restaurants|optimized_schedule|content|agent)"\s*:.*\}"#,
            )
            .ok()
        })
        .as_ref()
}

/// `None` for blank input; otherwise the best structured reading of `raw`.
pub fn parse_specialist_output(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }
    let extracted = known_shape()
        .and_then(|pattern| pattern.find(trimmed))
        .and_then(|found| serde_json::from_str::<Value>(found.as_str()).ok());
    if let Some(value) = extracted {
        tracing::debug!("recovered embedded JSON from specialist output");
        return Some(value);
    }
    Some(json!({ "content": raw }))
}

/// Planner input for `create_plan`: the aggregated JSON payload when any result survives parsing,
/// otherwise the bare query.
pub fn build_planner_request(
    query: &str,
    activity_results: Option<&str>,
    culinary_results: Option<&str>,
    foodie_results: Option<&str>,
) -> String {
    let [activity, culinary, foodie] = [activity_results, culinary_results, foodie_results]
        .map(|raw| raw.and_then(parse_specialist_output));
    if activity.is_none() && culinary.is_none() && foodie.is_none() {
        return query.to_string();
    }
    json!({
        "user_question": query,
        "activity_results": activity,
        "culinary_results": culinary,
        "foodie_results": foodie,
    })
    .to_string()
}
