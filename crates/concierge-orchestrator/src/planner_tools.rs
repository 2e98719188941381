use super::*;

use crate::catalog_tool::{with_params, CatalogToolSpec};
use crate::schedule::{optimize_schedule, render_itinerary, PlannedActivity, ScheduledActivity};

const RESULT_KEYS: [&str; 3] = ["activity_results", "culinary_results", "foodie_results"];

pub(crate) const PLANNER_TOOLS: &[CatalogToolSpec] = &[
    CatalogToolSpec {
        name: "calculate_travel_time",
        description: "Estimate driving time and distance between two locations.",
        parameters: travel_time_schema,
        handler: calculate_travel_time,
    },
    CatalogToolSpec {
        name: "optimize_schedule",
        description: "Order activities from a start time, adding travel between locations and \
                      dropping anything that ends after the optional end time.",
        parameters: optimize_schedule_schema,
        handler: optimize_schedule_tool,
    },
    CatalogToolSpec {
        name: "create_itinerary",
        description: "Render an optimized schedule as a readable itinerary.",
        parameters: create_itinerary_schema,
        handler: create_itinerary,
    },
];

fn default_include_tips() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TravelTimeParams {
    origin: String,
    destination: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct OptimizeScheduleParams {
    activities: Vec<PlannedActivity>,
    start_time: String,
    #[serde(default)]
    end_time: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CreateItineraryParams {
    schedule: Vec<ScheduledActivity>,
    #[serde(default = "default_include_tips")]
    include_tips: bool,
}

#[derive(Debug, Serialize)]
struct TravelTime {
    origin: String,
    destination: String,
    travel_time_minutes: u32,
    distance_miles: f64,
    notes: String,
}

#[derive(Debug, Serialize)]
struct OptimizedSchedule {
    optimized_schedule: Vec<ScheduledActivity>,
}

fn travel_time_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "origin": { "type": "string" },
            "destination": { "type": "string" }
        },
        "required": ["origin", "destination"],
        "additionalProperties": false
    })
}

fn optimize_schedule_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "activities": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string" },
                        "location": { "type": "string" },
                        "duration_minutes": { "type": "integer", "minimum": 0, "maximum": 1440 }
                    },
                    "additionalProperties": false
                }
            },
            "start_time": { "type": "string", "description": "HH:MM, 24-hour clock" },
            "end_time": {
                "type": ["string", "null"],
                "description": "Optional HH:MM cutoff"
            }
        },
        "required": ["activities", "start_time"],
        "additionalProperties": false
    })
}

fn create_itinerary_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "schedule": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "activity_name": { "type": "string" },
                        "location": { "type": "string" },
                        "start_time": { "type": "string" },
                        "end_time": { "type": "string" },
                        "travel_time_minutes": { "type": "integer", "minimum": 0 }
                    },
                    "required": ["start_time", "end_time"],
                    "additionalProperties": false
                }
            },
            "include_tips": { "type": "boolean" }
        },
        "required": ["schedule"],
        "additionalProperties": false
    })
}

fn calculate_travel_time(catalog: &FixtureCatalog, arguments: Value) -> ToolExecutionResult {
    with_params("calculate_travel_time", arguments, |params: TravelTimeParams| {
        let travel = catalog.travel_time(&params.origin, &params.destination);
        Ok(TravelTime {
            origin: params.origin,
            destination: params.destination,
            travel_time_minutes: travel.driving_minutes,
            distance_miles: travel.driving_distance_miles,
            notes: travel.traffic_notes.unwrap_or_default(),
        })
    })
}

fn optimize_schedule_tool(catalog: &FixtureCatalog, arguments: Value) -> ToolExecutionResult {
    with_params("optimize_schedule", arguments, |params: OptimizeScheduleParams| {
        optimize_schedule(
            &params.activities,
            &params.start_time,
            params.end_time.as_deref(),
            |from, to| {
                catalog
                    .lookup_travel_time(from, to)
                    .map(|entry| entry.driving_minutes)
            },
        )
        .map(|optimized_schedule| OptimizedSchedule { optimized_schedule })
        .map_err(|error| error.to_string())
    })
}

fn create_itinerary(_catalog: &FixtureCatalog, arguments: Value) -> ToolExecutionResult {
    with_params("create_itinerary", arguments, |params: CreateItineraryParams| {
        Ok(render_itinerary(&params.schedule, params.include_tips))
    })
}

fn section(data: &serde_json::Map<String, Value>, key: &str) -> String {
    match data.get(key) {
        None | Some(Value::Null) => "{}".to_string(),
        Some(value) => serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string()),
    }
}

/// Turns the coordinator's aggregated `create_plan` payload into a synthesis request. Anything
/// else passes through verbatim.
pub fn rewrite_planner_input(input: &str) -> String {
    let Ok(Value::Object(data)) = serde_json::from_str::<Value>(input) else {
        return input.to_string();
    };
    if !RESULT_KEYS.iter().any(|key| data.contains_key(*key)) {
        return input.to_string();
    }

    let question = data
        .get("user_question")
        .and_then(Value::as_str)
        .unwrap_or_default();
    format!(
        "Please create a comprehensive plan based on the following specialist outputs:\n\n\
         USER QUERY: {question}\n\n\
         ACTIVITY SUGGESTIONS: {}\n\n\
         CULINARY SUGGESTIONS: {}\n\n\
         RESTAURANT SUGGESTIONS: {}\n\n\
         Create a well-structured plan that integrates these suggestions with appropriate timing, \
         transitions, and logistics. Include both a narrative description and a structured itinerary.",
        section(&data, "activity_results"),
        section(&data, "culinary_results"),
        section(&data, "foodie_results"),
    )
}
