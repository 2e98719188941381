use super::*;

use concierge_fixtures::{Activity, ActivityFilter};

use crate::catalog_tool::{not_found, nullable, with_params, CatalogToolSpec};

const TODDLER_AGE_MIN: u32 = 1;
const TODDLER_AGE_MAX: u32 = 4;

pub(crate) const ACTIVITY_TOOLS: &[CatalogToolSpec] = &[
    CatalogToolSpec {
        name: "search_activities",
        description: "Search for family activities by age range, indoor/outdoor and location.",
        parameters: search_activities_schema,
        handler: search_activities,
    },
    CatalogToolSpec {
        name: "get_activity_details",
        description: "Get full details for one activity by its exact name.",
        parameters: activity_details_schema,
        handler: get_activity_details,
    },
    CatalogToolSpec {
        name: "get_toddler_activities",
        description: "List activities suitable for toddlers aged one to four.",
        parameters: toddler_activities_schema,
        handler: get_toddler_activities,
    },
];

fn default_age_max() -> u32 {
    99
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SearchActivitiesParams {
    #[serde(default)]
    age_min: u32,
    #[serde(default = "default_age_max")]
    age_max: u32,
    #[serde(default)]
    indoor: Option<bool>,
    #[serde(default)]
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ActivityDetailsParams {
    activity_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ToddlerActivitiesParams {
    #[serde(default)]
    indoor: Option<bool>,
}

#[derive(Debug, Serialize)]
struct ActivitySummary<'a> {
    name: &'a str,
    description: &'a str,
    location: &'a str,
    indoor: bool,
    duration_minutes: u32,
    suitable_for_toddlers: bool,
    cost: &'a str,
}

impl<'a> From<&'a Activity> for ActivitySummary<'a> {
    fn from(activity: &'a Activity) -> Self {
        Self {
            name: &activity.name,
            description: &activity.description,
            location: &activity.location,
            indoor: activity.indoor,
            duration_minutes: activity.duration_minutes,
            suitable_for_toddlers: activity.suitable_for_toddlers,
            cost: &activity.cost,
        }
    }
}

fn search_activities_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "age_min": {
                "type": "integer",
                "minimum": 0,
                "description": "Youngest child's age; 0 means no lower bound"
            },
            "age_max": {
                "type": "integer",
                "minimum": 0,
                "description": "Oldest child's age; 99 means no upper bound"
            },
            "indoor": nullable("boolean", "true for indoor, false for outdoor"),
            "location": nullable("string", "City or area, matched as a substring")
        },
        "additionalProperties": false
    })
}

fn activity_details_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "activity_name": { "type": "string", "description": "Exact activity name" }
        },
        "required": ["activity_name"],
        "additionalProperties": false
    })
}

fn toddler_activities_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "indoor": nullable("boolean", "true for indoor, false for outdoor")
        },
        "additionalProperties": false
    })
}

fn search_activities(catalog: &FixtureCatalog, arguments: Value) -> ToolExecutionResult {
    with_params("search_activities", arguments, |params: SearchActivitiesParams| {
        let filter = ActivityFilter {
            age_min: (params.age_min > 0).then_some(params.age_min),
            age_max: (params.age_max < 99).then_some(params.age_max),
            indoor: params.indoor,
            location: params.location.filter(|location| !location.trim().is_empty()),
            toddlers_only: false,
        };
        Ok(catalog
            .activities(&filter)
            .into_iter()
            .map(ActivitySummary::from)
            .collect::<Vec<_>>())
    })
}

fn get_activity_details(catalog: &FixtureCatalog, arguments: Value) -> ToolExecutionResult {
    with_params("get_activity_details", arguments, |params: ActivityDetailsParams| {
        catalog
            .activity_named(&params.activity_name)
            .ok_or_else(|| not_found("Activity", &params.activity_name))
    })
}

fn get_toddler_activities(catalog: &FixtureCatalog, arguments: Value) -> ToolExecutionResult {
    with_params("get_toddler_activities", arguments, |params: ToddlerActivitiesParams| {
        let filter = ActivityFilter {
            age_min: Some(TODDLER_AGE_MIN),
            age_max: Some(TODDLER_AGE_MAX),
            indoor: params.indoor,
            location: None,
            toddlers_only: true,
        };
        Ok(catalog.activities(&filter))
    })
}
