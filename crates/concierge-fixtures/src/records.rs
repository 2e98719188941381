use serde::{Deserialize, Serialize};

pub const DEFAULT_TRAVEL_NOTE: &str = "Estimated time based on average travel speed.";
const DEFAULT_TRAVEL_MINUTES: u32 = 30;
const DEFAULT_TRAVEL_MILES: f64 = 15.0;

fn default_age_max() -> u32 {
    99
}

fn default_duration_minutes() -> u32 {
    60
}

fn default_cost() -> String {
    "$".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Activity {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub indoor: bool,
    #[serde(default)]
    pub age_min: u32,
    #[serde(default = "default_age_max")]
    pub age_max: u32,
    #[serde(default = "default_duration_minutes")]
    pub duration_minutes: u32,
    #[serde(default)]
    pub suitable_for_toddlers: bool,
    #[serde(default = "default_cost")]
    pub cost: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hours: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tips: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recipe {
    pub name: String,
    #[serde(default)]
    pub cuisine: String,
    #[serde(default)]
    pub meal_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub prep_time: u32,
    #[serde(default)]
    pub cook_time: u32,
    #[serde(default)]
    pub kid_friendly: bool,
    #[serde(default)]
    pub favorite: bool,
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub instructions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Restaurant {
    pub name: String,
    #[serde(default)]
    pub cuisine: String,
    #[serde(default)]
    pub location: String,
    #[serde(default = "default_cost")]
    pub price_range: String,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub kid_friendly: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hours: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub popular_dishes: Vec<String>,
}

impl Restaurant {
    /// Number of `$` signs in the price range, the 1-5 scale used by searches.
    pub fn price_level(&self) -> usize {
        self.price_range.chars().filter(|ch| *ch == '$').count()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TravelTimeEntry {
    pub origin: String,
    pub destination: String,
    pub driving_minutes: u32,
    pub driving_distance_miles: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traffic_notes: Option<String>,
}

impl TravelTimeEntry {
    /// Fallback used when no fixture pair matches.
    pub fn estimate(origin: &str, destination: &str) -> Self {
        Self {
            origin: origin.to_string(),
            destination: destination.to_string(),
            driving_minutes: DEFAULT_TRAVEL_MINUTES,
            driving_distance_miles: DEFAULT_TRAVEL_MILES,
            traffic_notes: Some(DEFAULT_TRAVEL_NOTE.to_string()),
        }
    }
}
