use super::*;

use concierge_fixtures::{Restaurant, RestaurantFilter};

use crate::catalog_tool::{
    no_params_schema, not_found, nullable, with_params, CatalogToolSpec, NoParams,
};

const FAVORITE_MIN_RATING: f64 = 4.5;
const DEFAULT_STARTING_POINT: &str = "Sunnyvale";

pub(crate) const FOODIE_TOOLS: &[CatalogToolSpec] = &[
    CatalogToolSpec {
        name: "search_restaurants",
        description: "Search restaurants by cuisine, location and price range (1-5).",
        parameters: search_restaurants_schema,
        handler: search_restaurants,
    },
    CatalogToolSpec {
        name: "get_restaurant_details",
        description: "Get full details for one restaurant by its exact name.",
        parameters: restaurant_details_schema,
        handler: get_restaurant_details,
    },
    CatalogToolSpec {
        name: "get_favorite_restaurants",
        description: "List the highest rated restaurants.",
        parameters: no_params_schema,
        handler: get_favorite_restaurants,
    },
    CatalogToolSpec {
        name: "get_kid_friendly_restaurants",
        description: "List kid-friendly restaurants, optionally by cuisine and location.",
        parameters: kid_friendly_restaurants_schema,
        handler: get_kid_friendly_restaurants,
    },
    CatalogToolSpec {
        name: "get_restaurant_travel_time",
        description: "Estimate the drive from a starting point to a restaurant.",
        parameters: restaurant_travel_time_schema,
        handler: get_restaurant_travel_time,
    },
];

fn default_starting_point() -> String {
    DEFAULT_STARTING_POINT.to_string()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SearchRestaurantsParams {
    #[serde(default)]
    cuisine: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    price_range: Option<usize>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RestaurantDetailsParams {
    restaurant_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct KidFriendlyRestaurantsParams {
    #[serde(default)]
    cuisine: Option<String>,
    #[serde(default)]
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RestaurantTravelTimeParams {
    restaurant_name: String,
    #[serde(default = "default_starting_point")]
    starting_point: String,
}

#[derive(Debug, Serialize)]
struct RestaurantSummary<'a> {
    name: &'a str,
    cuisine: &'a str,
    location: &'a str,
    price_range: &'a str,
    rating: f64,
    description: &'a str,
    kid_friendly: bool,
}

impl<'a> From<&'a Restaurant> for RestaurantSummary<'a> {
    fn from(restaurant: &'a Restaurant) -> Self {
        Self {
            name: &restaurant.name,
            cuisine: &restaurant.cuisine,
            location: &restaurant.location,
            price_range: &restaurant.price_range,
            rating: restaurant.rating,
            description: &restaurant.description,
            kid_friendly: restaurant.kid_friendly,
        }
    }
}

#[derive(Debug, Serialize)]
struct RestaurantTravelTime {
    restaurant_name: String,
    starting_point: String,
    destination: String,
    travel_time_minutes: u32,
    distance_miles: f64,
    notes: String,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}

fn search_restaurants_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "cuisine": nullable("string", "Cuisine such as Korean or Greek"),
            "location": nullable("string", "City, matched as a substring"),
            "price_range": {
                "type": ["integer", "null"],
                "minimum": 1,
                "maximum": 5,
                "description": "Highest acceptable price level, 1 ($) to 5 ($$$$$)"
            }
        },
        "additionalProperties": false
    })
}

fn restaurant_details_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "restaurant_name": { "type": "string", "description": "Exact restaurant name" }
        },
        "required": ["restaurant_name"],
        "additionalProperties": false
    })
}

fn kid_friendly_restaurants_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "cuisine": nullable("string", "Cuisine such as Korean or Greek"),
            "location": nullable("string", "City, matched as a substring")
        },
        "additionalProperties": false
    })
}

fn restaurant_travel_time_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "restaurant_name": { "type": "string", "description": "Exact restaurant name" },
            "starting_point": {
                "type": "string",
                "description": "Where the drive starts; defaults to Sunnyvale"
            }
        },
        "required": ["restaurant_name"],
        "additionalProperties": false
    })
}

fn search_restaurants(catalog: &FixtureCatalog, arguments: Value) -> ToolExecutionResult {
    with_params("search_restaurants", arguments, |params: SearchRestaurantsParams| {
        let filter = RestaurantFilter {
            cuisine: non_blank(params.cuisine),
            location: non_blank(params.location),
            price_range: params.price_range,
            ..RestaurantFilter::default()
        };
        Ok(catalog
            .restaurants(&filter)
            .into_iter()
            .map(RestaurantSummary::from)
            .collect::<Vec<_>>())
    })
}

fn get_restaurant_details(catalog: &FixtureCatalog, arguments: Value) -> ToolExecutionResult {
    with_params("get_restaurant_details", arguments, |params: RestaurantDetailsParams| {
        catalog
            .restaurant_named(&params.restaurant_name)
            .ok_or_else(|| not_found("Restaurant", &params.restaurant_name))
    })
}

fn get_favorite_restaurants(catalog: &FixtureCatalog, arguments: Value) -> ToolExecutionResult {
    with_params("get_favorite_restaurants", arguments, |_: NoParams| {
        Ok(catalog.restaurants(&RestaurantFilter {
            min_rating: Some(FAVORITE_MIN_RATING),
            ..RestaurantFilter::default()
        }))
    })
}

fn get_kid_friendly_restaurants(catalog: &FixtureCatalog, arguments: Value) -> ToolExecutionResult {
    with_params(
        "get_kid_friendly_restaurants",
        arguments,
        |params: KidFriendlyRestaurantsParams| {
            Ok(catalog.restaurants(&RestaurantFilter {
                cuisine: non_blank(params.cuisine),
                location: non_blank(params.location),
                kid_friendly_only: true,
                ..RestaurantFilter::default()
            }))
        },
    )
}

fn get_restaurant_travel_time(catalog: &FixtureCatalog, arguments: Value) -> ToolExecutionResult {
    with_params(
        "get_restaurant_travel_time",
        arguments,
        |params: RestaurantTravelTimeParams| {
            let restaurant = catalog
                .restaurant_named(&params.restaurant_name)
                .ok_or_else(|| not_found("Restaurant", &params.restaurant_name))?;
            if restaurant.location.trim().is_empty() {
                return Err(format!(
                    "Restaurant '{}' has no location information",
                    params.restaurant_name
                ));
            }
            let travel = catalog.travel_time(&params.starting_point, &restaurant.location);
            Ok(RestaurantTravelTime {
                restaurant_name: restaurant.name.clone(),
                starting_point: params.starting_point,
                destination: restaurant.location.clone(),
                travel_time_minutes: travel.driving_minutes,
                distance_miles: travel.driving_distance_miles,
                notes: travel.traffic_notes.unwrap_or_default(),
            })
        },
    )
}
