use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Deserialize};
use thiserror::Error;

use crate::{
    filters::{ActivityFilter, RecipeFilter, RestaurantFilter},
    records::{Activity, Recipe, Restaurant, TravelTimeEntry},
};

const ACTIVITIES_FILE: &str = "activities.json";
const RECIPES_FILE: &str = "recipes.json";
const RESTAURANTS_FILE: &str = "restaurants.json";
const LOCATIONS_FILE: &str = "locations.json";

const EMBEDDED_ACTIVITIES: &str = include_str!("../data/activities.json");
const EMBEDDED_RECIPES: &str = include_str!("../data/recipes.json");
const EMBEDDED_RESTAURANTS: &str = include_str!("../data/restaurants.json");
const EMBEDDED_LOCATIONS: &str = include_str!("../data/locations.json");

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("failed to read fixture file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed fixture document '{document}': {source}")]
    Parse {
        document: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Default, Deserialize)]
struct ActivitiesDocument {
    #[serde(default)]
    activities: Vec<Activity>,
}

#[derive(Debug, Default, Deserialize)]
struct RecipesDocument {
    #[serde(default)]
    recipes: Vec<Recipe>,
}

#[derive(Debug, Default, Deserialize)]
struct RestaurantsDocument {
    #[serde(default)]
    restaurants: Vec<Restaurant>,
}

#[derive(Debug, Default, Deserialize)]
struct LocationsDocument {
    #[serde(default)]
    travel_times: Vec<TravelTimeEntry>,
}

fn parse_document<T: DeserializeOwned>(document: &str, raw: &str) -> Result<T, FixtureError> {
    serde_json::from_str(raw).map_err(|source| FixtureError::Parse {
        document: document.to_string(),
        source,
    })
}

/// Missing files load as an empty document.
fn read_document<T: DeserializeOwned + Default>(dir: &Path, file: &str) -> Result<T, FixtureError> {
    let path = dir.join(file);
    if !path.exists() {
        tracing::debug!(path = %path.display(), "fixture file absent; using empty collection");
        return Ok(T::default());
    }
    let raw = std::fs::read_to_string(&path).map_err(|source| FixtureError::Read {
        path: path.clone(),
        source,
    })?;
    parse_document(&path.display().to_string(), &raw)
}

fn same_name(left: &str, right: &str) -> bool {
    left.to_lowercase() == right.to_lowercase()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FixtureCatalog {
    activities: Vec<Activity>,
    recipes: Vec<Recipe>,
    restaurants: Vec<Restaurant>,
    travel_times: Vec<TravelTimeEntry>,
}

impl FixtureCatalog {
    pub fn new(
        activities: Vec<Activity>,
        recipes: Vec<Recipe>,
        restaurants: Vec<Restaurant>,
        travel_times: Vec<TravelTimeEntry>,
    ) -> Self {
        Self {
            activities,
            recipes,
            restaurants,
            travel_times,
        }
    }

    /// Catalog compiled into the binary.
    pub fn embedded() -> Result<Self, FixtureError> {
        let activities: ActivitiesDocument = parse_document(ACTIVITIES_FILE, EMBEDDED_ACTIVITIES)?;
        let recipes: RecipesDocument = parse_document(RECIPES_FILE, EMBEDDED_RECIPES)?;
        let restaurants: RestaurantsDocument =
            parse_document(RESTAURANTS_FILE, EMBEDDED_RESTAURANTS)?;
        let locations: LocationsDocument = parse_document(LOCATIONS_FILE, EMBEDDED_LOCATIONS)?;
        Ok(Self::new(
            activities.activities,
            recipes.recipes,
            restaurants.restaurants,
            locations.travel_times,
        ))
    }

    pub fn load_dir(dir: &Path) -> Result<Self, FixtureError> {
        let activities: ActivitiesDocument = read_document(dir, ACTIVITIES_FILE)?;
        let recipes: RecipesDocument = read_document(dir, RECIPES_FILE)?;
        let restaurants: RestaurantsDocument = read_document(dir, RESTAURANTS_FILE)?;
        let locations: LocationsDocument = read_document(dir, LOCATIONS_FILE)?;
        let catalog = Self::new(
            activities.activities,
            recipes.recipes,
            restaurants.restaurants,
            locations.travel_times,
        );
        tracing::debug!(
            dir = %dir.display(),
            activities = catalog.activities.len(),
            recipes = catalog.recipes.len(),
            restaurants = catalog.restaurants.len(),
            travel_times = catalog.travel_times.len(),
            "loaded fixture catalog"
        );
        Ok(catalog)
    }

    pub fn activities(&self, filter: &ActivityFilter) -> Vec<&Activity> {
        self.activities
            .iter()
            .filter(|activity| filter.matches(activity))
            .collect()
    }

    pub fn recipes(&self, filter: &RecipeFilter) -> Vec<&Recipe> {
        self.recipes
            .iter()
            .filter(|recipe| filter.matches(recipe))
            .collect()
    }

    pub fn restaurants(&self, filter: &RestaurantFilter) -> Vec<&Restaurant> {
        self.restaurants
            .iter()
            .filter(|restaurant| filter.matches(restaurant))
            .collect()
    }

    pub fn activity_named(&self, name: &str) -> Option<&Activity> {
        self.activities
            .iter()
            .find(|activity| same_name(&activity.name, name))
    }

    pub fn recipe_named(&self, name: &str) -> Option<&Recipe> {
        self.recipes.iter().find(|recipe| same_name(&recipe.name, name))
    }

    pub fn restaurant_named(&self, name: &str) -> Option<&Restaurant> {
        self.restaurants
            .iter()
            .find(|restaurant| same_name(&restaurant.name, name))
    }

    pub fn lookup_travel_time(&self, origin: &str, destination: &str) -> Option<&TravelTimeEntry> {
        self.travel_times.iter().find(|entry| {
            same_name(&entry.origin, origin) && same_name(&entry.destination, destination)
        })
    }

    /// Like [`Self::lookup_travel_time`] but falls back to a constant estimate.
    pub fn travel_time(&self, origin: &str, destination: &str) -> TravelTimeEntry {
        self.lookup_travel_time(origin, destination)
            .cloned()
            .unwrap_or_else(|| TravelTimeEntry::estimate(origin, destination))
    }
}
