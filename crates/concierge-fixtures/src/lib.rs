//! Read-only family data the specialists search: activities, recipes, restaurants and drive times.

mod catalog;
mod filters;
mod records;

pub use catalog::{FixtureCatalog, FixtureError};
pub use filters::{ActivityFilter, RecipeFilter, RestaurantFilter};
pub use records::{Activity, Recipe, Restaurant, TravelTimeEntry, DEFAULT_TRAVEL_NOTE};
