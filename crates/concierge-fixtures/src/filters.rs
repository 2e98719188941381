use crate::records::{Activity, Recipe, Restaurant};

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityFilter {
    /// Excludes activities whose minimum age is above this value.
    pub age_min: Option<u32>,
    /// Excludes activities whose maximum age is below this value.
    pub age_max: Option<u32>,
    pub indoor: Option<bool>,
    pub location: Option<String>,
    pub toddlers_only: bool,
}

impl ActivityFilter {
    pub fn matches(&self, activity: &Activity) -> bool {
        if self.age_min.is_some_and(|age| activity.age_min > age) {
            return false;
        }
        if self.age_max.is_some_and(|age| activity.age_max < age) {
            return false;
        }
        if self.indoor.is_some_and(|indoor| activity.indoor != indoor) {
            return false;
        }
        if let Some(location) = self.location.as_deref() {
            if !contains_ignore_case(&activity.location, location) {
                return false;
            }
        }
        !self.toddlers_only || activity.suitable_for_toddlers
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeFilter {
    pub cuisine: Option<String>,
    pub meal_type: Option<String>,
    pub max_prep_time: Option<u32>,
    pub kid_friendly_only: bool,
    pub favorites_only: bool,
}

impl RecipeFilter {
    pub fn matches(&self, recipe: &Recipe) -> bool {
        if let Some(cuisine) = self.cuisine.as_deref() {
            if !contains_ignore_case(&recipe.cuisine, cuisine) {
                return false;
            }
        }
        if let Some(meal_type) = self.meal_type.as_deref() {
            if !contains_ignore_case(&recipe.meal_type, meal_type) {
                return false;
            }
        }
        if self
            .max_prep_time
            .is_some_and(|limit| recipe.prep_time > limit)
        {
            return false;
        }
        (!self.kid_friendly_only || recipe.kid_friendly)
            && (!self.favorites_only || recipe.favorite)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RestaurantFilter {
    pub cuisine: Option<String>,
    pub location: Option<String>,
    /// Highest acceptable number of `$` signs.
    pub price_range: Option<usize>,
    pub kid_friendly_only: bool,
    pub min_rating: Option<f64>,
}

impl RestaurantFilter {
    pub fn matches(&self, restaurant: &Restaurant) -> bool {
        if let Some(cuisine) = self.cuisine.as_deref() {
            if !contains_ignore_case(&restaurant.cuisine, cuisine) {
                return false;
            }
        }
        if let Some(location) = self.location.as_deref() {
            if !contains_ignore_case(&restaurant.location, location) {
                return false;
            }
        }
        if self
            .price_range
            .is_some_and(|limit| restaurant.price_level() > limit)
        {
            return false;
        }
        if self
            .min_rating
            .is_some_and(|rating| restaurant.rating < rating)
        {
            return false;
        }
        !self.kid_friendly_only || restaurant.kid_friendly
    }
}
