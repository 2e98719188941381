use super::*;

use concierge_fixtures::{Recipe, RecipeFilter};

use crate::catalog_tool::{
    no_params_schema, not_found, nullable, with_params, CatalogToolSpec, NoParams,
};

pub(crate) const CULINARY_TOOLS: &[CatalogToolSpec] = &[
    CatalogToolSpec {
        name: "search_recipes",
        description: "Search family recipes by cuisine, meal type and maximum prep time.",
        parameters: search_recipes_schema,
        handler: search_recipes,
    },
    CatalogToolSpec {
        name: "get_recipe_details",
        description: "Get ingredients and instructions for one recipe by its exact name.",
        parameters: recipe_details_schema,
        handler: get_recipe_details,
    },
    CatalogToolSpec {
        name: "get_favorite_recipes",
        description: "List the recipes the family marked as favorites.",
        parameters: no_params_schema,
        handler: get_favorite_recipes,
    },
    CatalogToolSpec {
        name: "get_kid_friendly_recipes",
        description: "List kid-friendly recipes, optionally by cuisine and maximum prep time.",
        parameters: kid_friendly_recipes_schema,
        handler: get_kid_friendly_recipes,
    },
];

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct SearchRecipesParams {
    #[serde(default)]
    cuisine: Option<String>,
    #[serde(default)]
    meal_type: Option<String>,
    #[serde(default)]
    max_prep_time: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RecipeDetailsParams {
    recipe_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct KidFriendlyRecipesParams {
    #[serde(default)]
    cuisine: Option<String>,
    #[serde(default)]
    max_prep_time: Option<u32>,
}

#[derive(Debug, Serialize)]
struct RecipeSummary<'a> {
    name: &'a str,
    cuisine: &'a str,
    meal_type: &'a str,
    description: &'a str,
    prep_time: u32,
    cook_time: u32,
    kid_friendly: bool,
    favorite: bool,
}

impl<'a> From<&'a Recipe> for RecipeSummary<'a> {
    fn from(recipe: &'a Recipe) -> Self {
        Self {
            name: &recipe.name,
            cuisine: &recipe.cuisine,
            meal_type: &recipe.meal_type,
            description: &recipe.description,
            prep_time: recipe.prep_time,
            cook_time: recipe.cook_time,
            kid_friendly: recipe.kid_friendly,
            favorite: recipe.favorite,
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}

fn search_recipes_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "cuisine": nullable("string", "Cuisine such as Korean or Japanese"),
            "meal_type": nullable("string", "breakfast, lunch or dinner"),
            "max_prep_time": {
                "type": ["integer", "null"],
                "minimum": 0,
                "description": "Maximum preparation time in minutes"
            }
        },
        "additionalProperties": false
    })
}

fn recipe_details_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "recipe_name": { "type": "string", "description": "Exact recipe name" }
        },
        "required": ["recipe_name"],
        "additionalProperties": false
    })
}

fn kid_friendly_recipes_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "cuisine": nullable("string", "Cuisine such as Korean or Japanese"),
            "max_prep_time": {
                "type": ["integer", "null"],
                "minimum": 0,
                "description": "Maximum preparation time in minutes"
            }
        },
        "additionalProperties": false
    })
}

fn search_recipes(catalog: &FixtureCatalog, arguments: Value) -> ToolExecutionResult {
    with_params("search_recipes", arguments, |params: SearchRecipesParams| {
        let filter = RecipeFilter {
            cuisine: non_blank(params.cuisine),
            meal_type: non_blank(params.meal_type),
            max_prep_time: params.max_prep_time,
            ..RecipeFilter::default()
        };
        Ok(catalog
            .recipes(&filter)
            .into_iter()
            .map(RecipeSummary::from)
            .collect::<Vec<_>>())
    })
}

fn get_recipe_details(catalog: &FixtureCatalog, arguments: Value) -> ToolExecutionResult {
    with_params("get_recipe_details", arguments, |params: RecipeDetailsParams| {
        catalog
            .recipe_named(&params.recipe_name)
            .ok_or_else(|| not_found("Recipe", &params.recipe_name))
    })
}

fn get_favorite_recipes(catalog: &FixtureCatalog, arguments: Value) -> ToolExecutionResult {
    with_params("get_favorite_recipes", arguments, |_: NoParams| {
        Ok(catalog.recipes(&RecipeFilter {
            favorites_only: true,
            ..RecipeFilter::default()
        }))
    })
}

fn get_kid_friendly_recipes(catalog: &FixtureCatalog, arguments: Value) -> ToolExecutionResult {
    with_params("get_kid_friendly_recipes", arguments, |params: KidFriendlyRecipesParams| {
        Ok(catalog.recipes(&RecipeFilter {
            cuisine: non_blank(params.cuisine),
            max_prep_time: params.max_prep_time,
            kid_friendly_only: true,
            ..RecipeFilter::default()
        }))
    })
}

#[cfg(test)]
mod tests {
    use concierge_fixtures::FixtureCatalog;
    use serde_json::json;

    use super::{get_favorite_recipes, get_kid_friendly_recipes, get_recipe_details, search_recipes};

    fn names(value: &serde_json::Value) -> Vec<String> {
        value
            .as_array()
            .expect("array")
            .iter()
            .map(|row| row["name"].as_str().expect("name").to_string())
            .collect()
    }

    #[test]
    fn search_filters_by_cuisine_and_prep_time() {
        let catalog = FixtureCatalog::embedded().expect("fixtures");
        let result = search_recipes(&catalog, json!({ "cuisine": "korean", "max_prep_time": 15 }));
        assert_eq!(names(&result.content), vec!["Kimchi Fried Rice"]);
        assert!(result.content[0].get("ingredients").is_none());
    }

    #[test]
    fn favorites_and_kid_friendly_lists_return_full_records() {
        let catalog = FixtureCatalog::embedded().expect("fixtures");
        let favorites = get_favorite_recipes(&catalog, json!({}));
        assert!(names(&favorites.content).contains(&"Japchae".to_string()));
        assert!(favorites.content[0].get("ingredients").is_some());

        let kids = get_kid_friendly_recipes(&catalog, json!({ "cuisine": "Japanese" }));
        assert_eq!(
            names(&kids.content),
            vec!["Chicken Teriyaki Bowl", "Tamagoyaki"]
        );
    }

    #[test]
    fn missing_recipe_is_reported_to_the_model() {
        let catalog = FixtureCatalog::embedded().expect("fixtures");
        let result = get_recipe_details(&catalog, json!({ "recipe_name": "Bibimbap" }));
        assert_eq!(result.content, json!({ "error": "Recipe 'Bibimbap' not found" }));
    }
}
