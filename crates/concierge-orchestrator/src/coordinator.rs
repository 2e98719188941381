//! Head coordinator: four dispatch tools in front of the specialists.
use super::*;

use crate::catalog_tool::nullable;
use crate::lifecycle::observe_tool_calls;
use crate::prompts::coordinator_prompt;

pub const COORDINATOR_AGENT_NAME: &str = "Head Coordinator Agent";

#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    pub model: String,
    pub turn_limits: TurnLimits,
    /// `RunLlmAgain` makes every turn end with a synthesized answer.
    pub tool_use_behavior: ToolUseBehavior,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4".to_string(),
            turn_limits: TurnLimits::default(),
            tool_use_behavior: ToolUseBehavior::RunLlmAgain,
        }
    }
}

#[derive(Debug, Clone)]
/// Outcome of one user turn: the messages to persist and the text to show.
pub struct CoordinatorTurn {
    pub new_messages: Vec<Message>,
    pub final_text: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ActivitySuggestionParams {
    query: String,
    #[serde(default)]
    age: Option<u32>,
    #[serde(default)]
    indoor_preference: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RecipeSuggestionParams {
    query: String,
    #[serde(default)]
    cuisine: Option<String>,
    #[serde(default)]
    meal_type: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RestaurantSuggestionParams {
    query: String,
    #[serde(default)]
    cuisine: Option<String>,
    #[serde(default)]
    location: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CreatePlanParams {
    query: String,
    #[serde(default)]
    activity_results: Option<String>,
    #[serde(default)]
    culinary_results: Option<String>,
    #[serde(default)]
    foodie_results: Option<String>,
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|text| !text.is_empty())
}

/// Appends age and indoor/outdoor clauses to an activity query.
pub fn enrich_activity_query(query: &str, age: Option<u32>, indoor: Option<bool>) -> String {
    let mut enriched = query.to_string();
    if let Some(age) = age {
        enriched.push_str(&format!(" for a {age}-year-old"));
    }
    match indoor {
        Some(true) => enriched.push_str(" indoors"),
        Some(false) => enriched.push_str(" outdoors"),
        None => {}
    }
    enriched
}

pub fn enrich_recipe_query(query: &str, cuisine: Option<&str>, meal_type: Option<&str>) -> String {
    let mut enriched = query.to_string();
    if let Some(cuisine) = present(cuisine) {
        enriched.push_str(&format!(" {cuisine} cuisine"));
    }
    if let Some(meal_type) = present(meal_type) {
        enriched.push_str(&format!(" for {meal_type}"));
    }
    enriched
}

pub fn enrich_restaurant_query(
    query: &str,
    cuisine: Option<&str>,
    location: Option<&str>,
) -> String {
    let mut enriched = query.to_string();
    if let Some(cuisine) = present(cuisine) {
        enriched.push_str(&format!(" {cuisine} cuisine"));
    }
    if let Some(location) = present(location) {
        enriched.push_str(&format!(" in {location}"));
    }
    enriched
}

fn dispatch_tool_name(role: SpecialistRole) -> &'static str {
    match role {
        SpecialistRole::Activity => "get_activity_suggestions",
        SpecialistRole::Culinary => "get_recipe_suggestions",
        SpecialistRole::Foodie => "get_restaurant_suggestions",
        SpecialistRole::Planner => "create_plan",
    }
}

fn dispatch_definition(role: SpecialistRole) -> ToolDefinition {
    let query = json!({ "type": "string", "description": "The user's request in plain words" });
    let (description, properties) = match role {
        SpecialistRole::Activity => (
            "Ask the Activity Suggestion Agent for things to do.",
            json!({
                "query": query,
                "age": {
                    "type": ["integer", "null"],
                    "minimum": 0,
                    "description": "Child's age in years"
                },
                "indoor_preference": nullable("boolean", "true for indoor, false for outdoor")
            }),
        ),
        SpecialistRole::Culinary => (
            "Ask the Culinary Agent for recipes to cook at home.",
            json!({
                "query": query,
                "cuisine": nullable("string", "Preferred cuisine"),
                "meal_type": nullable("string", "breakfast, lunch or dinner")
            }),
        ),
        SpecialistRole::Foodie => (
            "Ask the Foodie Agent for restaurant recommendations.",
            json!({
                "query": query,
                "cuisine": nullable("string", "Preferred cuisine"),
                "location": nullable("string", "City or area")
            }),
        ),
        SpecialistRole::Planner => (
            "Ask the Planner Agent to build a schedule. Pass earlier specialist results verbatim.",
            json!({
                "query": query,
                "activity_results": nullable("string", "Raw output of get_activity_suggestions"),
                "culinary_results": nullable("string", "Raw output of get_recipe_suggestions"),
                "foodie_results": nullable("string", "Raw output of get_restaurant_suggestions")
            }),
        ),
    };
    ToolDefinition {
        name: dispatch_tool_name(role).to_string(),
        description: description.to_string(),
        parameters: json!({
            "type": "object",
            "properties": properties,
            "required": ["query"],
            "additionalProperties": false
        }),
    }
}

/// Validates dispatch arguments and renders the specialist's input text.
fn specialist_input(role: SpecialistRole, arguments: Value) -> Result<String, ToolInputError> {
    let tool = dispatch_tool_name(role);
    Ok(match role {
        SpecialistRole::Activity => {
            let params: ActivitySuggestionParams = parse_tool_arguments(tool, arguments)?;
            enrich_activity_query(&params.query, params.age, params.indoor_preference)
        }
        SpecialistRole::Culinary => {
            let params: RecipeSuggestionParams = parse_tool_arguments(tool, arguments)?;
            enrich_recipe_query(
                &params.query,
                params.cuisine.as_deref(),
                params.meal_type.as_deref(),
            )
        }
        SpecialistRole::Foodie => {
            let params: RestaurantSuggestionParams = parse_tool_arguments(tool, arguments)?;
            enrich_restaurant_query(
                &params.query,
                params.cuisine.as_deref(),
                params.location.as_deref(),
            )
        }
        SpecialistRole::Planner => {
            let params: CreatePlanParams = parse_tool_arguments(tool, arguments)?;
            build_planner_request(
                &params.query,
                params.activity_results.as_deref(),
                params.culinary_results.as_deref(),
                params.foodie_results.as_deref(),
            )
        }
    })
}

struct DispatchTool {
    specialist: Arc<SpecialistAgent>,
    lifecycle: Arc<dyn LifecycleSink>,
}

#[async_trait]
impl AgentTool for DispatchTool {
    fn definition(&self) -> ToolDefinition {
        dispatch_definition(self.specialist.role())
    }

    async fn execute(&self, arguments: Value) -> ToolExecutionResult {
        let role = self.specialist.role();
        let input = match specialist_input(role, arguments) {
            Ok(input) => input,
            Err(error) => return error.into(),
        };

        self.lifecycle.record(&LifecycleRecord::new(
            COORDINATOR_AGENT_NAME,
            LifecycleAction::Handoff {
                to_agent: role.agent_name().to_string(),
            },
        ));
        match self.specialist.run(&input).await {
            Ok(result) => match serde_json::to_value(&result) {
                Ok(value) => ToolExecutionResult::ok(value),
                Err(error) => ToolExecutionResult::error_message(format!(
                    "Error in {} Agent: {error}",
                    role.short_name()
                )),
            },
            Err(error) => {
                tracing::warn!(
                    agent = role.agent_name(),
                    error = %error,
                    "specialist run failed"
                );
                ToolExecutionResult::error_message(format!(
                    "Error in {} Agent: {error}",
                    role.short_name()
                ))
            }
        }
    }
}

pub struct Coordinator {
    context: SpecialistContext,
    settings: CoordinatorSettings,
    specialists: Vec<Arc<SpecialistAgent>>,
}

impl Coordinator {
    pub fn new(
        client: Arc<dyn LlmClient>,
        catalog: Arc<FixtureCatalog>,
        lifecycle: Arc<dyn LifecycleSink>,
        settings: CoordinatorSettings,
    ) -> Self {
        let context = SpecialistContext {
            client,
            catalog,
            lifecycle,
            model: settings.model.clone(),
        };
        let specialists = SpecialistRole::ALL
            .into_iter()
            .map(|role| {
                Arc::new(SpecialistAgent::new(
                    role,
                    context.clone(),
                    settings.turn_limits.for_role(role),
                ))
            })
            .collect();
        Self {
            context,
            settings,
            specialists,
        }
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.build_agent().tool_names()
    }

    fn build_agent(&self) -> Agent {
        let config = AgentConfig {
            name: COORDINATOR_AGENT_NAME.to_string(),
            model: self.settings.model.clone(),
            system_prompt: coordinator_prompt(),
            max_turns: self.settings.turn_limits.coordinator,
            temperature: Some(0.0),
            max_tokens: None,
            tool_choice: Some(ToolChoice::Auto),
            parallel_tool_calls: Some(true),
            tool_use_behavior: self.settings.tool_use_behavior,
        };
        let mut agent = Agent::new(self.context.client.clone(), config);
        for specialist in &self.specialists {
            agent.register_tool(DispatchTool {
                specialist: specialist.clone(),
                lifecycle: self.context.lifecycle.clone(),
            });
        }
        observe_tool_calls(&mut agent, self.context.lifecycle.clone());
        agent
    }

    /// Runs one user turn on top of `history`. Streaming fragments go to `on_delta`.
    pub async fn respond(
        &self,
        history: Vec<Message>,
        input: &str,
        on_delta: Option<StreamDeltaHandler>,
    ) -> Result<CoordinatorTurn, AgentError> {
        let mut agent = self.build_agent();
        let mut transcript = agent.messages().to_vec();
        transcript.extend(history);
        agent.replace_messages(transcript);

        let lifecycle = &self.context.lifecycle;
        lifecycle.record(&LifecycleRecord::new(
            COORDINATOR_AGENT_NAME,
            LifecycleAction::AgentStart,
        ));
        lifecycle.record(&LifecycleRecord::new(
            COORDINATOR_AGENT_NAME,
            LifecycleAction::Processing {
                input: input.to_string(),
            },
        ));

        let new_messages = agent.prompt_with_stream(input, on_delta).await?;
        let final_text = final_output(&new_messages);
        Ok(CoordinatorTurn {
            new_messages,
            final_text,
        })
    }
}
