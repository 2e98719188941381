//! Specialist agents: one prompt, one closed tool table, one `run(query)` contract.
use super::*;

use crate::activity_tools::ACTIVITY_TOOLS;
use crate::catalog_tool::{CatalogTool, CatalogToolSpec};
use crate::culinary_tools::CULINARY_TOOLS;
use crate::foodie_tools::FOODIE_TOOLS;
use crate::lifecycle::observe_tool_calls;
use crate::planner_tools::PLANNER_TOOLS;
use crate::prompts::specialist_prompt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// Enumerates supported `SpecialistRole` values.
pub enum SpecialistRole {
    Activity,
    Culinary,
    Foodie,
    Planner,
}

impl SpecialistRole {
    pub const ALL: [SpecialistRole; 4] = [
        SpecialistRole::Activity,
        SpecialistRole::Culinary,
        SpecialistRole::Foodie,
        SpecialistRole::Planner,
    ];

    /// Name reported in [`SpecialistResult::agent`] and lifecycle records.
    pub fn agent_name(self) -> &'static str {
        match self {
            SpecialistRole::Activity => "Activity Suggestion Agent",
            SpecialistRole::Culinary => "Culinary Agent",
            SpecialistRole::Foodie => "Foodie Agent",
            SpecialistRole::Planner => "Planner Agent",
        }
    }

    /// Name used in coordinator error payloads, e.g. `Error in Foodie Agent: ...`.
    pub fn short_name(self) -> &'static str {
        match self {
            SpecialistRole::Activity => "Activity",
            SpecialistRole::Culinary => "Culinary",
            SpecialistRole::Foodie => "Foodie",
            SpecialistRole::Planner => "Planner",
        }
    }

    fn tool_table(self) -> &'static [CatalogToolSpec] {
        match self {
            SpecialistRole::Activity => ACTIVITY_TOOLS,
            SpecialistRole::Culinary => CULINARY_TOOLS,
            SpecialistRole::Foodie => FOODIE_TOOLS,
            SpecialistRole::Planner => PLANNER_TOOLS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecialistResult {
    pub content: String,
    pub agent: String,
}

#[derive(Clone)]
/// Shared handles every specialist and the coordinator run with.
pub struct SpecialistContext {
    pub client: Arc<dyn LlmClient>,
    pub catalog: Arc<FixtureCatalog>,
    pub lifecycle: Arc<dyn LifecycleSink>,
    pub model: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Max-turns ceiling per agent role.
pub struct TurnLimits {
    pub activity: usize,
    pub culinary: usize,
    pub foodie: usize,
    pub planner: usize,
    pub coordinator: usize,
}

impl Default for TurnLimits {
    fn default() -> Self {
        Self {
            activity: 5,
            culinary: 5,
            foodie: 5,
            planner: 5,
            coordinator: 20,
        }
    }
}

impl TurnLimits {
    pub fn for_role(&self, role: SpecialistRole) -> usize {
        match role {
            SpecialistRole::Activity => self.activity,
            SpecialistRole::Culinary => self.culinary,
            SpecialistRole::Foodie => self.foodie,
            SpecialistRole::Planner => self.planner,
        }
    }
}

pub struct SpecialistAgent {
    role: SpecialistRole,
    context: SpecialistContext,
    max_turns: usize,
}

impl SpecialistAgent {
    pub fn new(role: SpecialistRole, context: SpecialistContext, max_turns: usize) -> Self {
        Self {
            role,
            context,
            max_turns,
        }
    }

    pub fn role(&self) -> SpecialistRole {
        self.role
    }

    pub fn tool_names(&self) -> Vec<&'static str> {
        self.role.tool_table().iter().map(|spec| spec.name).collect()
    }

    fn build_agent(&self) -> Agent {
        let config = AgentConfig {
            name: self.role.agent_name().to_string(),
            model: self.context.model.clone(),
            system_prompt: specialist_prompt(self.role),
            max_turns: self.max_turns,
            temperature: Some(0.0),
            max_tokens: None,
            tool_choice: Some(ToolChoice::Auto),
            parallel_tool_calls: Some(true),
            tool_use_behavior: ToolUseBehavior::RunLlmAgain,
        };
        let mut agent = Agent::new(self.context.client.clone(), config);
        for spec in self.role.tool_table() {
            agent.register_tool(CatalogTool::new(spec, self.context.catalog.clone()));
        }
        observe_tool_calls(&mut agent, self.context.lifecycle.clone());
        agent
    }

    fn record(&self, action: LifecycleAction) {
        self.context
            .lifecycle
            .record(&LifecycleRecord::new(self.role.agent_name(), action));
    }

    /// Answers `query` with a fresh transcript; nothing carries over between runs.
    pub async fn run(&self, query: &str) -> Result<SpecialistResult, AgentError> {
        self.record(LifecycleAction::AgentStart);
        self.record(LifecycleAction::Processing {
            input: query.to_string(),
        });

        let input = match self.role {
            SpecialistRole::Planner => rewrite_planner_input(query),
            _ => query.to_string(),
        };
        let mut agent = self.build_agent();
        let new_messages = agent.prompt(input).await?;

        self.record(LifecycleAction::Complete);
        Ok(SpecialistResult {
            content: final_output(&new_messages),
            agent: self.role.agent_name().to_string(),
        })
    }
}
