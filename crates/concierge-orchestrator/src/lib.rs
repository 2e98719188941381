//! Specialist agents, their catalog tools and the coordinator that routes between them.

mod activity_tools;
mod catalog_tool;
mod coordinator;
mod culinary_tools;
mod foodie_tools;
mod lifecycle;
mod plan_inputs;
mod planner_tools;
mod prompts;
mod schedule;
mod specialist;
#[cfg(test)]
mod tests;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use concierge_agent_core::{
    final_output, parse_tool_arguments, Agent, AgentConfig, AgentError, AgentEvent, AgentTool,
    ToolExecutionResult, ToolInputError, ToolUseBehavior,
};
use concierge_ai::{LlmClient, Message, StreamDeltaHandler, ToolChoice, ToolDefinition};
use concierge_fixtures::FixtureCatalog;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};

pub use coordinator::{
    enrich_activity_query, enrich_recipe_query, enrich_restaurant_query, Coordinator,
    CoordinatorSettings, CoordinatorTurn, COORDINATOR_AGENT_NAME,
};
pub use lifecycle::{
    agent_label, render_lifecycle_line, LifecycleAction, LifecycleRecord, LifecycleSink,
    MemoryLifecycleSink, NoopLifecycleSink,
};
pub use plan_inputs::{build_planner_request, parse_specialist_output};
pub use planner_tools::rewrite_planner_input;
pub use prompts::compose_system_prompt;
pub use schedule::{
    optimize_schedule, render_itinerary, Itinerary, PlannedActivity, ScheduleError,
    ScheduledActivity, DEFAULT_LEG_MINUTES, HOME_LOCATION,
};
pub use specialist::{
    SpecialistAgent, SpecialistContext, SpecialistResult, SpecialistRole, TurnLimits,
};
