//! Markdown system prompts compiled into the binary.
use super::*;

const DISCLAIMER: &str = include_str!("../prompts/disclaimer.md");
const ACTIVITY_PROMPT: &str = include_str!("../prompts/activity.md");
const CULINARY_PROMPT: &str = include_str!("../prompts/culinary.md");
const FOODIE_PROMPT: &str = include_str!("../prompts/foodie.md");
const PLANNER_PROMPT: &str = include_str!("../prompts/planner.md");
const COORDINATOR_PROMPT: &str = include_str!("../prompts/coordinator.md");

/// Appends the shared safety disclaimer to a prompt template.
pub fn compose_system_prompt(template: &str) -> String {
    format!("{}\n\n{}", template.trim_end(), DISCLAIMER.trim_end())
}

pub(crate) fn specialist_prompt(role: SpecialistRole) -> String {
    let template = match role {
        SpecialistRole::Activity => ACTIVITY_PROMPT,
        SpecialistRole::Culinary => CULINARY_PROMPT,
        SpecialistRole::Foodie => FOODIE_PROMPT,
        SpecialistRole::Planner => PLANNER_PROMPT,
    };
    compose_system_prompt(template)
}

pub(crate) fn coordinator_prompt() -> String {
    compose_system_prompt(COORDINATOR_PROMPT)
}
