use super::*;

use thiserror::Error;

#[derive(Debug, Error)]
/// Failures the runtime reports to the user. Only `Configuration` ends the process.
pub(crate) enum AssistantError {
    #[error("{0}")]
    Configuration(String),
    #[error("{0:#}")]
    Session(anyhow::Error),
    #[error(transparent)]
    Agent(#[from] AgentError),
}

impl AssistantError {
    pub(crate) fn error_type(&self) -> &'static str {
        match self {
            AssistantError::Configuration(_) => "ConfigurationError",
            AssistantError::Session(_) => "SessionError",
            AssistantError::Agent(_) => "AgentError",
        }
    }
}

/// JSON payload written to the event log for a failed turn.
pub(crate) fn format_error(error: &AssistantError) -> Value {
    let mut payload = json!({
        "error": true,
        "error_type": error.error_type(),
        "message": error.to_string(),
    });
    let original = match error {
        AssistantError::Session(inner) => inner.root_cause().to_string(),
        AssistantError::Agent(AgentError::Ai(inner)) => inner.to_string(),
        _ => String::new(),
    };
    if !original.is_empty() && original != error.to_string() {
        payload["original_error"] = Value::String(original);
    }
    payload
}
