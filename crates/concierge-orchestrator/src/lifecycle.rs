//! Agent lifecycle records delivered to injected sinks.
//!
//! Sinks are a side channel for operators. Nothing in the dispatch path reads them back.
use super::*;

const PREVIEW_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum LifecycleAction {
    AgentStart,
    Processing {
        input: String,
    },
    ToolStart {
        tool: String,
        arguments: Value,
    },
    ToolEnd {
        tool: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        from_agent: Option<String>,
        is_error: bool,
    },
    Handoff {
        to_agent: String,
    },
    Complete,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LifecycleRecord {
    pub agent: String,
    #[serde(flatten)]
    pub action: LifecycleAction,
}

impl LifecycleRecord {
    pub fn new(agent: impl Into<String>, action: LifecycleAction) -> Self {
        Self {
            agent: agent.into(),
            action,
        }
    }
}

pub trait LifecycleSink: Send + Sync {
    fn record(&self, record: &LifecycleRecord);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLifecycleSink;

impl LifecycleSink for NoopLifecycleSink {
    fn record(&self, _record: &LifecycleRecord) {}
}

#[derive(Debug, Default)]
/// Keeps every record in memory; used by tests and diagnostics.
pub struct MemoryLifecycleSink {
    records: Mutex<Vec<LifecycleRecord>>,
}

impl MemoryLifecycleSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LifecycleRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }
}

impl LifecycleSink for MemoryLifecycleSink {
    fn record(&self, record: &LifecycleRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.push(record.clone());
        }
    }
}

/// Short console label for an agent name.
pub fn agent_label(agent: &str) -> String {
    match agent {
        "Activity Suggestion Agent" => "[Activity Agent]".to_string(),
        "Culinary Agent" => "[Culinary Agent]".to_string(),
        "Foodie Agent" => "[Foodie Agent]".to_string(),
        "Planner Agent" => "[Planner Agent]".to_string(),
        COORDINATOR_AGENT_NAME => "[Coordinator]".to_string(),
        other => format!("[{other}]"),
    }
}

fn preview(input: &str) -> String {
    let mut chars = input.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

fn render_arguments(arguments: &Value) -> String {
    let Value::Object(map) = arguments else {
        return String::new();
    };
    map.iter()
        .map(|(key, value)| match value {
            Value::String(text) => format!("{key}={text}"),
            other => format!("{key}={other}"),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// One human-readable console line per record.
pub fn render_lifecycle_line(record: &LifecycleRecord) -> String {
    let label = agent_label(&record.agent);
    match &record.action {
        LifecycleAction::AgentStart => format!("[Agent updated: {}]", record.agent),
        LifecycleAction::Processing { input } => {
            format!("{label} Processing request: '{}'", preview(input))
        }
        LifecycleAction::ToolStart { tool, arguments } => {
            let rendered = render_arguments(arguments);
            if rendered.is_empty() {
                format!("[tool called: {tool}]")
            } else {
                format!("[tool called: {tool}({rendered})]")
            }
        }
        LifecycleAction::ToolEnd {
            tool,
            from_agent,
            is_error,
        } => {
            let source = from_agent
                .as_deref()
                .map(|agent| format!(" from {agent}"))
                .unwrap_or_default();
            let failed = if *is_error { " (failed)" } else { "" };
            format!("{label} Completed tool: {tool}{source}{failed}")
        }
        LifecycleAction::Handoff { to_agent } => {
            format!("[Handoff from {} to {to_agent}]", record.agent)
        }
        LifecycleAction::Complete => format!("{label} Completed analysis and recommendations"),
    }
}

/// Forwards an agent's tool start/end events to `sink`.
pub(crate) fn observe_tool_calls(agent: &mut Agent, sink: Arc<dyn LifecycleSink>) {
    let name = agent.name().to_string();
    agent.subscribe(move |event| {
        let action = match event {
            AgentEvent::ToolExecutionStart {
                tool_name,
                arguments,
                ..
            } => LifecycleAction::ToolStart {
                tool: tool_name.clone(),
                arguments: arguments.clone(),
            },
            AgentEvent::ToolExecutionEnd {
                tool_name, result, ..
            } => LifecycleAction::ToolEnd {
                tool: tool_name.clone(),
                from_agent: result
                    .content
                    .get("agent")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                is_error: result.is_error,
            },
            _ => return,
        };
        sink.record(&LifecycleRecord::new(name.clone(), action));
    });
}
