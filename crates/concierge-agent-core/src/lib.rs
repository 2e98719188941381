//! Model-tool loop shared by the coordinator and every specialist.

mod streaming;

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use concierge_ai::{
    AiError, ChatRequest, LlmClient, Message, MessageRole, StreamDeltaHandler, ToolCall,
    ToolChoice, ToolDefinition,
};
use jsonschema::validator_for;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use thiserror::Error;

pub use streaming::{text_fragment_channel, TextFragments};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// What an agent does once a round of tool calls has produced results.
pub enum ToolUseBehavior {
    /// Send tool results back to the model until it answers without tool calls.
    #[default]
    RunLlmAgain,
    /// End the turn with the first tool round's output as the final text.
    StopOnFirstTool,
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub name: String,
    pub model: String,
    pub system_prompt: String,
    pub max_turns: usize,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub tool_choice: Option<ToolChoice>,
    pub parallel_tool_calls: Option<bool>,
    pub tool_use_behavior: ToolUseBehavior,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "Assistant".to_string(),
            model: "gpt-4".to_string(),
            system_prompt: "You are a helpful assistant.".to_string(),
            max_turns: 5,
            temperature: Some(0.0),
            max_tokens: None,
            tool_choice: Some(ToolChoice::Auto),
            parallel_tool_calls: Some(true),
            tool_use_behavior: ToolUseBehavior::RunLlmAgain,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ToolExecutionResult {
    pub content: Value,
    pub is_error: bool,
}

impl ToolExecutionResult {
    pub fn ok(content: Value) -> Self {
        Self {
            content,
            is_error: false,
        }
    }

    pub fn error(content: Value) -> Self {
        Self {
            content,
            is_error: true,
        }
    }

    /// Shorthand for the `{"error": message}` payload the model sees on failure.
    pub fn error_message(message: impl Into<String>) -> Self {
        Self::error(json!({ "error": message.into() }))
    }

    pub fn as_text(&self) -> String {
        match &self.content {
            Value::String(text) => text.clone(),
            other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
        }
    }
}

#[derive(Debug, Error)]
#[error("invalid arguments for '{tool}': {message}")]
pub struct ToolInputError {
    pub tool: String,
    pub message: String,
}

impl From<ToolInputError> for ToolExecutionResult {
    fn from(error: ToolInputError) -> Self {
        ToolExecutionResult::error_message(error.to_string())
    }
}

/// Deserializes schema-validated arguments into a typed parameter struct.
pub fn parse_tool_arguments<T: DeserializeOwned>(
    tool: &str,
    arguments: Value,
) -> Result<T, ToolInputError> {
    serde_json::from_value(arguments).map_err(|error| ToolInputError {
        tool: tool.to_string(),
        message: error.to_string(),
    })
}

#[async_trait]
pub trait AgentTool: Send + Sync {
    fn definition(&self) -> ToolDefinition;
    async fn execute(&self, arguments: Value) -> ToolExecutionResult;
}

#[derive(Debug, Clone)]
pub enum AgentEvent {
    AgentStart,
    AgentEnd {
        new_messages: usize,
    },
    TurnStart {
        turn: usize,
    },
    TurnEnd {
        turn: usize,
        tool_results: usize,
    },
    MessageAdded {
        message: Message,
    },
    ToolExecutionStart {
        tool_call_id: String,
        tool_name: String,
        arguments: Value,
    },
    ToolExecutionEnd {
        tool_call_id: String,
        tool_name: String,
        result: ToolExecutionResult,
    },
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Ai(#[from] AiError),
    #[error("agent exceeded max turns ({0})")]
    MaxTurnsExceeded(usize),
}

type EventHandler = Arc<dyn Fn(&AgentEvent) + Send + Sync>;

struct RegisteredTool {
    definition: ToolDefinition,
    tool: Arc<dyn AgentTool>,
}

pub struct Agent {
    client: Arc<dyn LlmClient>,
    config: AgentConfig,
    messages: Vec<Message>,
    tools: HashMap<String, RegisteredTool>,
    tool_order: Vec<String>,
    handlers: Vec<EventHandler>,
}

impl Agent {
    pub fn new(client: Arc<dyn LlmClient>, config: AgentConfig) -> Self {
        let mut messages = Vec::new();
        if !config.system_prompt.trim().is_empty() {
            messages.push(Message::system(config.system_prompt.clone()));
        }

        Self {
            client,
            config,
            messages,
            tools: HashMap::new(),
            tool_order: Vec::new(),
            handlers: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn subscribe<F>(&mut self, handler: F)
    where
        F: Fn(&AgentEvent) + Send + Sync + 'static,
    {
        self.handlers.push(Arc::new(handler));
    }

    pub fn register_tool<T>(&mut self, tool: T)
    where
        T: AgentTool + 'static,
    {
        self.register_shared_tool(Arc::new(tool));
    }

    /// Registering a name twice replaces the earlier tool but keeps its position.
    pub fn register_shared_tool(&mut self, tool: Arc<dyn AgentTool>) {
        let definition = tool.definition();
        if !self.tools.contains_key(&definition.name) {
            self.tool_order.push(definition.name.clone());
        }
        self.tools
            .insert(definition.name.clone(), RegisteredTool { definition, tool });
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tool_order.clone()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn replace_messages(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }

    pub fn append_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub async fn prompt(&mut self, text: impl Into<String>) -> Result<Vec<Message>, AgentError> {
        self.prompt_with_stream(text, None).await
    }

    /// Runs one user turn. On failure the transcript is restored to its state before the prompt.
    pub async fn prompt_with_stream(
        &mut self,
        text: impl Into<String>,
        on_delta: Option<StreamDeltaHandler>,
    ) -> Result<Vec<Message>, AgentError> {
        let start_index = self.messages.len();
        let user_message = Message::user(text.into());
        self.messages.push(user_message.clone());
        self.emit(AgentEvent::MessageAdded {
            message: user_message,
        });

        let outcome = self.run_loop(start_index, on_delta).await;
        if outcome.is_err() {
            self.messages.truncate(start_index);
        }
        outcome
    }

    fn emit(&self, event: AgentEvent) {
        for handler in &self.handlers {
            handler(&event);
        }
    }

    fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tool_order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.definition.clone())
            .collect()
    }

    fn finish(&self, start_index: usize) -> Vec<Message> {
        let new_messages = self.messages[start_index..].to_vec();
        self.emit(AgentEvent::AgentEnd {
            new_messages: new_messages.len(),
        });
        new_messages
    }

    async fn run_loop(
        &mut self,
        start_index: usize,
        on_delta: Option<StreamDeltaHandler>,
    ) -> Result<Vec<Message>, AgentError> {
        self.emit(AgentEvent::AgentStart);

        for turn in 1..=self.config.max_turns {
            self.emit(AgentEvent::TurnStart { turn });
            tracing::debug!(agent = %self.config.name, turn, "requesting model response");

            let tools = self.tool_definitions();
            let has_tools = !tools.is_empty();
            let request = ChatRequest {
                model: self.config.model.clone(),
                messages: self.messages.clone(),
                tools,
                tool_choice: self.config.tool_choice.clone().filter(|_| has_tools),
                parallel_tool_calls: self.config.parallel_tool_calls.filter(|_| has_tools),
                max_tokens: self.config.max_tokens,
                temperature: self.config.temperature,
            };

            let response = self
                .client
                .complete_with_stream(request, on_delta.clone())
                .await?;
            let assistant = response.message;
            self.messages.push(assistant.clone());
            self.emit(AgentEvent::MessageAdded {
                message: assistant.clone(),
            });

            let tool_calls = assistant.tool_calls();
            if tool_calls.is_empty() {
                self.emit(AgentEvent::TurnEnd {
                    turn,
                    tool_results: 0,
                });
                return Ok(self.finish(start_index));
            }

            let tool_results = tool_calls.len();
            for call in tool_calls {
                self.execute_tool_call(call).await;
            }
            self.emit(AgentEvent::TurnEnd { turn, tool_results });

            if self.config.tool_use_behavior == ToolUseBehavior::StopOnFirstTool {
                return Ok(self.finish(start_index));
            }
        }

        tracing::debug!(
            agent = %self.config.name,
            max_turns = self.config.max_turns,
            "agent exhausted its turn budget"
        );
        Err(AgentError::MaxTurnsExceeded(self.config.max_turns))
    }

    async fn execute_tool_call(&mut self, call: ToolCall) {
        self.emit(AgentEvent::ToolExecutionStart {
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            arguments: call.arguments.clone(),
        });

        let result = if let Some(registered) = self.tools.get(&call.name) {
            if let Err(error) = validate_tool_arguments(&registered.definition, &call.arguments) {
                ToolExecutionResult::error_message(error)
            } else {
                registered.tool.execute(call.arguments).await
            }
        } else {
            ToolExecutionResult::error_message(format!("Tool '{}' is not registered", call.name))
        };

        self.emit(AgentEvent::ToolExecutionEnd {
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            result: result.clone(),
        });

        let tool_message =
            Message::tool_result(call.id, call.name, result.as_text(), result.is_error);
        self.messages.push(tool_message.clone());
        self.emit(AgentEvent::MessageAdded {
            message: tool_message,
        });
    }
}

/// Final text of a completed turn: the last assistant answer, or the first tool output of a
/// turn that stopped on its tool round.
pub fn final_output(new_messages: &[Message]) -> String {
    let Some(last) = new_messages.last() else {
        return String::new();
    };
    if last.role != MessageRole::Tool {
        return last.text_content();
    }
    new_messages
        .iter()
        .rev()
        .take_while(|message| message.role == MessageRole::Tool)
        .last()
        .map(Message::text_content)
        .unwrap_or_default()
}

fn validate_tool_arguments(definition: &ToolDefinition, arguments: &Value) -> Result<(), String> {
    let validator = validator_for(&definition.parameters)
        .map_err(|error| format!("invalid JSON schema for '{}': {error}", definition.name))?;

    let mut errors = validator.iter_errors(arguments);
    if let Some(first) = errors.next() {
        return Err(format!(
            "invalid arguments for '{}': {}",
            definition.name, first
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{
        collections::VecDeque,
        sync::{Arc, Mutex},
    };

    use async_trait::async_trait;
    use concierge_ai::{
        AiError, ChatRequest, ChatResponse, ChatUsage, ContentBlock, LlmClient, Message,
        MessageRole, StreamDeltaHandler, ToolChoice, ToolDefinition,
    };
    use serde::Deserialize;
    use serde_json::{json, Value};
    use tokio::sync::Mutex as AsyncMutex;

    use crate::{
        final_output, parse_tool_arguments, text_fragment_channel, Agent, AgentConfig, AgentError,
        AgentEvent, AgentTool, ToolExecutionResult, ToolUseBehavior,
    };

    struct MockClient {
        responses: AsyncMutex<VecDeque<ChatResponse>>,
        requests: AsyncMutex<Vec<ChatRequest>>,
    }

    impl MockClient {
        fn new(messages: Vec<Message>) -> Self {
            Self {
                responses: AsyncMutex::new(
                    messages
                        .into_iter()
                        .map(|message| ChatResponse {
                            message,
                            finish_reason: Some("stop".to_string()),
                            usage: ChatUsage::default(),
                        })
                        .collect(),
                ),
                requests: AsyncMutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmClient for MockClient {
        async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, AiError> {
            self.requests.lock().await.push(request);
            let mut responses = self.responses.lock().await;
            responses.pop_front().ok_or_else(|| {
                AiError::InvalidResponse("mock response queue is empty".to_string())
            })
        }
    }

    struct StreamingMockClient {
        response: ChatResponse,
        deltas: Vec<String>,
    }

    #[async_trait]
    impl LlmClient for StreamingMockClient {
        async fn complete(&self, _request: ChatRequest) -> Result<ChatResponse, AiError> {
            Ok(self.response.clone())
        }

        async fn complete_with_stream(
            &self,
            _request: ChatRequest,
            on_delta: Option<StreamDeltaHandler>,
        ) -> Result<ChatResponse, AiError> {
            if let Some(handler) = on_delta {
                for delta in &self.deltas {
                    handler(delta.clone());
                }
            }
            Ok(self.response.clone())
        }
    }

    #[derive(Debug, Deserialize)]
    #[serde(deny_unknown_fields)]
    struct LookupParams {
        activity_name: String,
    }

    struct LookupTool;

    #[async_trait]
    impl AgentTool for LookupTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition {
                name: "get_activity_details".to_string(),
                description: "Look up an activity".to_string(),
                parameters: json!({
                    "type": "object",
                    "properties": {
                        "activity_name": { "type": "string" }
                    },
                    "required": ["activity_name"],
                    "additionalProperties": false
                }),
            }
        }

        async fn execute(&self, arguments: Value) -> ToolExecutionResult {
            match parse_tool_arguments::<LookupParams>("get_activity_details", arguments) {
                Ok(params) => ToolExecutionResult::ok(json!({ "name": params.activity_name })),
                Err(error) => error.into(),
            }
        }
    }

    fn tool_call(id: &str, arguments: Value) -> Message {
        Message::assistant_blocks(vec![ContentBlock::ToolCall {
            id: id.to_string(),
            name: "get_activity_details".to_string(),
            arguments,
        }])
    }

    #[tokio::test]
    async fn prompt_without_tools_completes_in_one_turn() {
        let client = Arc::new(MockClient::new(vec![Message::assistant_text(
            "Hello from model",
        )]));

        let mut agent = Agent::new(client.clone(), AgentConfig::default());
        let new_messages = agent.prompt("hi").await.expect("prompt should succeed");

        assert_eq!(new_messages.len(), 2);
        assert_eq!(new_messages[0].role, MessageRole::User);
        assert_eq!(final_output(&new_messages), "Hello from model");

        let requests = client.requests.lock().await;
        assert!(requests[0].tool_choice.is_none());
        assert!(requests[0].parallel_tool_calls.is_none());
    }

    #[tokio::test]
    async fn prompt_executes_tool_calls_and_continues() {
        let client = Arc::new(MockClient::new(vec![
            tool_call("call_1", json!({ "activity_name": "Tech Interactive" })),
            Message::assistant_text("It is a science museum."),
        ]));

        let mut agent = Agent::new(client.clone(), AgentConfig::default());
        agent.register_tool(LookupTool);

        let new_messages = agent
            .prompt("Tell me about the Tech Interactive")
            .await
            .expect("prompt should succeed");

        assert_eq!(new_messages.len(), 4);
        assert_eq!(new_messages[2].role, MessageRole::Tool);
        assert_eq!(new_messages[2].tool_call_id.as_deref(), Some("call_1"));
        assert!(new_messages[2].text_content().contains("Tech Interactive"));
        assert_eq!(final_output(&new_messages), "It is a science museum.");

        let requests = client.requests.lock().await;
        assert_eq!(requests[0].tool_choice, Some(ToolChoice::Auto));
        assert_eq!(requests[0].parallel_tool_calls, Some(true));
        assert_eq!(requests[1].messages.len(), 4);
    }

    #[tokio::test]
    async fn emits_expected_event_sequence_for_tool_turn() {
        let client = Arc::new(MockClient::new(vec![
            tool_call("call_1", json!({ "activity_name": "Zoo" })),
            Message::assistant_text("done"),
        ]));

        let mut agent = Agent::new(client, AgentConfig::default());
        agent.register_tool(LookupTool);

        let events = Arc::new(Mutex::new(Vec::<String>::new()));
        let recorded = events.clone();
        agent.subscribe(move |event| {
            let label = match event {
                AgentEvent::MessageAdded { message } => format!("message:{:?}", message.role),
                AgentEvent::ToolExecutionStart { tool_name, .. } => {
                    format!("tool_start:{tool_name}")
                }
                AgentEvent::ToolExecutionEnd { tool_name, .. } => format!("tool_end:{tool_name}"),
                AgentEvent::TurnStart { turn } => format!("turn_start:{turn}"),
                AgentEvent::TurnEnd { turn, .. } => format!("turn_end:{turn}"),
                AgentEvent::AgentStart => "agent_start".to_string(),
                AgentEvent::AgentEnd { .. } => "agent_end".to_string(),
            };

            recorded
                .lock()
                .expect("event mutex should lock")
                .push(label);
        });

        let _ = agent.prompt("zoo").await.expect("prompt should succeed");

        let events = events.lock().expect("event mutex should lock").clone();
        assert_eq!(
            events,
            vec![
                "message:User",
                "agent_start",
                "turn_start:1",
                "message:Assistant",
                "tool_start:get_activity_details",
                "tool_end:get_activity_details",
                "message:Tool",
                "turn_end:1",
                "turn_start:2",
                "message:Assistant",
                "turn_end:2",
                "agent_end",
            ]
        );
    }

    #[tokio::test]
    async fn max_turns_exceeded_rolls_back_the_transcript() {
        let client = Arc::new(MockClient::new(vec![
            tool_call("call_1", json!({ "activity_name": "Zoo" })),
            tool_call("call_2", json!({ "activity_name": "Zoo" })),
        ]));

        let mut agent = Agent::new(
            client,
            AgentConfig {
                max_turns: 2,
                ..AgentConfig::default()
            },
        );
        agent.register_tool(LookupTool);
        let before = agent.messages().to_vec();

        let error = agent.prompt("loop").await.expect_err("must hit max turns");
        match error {
            AgentError::MaxTurnsExceeded(2) => {}
            other => panic!("expected AgentError::MaxTurnsExceeded(2), got {other:?}"),
        }
        assert_eq!(agent.messages(), before.as_slice());
    }

    #[tokio::test]
    async fn rejects_unknown_fields_via_json_schema() {
        let client = Arc::new(MockClient::new(vec![
            tool_call("call_1", json!({ "activity_name": "Zoo", "extra": 1 })),
            Message::assistant_text("sorry"),
        ]));

        let mut agent = Agent::new(client, AgentConfig::default());
        agent.register_tool(LookupTool);

        let messages = agent.prompt("zoo").await.expect("prompt succeeds");
        let tool_message = messages
            .iter()
            .find(|message| message.role == MessageRole::Tool)
            .expect("tool result must exist");
        assert!(tool_message.is_error);
        assert!(tool_message.text_content().contains("invalid arguments"));
    }

    #[tokio::test]
    async fn unknown_tool_names_are_reported_to_the_model() {
        let client = Arc::new(MockClient::new(vec![
            Message::assistant_blocks(vec![ContentBlock::ToolCall {
                id: "call_1".to_string(),
                name: "book_flight".to_string(),
                arguments: json!({}),
            }]),
            Message::assistant_text("I cannot book flights."),
        ]));

        let mut agent = Agent::new(client, AgentConfig::default());
        agent.register_tool(LookupTool);

        let messages = agent.prompt("fly").await.expect("prompt succeeds");
        assert!(messages[2].is_error);
        assert!(messages[2]
            .text_content()
            .contains("Tool 'book_flight' is not registered"));
    }

    #[tokio::test]
    async fn stop_on_first_tool_uses_tool_output_as_final_text() {
        let client = Arc::new(MockClient::new(vec![tool_call(
            "call_1",
            json!({ "activity_name": "Museum" }),
        )]));

        let mut agent = Agent::new(
            client,
            AgentConfig {
                tool_use_behavior: ToolUseBehavior::StopOnFirstTool,
                ..AgentConfig::default()
            },
        );
        agent.register_tool(LookupTool);

        let messages = agent.prompt("museum").await.expect("prompt succeeds");
        assert_eq!(messages.len(), 3);
        assert!(final_output(&messages).contains("Museum"));
    }

    #[tokio::test]
    async fn prompt_with_stream_feeds_the_fragment_channel() {
        let client = Arc::new(StreamingMockClient {
            response: ChatResponse {
                message: Message::assistant_text("Hello"),
                finish_reason: Some("stop".to_string()),
                usage: ChatUsage::default(),
            },
            deltas: vec!["Hel".to_string(), "lo".to_string()],
        });

        let mut agent = Agent::new(client, AgentConfig::default());
        let (handler, fragments) = text_fragment_channel();

        let new_messages = agent
            .prompt_with_stream("hello", Some(handler))
            .await
            .expect("prompt should succeed");

        assert_eq!(final_output(&new_messages), "Hello");
        assert_eq!(fragments.collect_text().await, "Hello");
    }
}
