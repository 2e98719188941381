use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::time::sleep;

use crate::{
    retry::{
        is_retryable_http_error, new_request_id, parse_retry_after_ms, retry_budget_allows_delay,
        retry_delay_ms, should_retry_status,
    },
    AiError, ChatRequest, ChatResponse, ChatUsage, ContentBlock, LlmClient, Message, MessageRole,
    StreamDeltaHandler, ToolChoice, ToolDefinition,
};

pub const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
/// Request shape used against the hosted endpoint.
pub enum OpenAiApiMode {
    #[default]
    Responses,
    /// Legacy `/chat/completions` call shape, for compatible third-party providers.
    ChatCompletions,
}

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_base: String,
    pub api_key: String,
    pub organization: Option<String>,
    pub request_timeout_ms: u64,
    pub max_retries: usize,
    pub retry_budget_ms: u64,
    pub retry_jitter: bool,
    pub api_mode: OpenAiApiMode,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_base: DEFAULT_OPENAI_API_BASE.to_string(),
            api_key: api_key.into(),
            organization: None,
            request_timeout_ms: 120_000,
            max_retries: 2,
            retry_budget_ms: 0,
            retry_jitter: true,
            api_mode: OpenAiApiMode::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig) -> Result<Self, AiError> {
        let api_key = config.api_key.trim();
        if api_key.is_empty() {
            return Err(AiError::MissingApiKey);
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {api_key}"))
                .map_err(|e| AiError::InvalidResponse(format!("invalid API key header: {e}")))?,
        );
        if let Some(org) = config.organization.as_deref().map(str::trim) {
            if !org.is_empty() {
                headers.insert(
                    "OpenAI-Organization",
                    HeaderValue::from_str(org).map_err(|e| {
                        AiError::InvalidResponse(format!("invalid organization header: {e}"))
                    })?,
                );
            }
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_millis(
                config.request_timeout_ms.max(1),
            ))
            .build()?;

        Ok(Self { client, config })
    }

    fn endpoint_url(&self, suffix: &str) -> String {
        let base = self.config.api_base.trim_end_matches('/');
        let base = base
            .strip_suffix("/chat/completions")
            .or_else(|| base.strip_suffix("/responses"))
            .unwrap_or(base);
        format!("{base}/{suffix}")
    }

    /// Posts `body`, retrying transient failures within the configured attempt and time budget.
    async fn post_with_retries(
        &self,
        url: &str,
        body: &Value,
    ) -> Result<reqwest::Response, AiError> {
        let started = std::time::Instant::now();
        let max_retries = self.config.max_retries;
        let mut attempt = 0;

        loop {
            let response = self
                .client
                .post(url)
                .header("x-concierge-request-id", new_request_id())
                .header("x-concierge-retry-attempt", attempt.to_string())
                .json(body)
                .send()
                .await;

            let (retry_after_ms, failure) = match response {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status().as_u16();
                    let retry_after_ms = parse_retry_after_ms(response.headers());
                    let body = response.text().await?;
                    if !should_retry_status(status) {
                        return Err(AiError::HttpStatus { status, body });
                    }
                    (retry_after_ms, AiError::HttpStatus { status, body })
                }
                Err(error) if is_retryable_http_error(&error) => (None, AiError::Http(error)),
                Err(error) => return Err(AiError::Http(error)),
            };

            if attempt >= max_retries {
                return Err(failure);
            }
            let delay_ms = retry_delay_ms(attempt, self.config.retry_jitter, retry_after_ms);
            let elapsed_ms = started.elapsed().as_millis() as u64;
            if !retry_budget_allows_delay(elapsed_ms, delay_ms, self.config.retry_budget_ms) {
                return Err(failure);
            }
            tracing::debug!(attempt, delay_ms, error = %failure, "retrying model request");
            sleep(std::time::Duration::from_millis(delay_ms)).await;
            attempt += 1;
        }
    }

    async fn complete_via_chat(
        &self,
        request: &ChatRequest,
        on_delta: Option<StreamDeltaHandler>,
    ) -> Result<ChatResponse, AiError> {
        let mut body = build_chat_request_body(request)?;
        if on_delta.is_some() {
            body["stream"] = json!(true);
        }
        let response = self
            .post_with_retries(&self.endpoint_url("chat/completions"), &body)
            .await?;

        let Some(on_delta) = on_delta else {
            return parse_chat_response(&response.text().await?);
        };
        let is_event_stream = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.to_ascii_lowercase().contains("text/event-stream"));
        if is_event_stream {
            return parse_chat_stream_response(response, on_delta).await;
        }
        let parsed = parse_chat_response(&response.text().await?)?;
        emit_whole_text(&parsed, &on_delta);
        Ok(parsed)
    }

    async fn complete_via_responses(
        &self,
        request: &ChatRequest,
        on_delta: Option<StreamDeltaHandler>,
    ) -> Result<ChatResponse, AiError> {
        let body = build_responses_request_body(request)?;
        let response = self
            .post_with_retries(&self.endpoint_url("responses"), &body)
            .await?;
        let parsed = parse_responses_api_response(&response.text().await?)?;
        if let Some(on_delta) = on_delta {
            emit_whole_text(&parsed, &on_delta);
        }
        Ok(parsed)
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, AiError> {
        self.complete_with_stream(request, None).await
    }

    async fn complete_with_stream(
        &self,
        request: ChatRequest,
        on_delta: Option<StreamDeltaHandler>,
    ) -> Result<ChatResponse, AiError> {
        match self.config.api_mode {
            OpenAiApiMode::Responses => self.complete_via_responses(&request, on_delta).await,
            OpenAiApiMode::ChatCompletions => self.complete_via_chat(&request, on_delta).await,
        }
    }
}

fn emit_whole_text(response: &ChatResponse, on_delta: &StreamDeltaHandler) {
    let text = response.message.text_content();
    if !text.is_empty() {
        on_delta(text);
    }
}

fn apply_common_request_fields(body: &mut Value, request: &ChatRequest, responses_shape: bool) {
    if !request.tools.is_empty() {
        if let Some(tool_choice) = request.tool_choice.as_ref() {
            body["tool_choice"] = to_openai_tool_choice(tool_choice, responses_shape);
        }
        if let Some(parallel) = request.parallel_tool_calls {
            body["parallel_tool_calls"] = json!(parallel);
        }
    }
    if let Some(temperature) = request.temperature {
        body["temperature"] = json!(temperature);
    }
}

fn build_chat_request_body(request: &ChatRequest) -> Result<Value, AiError> {
    let mut body = json!({
        "model": request.model,
        "messages": to_openai_messages(&request.messages)?,
    });
    if !request.tools.is_empty() {
        body["tools"] = to_openai_tools(&request.tools, false);
    }
    apply_common_request_fields(&mut body, request, false);
    if let Some(max_tokens) = request.max_tokens {
        body["max_tokens"] = json!(max_tokens);
    }
    Ok(body)
}

fn build_responses_request_body(request: &ChatRequest) -> Result<Value, AiError> {
    let mut body = json!({
        "model": request.model,
        "input": to_openai_responses_input(&request.messages)?,
    });
    if !request.tools.is_empty() {
        body["tools"] = to_openai_tools(&request.tools, true);
    }
    apply_common_request_fields(&mut body, request, true);
    if let Some(max_tokens) = request.max_tokens {
        body["max_output_tokens"] = json!(max_tokens);
    }
    Ok(body)
}

fn to_openai_tool_choice(tool_choice: &ToolChoice, responses_shape: bool) -> Value {
    match tool_choice {
        ToolChoice::Auto => json!("auto"),
        ToolChoice::None => json!("none"),
        ToolChoice::Required => json!("required"),
        ToolChoice::Tool { name } if responses_shape => json!({
            "type": "function",
            "name": name,
        }),
        ToolChoice::Tool { name } => json!({
            "type": "function",
            "function": { "name": name },
        }),
    }
}

fn to_openai_tools(tools: &[ToolDefinition], responses_shape: bool) -> Value {
    Value::Array(
        tools
            .iter()
            .map(|tool| {
                if responses_shape {
                    json!({
                        "type": "function",
                        "name": tool.name,
                        "description": tool.description,
                        "parameters": tool.parameters,
                    })
                } else {
                    json!({
                        "type": "function",
                        "function": {
                            "name": tool.name,
                            "description": tool.description,
                            "parameters": tool.parameters,
                        }
                    })
                }
            })
            .collect(),
    )
}

fn required_tool_call_id(message: &Message) -> Result<&str, AiError> {
    message
        .tool_call_id
        .as_deref()
        .ok_or_else(|| AiError::InvalidResponse("tool message is missing tool_call_id".to_string()))
}

fn to_openai_responses_input(messages: &[Message]) -> Result<Value, AiError> {
    let mut items = Vec::new();

    for message in messages {
        if message.role == MessageRole::Tool {
            items.push(json!({
                "type": "function_call_output",
                "call_id": required_tool_call_id(message)?,
                "output": message.text_content(),
            }));
            continue;
        }

        let text = message.text_content();
        if !text.trim().is_empty() {
            items.push(json!({
                "role": role_name(message.role),
                "content": text,
            }));
        }
        for call in message.tool_calls() {
            items.push(json!({
                "type": "function_call",
                "call_id": call.id,
                "name": call.name,
                "arguments": stringify_tool_arguments(&call.arguments),
            }));
        }
    }

    Ok(Value::Array(items))
}

fn to_openai_messages(messages: &[Message]) -> Result<Vec<Value>, AiError> {
    let mut serialized = Vec::with_capacity(messages.len());

    for message in messages {
        let text = message.text_content();
        match message.role {
            MessageRole::System | MessageRole::User => serialized.push(json!({
                "role": role_name(message.role),
                "content": text,
            })),
            MessageRole::Assistant => {
                let tool_calls: Vec<Value> = message
                    .tool_calls()
                    .into_iter()
                    .map(|call| {
                        json!({
                            "id": call.id,
                            "type": "function",
                            "function": {
                                "name": call.name,
                                "arguments": stringify_tool_arguments(&call.arguments),
                            }
                        })
                    })
                    .collect();
                if tool_calls.is_empty() {
                    serialized.push(json!({ "role": "assistant", "content": text }));
                } else {
                    let content = if text.trim().is_empty() {
                        Value::Null
                    } else {
                        Value::String(text)
                    };
                    serialized.push(json!({
                        "role": "assistant",
                        "content": content,
                        "tool_calls": tool_calls,
                    }));
                }
            }
            MessageRole::Tool => serialized.push(json!({
                "role": "tool",
                "tool_call_id": required_tool_call_id(message)?,
                "content": text,
            })),
        }
    }

    Ok(serialized)
}

fn role_name(role: MessageRole) -> &'static str {
    match role {
        MessageRole::System => "system",
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
        MessageRole::Tool => "tool",
    }
}

fn stringify_tool_arguments(arguments: &Value) -> String {
    match arguments {
        Value::String(value) => value.clone(),
        value => value.to_string(),
    }
}

/// Arguments that are not valid JSON are kept as a raw string so schema validation can reject them.
fn parse_tool_call_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return json!({});
    }
    serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn assistant_message(content: Vec<ContentBlock>) -> Message {
    Message::assistant_blocks(content)
}

fn parse_chat_response(raw: &str) -> Result<ChatResponse, AiError> {
    let parsed: OpenAiChatResponse = serde_json::from_str(raw)?;
    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| AiError::InvalidResponse("response contained no choices".to_string()))?;

    let mut content = parse_openai_content_blocks(choice.message.content.as_ref());
    for tool_call in choice.message.tool_calls.unwrap_or_default() {
        if tool_call.call_type != "function" {
            continue;
        }
        content.push(ContentBlock::ToolCall {
            id: tool_call.id,
            name: tool_call.function.name,
            arguments: parse_tool_call_arguments(&tool_call.function.arguments),
        });
    }

    Ok(ChatResponse {
        message: assistant_message(content),
        finish_reason: choice.finish_reason,
        usage: parsed.usage.map(ChatUsage::from).unwrap_or_default(),
    })
}

fn parse_responses_api_response(raw: &str) -> Result<ChatResponse, AiError> {
    let parsed: OpenAiResponsesResponse = serde_json::from_str(raw)?;
    let mut content = Vec::new();

    for item in parsed.output.unwrap_or_default() {
        match item.item_type.as_deref() {
            Some("message") => content.extend(parse_openai_content_blocks(item.content.as_ref())),
            Some("function_call") => {
                let Some(name) = item.name else {
                    continue;
                };
                let id = item
                    .call_id
                    .or(item.id)
                    .unwrap_or_else(|| format!("response_call_{}", content.len() + 1));
                content.push(ContentBlock::ToolCall {
                    id,
                    name,
                    arguments: parse_tool_call_arguments(item.arguments.as_deref().unwrap_or("")),
                });
            }
            _ => {}
        }
    }

    let has_text = content
        .iter()
        .any(|block| matches!(block, ContentBlock::Text { .. }));
    if !has_text {
        if let Some(output_text) = parsed.output_text.filter(|text| !text.trim().is_empty()) {
            content.insert(0, ContentBlock::Text { text: output_text });
        }
    }

    let usage = parsed
        .usage
        .map(|usage| {
            let input_tokens = usage.input_tokens.unwrap_or_default();
            let output_tokens = usage.output_tokens.unwrap_or_default();
            ChatUsage {
                input_tokens,
                output_tokens,
                total_tokens: usage.total_tokens.unwrap_or(input_tokens + output_tokens),
            }
        })
        .unwrap_or_default();

    Ok(ChatResponse {
        message: assistant_message(content),
        finish_reason: parsed.status,
        usage,
    })
}

fn parse_openai_content_blocks(content: Option<&Value>) -> Vec<ContentBlock> {
    let text_block = |text: &str| {
        (!text.trim().is_empty()).then(|| ContentBlock::Text {
            text: text.to_string(),
        })
    };
    match content {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::String(text)) => text_block(text).into_iter().collect(),
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(|part| part.get("text").and_then(Value::as_str))
            .filter_map(text_block)
            .collect(),
        Some(other) => text_block(&other.to_string()).into_iter().collect(),
    }
}

async fn parse_chat_stream_response(
    response: reqwest::Response,
    on_delta: StreamDeltaHandler,
) -> Result<ChatResponse, AiError> {
    let mut stream = response.bytes_stream();
    let mut lines = SseLineBuffer::default();
    let mut state = ChatStreamState::default();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        lines.push(chunk.as_ref());
        while let Some(line) = lines.next_line()? {
            if state.apply_line(&line, &on_delta)? {
                return Ok(state.finish());
            }
        }
    }

    let trailing = lines.finish()?;
    state.apply_line(&trailing, &on_delta)?;
    Ok(state.finish())
}

#[derive(Debug, Default)]
/// Raw stream bytes split into lines. Only complete lines are decoded, so a character split across
/// network chunks is never mangled.
struct SseLineBuffer {
    pending: Vec<u8>,
}

impl SseLineBuffer {
    fn push(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
    }

    fn next_line(&mut self) -> Result<Option<String>, AiError> {
        let Some(pos) = self.pending.iter().position(|byte| *byte == b'\n') else {
            return Ok(None);
        };
        let line: Vec<u8> = self.pending.drain(..=pos).collect();
        decode_stream_line(&line[..pos]).map(Some)
    }

    fn finish(self) -> Result<String, AiError> {
        decode_stream_line(&self.pending)
    }
}

fn decode_stream_line(bytes: &[u8]) -> Result<String, AiError> {
    std::str::from_utf8(bytes)
        .map(|line| line.trim().to_string())
        .map_err(|error| {
            AiError::InvalidResponse(format!("stream line is not valid UTF-8: {error}"))
        })
}

#[derive(Debug, Default)]
struct ChatStreamState {
    text: String,
    tool_calls: Vec<ToolCallAccumulator>,
    finish_reason: Option<String>,
    usage: ChatUsage,
}

#[derive(Debug, Default)]
struct ToolCallAccumulator {
    id: String,
    name: String,
    arguments: String,
}

impl ChatStreamState {
    /// Applies one SSE line; returns `true` once the `[DONE]` sentinel is seen.
    fn apply_line(&mut self, line: &str, on_delta: &StreamDeltaHandler) -> Result<bool, AiError> {
        let Some(data) = line.strip_prefix("data:").map(str::trim) else {
            return Ok(false);
        };
        if data == "[DONE]" {
            return Ok(true);
        }
        if data.is_empty() {
            return Ok(false);
        }

        let chunk: OpenAiStreamChunk = serde_json::from_str(data).map_err(|error| {
            AiError::InvalidResponse(format!("failed to parse stream chunk: {error}"))
        })?;
        if let Some(usage) = chunk.usage {
            self.usage = usage.into();
        }

        for choice in chunk.choices {
            if let Some(reason) = choice.finish_reason {
                self.finish_reason = Some(reason);
            }
            let Some(delta) = choice.delta else {
                continue;
            };
            if let Some(text) = delta.content.filter(|text| !text.is_empty()) {
                self.text.push_str(&text);
                on_delta(text);
            }
            for call in delta.tool_calls.unwrap_or_default() {
                if self.tool_calls.len() <= call.index {
                    self.tool_calls
                        .resize_with(call.index + 1, ToolCallAccumulator::default);
                }
                let current = &mut self.tool_calls[call.index];
                if let Some(id) = call.id.filter(|id| !id.is_empty()) {
                    current.id = id;
                }
                if let Some(function) = call.function {
                    if let Some(name) = function.name.filter(|name| !name.is_empty()) {
                        current.name = name;
                    }
                    if let Some(arguments) = function.arguments {
                        current.arguments.push_str(&arguments);
                    }
                }
            }
        }
        Ok(false)
    }

    fn finish(self) -> ChatResponse {
        let mut content = Vec::new();
        if !self.text.trim().is_empty() {
            content.push(ContentBlock::Text { text: self.text });
        }
        for (index, call) in self.tool_calls.into_iter().enumerate() {
            if call.name.trim().is_empty() {
                continue;
            }
            let id = if call.id.trim().is_empty() {
                format!("stream_call_{}", index + 1)
            } else {
                call.id
            };
            content.push(ContentBlock::ToolCall {
                id,
                name: call.name,
                arguments: parse_tool_call_arguments(&call.arguments),
            });
        }

        ChatResponse {
            message: assistant_message(content),
            finish_reason: self.finish_reason,
            usage: self.usage,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiResponsesResponse {
    status: Option<String>,
    output: Option<Vec<OpenAiResponsesOutputItem>>,
    output_text: Option<String>,
    usage: Option<OpenAiResponsesUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponsesOutputItem {
    #[serde(rename = "type")]
    item_type: Option<String>,
    id: Option<String>,
    name: Option<String>,
    call_id: Option<String>,
    arguments: Option<String>,
    content: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponsesUsage {
    input_tokens: Option<u64>,
    output_tokens: Option<u64>,
    total_tokens: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoiceMessage {
    content: Option<Value>,
    tool_calls: Option<Vec<OpenAiToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenAiToolCall {
    id: String,
    #[serde(rename = "type")]
    call_type: String,
    function: OpenAiFunctionCall,
}

#[derive(Debug, Deserialize)]
struct OpenAiFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u64,
    completion_tokens: u64,
    total_tokens: u64,
}

impl From<OpenAiUsage> for ChatUsage {
    fn from(usage: OpenAiUsage) -> Self {
        Self {
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChunk {
    choices: Vec<OpenAiStreamChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChoice {
    delta: Option<OpenAiStreamDelta>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamDelta {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAiStreamToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamToolCallDelta {
    index: usize,
    id: Option<String>,
    function: Option<OpenAiStreamFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamFunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}
