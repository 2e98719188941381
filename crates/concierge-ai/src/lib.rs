//! Hosted language-model client surface shared by every agent in the assistant.
mod openai;
mod retry;
mod types;

pub use openai::{OpenAiApiMode, OpenAiClient, OpenAiConfig, DEFAULT_OPENAI_API_BASE};
pub use types::{
    AiError, ChatRequest, ChatResponse, ChatUsage, ContentBlock, LlmClient, Message, MessageRole,
    StreamDeltaHandler, ToolCall, ToolChoice, ToolDefinition,
};
