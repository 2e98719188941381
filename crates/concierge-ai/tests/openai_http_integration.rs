use concierge_ai::{
    AiError, ChatRequest, LlmClient, Message, OpenAiApiMode, OpenAiClient, OpenAiConfig,
    ToolChoice, ToolDefinition,
};
use httpmock::prelude::*;
use serde_json::json;
use std::sync::{Arc, Mutex};

fn config_for(server: &MockServer, api_mode: OpenAiApiMode) -> OpenAiConfig {
    OpenAiConfig {
        api_base: format!("{}/v1", server.base_url()),
        api_key: "test-openai-key".to_string(),
        organization: None,
        request_timeout_ms: 5_000,
        max_retries: 2,
        retry_budget_ms: 0,
        retry_jitter: false,
        api_mode,
    }
}

fn dispatch_request() -> ChatRequest {
    ChatRequest {
        model: "gpt-4".to_string(),
        messages: vec![
            Message::system("Coordinate the specialists."),
            Message::user("Find a museum for Saturday"),
        ],
        tools: vec![ToolDefinition {
            name: "get_activity_suggestions".to_string(),
            description: "Ask the activity specialist".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {"query": {"type": "string"}},
                "required": ["query"]
            }),
        }],
        tool_choice: Some(ToolChoice::Auto),
        parallel_tool_calls: Some(true),
        max_tokens: Some(128),
        temperature: Some(0.0),
    }
}

#[tokio::test]
async fn responses_mode_posts_function_tools_and_parses_calls() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/responses")
            .header("authorization", "Bearer test-openai-key")
            .header("x-concierge-retry-attempt", "0")
            .json_body_includes(
                json!({
                    "model": "gpt-4",
                    "parallel_tool_calls": true,
                    "tool_choice": "auto"
                })
                .to_string(),
            );
        then.status(200).json_body(json!({
            "status": "completed",
            "output": [{
                "type": "function_call",
                "call_id": "call_1",
                "name": "get_activity_suggestions",
                "arguments": "{\"query\":\"museum\"}"
            }],
            "usage": {"input_tokens": 20, "output_tokens": 6, "total_tokens": 26}
        }));
    });

    let client = OpenAiClient::new(config_for(&server, OpenAiApiMode::Responses))
        .expect("client should be created");
    let response = client
        .complete(dispatch_request())
        .await
        .expect("completion should succeed");

    mock.assert();
    let calls = response.message.tool_calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].name, "get_activity_suggestions");
    assert_eq!(calls[0].arguments, json!({ "query": "museum" }));
    assert_eq!(response.usage.total_tokens, 26);
}

#[tokio::test]
async fn chat_completions_mode_sends_organization_header() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/chat/completions")
            .header("authorization", "Bearer test-openai-key")
            .header("openai-organization", "org-family")
            .json_body_includes(json!({ "max_tokens": 128 }).to_string());
        then.status(200).json_body(json!({
            "choices": [{
                "message": {"content": "The Tech Interactive is a good pick."},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 8, "total_tokens": 20}
        }));
    });

    let mut config = config_for(&server, OpenAiApiMode::ChatCompletions);
    config.organization = Some("org-family".to_string());
    let client = OpenAiClient::new(config).expect("client should be created");
    let response = client
        .complete(dispatch_request())
        .await
        .expect("completion should succeed");

    mock.assert();
    assert_eq!(
        response.message.text_content(),
        "The Tech Interactive is a good pick."
    );
    assert_eq!(response.finish_reason.as_deref(), Some("stop"));
}

#[tokio::test]
async fn retries_service_unavailable_then_succeeds() {
    let server = MockServer::start();
    let first = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/responses")
            .header("x-concierge-retry-attempt", "0");
        then.status(503).body("overloaded");
    });
    let second = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/responses")
            .header("x-concierge-retry-attempt", "1");
        then.status(200).json_body(json!({
            "status": "completed",
            "output_text": "ok after retry"
        }));
    });

    let client = OpenAiClient::new(config_for(&server, OpenAiApiMode::Responses))
        .expect("client should be created");
    let response = client
        .complete(ChatRequest {
            model: "gpt-4".to_string(),
            messages: vec![Message::user("hello")],
            tools: vec![],
            tool_choice: None,
            parallel_tool_calls: None,
            max_tokens: None,
            temperature: None,
        })
        .await
        .expect("retry should eventually succeed");

    first.assert_calls(1);
    second.assert_calls(1);
    assert_eq!(response.message.text_content(), "ok after retry");
}

#[tokio::test]
async fn surfaces_non_retryable_status_without_retrying() {
    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST).path("/v1/chat/completions");
        then.status(401).body("unauthorized");
    });

    let client = OpenAiClient::new(config_for(&server, OpenAiApiMode::ChatCompletions))
        .expect("client should be created");
    let error = client
        .complete(dispatch_request())
        .await
        .expect_err("401 should fail");

    mock.assert_calls(1);
    match error {
        AiError::HttpStatus { status, body } => {
            assert_eq!(status, 401);
            assert_eq!(body, "unauthorized");
        }
        other => panic!("expected HttpStatus error, got {other:?}"),
    }
}

#[tokio::test]
async fn chat_completions_mode_streams_text_deltas() {
    let server = MockServer::start();
    let stream = server.mock(|when, then| {
        when.method(POST)
            .path("/v1/chat/completions")
            .json_body_includes(json!({ "stream": true }).to_string());
        then.status(200)
            .header("content-type", "text/event-stream")
            .body(concat!(
                "data: {\"choices\":[{\"delta\":{\"content\":\"Sunny\"}}]}\n\n",
                "data: {\"choices\":[{\"delta\":{\"content\":\"vale\"},\"finish_reason\":\"stop\"}],\"usage\":{\"prompt_tokens\":3,\"completion_tokens\":2,\"total_tokens\":5}}\n\n",
                "data: [DONE]\n\n"
            ));
    });

    let client = OpenAiClient::new(config_for(&server, OpenAiApiMode::ChatCompletions))
        .expect("client should be created");
    let deltas = Arc::new(Mutex::new(String::new()));
    let delta_sink = deltas.clone();
    let sink = Arc::new(move |delta: String| {
        delta_sink.lock().expect("delta lock").push_str(&delta);
    });

    let response = client
        .complete_with_stream(
            ChatRequest {
                model: "gpt-4".to_string(),
                messages: vec![Message::user("where?")],
                tools: vec![],
                tool_choice: None,
                parallel_tool_calls: None,
                max_tokens: None,
                temperature: None,
            },
            Some(sink),
        )
        .await
        .expect("streaming completion should succeed");

    stream.assert_calls(1);
    assert_eq!(deltas.lock().expect("delta lock").as_str(), "Sunnyvale");
    assert_eq!(response.message.text_content(), "Sunnyvale");
    assert_eq!(response.usage.total_tokens, 5);
}

#[test]
fn rejects_blank_api_key() {
    let error = OpenAiClient::new(OpenAiConfig::new("   ")).expect_err("blank key must fail");
    assert!(matches!(error, AiError::MissingApiKey));
}
