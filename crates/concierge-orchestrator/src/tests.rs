//! Coordinator and specialist round trips against a scripted model.
use std::{collections::VecDeque, sync::Arc};

use async_trait::async_trait;
use concierge_agent_core::{text_fragment_channel, AgentError, ToolUseBehavior};
use concierge_ai::{
    AiError, ChatRequest, ChatResponse, ChatUsage, ContentBlock, LlmClient, Message, MessageRole,
    StreamDeltaHandler,
};
use concierge_fixtures::FixtureCatalog;
use serde_json::{json, Value};
use tokio::sync::Mutex as AsyncMutex;

use super::{
    Coordinator, CoordinatorSettings, LifecycleAction, MemoryLifecycleSink, SpecialistAgent,
    SpecialistContext, SpecialistRole, TurnLimits,
};

enum Scripted {
    Reply(Message),
    Fail(String),
}

struct ScriptedClient {
    script: AsyncMutex<VecDeque<Scripted>>,
    requests: AsyncMutex<Vec<ChatRequest>>,
}

impl ScriptedClient {
    fn new(script: Vec<Scripted>) -> Arc<Self> {
        Arc::new(Self {
            script: AsyncMutex::new(script.into()),
            requests: AsyncMutex::new(Vec::new()),
        })
    }

    async fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedClient {
    async fn complete(&self, request: ChatRequest) -> Result<ChatResponse, AiError> {
        self.requests.lock().await.push(request);
        match self.script.lock().await.pop_front() {
            Some(Scripted::Reply(message)) => Ok(ChatResponse {
                message,
                finish_reason: Some("stop".to_string()),
                usage: ChatUsage::default(),
            }),
            Some(Scripted::Fail(reason)) => Err(AiError::InvalidResponse(reason)),
            None => Err(AiError::InvalidResponse("script exhausted".to_string())),
        }
    }

    async fn complete_with_stream(
        &self,
        request: ChatRequest,
        on_delta: Option<StreamDeltaHandler>,
    ) -> Result<ChatResponse, AiError> {
        let response = self.complete(request).await?;
        if let Some(handler) = on_delta {
            let text = response.message.text_content();
            for word in text.split_inclusive(' ') {
                handler(word.to_string());
            }
        }
        Ok(response)
    }
}

fn call(id: &str, name: &str, arguments: Value) -> Scripted {
    Scripted::Reply(Message::assistant_blocks(vec![ContentBlock::ToolCall {
        id: id.to_string(),
        name: name.to_string(),
        arguments,
    }]))
}

fn reply(text: &str) -> Scripted {
    Scripted::Reply(Message::assistant_text(text))
}

fn last_user_text(request: &ChatRequest) -> String {
    request
        .messages
        .iter()
        .rev()
        .find(|message| message.role == MessageRole::User)
        .map(Message::text_content)
        .unwrap_or_default()
}

fn coordinator(
    client: Arc<ScriptedClient>,
    sink: Arc<MemoryLifecycleSink>,
    settings: CoordinatorSettings,
) -> Coordinator {
    Coordinator::new(
        client,
        Arc::new(FixtureCatalog::embedded().expect("fixtures")),
        sink,
        settings,
    )
}

#[test]
fn coordinator_exposes_exactly_the_dispatch_tools() {
    let coordinator = coordinator(
        ScriptedClient::new(Vec::new()),
        Arc::new(MemoryLifecycleSink::new()),
        CoordinatorSettings::default(),
    );
    assert_eq!(
        coordinator.tool_names(),
        vec![
            "get_activity_suggestions",
            "get_recipe_suggestions",
            "get_restaurant_suggestions",
            "create_plan"
        ]
    );
}

#[tokio::test]
async fn coordinator_routes_to_activity_specialist_and_synthesizes() {
    let client = ScriptedClient::new(vec![
        call(
            "coord_1",
            "get_activity_suggestions",
            json!({ "query": "Something fun on Saturday", "age": 3, "indoor_preference": true }),
        ),
        call("act_1", "get_toddler_activities", json!({ "indoor": true })),
        reply("Children's Discovery Museum is a great pick."),
        reply("Head to the Children's Discovery Museum on Saturday."),
    ]);
    let sink = Arc::new(MemoryLifecycleSink::new());
    let coordinator = coordinator(client.clone(), sink.clone(), CoordinatorSettings::default());

    let turn = coordinator
        .respond(Vec::new(), "What can we do Saturday?", None)
        .await
        .expect("turn succeeds");

    assert_eq!(
        turn.final_text,
        "Head to the Children's Discovery Museum on Saturday."
    );
    assert_eq!(turn.new_messages[0].role, MessageRole::User);
    assert_eq!(turn.new_messages.len(), 4);
    let tool_result = &turn.new_messages[2];
    assert_eq!(tool_result.tool_call_id.as_deref(), Some("coord_1"));
    let payload: Value = serde_json::from_str(&tool_result.text_content()).expect("tool json");
    assert_eq!(payload["agent"], "Activity Suggestion Agent");
    assert_eq!(
        payload["content"],
        "Children's Discovery Museum is a great pick."
    );

    let requests = client.requests().await;
    assert_eq!(requests.len(), 4);
    assert_eq!(
        last_user_text(&requests[1]),
        "Something fun on Saturday for a 3-year-old indoors"
    );
    assert!(requests[1]
        .tools
        .iter()
        .any(|tool| tool.name == "get_toddler_activities"));

    let actions: Vec<LifecycleAction> = sink
        .records()
        .into_iter()
        .map(|record| record.action)
        .collect();
    assert!(actions.contains(&LifecycleAction::Handoff {
        to_agent: "Activity Suggestion Agent".to_string()
    }));
    assert!(actions.contains(&LifecycleAction::Complete));
}

#[tokio::test]
async fn specialist_failure_becomes_a_tool_error_and_the_turn_continues() {
    let client = ScriptedClient::new(vec![
        call(
            "coord_1",
            "get_restaurant_suggestions",
            json!({ "query": "dinner", "cuisine": "Korean" }),
        ),
        Scripted::Fail("upstream unavailable".to_string()),
        reply("Sorry, restaurant suggestions are unavailable right now."),
    ]);
    let coordinator = coordinator(
        client,
        Arc::new(MemoryLifecycleSink::new()),
        CoordinatorSettings::default(),
    );

    let turn = coordinator
        .respond(Vec::new(), "Where should we eat?", None)
        .await
        .expect("specialist failure is not fatal");

    let tool_result = &turn.new_messages[2];
    assert!(tool_result.is_error);
    assert!(tool_result
        .text_content()
        .contains("Error in Foodie Agent: invalid response: upstream unavailable"));
    assert_eq!(
        turn.final_text,
        "Sorry, restaurant suggestions are unavailable right now."
    );
}

#[tokio::test]
async fn create_plan_wraps_malformed_results_for_the_planner() {
    let client = ScriptedClient::new(vec![
        call(
            "coord_1",
            "create_plan",
            json!({
                "query": "Plan Saturday",
                "activity_results": "Park in the morning (not json)",
                "foodie_results": "{\"content\": \"Dish N Dash\", \"agent\": \"Foodie Agent\"}"
            }),
        ),
        reply("09:00 park, 12:00 lunch at Dish N Dash."),
        reply("Here is your Saturday plan."),
    ]);
    let coordinator = coordinator(
        client.clone(),
        Arc::new(MemoryLifecycleSink::new()),
        CoordinatorSettings::default(),
    );

    coordinator
        .respond(Vec::new(), "Plan my Saturday", None)
        .await
        .expect("turn succeeds");

    let requests = client.requests().await;
    let planner_input = last_user_text(&requests[1]);
    assert!(planner_input.contains("USER QUERY: Plan Saturday"));
    assert!(planner_input.contains("\"content\": \"Park in the morning (not json)\""));
    assert!(planner_input.contains("\"content\": \"Dish N Dash\""));
    assert!(planner_input.contains("CULINARY SUGGESTIONS: {}"));
}

#[tokio::test]
async fn history_is_replayed_before_the_new_input() {
    let client = ScriptedClient::new(vec![reply("You asked about the zoo.")]);
    let coordinator = coordinator(
        client.clone(),
        Arc::new(MemoryLifecycleSink::new()),
        CoordinatorSettings::default(),
    );
    let history = vec![
        Message::user("Is the zoo open?"),
        Message::assistant_text("Yes, from 10:00."),
    ];

    let turn = coordinator
        .respond(history, "What did I ask?", None)
        .await
        .expect("turn");

    assert_eq!(turn.new_messages.len(), 2);
    let request = &client.requests().await[0];
    let roles: Vec<MessageRole> = request.messages.iter().map(|message| message.role).collect();
    assert_eq!(
        roles,
        vec![
            MessageRole::System,
            MessageRole::User,
            MessageRole::Assistant,
            MessageRole::User
        ]
    );
}

#[tokio::test]
async fn coordinator_text_streams_through_the_fragment_channel() {
    let client = ScriptedClient::new(vec![reply("Enjoy the park today")]);
    let coordinator = coordinator(
        client,
        Arc::new(MemoryLifecycleSink::new()),
        CoordinatorSettings::default(),
    );
    let (handler, fragments) = text_fragment_channel();

    let turn = coordinator
        .respond(Vec::new(), "Any ideas?", Some(handler))
        .await
        .expect("turn");

    assert_eq!(fragments.collect_text().await, turn.final_text);
}

#[tokio::test]
async fn stop_on_first_tool_returns_specialist_output() {
    let client = ScriptedClient::new(vec![
        call("coord_1", "get_recipe_suggestions", json!({ "query": "dinner" })),
        reply("Make Tomato Egg Stir-Fry."),
    ]);
    let settings = CoordinatorSettings {
        tool_use_behavior: ToolUseBehavior::StopOnFirstTool,
        ..CoordinatorSettings::default()
    };
    let coordinator = coordinator(client, Arc::new(MemoryLifecycleSink::new()), settings);

    let turn = coordinator
        .respond(Vec::new(), "What's for dinner?", None)
        .await
        .expect("turn");
    let payload: Value = serde_json::from_str(&turn.final_text).expect("tool json");
    assert_eq!(payload["content"], "Make Tomato Egg Stir-Fry.");
}

#[tokio::test]
async fn specialist_exceeding_max_turns_is_fatal_for_that_run() {
    let client = ScriptedClient::new(vec![
        call("a", "get_favorite_recipes", json!({})),
        call("b", "get_favorite_recipes", json!({})),
    ]);
    let specialist = SpecialistAgent::new(
        SpecialistRole::Culinary,
        SpecialistContext {
            client,
            catalog: Arc::new(FixtureCatalog::embedded().expect("fixtures")),
            lifecycle: Arc::new(MemoryLifecycleSink::new()),
            model: "gpt-4".to_string(),
        },
        TurnLimits {
            culinary: 2,
            ..TurnLimits::default()
        }
        .for_role(SpecialistRole::Culinary),
    );

    let error = specialist.run("favorites?").await.expect_err("budget exhausted");
    assert!(matches!(error, AgentError::MaxTurnsExceeded(2)));
}
