use super::*;

use std::io::IsTerminal;

use concierge_agent_core::text_fragment_channel;
use concierge_session::{items_from_messages, messages_from_items};
use rustyline::{error::ReadlineError, history::DefaultHistory, Config as ReadlineConfig, Editor};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    task::JoinHandle,
};

const REPL_PROMPT: &str = " > ";
const SECTION_RULE_WIDTH: usize = 50;
const INVALID_INPUT_MESSAGE: &str =
    "I couldn't read that line because it isn't valid UTF-8 text. Please try again.";

enum InteractiveLoopControl {
    Continue,
    Exit,
}

pub(crate) struct TurnOutput {
    pub(crate) text: String,
    /// Whether any fragment already reached stdout while the turn ran.
    pub(crate) streamed: bool,
}

pub(crate) struct AssistantRuntime {
    coordinator: Coordinator,
    store: Arc<dyn SessionStore>,
    locks: SessionLocks,
    event_log: Option<Arc<JsonlEventLog>>,
}

fn spawn_stream_printer() -> (concierge_ai::StreamDeltaHandler, JoinHandle<bool>) {
    let (handler, mut fragments) = text_fragment_channel();
    let printer = tokio::spawn(async move {
        let mut printed = false;
        while let Some(delta) = fragments.next().await {
            if delta.is_empty() {
                continue;
            }
            print!("{delta}");
            let _ = std::io::stdout().flush();
            printed = true;
        }
        printed
    });
    (handler, printer)
}

impl AssistantRuntime {
    pub(crate) fn new(
        coordinator: Coordinator,
        store: Arc<dyn SessionStore>,
        locks: SessionLocks,
        event_log: Option<Arc<JsonlEventLog>>,
    ) -> Self {
        Self {
            coordinator,
            store,
            locks,
            event_log,
        }
    }

    pub(crate) fn session_id(&self) -> &str {
        self.store.session_id()
    }

    pub(crate) fn message_count(&self) -> Result<usize, AssistantError> {
        self.store.count().map_err(AssistantError::Session)
    }

    /// Runs one coordinator turn under the session lock. The turn's items are committed only when
    /// the turn succeeds.
    pub(crate) async fn run_turn(
        &self,
        input: &str,
        stream: bool,
    ) -> Result<TurnOutput, AssistantError> {
        let _guard = self.locks.acquire(self.session_id()).await;
        let history = self.store.get_items(None).map_err(AssistantError::Session)?;

        let (on_delta, printer) = if stream {
            let (handler, printer) = spawn_stream_printer();
            (Some(handler), Some(printer))
        } else {
            (None, None)
        };
        let outcome = self
            .coordinator
            .respond(messages_from_items(&history), input, on_delta)
            .await;
        let streamed = match printer {
            Some(printer) => printer.await.unwrap_or(false),
            None => false,
        };

        let turn = outcome?;
        self.store
            .add_items(&items_from_messages(&turn.new_messages))
            .map_err(AssistantError::Session)?;
        tracing::debug!(
            session_id = self.session_id(),
            items = turn.new_messages.len(),
            "turn committed"
        );
        Ok(TurnOutput {
            text: turn.final_text,
            streamed,
        })
    }

    pub(crate) async fn clear_session(&self) -> Result<(), AssistantError> {
        let _guard = self.locks.acquire(self.session_id()).await;
        self.store.clear().map_err(AssistantError::Session)
    }

    fn report_turn_error(&self, error: &AssistantError) {
        if let Some(log) = &self.event_log {
            if let Err(log_error) = log.log_turn_error(self.session_id(), error) {
                tracing::warn!(error = %log_error, "failed to record turn error");
            }
        }
        match error {
            AssistantError::Session(_) => println!("Session error: {error}"),
            _ => println!("\nI encountered an issue processing your request: {error}\n"),
        }
    }
}

fn print_welcome_banner(runtime: &AssistantRuntime) {
    println!("Personal Assistant Multi-Agent System");
    println!("====================================");
    match runtime.message_count() {
        Ok(count) => {
            let persistence = if runtime.store.is_persistent() {
                " - persistent"
            } else {
                ""
            };
            println!(
                "Session: {} ({count} messages{persistence})",
                runtime.session_id()
            );
        }
        Err(error) => println!("Session error: {error}"),
    }
    println!("Type your questions or requests. Type 'exit', 'quit', or Ctrl-D to end the session.");
    println!("Special commands: '/clear' to clear session history.");
    println!();
}

async fn dispatch_interactive_turn(
    runtime: &AssistantRuntime,
    input: &str,
) -> Result<InteractiveLoopControl> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(InteractiveLoopControl::Continue);
    }
    if trimmed.eq_ignore_ascii_case("exit") || trimmed.eq_ignore_ascii_case("quit") {
        return Ok(InteractiveLoopControl::Exit);
    }
    if trimmed == "/clear" {
        match runtime.clear_session().await {
            Ok(()) => println!("\nSession cleared.\n"),
            Err(error) => println!("Session error: {error}"),
        }
        return Ok(InteractiveLoopControl::Continue);
    }

    match runtime.run_turn(trimmed, true).await {
        Ok(output) => {
            if output.streamed {
                println!();
            } else {
                println!("{}", output.text);
            }
            println!();
        }
        Err(error) => runtime.report_turn_error(&error),
    }
    std::io::stdout()
        .flush()
        .context("failed to flush stdout")?;
    Ok(InteractiveLoopControl::Continue)
}

pub(crate) async fn run_interactive(runtime: &AssistantRuntime) -> Result<()> {
    print_welcome_banner(runtime);
    if std::io::stdin().is_terminal() && std::io::stdout().is_terminal() {
        run_interactive_tty(runtime).await
    } else {
        run_interactive_stdin(runtime).await
    }
}

async fn run_interactive_stdin(runtime: &AssistantRuntime) -> Result<()> {
    let mut stdin = BufReader::new(tokio::io::stdin());
    let mut buffer = Vec::new();

    loop {
        print!("{REPL_PROMPT}");
        std::io::stdout()
            .flush()
            .context("failed to flush stdout")?;

        buffer.clear();
        let read = stdin
            .read_until(b'\n', &mut buffer)
            .await
            .context("failed to read interactive input")?;
        if read == 0 {
            break;
        }
        let Ok(line) = std::str::from_utf8(&buffer) else {
            println!("\n{INVALID_INPUT_MESSAGE}\n");
            continue;
        };

        match dispatch_interactive_turn(runtime, line).await? {
            InteractiveLoopControl::Continue => continue,
            InteractiveLoopControl::Exit => break,
        }
    }

    Ok(())
}

async fn run_interactive_tty(runtime: &AssistantRuntime) -> Result<()> {
    let mut editor = Editor::<(), DefaultHistory>::with_config(ReadlineConfig::builder().build())
        .context("failed to initialize interactive editor")?;

    loop {
        let readline = tokio::task::block_in_place(|| editor.readline(REPL_PROMPT));
        let line = match readline {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(error) => return Err(anyhow!("failed to read interactive input: {error}")),
        };
        if line.trim().is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(line.as_str());

        match dispatch_interactive_turn(runtime, &line).await? {
            InteractiveLoopControl::Continue => continue,
            InteractiveLoopControl::Exit => break,
        }
    }

    Ok(())
}

/// `--query` mode. A failed turn exits nonzero.
pub(crate) async fn run_single_query(runtime: &AssistantRuntime, query: &str) -> Result<ExitCode> {
    let rule = "=".repeat(SECTION_RULE_WIDTH);
    println!("Personal Assistant");
    match runtime.message_count() {
        Ok(count) => println!("Session: {} ({count} messages)", runtime.session_id()),
        Err(error) => println!("Session error: {error}"),
    }
    println!("Query: {query}");
    println!("{rule}");

    match runtime.run_turn(query, false).await {
        Ok(output) => {
            println!("Final Answer:");
            println!("{}", output.text);
            println!("{rule}");
            Ok(ExitCode::SUCCESS)
        }
        Err(error) => {
            runtime.report_turn_error(&error);
            Ok(ExitCode::FAILURE)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::VecDeque, sync::Arc};

    use async_trait::async_trait;
    use concierge_ai::{
        AiError, ChatRequest, ChatResponse, ChatUsage, LlmClient, Message, StreamDeltaHandler,
    };
    use concierge_fixtures::FixtureCatalog;
    use concierge_orchestrator::{Coordinator, CoordinatorSettings, NoopLifecycleSink};
    use concierge_session::{InMemorySessionStore, ItemRole, SessionLocks, SessionStore};
    use tokio::sync::Mutex as AsyncMutex;

    use super::AssistantRuntime;
    use crate::AssistantError;

    struct QueuedClient {
        replies: AsyncMutex<VecDeque<Result<String, String>>>,
    }

    #[async_trait]
    impl LlmClient for QueuedClient {
        async fn complete(&self, _request: ChatRequest) -> Result<ChatResponse, AiError> {
            match self.replies.lock().await.pop_front() {
                Some(Ok(text)) => Ok(ChatResponse {
                    message: Message::assistant_text(text),
                    finish_reason: Some("stop".to_string()),
                    usage: ChatUsage::default(),
                }),
                Some(Err(reason)) => Err(AiError::InvalidResponse(reason)),
                None => Err(AiError::InvalidResponse("no queued reply".to_string())),
            }
        }

        async fn complete_with_stream(
            &self,
            request: ChatRequest,
            on_delta: Option<StreamDeltaHandler>,
        ) -> Result<ChatResponse, AiError> {
            let response = self.complete(request).await?;
            if let Some(handler) = on_delta {
                handler(response.message.text_content());
            }
            Ok(response)
        }
    }

    fn runtime(
        replies: Vec<Result<String, String>>,
    ) -> (AssistantRuntime, Arc<InMemorySessionStore>) {
        let client = Arc::new(QueuedClient {
            replies: AsyncMutex::new(replies.into()),
        });
        let coordinator = Coordinator::new(
            client,
            Arc::new(FixtureCatalog::embedded().expect("fixtures")),
            Arc::new(NoopLifecycleSink),
            CoordinatorSettings::default(),
        );
        let store = Arc::new(InMemorySessionStore::new("family"));
        let runtime = AssistantRuntime::new(coordinator, store.clone(), SessionLocks::new(), None);
        (runtime, store)
    }

    #[tokio::test]
    async fn successful_turn_commits_user_and_assistant_items() {
        let (runtime, store) = runtime(vec![Ok("Try the zoo.".to_string())]);
        let output = runtime.run_turn("Ideas for today?", false).await.expect("turn");
        assert_eq!(output.text, "Try the zoo.");
        assert!(!output.streamed);

        let items = store.get_items(None).expect("items");
        let roles: Vec<ItemRole> = items.iter().map(|item| item.role).collect();
        assert_eq!(roles, vec![ItemRole::User, ItemRole::Assistant]);
        assert_eq!(items[0].content.as_deref(), Some("Ideas for today?"));
    }

    #[tokio::test]
    async fn failed_turn_leaves_history_untouched() {
        let (runtime, store) = runtime(vec![Err("upstream timeout".to_string())]);
        let error = runtime
            .run_turn("Ideas for today?", false)
            .await
            .err()
            .expect("turn fails");
        assert!(matches!(error, AssistantError::Agent(_)));
        assert_eq!(store.count().expect("count"), 0);
    }

    #[tokio::test]
    async fn streamed_turn_reports_printed_fragments() {
        let (runtime, _store) = runtime(vec![Ok("Park time.".to_string())]);
        let output = runtime.run_turn("Now?", true).await.expect("turn");
        assert!(output.streamed);
        assert_eq!(output.text, "Park time.");
    }

    #[tokio::test]
    async fn clear_empties_the_session_and_is_idempotent() {
        let (runtime, store) = runtime(vec![Ok("Sure.".to_string())]);
        runtime.run_turn("Remember the zoo", false).await.expect("turn");
        assert_eq!(runtime.message_count().expect("count"), 2);

        runtime.clear_session().await.expect("clear");
        runtime.clear_session().await.expect("clear again");
        assert_eq!(store.count().expect("count"), 0);
    }
}
