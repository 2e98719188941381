mod bootstrap_helpers;
mod observability_loggers;
mod runtime_errors;
mod runtime_loop;
mod session_commands;
mod startup_config;

use std::{
    io::Write,
    path::Path,
    process::ExitCode,
    sync::{Arc, Mutex},
};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use concierge_agent_core::AgentError;
use concierge_ai::{LlmClient, OpenAiClient};
use concierge_cli::Cli;
use concierge_fixtures::FixtureCatalog;
use concierge_orchestrator::{
    render_lifecycle_line, Coordinator, CoordinatorSettings, LifecycleRecord, LifecycleSink,
};
use concierge_session::{generate_session_id, SessionLocks, SessionStore};
use serde_json::{json, Value};

pub(crate) use crate::bootstrap_helpers::init_tracing;
pub(crate) use crate::observability_loggers::{
    ConsoleLifecycleSink, FanoutLifecycleSink, JsonlEventLog,
};
pub(crate) use crate::runtime_errors::{format_error, AssistantError};
pub(crate) use crate::runtime_loop::{run_interactive, run_single_query, AssistantRuntime};
pub(crate) use crate::session_commands::{open_session_store, write_session_listing};
pub(crate) use crate::startup_config::{
    build_openai_config, resolve_turn_limits, validate_required_environment,
};

async fn run_cli(cli: Cli, api_key: String) -> Result<ExitCode> {
    if cli.list_sessions {
        let mut stdout = std::io::stdout();
        write_session_listing(&mut stdout, &cli.db_path)?;
        return Ok(ExitCode::SUCCESS);
    }

    let catalog = match &cli.fixtures_dir {
        Some(dir) => FixtureCatalog::load_dir(dir),
        None => FixtureCatalog::embedded(),
    }
    .map_err(|error| AssistantError::Configuration(error.to_string()))?;

    let event_log = cli
        .event_log
        .clone()
        .map(JsonlEventLog::open)
        .transpose()?
        .map(Arc::new);
    let mut sinks: Vec<Arc<dyn LifecycleSink>> = vec![Arc::new(ConsoleLifecycleSink)];
    if let Some(log) = &event_log {
        sinks.push(log.clone());
    }
    let lifecycle: Arc<dyn LifecycleSink> = Arc::new(FanoutLifecycleSink::new(sinks));

    let client: Arc<dyn LlmClient> = Arc::new(
        OpenAiClient::new(build_openai_config(&cli, api_key))
            .map_err(|error| AssistantError::Configuration(error.to_string()))?,
    );
    let settings = CoordinatorSettings {
        model: cli.model.clone(),
        turn_limits: resolve_turn_limits(&cli),
        ..CoordinatorSettings::default()
    };
    let coordinator = Coordinator::new(client, Arc::new(catalog), lifecycle, settings);

    let session_id = cli.session_id.clone().unwrap_or_else(generate_session_id);
    let store = match open_session_store(&cli, &session_id) {
        Ok(store) => store,
        Err(error) => {
            eprintln!("Session error: {error:#}");
            return Ok(ExitCode::FAILURE);
        }
    };
    if cli.clear_session {
        if let Err(error) = store.clear() {
            eprintln!("Session error: {error:#}");
        } else {
            println!("Session '{session_id}' cleared.");
        }
    }

    let runtime = AssistantRuntime::new(coordinator, store, SessionLocks::new(), event_log);
    match &cli.query {
        Some(query) => run_single_query(&runtime, query).await,
        None => {
            run_interactive(&runtime).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let api_key = match validate_required_environment(&cli) {
        Ok(key) => key,
        Err(error) => {
            eprintln!("{error}");
            return Ok(ExitCode::FAILURE);
        }
    };
    run_cli(cli, api_key).await
}
