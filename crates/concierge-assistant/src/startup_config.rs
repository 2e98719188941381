//! Startup configuration: required environment, turn ceilings and the model client config.
use super::*;

use concierge_ai::{OpenAiApiMode, OpenAiConfig};
use concierge_orchestrator::TurnLimits;

const REQUIRED_ENVIRONMENT: &[&str] = &["OPENAI_API_KEY"];

/// Returns the API key, or the configuration error naming every missing variable.
pub(crate) fn validate_required_environment(cli: &Cli) -> Result<String, AssistantError> {
    let key = cli
        .openai_api_key
        .as_deref()
        .map(str::trim)
        .filter(|key| !key.is_empty());
    match key {
        Some(key) => Ok(key.to_string()),
        None => Err(AssistantError::Configuration(format!(
            "Missing required environment variables: {}",
            REQUIRED_ENVIRONMENT.join(", ")
        ))),
    }
}

/// Per-role flag, then `--max-turns`, then the built-in default. The coordinator ignores
/// `--max-turns`.
pub(crate) fn resolve_turn_limits(cli: &Cli) -> TurnLimits {
    let defaults = TurnLimits::default();
    let specialist =
        |role: Option<usize>, fallback: usize| role.or(cli.max_turns).unwrap_or(fallback);
    TurnLimits {
        activity: specialist(cli.activity_max_turns, defaults.activity),
        culinary: specialist(cli.culinary_max_turns, defaults.culinary),
        foodie: specialist(cli.foodie_max_turns, defaults.foodie),
        planner: specialist(cli.planner_max_turns, defaults.planner),
        coordinator: cli.coordinator_max_turns.unwrap_or(defaults.coordinator),
    }
}

pub(crate) fn build_openai_config(cli: &Cli, api_key: String) -> OpenAiConfig {
    let mut config = OpenAiConfig::new(api_key);
    if let Some(base) = cli
        .openai_base_url
        .as_deref()
        .map(str::trim)
        .filter(|base| !base.is_empty())
    {
        config.api_base = base.to_string();
    }
    config.organization = cli
        .openai_org_id
        .as_deref()
        .map(str::trim)
        .filter(|org| !org.is_empty())
        .map(str::to_string);
    config.request_timeout_ms = cli.request_timeout_ms.max(1);
    config.max_retries = cli.request_max_retries;
    config.api_mode = if cli.use_chat_completions {
        OpenAiApiMode::ChatCompletions
    } else {
        OpenAiApiMode::Responses
    };
    config
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use concierge_ai::{OpenAiApiMode, DEFAULT_OPENAI_API_BASE};
    use concierge_cli::Cli;

    use super::{build_openai_config, resolve_turn_limits, validate_required_environment};

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["concierge-assistant"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).expect("parse cli")
    }

    #[test]
    fn blank_api_key_is_a_configuration_error() {
        let cli = parse(&["--openai-api-key", "   "]);
        let error = validate_required_environment(&cli).expect_err("blank key");
        assert_eq!(
            error.to_string(),
            "Missing required environment variables: OPENAI_API_KEY"
        );
        assert_eq!(error.error_type(), "ConfigurationError");

        let cli = parse(&["--openai-api-key", "sk-test"]);
        assert_eq!(validate_required_environment(&cli).expect("key"), "sk-test");
    }

    #[test]
    fn role_ceiling_beats_global_ceiling_and_coordinator_keeps_its_own() {
        let cli = parse(&["--max-turns", "3", "--planner-max-turns", "8"]);
        let limits = resolve_turn_limits(&cli);
        assert_eq!(limits.activity, 3);
        assert_eq!(limits.culinary, 3);
        assert_eq!(limits.foodie, 3);
        assert_eq!(limits.planner, 8);
        assert_eq!(limits.coordinator, 20);

        let cli = parse(&["--coordinator-max-turns", "4"]);
        let limits = resolve_turn_limits(&cli);
        assert_eq!(limits.activity, 5);
        assert_eq!(limits.coordinator, 4);
    }

    #[test]
    fn openai_config_follows_flags() {
        let cli = parse(&[
            "--openai-base-url",
            "http://localhost:9000/v1",
            "--openai-org-id",
            "org-family",
            "--use-chat-completions",
            "--request-max-retries",
            "0",
        ]);
        let config = build_openai_config(&cli, "sk-test".to_string());
        assert_eq!(config.api_base, "http://localhost:9000/v1");
        assert_eq!(config.organization.as_deref(), Some("org-family"));
        assert_eq!(config.api_mode, OpenAiApiMode::ChatCompletions);
        assert_eq!(config.max_retries, 0);

        let responses = build_openai_config(
            &parse(&["--use-chat-completions=false", "--openai-base-url", " "]),
            "sk-test".to_string(),
        );
        assert_eq!(responses.api_base, DEFAULT_OPENAI_API_BASE);
        assert_eq!(responses.api_mode, OpenAiApiMode::Responses);
    }
}
