use std::path::PathBuf;

use clap::{ArgAction, Parser};

pub const DEFAULT_MODEL: &str = "gpt-4";

fn parse_positive_usize(value: &str) -> Result<usize, String> {
    let parsed = value
        .trim()
        .parse::<usize>()
        .map_err(|error| format!("failed to parse integer: {error}"))?;
    if parsed == 0 {
        return Err("value must be greater than 0".to_string());
    }
    Ok(parsed)
}

/// `true`, `1` and `yes` (any case) enable a flag; every other value disables it.
pub fn parse_truthy_flag(value: &str) -> Result<bool, String> {
    Ok(matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes"
    ))
}

#[derive(Debug, Parser)]
#[command(
    name = "concierge-assistant",
    about = "Family personal assistant: activities, recipes, restaurants and day plans",
    version
)]
pub struct Cli {
    #[arg(
        short = 'q',
        long,
        help = "Answer a single query and exit instead of starting the interactive session"
    )]
    pub query: Option<String>,

    #[arg(
        short = 's',
        long = "session-id",
        help = "Session to resume or create; defaults to a timestamp-derived id"
    )]
    pub session_id: Option<String>,

    #[arg(long = "clear-session", help = "Clear the session history before starting")]
    pub clear_session: bool,

    #[arg(
        long = "list-sessions",
        help = "List the sessions stored in the database and exit"
    )]
    pub list_sessions: bool,

    #[arg(
        long = "db-path",
        default_value = "conversation_history.db",
        help = "SQLite file holding persistent session history"
    )]
    pub db_path: PathBuf,

    #[arg(
        long = "in-memory",
        help = "Keep history in memory only; nothing is written to disk"
    )]
    pub in_memory: bool,

    #[arg(
        long,
        env = "MODEL",
        default_value = DEFAULT_MODEL,
        help = "Model used by the coordinator and every specialist"
    )]
    pub model: String,

    #[arg(long, help = "Enable debug logging on stderr")]
    pub debug: bool,

    #[arg(
        long = "fixtures-dir",
        env = "CONCIERGE_FIXTURES_DIR",
        help = "Directory with activities.json, recipes.json, restaurants.json and locations.json; the built-in catalog is used when unset"
    )]
    pub fixtures_dir: Option<PathBuf>,

    #[arg(
        long = "event-log",
        help = "Append agent lifecycle events as JSON lines to this file"
    )]
    pub event_log: Option<PathBuf>,

    #[arg(
        long = "openai-api-key",
        env = "OPENAI_API_KEY",
        hide_env_values = true,
        help = "API key for the OpenAI-compatible endpoint"
    )]
    pub openai_api_key: Option<String>,

    #[arg(
        long = "openai-org-id",
        env = "OPENAI_ORG_ID",
        help = "Optional organization id sent with every request"
    )]
    pub openai_org_id: Option<String>,

    #[arg(
        long = "openai-base-url",
        env = "OPENAI_BASE_URL",
        help = "Alternate base URL for the OpenAI-compatible endpoint"
    )]
    pub openai_base_url: Option<String>,

    #[arg(
        long = "use-chat-completions",
        env = "USE_CHAT_COMPLETIONS",
        default_value_t = false,
        action = ArgAction::Set,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        value_parser = parse_truthy_flag,
        help = "Call the Chat Completions API instead of the Responses API"
    )]
    pub use_chat_completions: bool,

    #[arg(
        long = "request-timeout-ms",
        env = "CONCIERGE_REQUEST_TIMEOUT_MS",
        default_value_t = 120_000,
        help = "Timeout for one model HTTP request"
    )]
    pub request_timeout_ms: u64,

    #[arg(
        long = "request-max-retries",
        env = "CONCIERGE_REQUEST_MAX_RETRIES",
        default_value_t = 2,
        help = "Transport retries for retryable model HTTP failures"
    )]
    pub request_max_retries: usize,

    #[arg(
        long = "max-turns",
        env = "MAX_TURNS",
        value_parser = parse_positive_usize,
        help = "Max model round-trips per turn for every specialist"
    )]
    pub max_turns: Option<usize>,

    #[arg(
        long = "activity-max-turns",
        env = "ACTIVITY_MAX_TURNS",
        value_parser = parse_positive_usize,
        help = "Max round-trips for the activity specialist"
    )]
    pub activity_max_turns: Option<usize>,

    #[arg(
        long = "culinary-max-turns",
        env = "CULINARY_MAX_TURNS",
        value_parser = parse_positive_usize,
        help = "Max round-trips for the culinary specialist"
    )]
    pub culinary_max_turns: Option<usize>,

    #[arg(
        long = "foodie-max-turns",
        env = "FOODIE_MAX_TURNS",
        value_parser = parse_positive_usize,
        help = "Max round-trips for the restaurant specialist"
    )]
    pub foodie_max_turns: Option<usize>,

    #[arg(
        long = "planner-max-turns",
        env = "PLANNER_MAX_TURNS",
        value_parser = parse_positive_usize,
        help = "Max round-trips for the planner specialist"
    )]
    pub planner_max_turns: Option<usize>,

    #[arg(
        long = "coordinator-max-turns",
        env = "COORDINATOR_MAX_TURNS",
        value_parser = parse_positive_usize,
        help = "Max round-trips for the coordinator"
    )]
    pub coordinator_max_turns: Option<usize>,
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{parse_positive_usize, parse_truthy_flag, Cli};

    #[test]
    fn truthy_flag_accepts_the_documented_spellings() {
        for value in ["true", "TRUE", "1", "yes", " Yes "] {
            assert_eq!(parse_truthy_flag(value), Ok(true), "{value}");
        }
        for value in ["false", "0", "no", "", "on"] {
            assert_eq!(parse_truthy_flag(value), Ok(false), "{value}");
        }
    }

    #[test]
    fn turn_ceilings_must_be_positive() {
        assert_eq!(parse_positive_usize("7"), Ok(7));
        assert!(parse_positive_usize("0").is_err());
        assert!(parse_positive_usize("many").is_err());
    }

    #[test]
    fn parses_single_shot_flags() {
        let cli = Cli::try_parse_from([
            "concierge-assistant",
            "-q",
            "Plan Saturday",
            "-s",
            "family",
            "--clear-session",
            "--db-path",
            "/tmp/history.db",
            "--planner-max-turns",
            "9",
        ])
        .expect("parse");
        assert_eq!(cli.query.as_deref(), Some("Plan Saturday"));
        assert_eq!(cli.session_id.as_deref(), Some("family"));
        assert!(cli.clear_session);
        assert_eq!(cli.db_path.to_str(), Some("/tmp/history.db"));
        assert_eq!(cli.planner_max_turns, Some(9));
        assert!(!cli.in_memory);
    }

    #[test]
    fn chat_completions_switch_works_bare_and_with_value() {
        let bare =
            Cli::try_parse_from(["concierge-assistant", "--use-chat-completions"]).expect("parse");
        assert!(bare.use_chat_completions);
        let explicit = Cli::try_parse_from(["concierge-assistant", "--use-chat-completions=no"])
            .expect("parse");
        assert!(!explicit.use_chat_completions);
    }

    #[test]
    fn rejects_zero_turn_ceiling() {
        assert!(Cli::try_parse_from(["concierge-assistant", "--max-turns", "0"]).is_err());
    }
}
