//! Command-line and environment surface of the family assistant.

pub mod cli_args;

pub use cli_args::{parse_truthy_flag, Cli, DEFAULT_MODEL};
