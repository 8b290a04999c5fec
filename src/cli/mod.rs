//! CLI layer - Command-line interface
//!
//! Contains argument parsing, output formatting, the interactive
//! recording runner and the sessions, auth and config subcommands.

pub mod app;
pub mod args;
pub mod auth_cmd;
pub mod config_cmd;
pub mod presenter;
pub mod sessions_cmd;

// Re-export commonly used types
pub use app::{run_record, AppError, EXIT_ERROR, EXIT_SUCCESS, EXIT_USAGE_ERROR};
pub use args::{AuthAction, Cli, Commands, ConfigAction, RecordArgs, RecordOptions, SessionsAction};
pub use presenter::Presenter;
