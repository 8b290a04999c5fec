//! CLI argument definitions using Clap

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::application::ControllerConfig;
use crate::domain::recording::Duration;

/// Session Recorder - record audio in timed chunks and stream it to a
/// recording service
#[derive(Parser, Debug)]
#[command(name = "session-recorder")]
#[command(version)]
#[command(about = "Record microphone audio in timed chunks and upload them to a recording service")]
#[command(long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short = 'v', long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start an interactive recording session
    Record(RecordArgs),
    /// Browse recordings stored by the service
    Sessions {
        #[command(subcommand)]
        action: SessionsAction,
    },
    /// Manage the service bearer token
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Flags for `record`
#[derive(Args, Debug, Default)]
pub struct RecordArgs {
    /// Chunk cadence (e.g., 10s, 500ms, 1m)
    #[arg(short = 'c', long, value_name = "TIME")]
    pub cadence: Option<String>,

    /// Show desktop notifications
    #[arg(short = 'n', long)]
    pub notify: bool,

    /// Base URL of the recording service
    #[arg(long, value_name = "URL")]
    pub api_url: Option<String>,
}

/// Session browsing actions
#[derive(Subcommand, Debug)]
pub enum SessionsAction {
    /// List all recordings, newest first
    List,
    /// Show one recording and its transcription
    Show {
        /// Recording id
        id: String,
    },
}

/// Credential actions
#[derive(Subcommand, Debug)]
pub enum AuthAction {
    /// Store a bearer token in the credential file
    SetToken {
        /// Token issued by the service
        token: String,
    },
    /// Delete the stored token
    Clear,
    /// Show where the active token comes from
    Status,
}

/// Config action subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Create config file with defaults
    Init,
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// Config value
        value: String,
    },
    /// Get a config value
    Get {
        /// Config key
        key: String,
    },
    /// List all config values
    List,
    /// Show config file path
    Path,
}

/// Parsed record options
#[derive(Debug, Clone)]
pub struct RecordOptions {
    pub api_url: String,
    pub token: Option<String>,
    pub request_timeout: Duration,
    pub notify: bool,
    pub controller: ControllerConfig,
}

/// Valid config keys
pub const VALID_CONFIG_KEYS: &[&str] = &[
    "api_url",
    "token",
    "cadence",
    "request_timeout",
    "drain_timeout",
    "flush_on_stop",
    "notify",
    "capture.echo_cancellation",
    "capture.noise_suppression",
];

/// Check if a config key is valid
pub fn is_valid_config_key(key: &str) -> bool {
    VALID_CONFIG_KEYS.contains(&key)
}
