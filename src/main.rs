//! Session Recorder CLI entry point

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use session_recorder::application::ports::CredentialProvider;
use session_recorder::cli::{
    app::{connect, load_merged_config, record_options, run_record, EXIT_ERROR},
    args::{Cli, Commands, RecordArgs},
    auth_cmd::handle_auth_command,
    config_cmd::handle_config_command,
    presenter::Presenter,
    sessions_cmd::handle_sessions_command,
};
use session_recorder::domain::config::AppConfig;
use session_recorder::infrastructure::{StoredCredential, XdgConfigStore};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let presenter = Presenter::new();

    match cli.command {
        Commands::Config { action } => {
            let store = XdgConfigStore::new();
            if let Err(e) = handle_config_command(action, &store, &presenter).await {
                presenter.error(&e.to_string());
                return ExitCode::from(EXIT_ERROR);
            }
            ExitCode::SUCCESS
        }
        Commands::Auth { action } => {
            let config = load_merged_config(AppConfig::empty()).await;
            let path = StoredCredential::default_path();
            if let Err(e) = handle_auth_command(action, &path, config.token, &presenter) {
                presenter.error(&e.to_string());
                return ExitCode::from(EXIT_ERROR);
            }
            ExitCode::SUCCESS
        }
        Commands::Sessions { action } => {
            let config = load_merged_config(AppConfig::empty()).await;
            let options = match record_options(&config) {
                Ok(options) => options,
                Err(e) => {
                    presenter.error(&e.to_string());
                    return ExitCode::from(e.exit_code());
                }
            };
            let service = match connect(&options.api_url, options.token, options.request_timeout) {
                Ok(service) => service,
                Err(e) => {
                    presenter.error(&e.to_string());
                    return ExitCode::from(e.exit_code());
                }
            };
            if let Err(e) = handle_sessions_command(action, &service, &presenter).await {
                presenter.error(&e.to_string());
                if service.credentials().bearer_token().is_none() {
                    presenter.info("Set a token with 'session-recorder auth set-token <TOKEN>'");
                }
                return ExitCode::from(EXIT_ERROR);
            }
            ExitCode::SUCCESS
        }
        Commands::Record(args) => {
            let config = load_merged_config(cli_config(args)).await;
            match record_options(&config) {
                Ok(options) => run_record(options).await,
                Err(e) => {
                    presenter.error(&e.to_string());
                    ExitCode::from(e.exit_code())
                }
            }
        }
    }
}

/// Config layer contributed by `record` flags
fn cli_config(args: RecordArgs) -> AppConfig {
    AppConfig {
        api_url: args.api_url,
        cadence: args.cadence,
        notify: if args.notify { Some(true) } else { None },
        ..Default::default()
    }
}

/// Diagnostics go to stderr. `RUST_LOG` wins over `-v`.
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
