//! Application runners: interactive recording and service access

use std::env;
use std::io::BufRead;
use std::process::ExitCode;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::application::ports::{ConfigStore, CredentialError, NoticeKind, Notifier, ServiceError};
use crate::application::{
    CommandOutcome, ControllerConfig, ControllerError, RecordingSessionController, SessionEvent,
    SessionSummary,
};
use crate::domain::config::AppConfig;
use crate::domain::error::DurationParseError;
use crate::domain::recording::Duration;
use crate::infrastructure::{
    create_notifier, CpalCapture, HttpSessionService, StoredCredential, XdgConfigStore,
};

use super::args::RecordOptions;
use super::presenter::Presenter;

/// Exit codes
pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_ERROR: u8 = 1;
pub const EXIT_USAGE_ERROR: u8 = 2;

/// Environment overrides
pub const ENV_API_URL: &str = "SESSION_RECORDER_API_URL";
pub const ENV_TOKEN: &str = "SESSION_RECORDER_TOKEN";

const KEY_HINT: &str = "Type p + Enter to pause, r to resume, s to stop (Ctrl+C also stops)";

/// Errors raised while wiring up a command
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid {key}: {message}")]
    Usage { key: &'static str, message: String },

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl AppError {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Usage { .. } => EXIT_USAGE_ERROR,
            _ => EXIT_ERROR,
        }
    }
}

/// Interactive input during a recording
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCommand {
    Pause,
    Resume,
    Stop,
    Help,
}

/// Map one line of stdin to a command. Blank lines are ignored.
pub fn parse_command(line: &str) -> Option<KeyCommand> {
    match line.trim().to_lowercase().as_str() {
        "" => None,
        "p" | "pause" => Some(KeyCommand::Pause),
        "r" | "resume" => Some(KeyCommand::Resume),
        "s" | "stop" | "q" | "quit" => Some(KeyCommand::Stop),
        _ => Some(KeyCommand::Help),
    }
}

/// Load and merge configuration from file, env, and CLI
pub async fn load_merged_config(cli_config: AppConfig) -> AppConfig {
    let store = XdgConfigStore::new();
    let file_config = match store.load().await {
        Ok(config) => config,
        Err(e) => {
            warn!(error = %e, "ignoring unreadable config file");
            AppConfig::empty()
        }
    };

    let env_config = AppConfig {
        api_url: env::var(ENV_API_URL).ok().filter(|s| !s.is_empty()),
        token: env::var(ENV_TOKEN).ok().filter(|s| !s.trim().is_empty()),
        ..Default::default()
    };

    // Merge: defaults < file < env < cli
    AppConfig::defaults()
        .merge(file_config)
        .merge(env_config)
        .merge(cli_config)
}

/// Resolve the options for `record`, rejecting unparseable durations
pub fn record_options(config: &AppConfig) -> Result<RecordOptions, AppError> {
    let cadence = parse_duration("cadence", config.cadence.as_deref(), Duration::default_cadence())?;
    let request_timeout = parse_duration(
        "request_timeout",
        config.request_timeout.as_deref(),
        Duration::default_request_timeout(),
    )?;
    let drain_timeout = parse_duration(
        "drain_timeout",
        config.drain_timeout.as_deref(),
        Duration::default_drain_timeout(),
    )?;

    let controller = ControllerConfig {
        cadence,
        drain_timeout,
        ..ControllerConfig::from(config)
    };

    Ok(RecordOptions {
        api_url: config.api_url_or_default(),
        token: config.token.clone(),
        request_timeout,
        notify: config.notify_or_default(),
        controller,
    })
}

fn parse_duration(
    key: &'static str,
    value: Option<&str>,
    default: Duration,
) -> Result<Duration, AppError> {
    let Some(value) = value else {
        return Ok(default);
    };
    let duration: Duration = value.parse().map_err(|e: DurationParseError| AppError::Usage {
        key,
        message: e.to_string(),
    })?;
    if duration.as_millis() == 0 {
        return Err(AppError::Usage {
            key,
            message: "must be greater than zero".to_string(),
        });
    }
    Ok(duration)
}

/// Build the HTTP client with the stored credential
pub fn connect(
    api_url: &str,
    token: Option<String>,
    timeout: Duration,
) -> Result<HttpSessionService<StoredCredential>, AppError> {
    let credentials = StoredCredential::load(StoredCredential::default_path(), token)?;
    Ok(HttpSessionService::new(api_url, Arc::new(credentials), timeout)?)
}

/// Run an interactive recording session until stopped
pub async fn run_record(options: RecordOptions) -> ExitCode {
    let mut presenter = Presenter::new();

    let service = match connect(&options.api_url, options.token.clone(), options.request_timeout) {
        Ok(service) => service,
        Err(e) => {
            presenter.error(&e.to_string());
            return ExitCode::from(e.exit_code());
        }
    };
    if options.token.is_none() && !StoredCredential::default_path().exists() {
        presenter.warn("No token configured. Run 'session-recorder auth set-token <TOKEN>' if the service requires one");
    }
    debug!(api_url = %service.base_url(), "using recording service");

    let notifier = create_notifier(options.notify);
    let (controller, mut events) = RecordingSessionController::new(
        Arc::new(CpalCapture::new()),
        Arc::new(service),
        options.controller.clone(),
    );

    presenter.start_spinner("Starting recording...");
    if let Err(e) = controller.start().await {
        presenter.spinner_fail(&e.to_string());
        notify(&notifier, NoticeKind::Failed, &e.to_string()).await;
        return ExitCode::from(EXIT_ERROR);
    }
    let session_id = controller
        .session()
        .await
        .map(|s| s.id().to_string())
        .unwrap_or_default();
    presenter.spinner_success(&format!("Recording session {} started", session_id));
    presenter.info(KEY_HINT);
    notify(&notifier, NoticeKind::Started, &session_id).await;

    let mut commands = spawn_command_sources();
    loop {
        tokio::select! {
            Some(event) = events.recv() => report_event(&presenter, &notifier, &event).await,
            command = commands.recv() => match command.unwrap_or(KeyCommand::Stop) {
                KeyCommand::Pause => {
                    let outcome = controller.pause().await;
                    report_command(&presenter, &notifier, outcome, NoticeKind::Paused).await;
                }
                KeyCommand::Resume => {
                    let outcome = controller.resume().await;
                    report_command(&presenter, &notifier, outcome, NoticeKind::Resumed).await;
                }
                KeyCommand::Help => presenter.info(KEY_HINT),
                KeyCommand::Stop => break,
            },
        }
    }

    presenter.start_spinner("Finishing recording...");
    let stopped = controller.stop().await;
    while let Ok(event) = events.try_recv() {
        report_event(&presenter, &notifier, &event).await;
    }
    let summary = controller.summary().await;

    let code = match stopped {
        Ok(_) => {
            presenter.spinner_success(&format!("Recording finished: {}", describe(&summary)));
            notify(&notifier, NoticeKind::Finished, &describe(&summary)).await;
            EXIT_SUCCESS
        }
        Err(e) => {
            presenter.spinner_fail(&e.to_string());
            notify(&notifier, NoticeKind::Failed, &e.to_string()).await;
            EXIT_ERROR
        }
    };

    if !summary.failed.is_empty() {
        presenter.warn(&format!(
            "Chunks not uploaded: {}",
            join_indices(&summary.failed)
        ));
    }
    match summary.session.as_ref().and_then(|s| s.transcription()) {
        Some(text) => presenter.output(text),
        None if code == EXIT_SUCCESS => presenter.info("No transcription available yet"),
        None => {}
    }

    ExitCode::from(code)
}

/// Stdin lines and Ctrl+C, funneled into one queue.
///
/// Stdin is read on a plain thread so a pending read never holds up
/// runtime shutdown.
fn spawn_command_sources() -> mpsc::UnboundedReceiver<KeyCommand> {
    let (tx, rx) = mpsc::unbounded_channel();

    let stdin_tx = tx.clone();
    let spawned = std::thread::Builder::new()
        .name("stdin-commands".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if let Some(command) = parse_command(&line) {
                    if stdin_tx.send(command).is_err() {
                        break;
                    }
                }
            }
            debug!("stdin closed");
        });
    if let Err(e) = spawned {
        warn!(error = %e, "failed to read commands from stdin");
    }

    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if tx.send(KeyCommand::Stop).is_err() {
                break;
            }
        }
    });

    rx
}

async fn report_command<N: Notifier>(
    presenter: &Presenter,
    notifier: &N,
    outcome: Result<CommandOutcome, ControllerError>,
    kind: NoticeKind,
) {
    match outcome {
        Ok(CommandOutcome::Applied) => {
            presenter.status(kind.summary());
            notify(notifier, kind, "").await;
        }
        Ok(CommandOutcome::Ignored { state }) => {
            presenter.warn(&format!("Ignored while {}", state));
        }
        Err(e) => {
            presenter.warn(&e.to_string());
            notify(notifier, NoticeKind::Problem, &e.to_string()).await;
        }
    }
}

/// Print chunk failures; command failures are reported by their caller
async fn report_event<N: Notifier>(presenter: &Presenter, notifier: &N, event: &SessionEvent) {
    match event {
        SessionEvent::ChunkUploadFailed { .. } => {
            if let Some(error) = ControllerError::from_event(event) {
                presenter.warn(&error.to_string());
                notify(notifier, NoticeKind::Problem, &error.to_string()).await;
            }
        }
        other => debug!(event = ?other, "session event"),
    }
}

async fn notify<N: Notifier>(notifier: &N, kind: NoticeKind, body: &str) {
    if let Err(e) = notifier.notify(kind, body).await {
        debug!(error = %e, "notification not shown");
    }
}

fn describe(summary: &SessionSummary) -> String {
    format!(
        "{} chunks, {} uploaded, {} failed",
        summary.chunks_produced,
        summary.confirmed.len(),
        summary.failed.len()
    )
}

fn join_indices(indices: &[u64]) -> String {
    indices
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
