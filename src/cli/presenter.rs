//! CLI presenter for output formatting

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};

use crate::domain::session::{Session, SessionStatus};

const NOT_SET: &str = "(not set)";

/// Presenter for CLI output formatting
pub struct Presenter {
    spinner: Option<ProgressBar>,
}

impl Presenter {
    pub fn new() -> Self {
        Self { spinner: None }
    }

    /// Start a spinner with message
    pub fn start_spinner(&mut self, message: &str) {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        spinner.set_style(style);
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        self.spinner = Some(spinner);
    }

    /// Mark spinner as success and finish
    pub fn spinner_success(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_with_message(format!("{} {}", "✓".green(), message));
        }
    }

    /// Mark spinner as failed and finish
    pub fn spinner_fail(&mut self, message: &str) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_with_message(format!("{} {}", "✗".red(), message));
        }
    }

    /// Print info message to stderr
    pub fn info(&self, message: &str) {
        self.eprint(format!("{} {}", "ℹ".cyan(), message));
    }

    /// Print success message to stderr
    pub fn success(&self, message: &str) {
        self.eprint(format!("{} {}", "✓".green(), message));
    }

    /// Print warning message to stderr
    pub fn warn(&self, message: &str) {
        self.eprint(format!("{} {}", "⚠".yellow(), message));
    }

    /// Print error message to stderr
    pub fn error(&self, message: &str) {
        self.eprint(format!("{} {}", "✗".red(), message));
    }

    /// Print a recording state marker
    pub fn status(&self, state: &str) {
        self.eprint(format!("{} {}", "●".cyan(), state));
    }

    /// Output text to stdout (transcriptions, config values)
    pub fn output(&self, text: &str) {
        println!("{}", text);
    }

    /// Print a key-value pair (for config list and session details)
    pub fn key_value(&self, key: &str, value: &str) {
        println!("{}: {}", key.cyan(), value);
    }

    /// One line per session in `sessions list`
    pub fn session_row(&self, session: &Session) {
        println!("{}", format_session_row(session));
    }

    /// Full rendering for `sessions show`
    pub fn session_detail(&self, session: &Session) {
        self.key_value("id", session.id().as_str());
        self.key_value("status", &colored_status(session.status()));
        self.key_value("created", &session.created_at().to_rfc3339());
        self.key_value(
            "updated",
            &session
                .updated_at()
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| NOT_SET.to_string()),
        );
        self.key_value("audio", session.audio_file_path().unwrap_or(NOT_SET));
        match session.transcription() {
            Some(text) => {
                println!();
                self.output(text);
            }
            None => self.key_value("transcription", NOT_SET),
        }
    }

    // Messages printed while the spinner ticks would be overdrawn
    fn eprint(&self, line: String) {
        match &self.spinner {
            Some(spinner) => spinner.suspend(|| eprintln!("{}", line)),
            None => eprintln!("{}", line),
        }
    }
}

impl Default for Presenter {
    fn default() -> Self {
        Self::new()
    }
}

fn colored_status(status: SessionStatus) -> String {
    let label = status.to_string();
    match status {
        SessionStatus::Active => label.green().to_string(),
        SessionStatus::Paused => label.yellow().to_string(),
        SessionStatus::Ended => label.dimmed().to_string(),
        SessionStatus::Created => label,
    }
}

fn format_session_row(session: &Session) -> String {
    let excerpt = session
        .transcription()
        .map(|text| preview(text, 48))
        .unwrap_or_default();
    format!(
        "{:<38} {:<8} {}  {}",
        session.id().as_str(),
        session.status().as_str(),
        session.created_at().format("%Y-%m-%d %H:%M"),
        excerpt
    )
    .trim_end()
    .to_string()
}

/// First `max` characters of the first line, with an ellipsis if cut
fn preview(text: &str, max: usize) -> String {
    let line = text.lines().next().unwrap_or_default().trim();
    if line.chars().count() <= max && !text.trim().contains('\n') {
        return line.to_string();
    }
    let cut: String = line.chars().take(max).collect();
    format!("{}…", cut.trim_end())
}
