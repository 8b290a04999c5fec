//! Config command handler

use crate::application::ports::ConfigStore;
use crate::domain::config::{AppConfig, CaptureConfig};
use crate::domain::error::ConfigError;
use crate::domain::recording::Duration;

use super::args::{is_valid_config_key, ConfigAction, VALID_CONFIG_KEYS};
use super::presenter::Presenter;

/// Handle config subcommand
pub async fn handle_config_command<S: ConfigStore>(
    action: ConfigAction,
    store: &S,
    presenter: &Presenter,
) -> Result<(), ConfigError> {
    match action {
        ConfigAction::Init => handle_init(store, presenter).await,
        ConfigAction::Set { key, value } => handle_set(store, presenter, &key, &value).await,
        ConfigAction::Get { key } => handle_get(store, presenter, &key).await,
        ConfigAction::List => handle_list(store, presenter).await,
        ConfigAction::Path => handle_path(store, presenter),
    }
}

async fn handle_init<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    store.init().await?;
    presenter.success(&format!(
        "Config file created at: {}",
        store.path().display()
    ));
    Ok(())
}

async fn handle_set<S: ConfigStore>(
    store: &S,
    presenter: &Presenter,
    key: &str,
    value: &str,
) -> Result<(), ConfigError> {
    ensure_known_key(key)?;
    validate_config_value(key, value)?;

    let mut config = store.load().await?;
    apply_value(&mut config, key, value)?;
    store.save(&config).await?;

    let shown = if key == "token" {
        mask_token(value)
    } else {
        value.to_string()
    };
    presenter.success(&format!("{} = {}", key, shown));
    Ok(())
}

async fn handle_get<S: ConfigStore>(
    store: &S,
    presenter: &Presenter,
    key: &str,
) -> Result<(), ConfigError> {
    ensure_known_key(key)?;
    let config = store.load().await?;
    presenter.output(&display_value(&config, key).unwrap_or_else(|| "(not set)".to_string()));
    Ok(())
}

async fn handle_list<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    let config = store.load().await?;
    for key in VALID_CONFIG_KEYS {
        presenter.key_value(
            key,
            &display_value(&config, key).unwrap_or_else(|| "(not set)".to_string()),
        );
    }
    Ok(())
}

fn handle_path<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    presenter.output(&store.path().to_string_lossy());
    Ok(())
}

fn ensure_known_key(key: &str) -> Result<(), ConfigError> {
    if is_valid_config_key(key) {
        return Ok(());
    }
    Err(ConfigError::ValidationError {
        key: key.to_string(),
        message: format!("Unknown key. Valid keys: {}", VALID_CONFIG_KEYS.join(", ")),
    })
}

/// Write an already validated value into `config`
fn apply_value(config: &mut AppConfig, key: &str, value: &str) -> Result<(), ConfigError> {
    match key {
        "api_url" => config.api_url = Some(value.trim_end_matches('/').to_string()),
        "token" => config.token = Some(value.trim().to_string()),
        "cadence" => config.cadence = Some(value.to_string()),
        "request_timeout" => config.request_timeout = Some(value.to_string()),
        "drain_timeout" => config.drain_timeout = Some(value.to_string()),
        "flush_on_stop" => config.flush_on_stop = Some(bool_value(key, value)?),
        "notify" => config.notify = Some(bool_value(key, value)?),
        "capture.echo_cancellation" => {
            config
                .capture
                .get_or_insert_with(CaptureConfig::default)
                .echo_cancellation = Some(bool_value(key, value)?);
        }
        "capture.noise_suppression" => {
            config
                .capture
                .get_or_insert_with(CaptureConfig::default)
                .noise_suppression = Some(bool_value(key, value)?);
        }
        _ => return ensure_known_key(key),
    }
    Ok(())
}

/// Stored value as shown to the user; the token is masked
fn display_value(config: &AppConfig, key: &str) -> Option<String> {
    let capture = config.capture.as_ref();
    match key {
        "api_url" => config.api_url.clone(),
        "token" => config.token.as_deref().map(mask_token),
        "cadence" => config.cadence.clone(),
        "request_timeout" => config.request_timeout.clone(),
        "drain_timeout" => config.drain_timeout.clone(),
        "flush_on_stop" => config.flush_on_stop.map(|b| b.to_string()),
        "notify" => config.notify.map(|b| b.to_string()),
        "capture.echo_cancellation" => capture
            .and_then(|c| c.echo_cancellation)
            .map(|b| b.to_string()),
        "capture.noise_suppression" => capture
            .and_then(|c| c.noise_suppression)
            .map(|b| b.to_string()),
        _ => None,
    }
}

const BOOL_HINT: &str = "Value must be 'true' or 'false'";

/// Reject values the record command could not use
fn validate_config_value(key: &str, value: &str) -> Result<(), ConfigError> {
    let problem = match key {
        "cadence" | "request_timeout" | "drain_timeout" => match value.parse::<Duration>() {
            Ok(d) if d.as_millis() == 0 => Some("Duration must be greater than zero".to_string()),
            Ok(_) => None,
            Err(e) => Some(e.to_string()),
        },
        "api_url" if !(value.starts_with("http://") || value.starts_with("https://")) => {
            Some(format!("Invalid URL '{value}'. Expected http:// or https://"))
        }
        "token" if value.trim().is_empty() => Some("Token must not be empty".to_string()),
        "flush_on_stop" | "notify" | "capture.echo_cancellation" | "capture.noise_suppression" => {
            parse_bool(value)
                .is_none()
                .then(|| BOOL_HINT.to_string())
        }
        _ => None,
    };

    match problem {
        Some(message) => Err(ConfigError::ValidationError {
            key: key.to_string(),
            message,
        }),
        None => Ok(()),
    }
}

fn bool_value(key: &str, value: &str) -> Result<bool, ConfigError> {
    parse_bool(value).ok_or_else(|| ConfigError::ValidationError {
        key: key.to_string(),
        message: BOOL_HINT.to_string(),
    })
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// Mask a token for display (first 4 and last 4 chars)
pub(crate) fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bool_values() {
        assert_eq!(parse_bool("true"), Some(true));
        assert_eq!(parse_bool("No"), Some(false));
        assert_eq!(parse_bool("on"), Some(true));
        assert_eq!(parse_bool("maybe"), None);
    }

    #[test]
    fn mask_token_long_and_short() {
        assert_eq!(mask_token("abcdefghijklmnop"), "abcd...mnop");
        assert_eq!(mask_token("short"), "*****");
    }

    #[test]
    fn validate_durations() {
        assert!(validate_config_value("cadence", "10s").is_ok());
        assert!(validate_config_value("drain_timeout", "1m").is_ok());
        assert!(validate_config_value("request_timeout", "soon").is_err());
        assert!(validate_config_value("cadence", "0s").is_err());
    }

    #[test]
    fn validate_api_url_scheme() {
        assert!(validate_config_value("api_url", "https://rec.example.com").is_ok());
        assert!(validate_config_value("api_url", "rec.example.com").is_err());
    }

    #[test]
    fn validate_booleans() {
        assert!(validate_config_value("capture.noise_suppression", "false").is_ok());
        assert!(validate_config_value("flush_on_stop", "sometimes").is_err());
    }

    #[test]
    fn apply_nested_capture_key_creates_section() {
        let mut config = AppConfig::empty();
        apply_value(&mut config, "capture.echo_cancellation", "false").unwrap();
        let capture = config.capture.unwrap();
        assert_eq!(capture.echo_cancellation, Some(false));
        assert_eq!(capture.noise_suppression, None);
    }

    #[test]
    fn display_masks_token() {
        let mut config = AppConfig::empty();
        apply_value(&mut config, "token", "  0123456789abcdef ").unwrap();
        assert_eq!(display_value(&config, "token").as_deref(), Some("0123...cdef"));
        assert_eq!(display_value(&config, "cadence"), None);
    }

    #[test]
    fn unknown_key_is_rejected() {
        let err = ensure_known_key("api_key").unwrap_err();
        assert!(err.to_string().contains("api_key"));
    }
}
