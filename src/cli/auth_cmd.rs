//! Auth command handler

use std::path::Path;

use crate::application::ports::{CredentialError, CredentialProvider};
use crate::infrastructure::StoredCredential;

use super::args::AuthAction;
use super::config_cmd::mask_token;
use super::presenter::Presenter;

/// Handle auth subcommand.
///
/// `configured` is the token from the environment or config file, which
/// takes precedence over the credential file at `path`.
pub fn handle_auth_command(
    action: AuthAction,
    path: &Path,
    configured: Option<String>,
    presenter: &Presenter,
) -> Result<(), CredentialError> {
    match action {
        AuthAction::SetToken { token } => {
            StoredCredential::store(path, &token)?;
            presenter.success(&format!("Token saved to {}", path.display()));
            if configured.is_some() {
                presenter.warn("A token from the environment or config file takes precedence");
            }
            Ok(())
        }
        AuthAction::Clear => {
            if StoredCredential::clear(path)? {
                presenter.success("Stored token removed");
            } else {
                presenter.info("No stored token");
            }
            Ok(())
        }
        AuthAction::Status => {
            let from_config = configured.is_some();
            let credential = StoredCredential::load(path, configured)?;
            match credential.bearer_token() {
                Some(token) => {
                    let source = if from_config {
                        "environment or config file"
                    } else {
                        "credential file"
                    };
                    presenter.key_value("token", &mask_token(&token));
                    presenter.key_value("source", source);
                }
                None => presenter.key_value("token", "(not set)"),
            }
            presenter.key_value("credential_file", &path.to_string_lossy());
            Ok(())
        }
    }
}
