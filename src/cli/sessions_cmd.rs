//! Sessions command handler

use crate::application::ports::{ServiceError, SessionService};
use crate::domain::session::SessionId;

use super::args::SessionsAction;
use super::presenter::Presenter;

/// Handle sessions subcommand
pub async fn handle_sessions_command<S: SessionService + ?Sized>(
    action: SessionsAction,
    service: &S,
    presenter: &Presenter,
) -> Result<(), ServiceError> {
    match action {
        SessionsAction::List => {
            let mut sessions = service.list_sessions().await?;
            if sessions.is_empty() {
                presenter.info("No recordings yet");
                return Ok(());
            }
            sessions.sort_by_key(|s| std::cmp::Reverse(s.created_at()));
            for session in &sessions {
                presenter.session_row(session);
            }
            Ok(())
        }
        SessionsAction::Show { id } => {
            let session = service.get_session(&SessionId::new(id)).await?;
            presenter.session_detail(&session);
            Ok(())
        }
    }
}
