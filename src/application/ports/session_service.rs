//! Remote session service port

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::recording::AudioData;
use crate::domain::session::{Session, SessionId};

/// Errors from the remote recording service
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    #[error("Not authorized. Set a token with `session-recorder auth set-token`.")]
    Unauthorized,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Service error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse service response: {0}")]
    ParseError(String),
}

/// Port for the backend that stores sessions and assembles chunks
#[async_trait]
pub trait SessionService: Send + Sync {
    /// Create a new session; the service assigns the id
    async fn create_session(&self) -> Result<Session, ServiceError>;

    /// Upload one chunk with its sequence index
    async fn upload_chunk(
        &self,
        id: &SessionId,
        sequence_index: u64,
        audio: &AudioData,
    ) -> Result<(), ServiceError>;

    /// Tell the service the session is paused. Response body is ignored.
    async fn pause_session(&self, id: &SessionId) -> Result<(), ServiceError>;

    /// Ask the service to assemble and finalize the session
    async fn finish_session(&self, id: &SessionId) -> Result<(), ServiceError>;

    async fn get_session(&self, id: &SessionId) -> Result<Session, ServiceError>;

    /// All sessions, in the order the service returns them
    async fn list_sessions(&self) -> Result<Vec<Session>, ServiceError>;
}
