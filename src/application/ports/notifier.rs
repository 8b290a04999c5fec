//! Desktop notice port

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum NotificationError {
    #[error("Failed to show notification: {0}")]
    SendFailed(String),
}

/// What a notice reports about the recording
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Started,
    Paused,
    Resumed,
    Finished,
    /// Something went wrong but the recording continues
    Problem,
    /// The recording could not start or finish
    Failed,
}

impl NoticeKind {
    /// Notice headline
    pub const fn summary(&self) -> &'static str {
        match self {
            Self::Started => "Recording started",
            Self::Paused => "Recording paused",
            Self::Resumed => "Recording resumed",
            Self::Finished => "Recording finished",
            Self::Problem => "Recording problem",
            Self::Failed => "Recording failed",
        }
    }

    /// Freedesktop icon name
    pub const fn icon_name(&self) -> &'static str {
        match self {
            Self::Started | Self::Resumed => "audio-input-microphone",
            Self::Paused => "media-playback-pause",
            Self::Finished => "dialog-ok",
            Self::Problem => "dialog-warning",
            Self::Failed => "dialog-error",
        }
    }
}

/// Port for desktop notices
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Show a notice of `kind`; `body` may be empty
    async fn notify(&self, kind: NoticeKind, body: &str) -> Result<(), NotificationError>;
}

#[async_trait]
impl Notifier for Box<dyn Notifier> {
    async fn notify(&self, kind: NoticeKind, body: &str) -> Result<(), NotificationError> {
        self.as_ref().notify(kind, body).await
    }
}
