//! Desktop notices through notify-rust

use async_trait::async_trait;
use notify_rust::Notification;

use crate::application::ports::{NoticeKind, NotificationError, Notifier};

/// Application name shown by the notification server
pub const APP_NAME: &str = "Session Recorder";

/// Shows each notice as a desktop notification
#[derive(Debug, Default)]
pub struct DesktopNotifier;

impl DesktopNotifier {
    fn build(kind: NoticeKind, body: &str) -> Notification {
        let mut notification = Notification::new();
        notification
            .appname(APP_NAME)
            .summary(kind.summary())
            .icon(kind.icon_name());
        if !body.is_empty() {
            notification.body(body);
        }
        notification
    }
}

#[async_trait]
impl Notifier for DesktopNotifier {
    async fn notify(&self, kind: NoticeKind, body: &str) -> Result<(), NotificationError> {
        let notification = Self::build(kind, body);
        // show() blocks on the notification server
        tokio::task::spawn_blocking(move || notification.show().map(drop))
            .await
            .map_err(|e| NotificationError::SendFailed(e.to_string()))?
            .map_err(|e| NotificationError::SendFailed(e.to_string()))
    }
}

/// Used when notices are turned off
#[derive(Debug, Default)]
pub struct SilentNotifier;

#[async_trait]
impl Notifier for SilentNotifier {
    async fn notify(&self, _kind: NoticeKind, _body: &str) -> Result<(), NotificationError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notice_carries_kind_summary_and_body() {
        let notification = DesktopNotifier::build(NoticeKind::Problem, "Chunk 3 failed to upload");
        assert_eq!(notification.appname, APP_NAME);
        assert_eq!(notification.summary, "Recording problem");
        assert_eq!(notification.body, "Chunk 3 failed to upload");
        assert_eq!(notification.icon, "dialog-warning");
    }

    #[test]
    fn empty_body_is_left_out() {
        let notification = DesktopNotifier::build(NoticeKind::Started, "");
        assert!(notification.body.is_empty());
    }

    #[tokio::test]
    async fn silent_notifier_never_fails() {
        assert!(SilentNotifier.notify(NoticeKind::Failed, "boom").await.is_ok());
    }
}
