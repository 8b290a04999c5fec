//! Notification infrastructure module

mod notify_rust;

pub use notify_rust::{DesktopNotifier, SilentNotifier, APP_NAME};

use crate::application::ports::Notifier;

/// Desktop notifier when `enabled`, otherwise one that does nothing
pub fn create_notifier(enabled: bool) -> Box<dyn Notifier> {
    if enabled {
        Box::new(DesktopNotifier)
    } else {
        Box::new(SilentNotifier)
    }
}
