//! Infrastructure layer - Adapter implementations
//!
//! Contains concrete implementations of the port interfaces: cpal
//! microphone capture, the HTTP recording service, credential and
//! config files, and desktop notifications.

pub mod capture;
pub mod config;
pub mod credentials;
pub mod notification;
pub mod remote;

// Re-export adapters
pub use capture::CpalCapture;
pub use config::XdgConfigStore;
pub use credentials::StoredCredential;
pub use notification::{create_notifier, DesktopNotifier};
pub use remote::HttpSessionService;
