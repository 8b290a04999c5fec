//! Port interfaces (traits) for external systems
//!
//! These traits define the boundaries between the application
//! and infrastructure layers.

pub mod capture;
pub mod config;
pub mod credentials;
pub mod notifier;
pub mod session_service;

// Re-export common types
pub use capture::{CaptureConstraints, CaptureError, CaptureSource};
pub use config::ConfigStore;
pub use credentials::{CredentialError, CredentialProvider};
pub use notifier::{NoticeKind, NotificationError, Notifier};
pub use session_service::{ServiceError, SessionService};
