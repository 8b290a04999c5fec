//! Domain layer - Core business logic
//!
//! Contains value objects, entities, the controller lifecycle state machine,
//! and domain errors. This layer has no dependencies on external systems.

pub mod chunk;
pub mod config;
pub mod error;
pub mod recording;
pub mod session;

// Re-export common types
pub use chunk::{Chunk, ChunkLedger, ChunkSequencer, UploadState};
pub use config::AppConfig;
pub use error::*;
pub use recording::{AudioData, AudioMimeType, Duration};
pub use session::{
    InvalidStateTransition, Lifecycle, LifecycleState, Session, SessionId, SessionStatus,
    Transition,
};
