//! Application layer - Use cases and port interfaces
//!
//! Contains the recording session controller, the chunk producer and
//! upload pipeline it drives, and the trait definitions for external
//! system interactions.

pub mod chunk_producer;
pub mod events;
pub mod ports;
pub mod recording_session;
pub mod upload_pipeline;

// Re-export use cases
pub use chunk_producer::{ChunkProducer, ChunkSink};
pub use events::{EventSink, SessionEvent};
pub use recording_session::{
    CommandOutcome, ControllerConfig, ControllerError, RecordingSessionController, SessionSummary,
};
pub use upload_pipeline::{DrainReport, UploadPipeline};
