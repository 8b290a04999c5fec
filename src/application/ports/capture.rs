//! Capture source port

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::recording::AudioData;

/// Microphone acquisition and capture errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CaptureError {
    #[error("Microphone access was denied: {0}")]
    PermissionDenied(String),

    #[error("No usable audio input device: {0}")]
    DeviceUnavailable(String),

    #[error("Audio capture failed: {0}")]
    CaptureFailed(String),
}

/// Processing requested from the platform when the microphone is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConstraints {
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
}

impl Default for CaptureConstraints {
    fn default() -> Self {
        Self {
            echo_cancellation: true,
            noise_suppression: true,
        }
    }
}

/// Port for a live microphone stream.
///
/// Audio accumulates between calls to [`CaptureSource::take_segment`];
/// each call hands back everything buffered since the previous one.
#[async_trait]
pub trait CaptureSource: Send + Sync {
    /// Open the device. Fails fast, no retry.
    async fn acquire(&self, constraints: &CaptureConstraints) -> Result<(), CaptureError>;

    /// Stop buffering samples without closing the device
    fn suspend(&self);

    /// Continue buffering after [`CaptureSource::suspend`]
    fn resume(&self);

    /// Drain the buffer into one encoded segment.
    ///
    /// Returns `Ok(None)` when nothing was captured since the last call.
    async fn take_segment(&self) -> Result<Option<AudioData>, CaptureError>;

    /// Close the device. Safe to call when not acquired.
    fn release(&self);

    /// Whether the device is currently held
    fn is_active(&self) -> bool;
}
