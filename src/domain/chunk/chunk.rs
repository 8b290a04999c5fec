//! Chunk entity: one sequence-indexed slice of captured audio

use std::fmt;

use crate::domain::error::EmptyPayloadError;
use crate::domain::recording::AudioData;

/// Upload progress of a single chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum UploadState {
    #[default]
    Pending,
    InFlight,
    Confirmed,
    Failed,
}

impl UploadState {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InFlight => "in-flight",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
        }
    }

    /// Confirmed and failed chunks never change again
    pub const fn is_settled(&self) -> bool {
        matches!(self, Self::Confirmed | Self::Failed)
    }
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One slice of captured audio belonging to exactly one session.
///
/// The payload is held only until the chunk settles; confirmed and
/// failed chunks keep their index and size but no audio.
#[derive(Debug, Clone)]
pub struct Chunk {
    sequence_index: u64,
    payload: Option<AudioData>,
    size_bytes: usize,
    upload_state: UploadState,
}

impl Chunk {
    /// Create a pending chunk. Empty payloads are rejected.
    pub fn new(sequence_index: u64, payload: AudioData) -> Result<Self, EmptyPayloadError> {
        if payload.is_empty() {
            return Err(EmptyPayloadError { sequence_index });
        }
        Ok(Self {
            sequence_index,
            size_bytes: payload.size_bytes(),
            payload: Some(payload),
            upload_state: UploadState::Pending,
        })
    }

    pub fn sequence_index(&self) -> u64 {
        self.sequence_index
    }

    /// The audio, while the chunk is still pending or in flight
    pub fn payload(&self) -> Option<&AudioData> {
        self.payload.as_ref()
    }

    /// Payload size at production time
    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    pub fn upload_state(&self) -> UploadState {
        self.upload_state
    }

    /// PENDING -> IN_FLIGHT, handing out a shared view of the payload
    pub(crate) fn begin_upload(&mut self) -> Option<AudioData> {
        if self.upload_state != UploadState::Pending {
            return None;
        }
        let payload = self.payload.clone()?;
        self.upload_state = UploadState::InFlight;
        Some(payload)
    }

    /// IN_FLIGHT -> CONFIRMED, releasing the payload
    pub(crate) fn confirm(&mut self) -> bool {
        if self.upload_state != UploadState::InFlight {
            return false;
        }
        self.upload_state = UploadState::Confirmed;
        self.payload = None;
        true
    }

    /// PENDING | IN_FLIGHT -> FAILED, releasing the payload
    pub(crate) fn fail(&mut self) -> bool {
        if self.upload_state.is_settled() {
            return false;
        }
        self.upload_state = UploadState::Failed;
        self.payload = None;
        true
    }
}
