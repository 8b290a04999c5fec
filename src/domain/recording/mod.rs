//! Recording domain module

mod audio_data;
mod duration;

pub use audio_data::{AudioData, AudioMimeType};
pub use duration::{
    Duration, DEFAULT_CADENCE_SECS, DEFAULT_DRAIN_TIMEOUT_SECS, DEFAULT_REQUEST_TIMEOUT_SECS,
};
