//! Capture infrastructure module
//!
//! Microphone capture through cpal, with each segment encoded as a
//! standalone 16 kHz mono FLAC file.

mod cpal_capture;
mod flac_encoder;

pub use cpal_capture::CpalCapture;
pub use flac_encoder::{encode_segment, EncodingError, TARGET_SAMPLE_RATE};
