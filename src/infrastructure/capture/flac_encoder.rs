//! Standalone FLAC encoding for capture segments
//!
//! Each chunk is a complete FLAC stream (header included) so the service
//! can store and concatenate segments without decoding them.

use flacenc::bitsink::ByteSink;
use flacenc::component::BitRepr;
use flacenc::config;
use flacenc::error::Verify;
use flacenc::source::MemSource;
use thiserror::Error;

/// Sample rate every segment is resampled to before encoding
pub const TARGET_SAMPLE_RATE: u32 = 16000;

const BITS_PER_SAMPLE: usize = 16;
const CHANNELS: usize = 1;

#[derive(Debug, Error)]
pub enum EncodingError {
    #[error("No samples to encode")]
    Empty,

    #[error("FLAC config error: {0}")]
    Config(String),

    #[error("FLAC encoding failed: {0}")]
    Encode(String),

    #[error("FLAC write failed: {0}")]
    Write(String),
}

/// Encode mono 16-bit PCM at [`TARGET_SAMPLE_RATE`] into a FLAC stream
pub fn encode_segment(pcm: &[i16]) -> Result<Vec<u8>, EncodingError> {
    if pcm.is_empty() {
        return Err(EncodingError::Empty);
    }

    let widened: Vec<i32> = pcm.iter().copied().map(i32::from).collect();
    let config = config::Encoder::default()
        .into_verified()
        .map_err(|(_, e)| EncodingError::Config(format!("{e:?}")))?;
    let source = MemSource::from_samples(
        &widened,
        CHANNELS,
        BITS_PER_SAMPLE,
        TARGET_SAMPLE_RATE as usize,
    );

    let stream = flacenc::encode_with_fixed_block_size(&config, source, config.block_size)
        .map_err(|e| EncodingError::Encode(format!("{e:?}")))?;

    let mut sink = ByteSink::new();
    stream
        .write(&mut sink)
        .map_err(|e| EncodingError::Write(e.to_string()))?;
    Ok(sink.into_inner())
}
