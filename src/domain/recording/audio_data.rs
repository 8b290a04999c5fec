//! Audio data value object

use std::fmt;

use bytes::Bytes;

/// Supported audio MIME types for chunk payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AudioMimeType {
    #[default]
    Flac,
    Wav,
    Ogg,
    Webm,
}

impl AudioMimeType {
    /// Get the MIME type string
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Flac => "audio/flac",
            Self::Wav => "audio/wav",
            Self::Ogg => "audio/ogg",
            Self::Webm => "audio/webm",
        }
    }

    /// Get the file extension
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Flac => "flac",
            Self::Wav => "wav",
            Self::Ogg => "ogg",
            Self::Webm => "webm",
        }
    }
}

impl fmt::Display for AudioMimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Value object representing one encoded slice of captured audio.
///
/// Backed by [`Bytes`] so handing a payload to an upload task is a
/// reference-count bump rather than a copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioData {
    data: Bytes,
    mime_type: AudioMimeType,
}

impl AudioData {
    /// Create AudioData from owned bytes
    pub fn new(data: impl Into<Bytes>, mime_type: AudioMimeType) -> Self {
        Self {
            data: data.into(),
            mime_type,
        }
    }

    /// Create AudioData by copying a byte slice
    pub fn from_bytes(data: &[u8], mime_type: AudioMimeType) -> Self {
        Self {
            data: Bytes::copy_from_slice(data),
            mime_type,
        }
    }

    /// Get the raw audio data
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Get a cheap clone of the underlying buffer
    pub fn bytes(&self) -> Bytes {
        self.data.clone()
    }

    /// Get the MIME type
    pub fn mime_type(&self) -> AudioMimeType {
        self.mime_type
    }

    /// Get the size in bytes
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    /// Whether there is no audio at all
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get human-readable size
    pub fn human_readable_size(&self) -> String {
        let bytes = self.size_bytes();
        if bytes < 1024 {
            format!("{} B", bytes)
        } else if bytes < 1024 * 1024 {
            format!("{:.1} KB", bytes as f64 / 1024.0)
        } else {
            format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_type_strings() {
        assert_eq!(AudioMimeType::Flac.as_str(), "audio/flac");
        assert_eq!(AudioMimeType::Webm.as_str(), "audio/webm");
        assert_eq!(AudioMimeType::Flac.extension(), "flac");
        assert_eq!(AudioMimeType::default(), AudioMimeType::Flac);
    }

    #[test]
    fn human_readable_sizes() {
        assert_eq!(
            AudioData::new(vec![0u8; 500], AudioMimeType::Flac).human_readable_size(),
            "500 B"
        );
        assert_eq!(
            AudioData::new(vec![0u8; 2048], AudioMimeType::Flac).human_readable_size(),
            "2.0 KB"
        );
        assert_eq!(
            AudioData::new(vec![0u8; 2 * 1024 * 1024], AudioMimeType::Flac).human_readable_size(),
            "2.0 MB"
        );
    }

    #[test]
    fn bytes_share_the_same_buffer() {
        let data = AudioData::from_bytes(&[1, 2, 3], AudioMimeType::Wav);
        let shared = data.bytes();
        assert_eq!(shared.as_ptr(), data.data().as_ptr());
        assert_eq!(data.mime_type(), AudioMimeType::Wav);
    }

    #[test]
    fn empty_detection() {
        assert!(AudioData::new(Vec::new(), AudioMimeType::Flac).is_empty());
        assert!(!AudioData::from_bytes(&[0], AudioMimeType::Flac).is_empty());
    }
}
