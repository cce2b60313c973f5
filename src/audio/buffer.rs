//! Playback buffer: immutable PCM bytes plus format metadata.

use std::sync::Arc;
use std::time::Duration;

use crate::audio::format::{AudioFormat, FormatError};

/// A chunk of interleaved PCM audio ready for playback.
///
/// The sample data is reference counted and never mutated, so clones are
/// cheap and the same buffer can be played by any number of concurrent
/// sessions without locking.
#[derive(Debug, Clone)]
pub struct PlaybackBuffer {
    data: Arc<[u8]>,
    format: AudioFormat,
    frame_count: u64,
}

impl PlaybackBuffer {
    /// Create a buffer from raw PCM bytes.
    ///
    /// The byte length must be an exact multiple of the format's frame size;
    /// anything else fails with [`FormatError::TruncatedFrame`]. Sample
    /// content is opaque and not validated.
    pub fn new(data: impl Into<Vec<u8>>, format: AudioFormat) -> Result<Self, FormatError> {
        let data: Vec<u8> = data.into();
        let frame_size = format.frame_size();
        if data.len() % frame_size != 0 {
            return Err(FormatError::TruncatedFrame {
                len: data.len(),
                frame_size,
            });
        }
        let frame_count = (data.len() / frame_size) as u64;
        Ok(Self {
            data: data.into(),
            format,
            frame_count,
        })
    }

    /// Format of the contained samples.
    pub fn format(&self) -> &AudioFormat {
        &self.format
    }

    /// Raw interleaved sample bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    /// Number of frames (one sample per channel).
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Whether the buffer holds no frames at all.
    pub fn is_empty(&self) -> bool {
        self.frame_count == 0
    }

    /// Playback duration at the buffer's sample rate.
    pub fn duration(&self) -> Duration {
        let seconds = self.frame_count as f64 / self.format.sample_rate() as f64;
        Duration::from_secs_f64(seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::format::SampleEncoding;

    fn stereo_16() -> AudioFormat {
        AudioFormat::new(44_100, 2, 2, SampleEncoding::Signed).unwrap()
    }

    #[test]
    fn test_frame_count_from_length() {
        let buffer = PlaybackBuffer::new(vec![0u8; 400], stereo_16()).unwrap();
        assert_eq!(buffer.frame_count(), 100);
        assert!(!buffer.is_empty());
    }

    #[test]
    fn test_truncated_frame_rejected() {
        let result = PlaybackBuffer::new(vec![0u8; 401], stereo_16());
        assert_eq!(
            result.unwrap_err(),
            FormatError::TruncatedFrame {
                len: 401,
                frame_size: 4
            }
        );
    }

    #[test]
    fn test_empty_buffer_is_valid() {
        let buffer = PlaybackBuffer::new(Vec::new(), stereo_16()).unwrap();
        assert_eq!(buffer.frame_count(), 0);
        assert!(buffer.is_empty());
        assert_eq!(buffer.duration(), Duration::ZERO);
    }

    #[test]
    fn test_duration() {
        let buffer = PlaybackBuffer::new(vec![0u8; 44_100 * 4], stereo_16()).unwrap();
        assert_eq!(buffer.duration(), Duration::from_secs(1));
    }

    #[test]
    fn test_clone_shares_data() {
        let buffer = PlaybackBuffer::new(vec![1u8; 40], stereo_16()).unwrap();
        let clone = buffer.clone();
        assert_eq!(buffer.bytes().as_ptr(), clone.bytes().as_ptr());
    }
}
