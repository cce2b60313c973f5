//! PCM format description and validation.

use thiserror::Error;

/// Error type for buffer and format construction
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("sample rate must be positive")]
    ZeroSampleRate,
    #[error("channel count must be positive")]
    ZeroChannels,
    #[error("unsupported sample width: {0} bytes per sample")]
    UnsupportedWidth(u8),
    #[error("float samples must be 4 bytes wide, got {0}")]
    InvalidFloatWidth(u8),
    #[error("buffer length {len} is not a multiple of the frame size {frame_size}")]
    TruncatedFrame { len: usize, frame_size: usize },
}

/// How the raw sample bytes are to be interpreted.
///
/// Samples are little-endian, matching WAV file layout. `Unsigned` is the
/// WAV convention for 8-bit audio but is accepted at any width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleEncoding {
    Unsigned,
    Signed,
    Float,
}

/// Immutable description of interleaved PCM data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    sample_rate: u32,
    channels: u16,
    bytes_per_sample: u8,
    encoding: SampleEncoding,
}

impl AudioFormat {
    /// Create a validated format description.
    ///
    /// Fails when the sample rate or channel count is zero, when
    /// `bytes_per_sample` is outside 1..=4, or when a float encoding is
    /// combined with a width other than 4 bytes.
    pub fn new(
        sample_rate: u32,
        channels: u16,
        bytes_per_sample: u8,
        encoding: SampleEncoding,
    ) -> Result<Self, FormatError> {
        if sample_rate == 0 {
            return Err(FormatError::ZeroSampleRate);
        }
        if channels == 0 {
            return Err(FormatError::ZeroChannels);
        }
        if !(1..=4).contains(&bytes_per_sample) {
            return Err(FormatError::UnsupportedWidth(bytes_per_sample));
        }
        if encoding == SampleEncoding::Float && bytes_per_sample != 4 {
            return Err(FormatError::InvalidFloatWidth(bytes_per_sample));
        }
        Ok(Self {
            sample_rate,
            channels,
            bytes_per_sample,
            encoding,
        })
    }

    /// Sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of interleaved channels.
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Width of a single sample in bytes.
    pub fn bytes_per_sample(&self) -> u8 {
        self.bytes_per_sample
    }

    /// Sample byte interpretation.
    pub fn encoding(&self) -> SampleEncoding {
        self.encoding
    }

    /// Size of one frame (one sample per channel) in bytes.
    pub fn frame_size(&self) -> usize {
        self.channels as usize * self.bytes_per_sample as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_format() {
        let format = AudioFormat::new(44_100, 2, 2, SampleEncoding::Signed).unwrap();
        assert_eq!(format.sample_rate(), 44_100);
        assert_eq!(format.channels(), 2);
        assert_eq!(format.bytes_per_sample(), 2);
        assert_eq!(format.frame_size(), 4);
    }

    #[test]
    fn test_zero_sample_rate_rejected() {
        let result = AudioFormat::new(0, 2, 2, SampleEncoding::Signed);
        assert_eq!(result, Err(FormatError::ZeroSampleRate));
    }

    #[test]
    fn test_zero_channels_rejected() {
        let result = AudioFormat::new(44_100, 0, 2, SampleEncoding::Signed);
        assert_eq!(result, Err(FormatError::ZeroChannels));
    }

    #[test]
    fn test_unsupported_width_rejected() {
        assert_eq!(
            AudioFormat::new(44_100, 2, 5, SampleEncoding::Signed),
            Err(FormatError::UnsupportedWidth(5))
        );
        assert_eq!(
            AudioFormat::new(44_100, 2, 0, SampleEncoding::Signed),
            Err(FormatError::UnsupportedWidth(0))
        );
    }

    #[test]
    fn test_float_width_must_be_four() {
        assert_eq!(
            AudioFormat::new(44_100, 2, 2, SampleEncoding::Float),
            Err(FormatError::InvalidFloatWidth(2))
        );
        assert!(AudioFormat::new(44_100, 2, 4, SampleEncoding::Float).is_ok());
    }

    #[test]
    fn test_frame_size_24_bit_mono() {
        let format = AudioFormat::new(48_000, 1, 3, SampleEncoding::Signed).unwrap();
        assert_eq!(format.frame_size(), 3);
    }
}
