//! Device backend abstraction.
//!
//! The playback engine never talks to a platform audio API directly; it
//! drives the two traits below. [`CpalBackend`](cpal::CpalBackend) is the
//! production implementation (cpal covers ALSA, CoreAudio and WASAPI, which
//! is the whole per-OS selection point). Tests inject a deterministic mock.
//!
//! The contract is push-based: the session's streaming thread calls `write`
//! with interleaved PCM frames and may block until the device has room. One
//! device handle is driven by exactly one thread; contention between handles
//! on the same physical device is the platform's problem.

pub mod cpal;
#[cfg(test)]
pub(crate) mod mock;

pub use self::cpal::CpalBackend;

use thiserror::Error;

use crate::audio::AudioFormat;

/// Error type for device backend operations.
///
/// Carries string payloads rather than platform error types so it can be
/// cloned: the same error is retained on a failed session and handed to
/// every caller that asks for it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("no audio output device available")]
    NoDevice,
    #[error("device does not support the requested format: {0}")]
    UnsupportedFormat(String),
    #[error("failed to open audio device: {0}")]
    OpenFailed(String),
    #[error("audio stream error: {0}")]
    Stream(String),
    #[error("audio device already closed")]
    Closed,
}

/// Factory for output devices, implemented once per platform.
pub trait AudioBackend: Send + Sync {
    /// Reserve and configure an output stream matching `format`.
    fn open(&self, format: &AudioFormat) -> Result<Box<dyn OutputDevice>, DeviceError>;
}

/// An open output stream accepting interleaved PCM frames.
pub trait OutputDevice: Send {
    /// Push whole frames (`frames.len()` is a multiple of the frame size).
    ///
    /// Returns the number of frames accepted, which may be fewer than
    /// offered. May block until the device has buffer space.
    fn write(&mut self, frames: &[u8]) -> Result<usize, DeviceError>;

    /// Block until every accepted frame has been played out.
    fn drain(&mut self) -> Result<(), DeviceError>;

    /// Release the device. Idempotent; discards any unplayed audio.
    fn close(&mut self);
}
