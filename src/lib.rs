//! wavplay: a minimal thread-based PCM playback engine.
//!
//! Callers hand the engine decoded PCM data (`bytes` plus an
//! [`AudioFormat`]); the engine streams it to the system audio device on a
//! background thread per session and exposes safe concurrent control:
//! stop, query, wait-for-completion.
//!
//! ```no_run
//! use std::time::Duration;
//! use wavplay::{AudioFormat, PlaybackBuffer, PlaybackEngine, SampleEncoding};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let format = AudioFormat::new(44_100, 2, 2, SampleEncoding::Signed)?;
//! let buffer = PlaybackBuffer::new(pcm_bytes(), format)?;
//!
//! let engine = PlaybackEngine::new();
//! let id = engine.play(buffer);
//! let state = engine.wait(id, Some(Duration::from_secs(10)))?;
//! println!("playback ended: {state:?}");
//! engine.shutdown(Duration::from_secs(2));
//! # Ok(())
//! # }
//! # fn pcm_bytes() -> Vec<u8> { Vec::new() }
//! ```
//!
//! WAV parsing is out of scope: decode the file however you like and pass
//! the raw sample bytes in. The device layer is pluggable through
//! [`AudioBackend`]; the built-in [`CpalBackend`] covers ALSA, CoreAudio
//! and WASAPI.

pub mod audio;
pub mod backend;
pub mod playback;

pub use audio::{AudioFormat, FormatError, PlaybackBuffer, SampleEncoding};
pub use backend::{AudioBackend, CpalBackend, DeviceError, OutputDevice};
pub use playback::{PlaybackEngine, PlaybackError, SessionId, SessionState};
