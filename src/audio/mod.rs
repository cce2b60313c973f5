pub mod buffer;
pub mod format;

pub use buffer::PlaybackBuffer;
pub use format::{AudioFormat, FormatError, SampleEncoding};
