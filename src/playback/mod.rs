pub mod engine;
pub mod session;
pub mod sync;

pub use engine::{PlaybackEngine, PlaybackError};
pub use session::{SessionId, SessionState};
