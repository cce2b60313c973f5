//! Playback sessions and their streaming threads.
//!
//! A session is one playback instance of one buffer. Its streaming thread is
//! the only writer of session state: it opens the device, pushes the buffer
//! in fixed-size chunks, re-checking the stop flag between writes, and moves
//! the session to a terminal state before notifying every waiter. Control
//! threads only read state and raise the stop flag.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, warn};

use crate::audio::PlaybackBuffer;
use crate::backend::{AudioBackend, DeviceError};
use crate::playback::sync::Monitor;

/// Identifier handed out by [`PlaybackEngine::play`](crate::PlaybackEngine::play).
///
/// Ids are assigned monotonically and never reused.
pub type SessionId = u64;

/// Frames offered to the device per write call. The stop flag is re-checked
/// before every write, so this also bounds stop latency to one blocking
/// write.
pub(crate) const CHUNK_FRAMES: u64 = 4096;

/// Playback session state machine.
///
/// `Created → Playing → {Completed, Stopped, Failed}`; the three terminal
/// states are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Registered, device not yet opened.
    Created,
    /// Device opened; the streaming thread is pushing chunks.
    Playing,
    /// All frames written and drained.
    Completed,
    /// A stop request was observed between writes.
    Stopped,
    /// The device failed; the error is retained on the session.
    Failed,
}

impl SessionState {
    /// Check if the session is actively streaming.
    pub fn is_playing(self) -> bool {
        matches!(self, SessionState::Playing)
    }

    /// Check if the session can no longer change state.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Stopped | SessionState::Failed
        )
    }
}

/// Mutable session state, written by the streaming thread and read by
/// everyone else under the same monitor.
pub(crate) struct SessionInner {
    pub(crate) state: SessionState,
    /// Frames accepted by the device so far; monotone while Playing.
    pub(crate) position: u64,
    /// Advisory stop flag, observed between chunk writes.
    pub(crate) stop_requested: bool,
    /// Captured device failure when state is Failed.
    pub(crate) error: Option<DeviceError>,
}

pub(crate) struct Session {
    pub(crate) shared: Arc<Monitor<SessionInner>>,
    pub(crate) worker: Option<JoinHandle<()>>,
}

impl Session {
    /// Register a session and start streaming `buffer` in the background.
    pub(crate) fn start(
        id: SessionId,
        buffer: PlaybackBuffer,
        backend: Arc<dyn AudioBackend>,
    ) -> Session {
        let shared = Arc::new(Monitor::new(SessionInner {
            state: SessionState::Created,
            position: 0,
            stop_requested: false,
            error: None,
        }));

        // Degenerate case: nothing to stream, so the device is never opened.
        if buffer.is_empty() {
            shared.lock().state = SessionState::Completed;
            debug!("session {id}: empty buffer, completed immediately");
            return Session {
                shared,
                worker: None,
            };
        }

        let thread_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name(format!("wavplay-session-{id}"))
            .spawn(move || stream_buffer(id, buffer, backend, thread_shared));

        match worker {
            Ok(handle) => Session {
                shared,
                worker: Some(handle),
            },
            Err(err) => {
                warn!("session {id}: failed to spawn streaming thread: {err}");
                {
                    let mut inner = shared.lock();
                    inner.state = SessionState::Failed;
                    inner.error = Some(DeviceError::OpenFailed(format!(
                        "failed to spawn streaming thread: {err}"
                    )));
                }
                shared.notify_all();
                Session {
                    shared,
                    worker: None,
                }
            }
        }
    }

    /// Raise the stop flag. No-op once the session is terminal.
    pub(crate) fn request_stop(&self) {
        let mut inner = self.shared.lock();
        if !inner.state.is_terminal() {
            inner.stop_requested = true;
        }
    }
}

/// Streaming thread body: open, chunked writes, drain, close.
fn stream_buffer(
    id: SessionId,
    buffer: PlaybackBuffer,
    backend: Arc<dyn AudioBackend>,
    shared: Arc<Monitor<SessionInner>>,
) {
    // A stop that lands before the device opens skips the open entirely.
    if shared.lock().stop_requested {
        finish(&shared, id, SessionState::Stopped);
        return;
    }

    let mut device = match backend.open(buffer.format()) {
        Ok(device) => device,
        Err(err) => {
            fail(&shared, id, err);
            return;
        }
    };

    {
        let mut inner = shared.lock();
        inner.state = SessionState::Playing;
    }
    debug!("session {id}: playing {} frames", buffer.frame_count());

    let frame_size = buffer.format().frame_size() as u64;
    let bytes = buffer.bytes();
    let total = buffer.frame_count();
    let mut position: u64 = 0;
    let mut stopped = false;

    while position < total {
        if shared.lock().stop_requested {
            stopped = true;
            break;
        }
        let chunk = CHUNK_FRAMES.min(total - position);
        let start = (position * frame_size) as usize;
        let end = start + (chunk * frame_size) as usize;
        match device.write(&bytes[start..end]) {
            Ok(accepted) => {
                let accepted = (accepted as u64).min(chunk);
                if accepted == 0 {
                    // The device made no room yet; offer the chunk again.
                    continue;
                }
                position += accepted;
                shared.lock().position = position;
            }
            Err(err) => {
                device.close();
                fail(&shared, id, err);
                return;
            }
        }
    }

    if stopped {
        // Stop means "quiet soon": discard queued audio instead of draining.
        device.close();
        finish(&shared, id, SessionState::Stopped);
        return;
    }

    if let Err(err) = device.drain() {
        device.close();
        fail(&shared, id, err);
        return;
    }
    device.close();
    finish(&shared, id, SessionState::Completed);
}

fn finish(shared: &Monitor<SessionInner>, id: SessionId, state: SessionState) {
    shared.lock().state = state;
    shared.notify_all();
    debug!("session {id}: {state:?}");
}

fn fail(shared: &Monitor<SessionInner>, id: SessionId, err: DeviceError) {
    {
        let mut inner = shared.lock();
        inner.state = SessionState::Failed;
        inner.error = Some(err.clone());
    }
    shared.notify_all();
    warn!("session {id} failed: {err}");
}
