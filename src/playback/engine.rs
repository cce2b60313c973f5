//! Playback engine: the session registry and control surface.
//!
//! The engine is an explicit context object, not a process-wide singleton:
//! construct one, keep it as long as playback is needed, and it will stop
//! and join everything on drop. All control calls are safe from any thread;
//! the session table lock is never held across a blocking wait or join.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::debug;
use thiserror::Error;

use crate::audio::PlaybackBuffer;
use crate::backend::{AudioBackend, CpalBackend, DeviceError};
use crate::playback::session::{Session, SessionId, SessionInner, SessionState};
use crate::playback::sync::Monitor;

/// How long `Drop` waits for streaming threads to wind down.
const DROP_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Error type for session control operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlaybackError {
    #[error("unknown session id {0}")]
    SessionNotFound(SessionId),
    #[error("timed out waiting for playback to finish")]
    WaitTimeout,
    #[error("session {0} is still active")]
    SessionActive(SessionId),
}

/// Owns the session table and hands out playback control.
pub struct PlaybackEngine {
    backend: Arc<dyn AudioBackend>,
    sessions: Mutex<HashMap<SessionId, Session>>,
    next_id: AtomicU64,
}

impl PlaybackEngine {
    /// Engine streaming to the platform's default output device.
    pub fn new() -> Self {
        Self::with_backend(Arc::new(CpalBackend::new()))
    }

    /// Engine with an injected backend (tests, alternate platforms).
    pub fn with_backend(backend: Arc<dyn AudioBackend>) -> Self {
        Self {
            backend,
            sessions: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Start playing `buffer` in the background and return the session id.
    ///
    /// Never fails synchronously: device errors surface through the session
    /// state and are retrievable via [`wait`](Self::wait) and
    /// [`error`](Self::error).
    pub fn play(&self, buffer: PlaybackBuffer) -> SessionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let session = Session::start(id, buffer, Arc::clone(&self.backend));
        self.table().insert(id, session);
        id
    }

    /// Whether the session is currently in the Playing state.
    pub fn is_playing(&self, id: SessionId) -> Result<bool, PlaybackError> {
        Ok(self.shared(id)?.lock().state.is_playing())
    }

    /// Current state of the session.
    pub fn state(&self, id: SessionId) -> Result<SessionState, PlaybackError> {
        Ok(self.shared(id)?.lock().state)
    }

    /// Frames accepted by the device so far. Monotone while Playing.
    pub fn position(&self, id: SessionId) -> Result<u64, PlaybackError> {
        Ok(self.shared(id)?.lock().position)
    }

    /// The device error captured on a Failed session, if any.
    pub fn error(&self, id: SessionId) -> Result<Option<DeviceError>, PlaybackError> {
        Ok(self.shared(id)?.lock().error.clone())
    }

    /// Request that the session stop streaming.
    ///
    /// Advisory and idempotent: the flag is observed between chunk writes,
    /// so audio stops after the in-flight write returns. A no-op on sessions
    /// that already reached a terminal state.
    pub fn stop(&self, id: SessionId) -> Result<(), PlaybackError> {
        let table = self.table();
        let session = table.get(&id).ok_or(PlaybackError::SessionNotFound(id))?;
        session.request_stop();
        Ok(())
    }

    /// Block until the session reaches a terminal state.
    ///
    /// Returns the terminal state, or [`PlaybackError::WaitTimeout`] if
    /// `timeout` elapses first. Any number of threads may wait on the same
    /// session; all are released on the terminal transition.
    pub fn wait(
        &self,
        id: SessionId,
        timeout: Option<Duration>,
    ) -> Result<SessionState, PlaybackError> {
        let shared = self.shared(id)?;
        let guard = shared.lock();
        match timeout {
            None => {
                let guard = shared.wait_while(guard, |inner| !inner.state.is_terminal());
                Ok(guard.state)
            }
            Some(timeout) => {
                let (guard, timed_out) =
                    shared.wait_timeout_while(guard, timeout, |inner| !inner.state.is_terminal());
                if timed_out {
                    Err(PlaybackError::WaitTimeout)
                } else {
                    Ok(guard.state)
                }
            }
        }
    }

    /// Request a stop on every non-terminal session.
    pub fn stop_all(&self) {
        let table = self.table();
        for session in table.values() {
            session.request_stop();
        }
    }

    /// Remove a terminal session from the registry and join its thread.
    ///
    /// Fails with [`PlaybackError::SessionActive`] if the session has not
    /// reached a terminal state. The id is never reused either way.
    pub fn dispose(&self, id: SessionId) -> Result<(), PlaybackError> {
        let mut table = self.table();
        let session = match table.remove(&id) {
            Some(session) => session,
            None => return Err(PlaybackError::SessionNotFound(id)),
        };
        if !session.shared.lock().state.is_terminal() {
            table.insert(id, session);
            return Err(PlaybackError::SessionActive(id));
        }
        drop(table);
        join_session(session);
        Ok(())
    }

    /// Cleanup pass: dispose every terminal session.
    ///
    /// Returns how many sessions were removed.
    pub fn reap_finished(&self) -> usize {
        let mut finished = Vec::new();
        {
            let mut table = self.table();
            let ids: Vec<SessionId> = table
                .iter()
                .filter(|(_, session)| session.shared.lock().state.is_terminal())
                .map(|(id, _)| *id)
                .collect();
            for id in ids {
                if let Some(session) = table.remove(&id) {
                    finished.push(session);
                }
            }
        }
        let count = finished.len();
        for session in finished {
            join_session(session);
        }
        if count > 0 {
            debug!("reaped {count} finished sessions");
        }
        count
    }

    /// Stop everything and wait for streaming threads to wind down.
    ///
    /// The shutdown hook for host processes: returns `true` if every session
    /// reached a terminal state within `timeout`, in which case all threads
    /// have been joined and the registry is empty. On `false`, sessions that
    /// are still blocked in a device write are left registered.
    pub fn shutdown(&self, timeout: Duration) -> bool {
        self.stop_all();
        let deadline = Instant::now() + timeout;

        let handles: Vec<Arc<Monitor<SessionInner>>> = self
            .table()
            .values()
            .map(|session| Arc::clone(&session.shared))
            .collect();

        let mut clean = true;
        for shared in handles {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let guard = shared.lock();
            let (_guard, timed_out) =
                shared.wait_timeout_while(guard, remaining, |inner| !inner.state.is_terminal());
            if timed_out {
                clean = false;
            }
        }

        if clean {
            let sessions: Vec<Session> = {
                let mut table = self.table();
                table.drain().map(|(_, session)| session).collect()
            };
            for session in sessions {
                join_session(session);
            }
        }
        clean
    }

    fn table(&self) -> MutexGuard<'_, HashMap<SessionId, Session>> {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn shared(&self, id: SessionId) -> Result<Arc<Monitor<SessionInner>>, PlaybackError> {
        self.table()
            .get(&id)
            .map(|session| Arc::clone(&session.shared))
            .ok_or(PlaybackError::SessionNotFound(id))
    }
}

impl Default for PlaybackEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        self.shutdown(DROP_SHUTDOWN_TIMEOUT);
    }
}

fn join_session(mut session: Session) {
    if let Some(worker) = session.worker.take() {
        let _ = worker.join();
    }
}
