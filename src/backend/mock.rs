//! Scripted backend for tests: records every call and can be told to fail,
//! stall, or accept fewer frames than offered.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::audio::AudioFormat;
use crate::backend::{AudioBackend, DeviceError, OutputDevice};

#[derive(Default)]
pub(crate) struct MockState {
    opens: AtomicUsize,
    writes: AtomicUsize,
    drains: AtomicUsize,
    closes: AtomicUsize,
}

/// Behavior knobs for a [`MockBackend`].
#[derive(Default, Clone, Copy)]
pub(crate) struct MockBehavior {
    /// Every `open` fails.
    pub(crate) fail_open: bool,
    /// Every `write` fails after being counted.
    pub(crate) fail_write: bool,
    /// Simulated device-buffer blocking per `write` call.
    pub(crate) write_delay: Option<Duration>,
    /// Accept at most this many frames per `write`.
    pub(crate) max_frames_per_write: Option<usize>,
}

#[derive(Clone)]
pub(crate) struct MockBackend {
    state: Arc<MockState>,
    behavior: MockBehavior,
}

impl MockBackend {
    pub(crate) fn new() -> Self {
        Self::with_behavior(MockBehavior::default())
    }

    pub(crate) fn with_behavior(behavior: MockBehavior) -> Self {
        Self {
            state: Arc::new(MockState::default()),
            behavior,
        }
    }

    pub(crate) fn open_count(&self) -> usize {
        self.state.opens.load(Ordering::SeqCst)
    }

    pub(crate) fn write_count(&self) -> usize {
        self.state.writes.load(Ordering::SeqCst)
    }

    pub(crate) fn drain_count(&self) -> usize {
        self.state.drains.load(Ordering::SeqCst)
    }

    pub(crate) fn close_count(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }
}

impl AudioBackend for MockBackend {
    fn open(&self, format: &AudioFormat) -> Result<Box<dyn OutputDevice>, DeviceError> {
        self.state.opens.fetch_add(1, Ordering::SeqCst);
        if self.behavior.fail_open {
            return Err(DeviceError::OpenFailed("mock open failure".to_string()));
        }
        Ok(Box::new(MockDevice {
            state: Arc::clone(&self.state),
            behavior: self.behavior,
            frame_size: format.frame_size(),
            closed: false,
        }))
    }
}

struct MockDevice {
    state: Arc<MockState>,
    behavior: MockBehavior,
    frame_size: usize,
    closed: bool,
}

impl OutputDevice for MockDevice {
    fn write(&mut self, frames: &[u8]) -> Result<usize, DeviceError> {
        if self.closed {
            return Err(DeviceError::Closed);
        }
        self.state.writes.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.behavior.write_delay {
            std::thread::sleep(delay);
        }
        if self.behavior.fail_write {
            return Err(DeviceError::Stream("mock write failure".to_string()));
        }
        let offered = frames.len() / self.frame_size;
        let accepted = match self.behavior.max_frames_per_write {
            Some(max) => offered.min(max),
            None => offered,
        };
        Ok(accepted)
    }

    fn drain(&mut self) -> Result<(), DeviceError> {
        if self.closed {
            return Err(DeviceError::Closed);
        }
        self.state.drains.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.state.closes.fetch_add(1, Ordering::SeqCst);
        }
    }
}
