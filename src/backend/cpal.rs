//! cpal-backed output device.
//!
//! cpal pulls samples through a callback; the engine pushes frames through
//! blocking `write` calls. The bridge is a monitor-guarded queue of f32
//! samples: `write` converts PCM bytes and appends, blocking while the queue
//! is above a high-water mark, and the stream callback pops into cpal's
//! buffer, zero-filling on underrun.
//!
//! `cpal::Stream` is not `Send`, so the stream lives on a dedicated holder
//! thread: it builds the stream, reports the result back over a channel, and
//! parks on the queue monitor until `close` is requested.

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleRate, StreamConfig};
use crossbeam::channel;
use log::{debug, error};

use crate::audio::{AudioFormat, SampleEncoding};
use crate::backend::{AudioBackend, DeviceError, OutputDevice};
use crate::playback::sync::Monitor;

/// How much audio `write` keeps queued ahead of the stream callback.
const HIGH_WATER: Duration = Duration::from_millis(250);

/// The default backend, streaming to the system's default output device.
#[derive(Debug, Default)]
pub struct CpalBackend;

impl CpalBackend {
    pub fn new() -> Self {
        Self
    }
}

impl AudioBackend for CpalBackend {
    fn open(&self, format: &AudioFormat) -> Result<Box<dyn OutputDevice>, DeviceError> {
        let device = CpalDevice::open(format)?;
        Ok(Box::new(device))
    }
}

/// Queue shared between `write`/`drain` callers and the stream callback.
struct SampleQueue {
    samples: VecDeque<f32>,
    /// Set by `close`; the holder thread and blocked writers exit on it.
    closed: bool,
    /// First stream error reported by cpal, surfaced on the next call.
    failed: Option<DeviceError>,
}

struct CpalDevice {
    queue: Arc<Monitor<SampleQueue>>,
    holder: Option<JoinHandle<()>>,
    format: AudioFormat,
    high_water_samples: usize,
    closed: bool,
}

impl CpalDevice {
    fn open(format: &AudioFormat) -> Result<Self, DeviceError> {
        let samples_per_second = format.sample_rate() as usize * format.channels() as usize;
        let high_water_samples =
            samples_per_second * HIGH_WATER.as_millis() as usize / 1000;

        let queue = Arc::new(Monitor::new(SampleQueue {
            samples: VecDeque::new(),
            closed: false,
            failed: None,
        }));

        let (ready_tx, ready_rx) = channel::bounded(1);
        let thread_queue = Arc::clone(&queue);
        let stream_format = *format;

        let holder = thread::Builder::new()
            .name("wavplay-cpal-stream".to_string())
            .spawn(move || stream_thread(stream_format, thread_queue, ready_tx))
            .map_err(|err| DeviceError::OpenFailed(format!("failed to spawn stream thread: {err}")))?;

        // The holder reports whether the stream came up before we return.
        let ready = ready_rx
            .recv()
            .unwrap_or(Err(DeviceError::OpenFailed("stream thread exited".to_string())));

        match ready {
            Ok(()) => {
                debug!(
                    "opened cpal output: {} Hz, {} channels",
                    stream_format.sample_rate(),
                    stream_format.channels()
                );
                Ok(Self {
                    queue,
                    holder: Some(holder),
                    format: stream_format,
                    high_water_samples,
                    closed: false,
                })
            }
            Err(err) => {
                let _ = holder.join();
                Err(err)
            }
        }
    }

    /// Surface a latched stream error or the closed flag.
    fn check_queue_state(queue: &SampleQueue) -> Result<(), DeviceError> {
        if let Some(err) = &queue.failed {
            return Err(err.clone());
        }
        if queue.closed {
            return Err(DeviceError::Closed);
        }
        Ok(())
    }
}

impl OutputDevice for CpalDevice {
    fn write(&mut self, frames: &[u8]) -> Result<usize, DeviceError> {
        if self.closed {
            return Err(DeviceError::Closed);
        }
        let frame_count = frames.len() / self.format.frame_size();
        let converted = decode_samples(frames, &self.format);

        let high_water = self.high_water_samples;
        let guard = self.queue.lock();
        let mut guard = self.queue.wait_while(guard, |queue| {
            queue.failed.is_none() && !queue.closed && queue.samples.len() > high_water
        });
        Self::check_queue_state(&guard)?;
        guard.samples.extend(converted);
        Ok(frame_count)
    }

    fn drain(&mut self) -> Result<(), DeviceError> {
        if self.closed {
            return Err(DeviceError::Closed);
        }
        let guard = self.queue.lock();
        let guard = self.queue.wait_while(guard, |queue| {
            queue.failed.is_none() && !queue.closed && !queue.samples.is_empty()
        });
        Self::check_queue_state(&guard)?;
        drop(guard);

        // cpal has no drain primitive; once the queue is empty, one
        // high-water period covers whatever the device FIFO still holds.
        thread::sleep(HIGH_WATER);
        Ok(())
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        {
            let mut guard = self.queue.lock();
            guard.closed = true;
            guard.samples.clear();
        }
        self.queue.notify_all();
        if let Some(holder) = self.holder.take() {
            let _ = holder.join();
        }
    }
}

impl Drop for CpalDevice {
    fn drop(&mut self) {
        self.close();
    }
}

/// Owns the `cpal::Stream` for the lifetime of the device.
fn stream_thread(
    format: AudioFormat,
    queue: Arc<Monitor<SampleQueue>>,
    ready_tx: channel::Sender<Result<(), DeviceError>>,
) {
    let host = cpal::default_host();
    let device = match host.default_output_device() {
        Some(device) => device,
        None => {
            let _ = ready_tx.send(Err(DeviceError::NoDevice));
            return;
        }
    };

    let config = StreamConfig {
        channels: format.channels(),
        sample_rate: SampleRate(format.sample_rate()),
        buffer_size: BufferSize::Default,
    };

    let callback_queue = Arc::clone(&queue);
    let error_queue = Arc::clone(&queue);

    let stream = device.build_output_stream(
        &config,
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            let mut guard = callback_queue.lock();
            let mut filled = 0;
            while filled < data.len() {
                match guard.samples.pop_front() {
                    Some(sample) => {
                        data[filled] = sample;
                        filled += 1;
                    }
                    None => break,
                }
            }
            drop(guard);
            // Underrun or fully drained: pad with silence.
            data[filled..].fill(0.0);
            callback_queue.notify_all();
        },
        move |err| {
            error!("audio stream error: {err}");
            let mut guard = error_queue.lock();
            if guard.failed.is_none() {
                guard.failed = Some(DeviceError::Stream(err.to_string()));
            }
            drop(guard);
            error_queue.notify_all();
        },
        None,
    );

    let stream = match stream {
        Ok(stream) => stream,
        Err(cpal::BuildStreamError::StreamConfigNotSupported) => {
            let _ = ready_tx.send(Err(DeviceError::UnsupportedFormat(format!(
                "{} Hz, {} channels",
                format.sample_rate(),
                format.channels()
            ))));
            return;
        }
        Err(err) => {
            let _ = ready_tx.send(Err(DeviceError::OpenFailed(err.to_string())));
            return;
        }
    };

    if let Err(err) = stream.play() {
        let _ = ready_tx.send(Err(DeviceError::OpenFailed(err.to_string())));
        return;
    }

    let _ = ready_tx.send(Ok(()));

    // Keep the stream alive until close; it is dropped on the way out.
    let guard = queue.lock();
    let _guard = queue.wait_while(guard, |queue| !queue.closed);
    debug!("cpal stream thread exiting");
}

/// Convert little-endian PCM bytes to f32 samples in [-1, 1].
fn decode_samples(bytes: &[u8], format: &AudioFormat) -> Vec<f32> {
    let width = format.bytes_per_sample() as usize;
    let encoding = format.encoding();
    bytes
        .chunks_exact(width)
        .map(|sample| decode_sample(sample, encoding))
        .collect()
}

fn decode_sample(sample: &[u8], encoding: SampleEncoding) -> f32 {
    match (encoding, sample.len()) {
        (SampleEncoding::Float, 4) => {
            f32::from_le_bytes([sample[0], sample[1], sample[2], sample[3]])
        }
        (SampleEncoding::Signed, 1) => sample[0] as i8 as f32 / 128.0,
        (SampleEncoding::Signed, 2) => {
            i16::from_le_bytes([sample[0], sample[1]]) as f32 / 32_768.0
        }
        (SampleEncoding::Signed, 3) => {
            // Sign-extend the 24-bit value through the top byte.
            let value = ((sample[2] as i8 as i32) << 16)
                | ((sample[1] as i32) << 8)
                | sample[0] as i32;
            value as f32 / 8_388_608.0
        }
        (SampleEncoding::Signed, 4) => {
            i32::from_le_bytes([sample[0], sample[1], sample[2], sample[3]]) as f32
                / 2_147_483_648.0
        }
        (SampleEncoding::Unsigned, 1) => (sample[0] as f32 - 128.0) / 128.0,
        (SampleEncoding::Unsigned, 2) => {
            (u16::from_le_bytes([sample[0], sample[1]]) as f32 - 32_768.0) / 32_768.0
        }
        (SampleEncoding::Unsigned, 3) => {
            let value =
                ((sample[2] as u32) << 16) | ((sample[1] as u32) << 8) | sample[0] as u32;
            (value as f32 - 8_388_608.0) / 8_388_608.0
        }
        (SampleEncoding::Unsigned, 4) => {
            let value = u32::from_le_bytes([sample[0], sample[1], sample[2], sample[3]]);
            ((value as f64 - 2_147_483_648.0) / 2_147_483_648.0) as f32
        }
        // Width/encoding combinations outside this table are rejected by
        // AudioFormat::new.
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioFormat;

    #[test]
    fn test_decode_i16() {
        assert_eq!(decode_sample(&i16::MIN.to_le_bytes(), SampleEncoding::Signed), -1.0);
        assert_eq!(decode_sample(&0i16.to_le_bytes(), SampleEncoding::Signed), 0.0);
        let max = decode_sample(&i16::MAX.to_le_bytes(), SampleEncoding::Signed);
        assert!((max - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_decode_u8() {
        assert_eq!(decode_sample(&[0], SampleEncoding::Unsigned), -1.0);
        assert_eq!(decode_sample(&[128], SampleEncoding::Unsigned), 0.0);
        let max = decode_sample(&[255], SampleEncoding::Unsigned);
        assert!((max - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_decode_i24_sign_extension() {
        // -1 in 24-bit two's complement, little-endian.
        let sample = [0xFF, 0xFF, 0xFF];
        let value = decode_sample(&sample, SampleEncoding::Signed);
        assert!(value < 0.0);
        assert!(value.abs() < 0.000001);

        let min = decode_sample(&[0x00, 0x00, 0x80], SampleEncoding::Signed);
        assert_eq!(min, -1.0);
    }

    #[test]
    fn test_decode_f32_passthrough() {
        let sample = 0.25f32.to_le_bytes();
        assert_eq!(decode_sample(&sample, SampleEncoding::Float), 0.25);
    }

    #[test]
    fn test_decode_i32() {
        assert_eq!(decode_sample(&i32::MIN.to_le_bytes(), SampleEncoding::Signed), -1.0);
        assert_eq!(decode_sample(&0i32.to_le_bytes(), SampleEncoding::Signed), 0.0);
    }

    #[test]
    fn test_decode_samples_interleaved() {
        let format = AudioFormat::new(44_100, 2, 2, SampleEncoding::Signed).unwrap();
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0i16.to_le_bytes());
        bytes.extend_from_slice(&i16::MIN.to_le_bytes());
        let samples = decode_samples(&bytes, &format);
        assert_eq!(samples, vec![0.0, -1.0]);
    }
}
