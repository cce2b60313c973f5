//! Demo binary: synthesizes a short sine sweep and plays it through the
//! real device backend. Exercises the cpal path end to end without any
//! file parsing.

use std::f64::consts::TAU;
use std::time::Duration;

use wavplay::{AudioFormat, PlaybackBuffer, PlaybackEngine, SampleEncoding};

const SAMPLE_RATE: u32 = 44_100;
const SWEEP_SECONDS: f64 = 2.0;
const START_HZ: f64 = 220.0;
const END_HZ: f64 = 880.0;
const AMPLITUDE: f64 = 0.3;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let format = AudioFormat::new(SAMPLE_RATE, 1, 2, SampleEncoding::Signed)?;
    let buffer = PlaybackBuffer::new(sine_sweep(), format)?;
    println!("playing a {:.1?} sine sweep", buffer.duration());

    let engine = PlaybackEngine::new();
    let id = engine.play(buffer);

    let state = engine.wait(id, Some(Duration::from_secs(10)))?;
    println!("playback ended: {state:?}");
    if let Some(err) = engine.error(id)? {
        eprintln!("device error: {err}");
    }

    engine.shutdown(Duration::from_secs(2));
    Ok(())
}

/// Exponential sweep from `START_HZ` to `END_HZ` as 16-bit mono PCM.
fn sine_sweep() -> Vec<u8> {
    let total = (SAMPLE_RATE as f64 * SWEEP_SECONDS) as usize;
    let mut bytes = Vec::with_capacity(total * 2);
    let mut phase = 0.0f64;
    for i in 0..total {
        let t = i as f64 / SAMPLE_RATE as f64;
        let freq = START_HZ * (END_HZ / START_HZ).powf(t / SWEEP_SECONDS);
        phase += TAU * freq / SAMPLE_RATE as f64;
        let sample = (phase.sin() * AMPLITUDE * i16::MAX as f64) as i16;
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}
