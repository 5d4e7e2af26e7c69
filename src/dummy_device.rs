//! A fake sensing device that fabricates wire-format packets, so the
//! whole ingestion and export pipeline can run without hardware
//! attached.
//!
//! The microphone bursts carry a sine tone with a little uniform noise
//! on top, stamped with correctly chained trailing timestamps, so a
//! simulated capture decodes into a gapless, evenly spaced series.

use crate::{I2S_SAMPLE_RATE_HZ, NOISE_SAMPLES_PER_PACKET, SAMPLE_INTERVAL_US};

use rand::prelude::*;
use std::f64::consts::PI;

/// Generates synthetic sensor packets in the device's wire format.
pub struct DummyDevice {
    start_us: i64,
    tone_hz: f64,
    amplitude: f64,
    noise: f64,
    samples_emitted: i64,
    packets_emitted: usize,
}

impl DummyDevice {
    /// A device whose microphone hears a `tone_hz` sine of the given
    /// peak `amplitude`, plus uniform noise of up to `noise` counts,
    /// starting at `start_us` microseconds since the epoch.
    pub fn new(start_us: i64, tone_hz: f64, amplitude: f64, noise: f64) -> Self {
        Self {
            start_us,
            tone_hz,
            amplitude,
            noise,
            samples_emitted: 0,
            packets_emitted: 0,
        }
    }

    /// Timestamp of the most recently emitted sample, used to stamp the
    /// slow sensors so all kinds share one clock.
    fn clock_us(&self) -> i64 {
        self.start_us + (self.samples_emitted - 1).max(0) * SAMPLE_INTERVAL_US
    }

    /// Builds the next microphone burst packet. The embedded timestamp
    /// is the capture time of the burst's last sample, so consecutive
    /// packets chain exactly one sample interval apart.
    pub fn next_mic_packet(&mut self) -> Vec<u8> {
        let mut rng = thread_rng();

        let last_sample_index = self.samples_emitted + NOISE_SAMPLES_PER_PACKET as i64 - 1;
        let timestamp_us = self.start_us + last_sample_index * SAMPLE_INTERVAL_US;

        let mut buf = timestamp_us.to_le_bytes().to_vec();
        for i in 0..NOISE_SAMPLES_PER_PACKET as i64 {
            let t = (self.samples_emitted + i) as f64 / I2S_SAMPLE_RATE_HZ as f64;
            let tone = (2.0 * PI * self.tone_hz * t).sin() * self.amplitude;
            let jitter = if self.noise > 0.0 {
                rng.gen_range(-self.noise..self.noise)
            } else {
                0.0
            };
            let sample = (tone + jitter).clamp(i16::MIN as f64, i16::MAX as f64) as i16;
            buf.extend_from_slice(&sample.to_le_bytes());
        }

        self.samples_emitted += NOISE_SAMPLES_PER_PACKET as i64;
        buf
    }

    /// Builds a luminosity packet with a plausible ADC value.
    pub fn next_luminosity_packet(&mut self) -> Vec<u8> {
        let mut rng = thread_rng();
        let mut buf = self.clock_us().to_le_bytes().to_vec();
        buf.extend_from_slice(&rng.gen_range(0i16..4096).to_le_bytes());
        buf
    }

    /// Builds a combined temperature/humidity packet, values in tenths.
    pub fn next_dht_packet(&mut self) -> Vec<u8> {
        let mut rng = thread_rng();
        let mut buf = self.clock_us().to_le_bytes().to_vec();
        buf.extend_from_slice(&rng.gen_range(180i16..320).to_le_bytes());
        buf.extend_from_slice(&rng.gen_range(300i16..700).to_le_bytes());
        buf
    }
}

// Mostly audio with the slow sensors sprinkled in, roughly matching the
// real device's packet mix.
impl Iterator for DummyDevice {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        let n = self.packets_emitted;
        self.packets_emitted += 1;
        if n % 25 == 24 {
            Some(self.next_dht_packet())
        } else if n % 10 == 9 {
            Some(self.next_luminosity_packet())
        } else {
            Some(self.next_mic_packet())
        }
    }
}
