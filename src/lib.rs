//! Telewav reconstructs audio from the telemetry of a small embedded
//! sensing device. The device samples a microphone over I2S along with a
//! light sensor and a DHT temperature/humidity sensor, and ships every
//! reading as a fixed-layout binary packet. On the host side this crate
//! decodes those packets into timestamped readings, stores them in an
//! append-only telemetry log, and later turns the (irregular, possibly
//! gappy) microphone series back into a uniform 8 kHz signal that can be
//! written out as a standard mono 16-bit WAV file.
//!
//! The pipeline has two halves:
//!
//! - **Ingestion** ([packet_decoder], [telemetry_log]): one packet in,
//!   a batch of [Reading](packet_decoder::Reading)s out, appended to the
//!   log. Pure per-packet work, safe to run per connection.
//! - **Export** ([series], [resample], [filter], [wav_writer]): the whole
//!   stored series is resampled onto a uniform time axis, gain-adjusted,
//!   low-pass filtered, and encoded as WAV.

#![warn(missing_docs)]
pub mod args;
pub mod dummy_device;
pub mod filter;
pub mod packet_decoder;
pub mod resample;
pub mod series;
pub mod telemetry_log;
pub mod wav_writer;

/// Sample rate of the device's I2S microphone, in Hz.
pub const I2S_SAMPLE_RATE_HZ: u32 = 8000;

/// Microseconds between two consecutive samples within a microphone burst.
pub const SAMPLE_INTERVAL_US: i64 = 1_000_000 / I2S_SAMPLE_RATE_HZ as i64;

/// Number of 16-bit audio samples packed into one microphone burst packet.
pub const NOISE_SAMPLES_PER_PACKET: usize = 448;

/// Default sample rate of the exported WAV file, in Hz. Matches the
/// device's I2S rate so that a clean capture needs no rate conversion.
pub const TARGET_SAMPLE_RATE_HZ: u32 = 8000;
