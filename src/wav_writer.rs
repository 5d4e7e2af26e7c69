//! A wrapper for the hound library that writes the reconstructed mono
//! signal to a standard uncompressed 16-bit PCM WAV container.

use hound::{SampleFormat, WavSpec, WavWriter};

use std::io::Cursor;
use std::path::Path;

/// Channel count of exported audio. The device has a single microphone.
pub const NUM_CHANNELS: u16 = 1;

/// Bits per exported sample.
pub const BITS_PER_SAMPLE: u16 = 16;

/// The WAV spec for an export at the given rate: mono, 16-bit integer
/// samples.
pub fn wav_spec(sample_rate_hz: u32) -> WavSpec {
    WavSpec {
        channels: NUM_CHANNELS,
        sample_rate: sample_rate_hz,
        bits_per_sample: BITS_PER_SAMPLE,
        sample_format: SampleFormat::Int,
    }
}

/// Writes `samples` to a WAV file at `path`. Finalizing explicitly (it
/// would also happen on drop) surfaces any header-patching error instead
/// of swallowing it.
pub fn write(
    path: impl AsRef<Path>,
    samples: &[i16],
    sample_rate_hz: u32,
) -> Result<(), hound::Error> {
    let mut writer = WavWriter::create(path, wav_spec(sample_rate_hz))?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()
}

/// Encodes `samples` to an in-memory WAV container. The payload is the
/// raw little-endian `i16` sample bytes in order, preceded by the
/// canonical header.
pub fn encode(samples: &[i16], sample_rate_hz: u32) -> Result<Vec<u8>, hound::Error> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, wav_spec(sample_rate_hz))?;
        for &sample in samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}
