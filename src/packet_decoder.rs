//! Decodes the device's binary sensor packets into typed [Reading]s.
//!
//! The device sends three packet shapes, all little-endian, each starting
//! with an `i64` timestamp in microseconds:
//!
//! | Shape                | Length (bytes)    | Payload                     |
//! |----------------------|-------------------|-----------------------------|
//! | Microphone burst     | 8 + 448 * 2 = 904 | 448 x `i16` audio samples   |
//! | Luminosity           | 8 + 2 = 10        | 1 x `i16` value             |
//! | Temperature+Humidity | 8 + 2 * 2 = 12    | `i16` temp, `i16` humidity  |
//!
//! The shape is determined solely by the buffer length; any other length
//! is rejected. Decoding is pure: one buffer in, a batch of owned
//! [Reading]s out, no I/O and no shared state, so independent packets can
//! be decoded concurrently without synchronization.
//!
//! A microphone burst carries a single timestamp for the whole packet,
//! taken when the *last* sample of the burst was captured. The decoder
//! reconstructs the missing per-sample timestamps by stepping backwards
//! from it in [SAMPLE_INTERVAL_US] increments, which also chains cleanly
//! across back-to-back packets.

use crate::{NOISE_SAMPLES_PER_PACKET, SAMPLE_INTERVAL_US};

use nom::{
    combinator::all_consuming,
    multi::count,
    number::complete::{le_i16, le_i64},
    sequence::{pair, tuple},
    Finish, IResult,
};

use std::fmt;

/// Byte length of a microphone burst packet.
pub const MIC_PACKET_LEN: usize = 8 + NOISE_SAMPLES_PER_PACKET * 2;

/// Byte length of a luminosity packet.
pub const LUMINOSITY_PACKET_LEN: usize = 8 + 2;

/// Byte length of a combined temperature/humidity packet.
pub const DHT_PACKET_LEN: usize = 8 + 2 * 2;

/// The kind of sensor a [Reading] was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    /// I2S microphone audio sample.
    Microphone,
    /// Light-dependent resistor reading.
    Luminosity,
    /// DHT temperature reading, in tenths of a degree.
    Temperature,
    /// DHT relative humidity reading, in tenths of a percent.
    Humidity,
}

impl SensorKind {
    /// Single-byte tag used when a reading is written to the telemetry log.
    pub fn tag(self) -> u8 {
        match self {
            SensorKind::Microphone => 0,
            SensorKind::Luminosity => 1,
            SensorKind::Temperature => 2,
            SensorKind::Humidity => 3,
        }
    }

    /// Inverse of [SensorKind::tag].
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(SensorKind::Microphone),
            1 => Some(SensorKind::Luminosity),
            2 => Some(SensorKind::Temperature),
            3 => Some(SensorKind::Humidity),
            _ => None,
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SensorKind::Microphone => "microphone",
            SensorKind::Luminosity => "luminosity",
            SensorKind::Temperature => "temperature",
            SensorKind::Humidity => "humidity",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for SensorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "microphone" => Ok(SensorKind::Microphone),
            "luminosity" => Ok(SensorKind::Luminosity),
            "temperature" => Ok(SensorKind::Temperature),
            "humidity" => Ok(SensorKind::Humidity),
            other => Err(format!("unknown sensor kind: {}", other)),
        }
    }
}

/// One decoded observation: a value of some sensor kind at a point in time.
/// Immutable once produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reading {
    /// Microseconds since the epoch, as stamped (or reconstructed) on the
    /// device side.
    pub timestamp_us: i64,
    /// Raw signed 16-bit sensor value.
    pub value: i16,
    /// Which sensor produced the value.
    pub kind: SensorKind,
}

/// Why a packet buffer could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The buffer length matches no known packet shape.
    UnrecognizedLength(usize),
    /// The length matched a shape but the payload could not be fully
    /// parsed as that shape.
    Truncated,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::UnrecognizedLength(len) => {
                write!(f, "unrecognized packet length: {} bytes", len)
            }
            DecodeError::Truncated => write!(f, "truncated packet payload"),
        }
    }
}

impl std::error::Error for DecodeError {}

fn parse_mic_packet(buf: &[u8]) -> IResult<&[u8], (i64, Vec<i16>)> {
    pair(le_i64, count(le_i16, NOISE_SAMPLES_PER_PACKET))(buf)
}

fn parse_luminosity_packet(buf: &[u8]) -> IResult<&[u8], (i64, i16)> {
    pair(le_i64, le_i16)(buf)
}

fn parse_dht_packet(buf: &[u8]) -> IResult<&[u8], (i64, i16, i16)> {
    tuple((le_i64, le_i16, le_i16))(buf)
}

/// Reconstructs the timestamp of the `index`-th sample (0 = earliest) of
/// a burst of `burst_len` samples whose *last* sample was captured at
/// `packet_timestamp_us`.
fn burst_sample_timestamp(packet_timestamp_us: i64, burst_len: usize, index: usize) -> i64 {
    packet_timestamp_us - (burst_len as i64 - 1 - index as i64) * SAMPLE_INTERVAL_US
}

/// Decodes one raw packet buffer into a batch of [Reading]s.
///
/// The packet shape is chosen from `buf.len()` alone. Microphone bursts
/// expand into [NOISE_SAMPLES_PER_PACKET] readings with reconstructed
/// per-sample timestamps; a luminosity packet yields one reading; a
/// temperature/humidity packet yields two readings sharing its timestamp.
pub fn decode(buf: &[u8]) -> Result<Vec<Reading>, DecodeError> {
    match buf.len() {
        MIC_PACKET_LEN => {
            let (_, (timestamp_us, samples)) = all_consuming(parse_mic_packet)(buf)
                .finish()
                .map_err(|_: nom::error::Error<&[u8]>| DecodeError::Truncated)?;
            Ok(samples
                .iter()
                .enumerate()
                .map(|(i, &value)| Reading {
                    timestamp_us: burst_sample_timestamp(timestamp_us, samples.len(), i),
                    value,
                    kind: SensorKind::Microphone,
                })
                .collect())
        }
        LUMINOSITY_PACKET_LEN => {
            let (_, (timestamp_us, value)) = all_consuming(parse_luminosity_packet)(buf)
                .finish()
                .map_err(|_: nom::error::Error<&[u8]>| DecodeError::Truncated)?;
            Ok(vec![Reading {
                timestamp_us,
                value,
                kind: SensorKind::Luminosity,
            }])
        }
        DHT_PACKET_LEN => {
            let (_, (timestamp_us, temperature, humidity)) = all_consuming(parse_dht_packet)(buf)
                .finish()
                .map_err(|_: nom::error::Error<&[u8]>| DecodeError::Truncated)?;
            Ok(vec![
                Reading {
                    timestamp_us,
                    value: temperature,
                    kind: SensorKind::Temperature,
                },
                Reading {
                    timestamp_us,
                    value: humidity,
                    kind: SensorKind::Humidity,
                },
            ])
        }
        other => Err(DecodeError::UnrecognizedLength(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mic_packet(timestamp_us: i64, sample: i16) -> Vec<u8> {
        let mut buf = timestamp_us.to_le_bytes().to_vec();
        for _ in 0..NOISE_SAMPLES_PER_PACKET {
            buf.extend_from_slice(&sample.to_le_bytes());
        }
        buf
    }

    #[test]
    fn mic_burst_reconstructs_backwards_from_trailing_timestamp() {
        let buf = mic_packet(1_000_000, 100);
        assert_eq!(buf.len(), MIC_PACKET_LEN);

        let readings = decode(&buf).unwrap();
        assert_eq!(readings.len(), NOISE_SAMPLES_PER_PACKET);

        for (i, r) in readings.iter().enumerate() {
            assert_eq!(r.timestamp_us, 1_000_000 - (447 - i as i64) * 125);
            assert_eq!(r.value, 100);
            assert_eq!(r.kind, SensorKind::Microphone);
        }

        // Evenly spaced by exactly one sample interval, ending on the
        // packet timestamp.
        for pair in readings.windows(2) {
            assert_eq!(pair[1].timestamp_us - pair[0].timestamp_us, SAMPLE_INTERVAL_US);
        }
        assert_eq!(readings.last().unwrap().timestamp_us, 1_000_000);
        assert_eq!(readings[0].timestamp_us, 1_000_000 - 447 * 125);
    }

    #[test]
    fn consecutive_bursts_chain_by_one_interval() {
        let first = decode(&mic_packet(1_000_000, 0)).unwrap();
        let next_ts = 1_000_000 + NOISE_SAMPLES_PER_PACKET as i64 * SAMPLE_INTERVAL_US;
        let second = decode(&mic_packet(next_ts, 0)).unwrap();

        let gap = second[0].timestamp_us - first.last().unwrap().timestamp_us;
        assert_eq!(gap, SAMPLE_INTERVAL_US);
    }

    #[test]
    fn luminosity_packet_keeps_its_timestamp() {
        let mut buf = 5_000_000i64.to_le_bytes().to_vec();
        buf.extend_from_slice(&(-42i16).to_le_bytes());

        let readings = decode(&buf).unwrap();
        assert_eq!(
            readings,
            vec![Reading {
                timestamp_us: 5_000_000,
                value: -42,
                kind: SensorKind::Luminosity,
            }]
        );
    }

    #[test]
    fn dht_packet_yields_paired_readings() {
        let mut buf = 77i64.to_le_bytes().to_vec();
        buf.extend_from_slice(&231i16.to_le_bytes()); // 23.1 C
        buf.extend_from_slice(&455i16.to_le_bytes()); // 45.5 %

        let readings = decode(&buf).unwrap();
        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0].kind, SensorKind::Temperature);
        assert_eq!(readings[0].value, 231);
        assert_eq!(readings[1].kind, SensorKind::Humidity);
        assert_eq!(readings[1].value, 455);
        assert!(readings.iter().all(|r| r.timestamp_us == 77));
    }

    #[test]
    fn unknown_lengths_are_rejected() {
        for len in [0usize, 1, 8, 9, 11, 13, 903, 905, 1024] {
            let buf = vec![0u8; len];
            assert_eq!(decode(&buf), Err(DecodeError::UnrecognizedLength(len)));
        }
    }

    #[test]
    fn kind_tags_round_trip() {
        for kind in [
            SensorKind::Microphone,
            SensorKind::Luminosity,
            SensorKind::Temperature,
            SensorKind::Humidity,
        ] {
            assert_eq!(SensorKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(SensorKind::from_tag(4), None);
    }
}
