//! This module provides the on-disk store for decoded [Reading]s: an
//! append-only log file that the ingestion loop writes batches into and
//! the export pipeline reads whole series back out of. The files have
//! the following structure:
//!
//! - First a small header with metadata, currently just the format
//!   version, encoded using [serde] and [ron]. In the file it appears as
//!   `(version:1)`.
//! - Then a separator, which is a byte of all 1s; `0xFF`.
//! - Finally the records, 11 bytes each: an `i64` little-endian
//!   timestamp in microseconds, an `i16` little-endian value, and a
//!   one-byte sensor kind tag (see [SensorKind::tag]).
//!
//! Writes are batched: a whole packet's readings are serialized first
//! and appended with a single write, so the log never gains a partial
//! batch from this crate's side. Failures are surfaced to the caller;
//! nothing here retries.

use crate::packet_decoder::{Reading, SensorKind};

use serde::{Deserialize, Serialize};
use std::{
    borrow::Cow,
    fmt,
    fs::{File, OpenOptions},
    io::{Read, Write},
    path::{Path, PathBuf},
};

/// Current log format version, stored in the header.
const FORMAT_VERSION: u32 = 1;

/// Bytes per record: i64 timestamp + i16 value + u8 kind tag.
const RECORD_LEN: usize = 8 + 2 + 1;

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
struct TelemetryLogHeader {
    version: u32,
}

/// A nice little error for everything that can go wrong while creating,
/// appending to, or reading back a telemetry log.
#[derive(Debug)]
pub enum TelemetryLogError {
    /// Returned when io fails while reading or writing the log file.
    IoError(std::io::Error),

    /// Returned when serialization of the header fails.
    RonError(ron::Error),

    /// Returned when deserialization of the header fails.
    RonSpannedError(ron::de::SpannedError),

    /// Returned when the delimiter between header and records is missing.
    NoDelimiter,

    /// Returned when the record section's length is not a whole number
    /// of records.
    TruncatedRecord,

    /// Returned when a record carries a sensor kind tag this version
    /// does not know.
    UnknownKind(u8),

    /// Returned when the file's header names a format version this
    /// version of the crate cannot read.
    BadVersion(u32),
}

impl fmt::Display for TelemetryLogError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use TelemetryLogError as TLE;
        let msg = match self {
            TLE::IoError(error) => Cow::from(format!("io error: {}", error)),
            TLE::RonError(error) => Cow::from(format!("ron error: {}", error)),
            TLE::RonSpannedError(error) => Cow::from(format!("ron spanning error: {}", error)),
            TLE::NoDelimiter => Cow::from("no delimiter in telemetry log"),
            TLE::TruncatedRecord => Cow::from("telemetry log ends mid-record"),
            TLE::UnknownKind(tag) => Cow::from(format!("unknown sensor kind tag: {}", tag)),
            TLE::BadVersion(v) => Cow::from(format!("unsupported log format version: {}", v)),
        };

        write!(f, "{}", msg)
    }
}

impl std::error::Error for TelemetryLogError {}

impl From<std::io::Error> for TelemetryLogError {
    fn from(value: std::io::Error) -> Self {
        Self::IoError(value)
    }
}

/// An append-only file of timestamped sensor readings. Acts as both the
/// reading sink for the ingestion loop and the reading source for the
/// export pipeline.
#[derive(Debug, Clone)]
pub struct TelemetryLog {
    path: PathBuf,
}

impl TelemetryLog {
    /// Creates a new, empty log at `path` (truncating anything already
    /// there) and writes the header.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, TelemetryLogError> {
        let mut file = File::create(&path)?;

        let header = TelemetryLogHeader {
            version: FORMAT_VERSION,
        };
        let h_str = ron::ser::to_string(&header).map_err(TelemetryLogError::RonError)?;
        file.write_all(h_str.as_bytes())?;
        file.write_all(&[0xFF])?;

        Ok(Self {
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Opens an existing log at `path`, validating its header.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TelemetryLogError> {
        let log = Self {
            path: path.as_ref().to_path_buf(),
        };
        // Reading the whole file just to validate is fine at the sizes
        // involved, and exercises the same path the export uses.
        log.read_all()?;
        Ok(log)
    }

    /// Opens `path` if it already holds a log, otherwise creates one.
    pub fn open_or_create(path: impl AsRef<Path>) -> Result<Self, TelemetryLogError> {
        if path.as_ref().exists() {
            Self::open(path)
        } else {
            Self::create(path)
        }
    }

    /// Appends a batch of readings. The batch is serialized up front and
    /// handed to the file in one write, so a failure leaves no partial
    /// batch bookkeeping on this side.
    pub fn append(&self, readings: &[Reading]) -> Result<(), TelemetryLogError> {
        let mut buf = Vec::with_capacity(readings.len() * RECORD_LEN);
        for r in readings {
            buf.extend_from_slice(&r.timestamp_us.to_le_bytes());
            buf.extend_from_slice(&r.value.to_le_bytes());
            buf.push(r.kind.tag());
        }

        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        file.write_all(&buf)?;
        Ok(())
    }

    /// Returns every stored reading of the given kind, ascending by
    /// timestamp. The sort is stable, so readings sharing a timestamp
    /// keep their arrival order.
    pub fn readings_of_kind(&self, kind: SensorKind) -> Result<Vec<Reading>, TelemetryLogError> {
        let mut readings: Vec<Reading> = self
            .read_all()?
            .into_iter()
            .filter(|r| r.kind == kind)
            .collect();
        readings.sort_by_key(|r| r.timestamp_us);
        Ok(readings)
    }

    /// Reads and decodes the whole log in file order.
    fn read_all(&self) -> Result<Vec<Reading>, TelemetryLogError> {
        let mut raw = Vec::new();
        File::open(&self.path)?.read_to_end(&mut raw)?;

        let delim_idx = raw
            .iter()
            .position(|&b| b == 0xFF)
            .ok_or(TelemetryLogError::NoDelimiter)?;

        let (header_buf, records_buf) = raw.split_at(delim_idx);
        let records_buf = &records_buf[1..];

        let header = ron::de::from_bytes::<TelemetryLogHeader>(header_buf)
            .map_err(TelemetryLogError::RonSpannedError)?;
        if header.version != FORMAT_VERSION {
            return Err(TelemetryLogError::BadVersion(header.version));
        }

        if records_buf.len() % RECORD_LEN != 0 {
            return Err(TelemetryLogError::TruncatedRecord);
        }

        records_buf
            .chunks_exact(RECORD_LEN)
            .map(|rec| {
                let ts_bytes: [u8; 8] = rec[0..8]
                    .try_into()
                    .map_err(|_| TelemetryLogError::TruncatedRecord)?;
                let value_bytes: [u8; 2] = rec[8..10]
                    .try_into()
                    .map_err(|_| TelemetryLogError::TruncatedRecord)?;
                let timestamp_us = i64::from_le_bytes(ts_bytes);
                let value = i16::from_le_bytes(value_bytes);
                let kind = SensorKind::from_tag(rec[10])
                    .ok_or(TelemetryLogError::UnknownKind(rec[10]))?;
                Ok(Reading {
                    timestamp_us,
                    value,
                    kind,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn reading(timestamp_us: i64, value: i16, kind: SensorKind) -> Reading {
        Reading {
            timestamp_us,
            value,
            kind,
        }
    }

    #[test]
    fn append_and_read_back_by_kind() {
        let dir = tempfile::tempdir().unwrap();
        let log = TelemetryLog::create(dir.path().join("telemetry.log")).unwrap();

        log.append(&[
            reading(3, 30, SensorKind::Microphone),
            reading(1, 10, SensorKind::Microphone),
            reading(1, 99, SensorKind::Luminosity),
        ])
        .unwrap();
        log.append(&[reading(2, 20, SensorKind::Microphone)]).unwrap();

        let mic = log.readings_of_kind(SensorKind::Microphone).unwrap();
        assert_eq!(
            mic,
            vec![
                reading(1, 10, SensorKind::Microphone),
                reading(2, 20, SensorKind::Microphone),
                reading(3, 30, SensorKind::Microphone),
            ]
        );

        let lum = log.readings_of_kind(SensorKind::Luminosity).unwrap();
        assert_eq!(lum, vec![reading(1, 99, SensorKind::Luminosity)]);
        assert!(log.readings_of_kind(SensorKind::Humidity).unwrap().is_empty());
    }

    #[test]
    fn tied_timestamps_keep_arrival_order() {
        let dir = tempfile::tempdir().unwrap();
        let log = TelemetryLog::create(dir.path().join("telemetry.log")).unwrap();

        log.append(&[
            reading(5, 1, SensorKind::Temperature),
            reading(5, 2, SensorKind::Temperature),
            reading(5, 3, SensorKind::Temperature),
        ])
        .unwrap();

        let values: Vec<i16> = log
            .readings_of_kind(SensorKind::Temperature)
            .unwrap()
            .iter()
            .map(|r| r.value)
            .collect();
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[test]
    fn open_validates_an_existing_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("telemetry.log");

        let log = TelemetryLog::create(&path).unwrap();
        log.append(&[reading(1, 1, SensorKind::Humidity)]).unwrap();

        let reopened = TelemetryLog::open(&path).unwrap();
        assert_eq!(
            reopened.readings_of_kind(SensorKind::Humidity).unwrap().len(),
            1
        );
    }

    #[test]
    fn open_or_create_creates_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fresh.log");

        let log = TelemetryLog::open_or_create(&path).unwrap();
        assert!(log.readings_of_kind(SensorKind::Microphone).unwrap().is_empty());
    }

    #[test]
    fn missing_delimiter_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.log");
        fs::write(&path, b"(version:1)").unwrap();

        assert!(matches!(
            TelemetryLog::open(&path),
            Err(TelemetryLogError::NoDelimiter)
        ));
    }

    #[test]
    fn partial_record_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.log");

        let log = TelemetryLog::create(&path).unwrap();
        log.append(&[reading(1, 1, SensorKind::Microphone)]).unwrap();

        // Chop the last byte off the final record.
        let mut raw = fs::read(&path).unwrap();
        raw.pop();
        fs::write(&path, raw).unwrap();

        assert!(matches!(
            log.readings_of_kind(SensorKind::Microphone),
            Err(TelemetryLogError::TruncatedRecord)
        ));
    }

    #[test]
    fn unknown_kind_tag_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.log");

        let log = TelemetryLog::create(&path).unwrap();
        log.append(&[reading(1, 1, SensorKind::Microphone)]).unwrap();

        let mut raw = fs::read(&path).unwrap();
        let last = raw.len() - 1;
        raw[last] = 200;
        fs::write(&path, raw).unwrap();

        assert!(matches!(
            log.readings_of_kind(SensorKind::Microphone),
            Err(TelemetryLogError::UnknownKind(200))
        ));
    }

    #[test]
    fn unsupported_version_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.log");
        let mut raw = b"(version:9)".to_vec();
        raw.push(0xFF);
        fs::write(&path, raw).unwrap();

        assert!(matches!(
            TelemetryLog::open(&path),
            Err(TelemetryLogError::BadVersion(9))
        ));
    }
}
