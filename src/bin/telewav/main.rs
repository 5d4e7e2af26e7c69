//! The telewav command line tool: ingest sensor packets into a telemetry
//! log, export the stored microphone series as WAV audio, or print
//! series statistics.

use clap::Parser;
use telewav::{
    args::{
        CommandTask::{Export, Ingest, Stats},
        ExportCommand, IngestCommand, StatsCommand, TelewavArgs,
    },
    dummy_device::DummyDevice,
    filter::lowpass,
    packet_decoder::{decode, SensorKind},
    resample::{apply_gain, resample},
    series::SampleSeries,
    telemetry_log::TelemetryLog,
    wav_writer,
};

use log::{info, warn};
use serial2::SerialPort;
use std::{
    error::Error,
    io,
    str::FromStr,
    time::{SystemTime, UNIX_EPOCH},
};

// Examples:
// cargo run -- ingest --log telemetry.log --simulate 500
// cargo run -- export --log telemetry.log
//                     --out output_filtered.wav
//                     --gained-out output_gained.wav
//                     --rate 8000 --gain 3.0 --cutoff 3500
// cargo run -- stats --kind luminosity

fn main() {
    env_logger::init();
    let args = TelewavArgs::parse();

    let result = match args.command {
        Ingest(cmd) => run_ingest(cmd),
        Export(cmd) => run_export(cmd),
        Stats(cmd) => run_stats(cmd),
    };

    if let Err(error) = result {
        eprintln!("telewav: {}", error);
        std::process::exit(1);
    }
}

/// Decodes packets from the chosen source into the telemetry log. One
/// malformed packet is dropped with a warning; the loop keeps going.
/// Only a persistence failure aborts ingestion.
fn run_ingest(cmd: IngestCommand) -> Result<(), Box<dyn Error>> {
    let log = TelemetryLog::open_or_create(&cmd.logfile)?;

    if let Some(packet_count) = cmd.simulate {
        let start_us = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before the epoch")
            .as_micros() as i64;
        let device = DummyDevice::new(start_us, 440.0, 8000.0, 100.0);

        for packet in device.take(packet_count) {
            ingest_packet(&log, &packet)?;
        }
        info!("simulated {} packets into {}", packet_count, cmd.logfile);
        return Ok(());
    }

    let device_name = match cmd.device {
        Some(name) => name,
        None => prompt_for_device()?,
    };

    let mut port = SerialPort::open(device_name.trim(), 115200)?;
    port.set_read_timeout(std::time::Duration::MAX)?;

    // Over the raw serial byte stream every packet is preceded by its
    // u16 little-endian byte length, so the decoder always sees exactly
    // one fixed-layout buffer.
    loop {
        let mut len_buf = [0u8; 2];
        read_exact_from_port(&port, &mut len_buf)?;
        let packet_len = u16::from_le_bytes(len_buf) as usize;
        if packet_len == 0 {
            continue;
        }

        let mut packet = vec![0u8; packet_len];
        read_exact_from_port(&port, &mut packet)?;
        ingest_packet(&log, &packet)?;
    }
}

/// Decodes one packet and appends the batch to the log. Decode failures
/// are isolated to the packet; log failures are returned.
fn ingest_packet(log: &TelemetryLog, packet: &[u8]) -> Result<(), Box<dyn Error>> {
    match decode(packet) {
        Ok(readings) => {
            log.append(&readings)?;
        }
        Err(error) => {
            warn!("dropping bad packet: {}", error);
        }
    }
    Ok(())
}

/// Lists available serial ports and reads the device name from stdin.
fn prompt_for_device() -> Result<String, Box<dyn Error>> {
    let available_ports = SerialPort::available_ports()?;
    println!("Available devices:");
    for port in available_ports {
        println!("\t{}", port.to_string_lossy());
    }
    println!("Enter the device name: ");
    let mut device_name = String::new();
    io::stdin().read_line(&mut device_name)?;
    Ok(device_name)
}

/// Blocks until `buf` is filled from the port.
fn read_exact_from_port(port: &SerialPort, buf: &mut [u8]) -> io::Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        let read_len = port.read(&mut buf[filled..])?;
        if read_len == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "device disconnected",
            ));
        }
        filled += read_len;
    }
    Ok(())
}

/// Runs the offline reconstruction pipeline: resample the stored
/// microphone series to a uniform rate, apply gain, low-pass filter,
/// and write the WAV file(s).
fn run_export(cmd: ExportCommand) -> Result<(), Box<dyn Error>> {
    let log = TelemetryLog::open(&cmd.logfile)?;
    let readings = log.readings_of_kind(SensorKind::Microphone)?;
    let series = SampleSeries::from_readings(SensorKind::Microphone, &readings);

    if series.is_empty() {
        warn!("no microphone readings in {}, nothing to export", cmd.logfile);
        return Ok(());
    }

    info!(
        "{} readings, observed rate {:.2} Hz, span {} us to {} us",
        series.len(),
        series.average_frequency(),
        series.first_timestamp_us().unwrap_or(0),
        series.last_timestamp_us().unwrap_or(0),
    );

    let uniform = resample(&series, cmd.rate);
    let gained = apply_gain(&uniform, cmd.gain);

    if let Some(gained_outfile) = &cmd.gained_outfile {
        wav_writer::write(gained_outfile, &gained, cmd.rate)?;
        info!("wrote {} ({} samples)", gained_outfile, gained.len());
    }

    let filtered = lowpass(&gained, cmd.cutoff, cmd.rate);
    wav_writer::write(&cmd.outfile, &filtered, cmd.rate)?;
    info!(
        "wrote {} ({} samples at {} Hz)",
        cmd.outfile,
        filtered.len(),
        cmd.rate
    );

    Ok(())
}

/// Prints the diagnostic summary of one stored series.
fn run_stats(cmd: StatsCommand) -> Result<(), Box<dyn Error>> {
    let kind = SensorKind::from_str(&cmd.kind)?;
    let log = TelemetryLog::open(&cmd.logfile)?;
    let readings = log.readings_of_kind(kind)?;
    let series = SampleSeries::from_readings(kind, &readings);

    println!("kind:           {}", kind);
    println!("readings:       {}", series.len());
    println!("observed rate:  {:.2} Hz", series.average_frequency());
    if let (Some(first), Some(last)) =
        (series.first_timestamp_us(), series.last_timestamp_us())
    {
        println!("first reading:  {} us", first);
        println!("last reading:   {} us", last);
    }

    Ok(())
}
