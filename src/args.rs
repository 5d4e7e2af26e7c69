// Commandline argument parser using clap for telewav

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser, Clone)]
#[clap(version, about)]
pub struct TelewavArgs {
    #[command(subcommand, long_about)]
    /// Which task to perform: ingest packets, export audio, or print
    /// series statistics
    pub command: CommandTask,
}

#[derive(Debug, Subcommand, Clone)]
pub enum CommandTask {
    /// Decode sensor packets from a device (or the simulator) into the
    /// telemetry log
    #[command(about)]
    Ingest(IngestCommand),

    /// Reconstruct the microphone series into WAV files
    #[command(about)]
    Export(ExportCommand),

    /// Print reading count and observed sample rate for one sensor kind
    #[command(about)]
    Stats(StatsCommand),
}

#[derive(Debug, Args, Clone)]
#[command(version, about)]
pub struct IngestCommand {
    /// Telemetry log file to append decoded readings to
    #[arg(short = 'l', long = "log", default_value = "telemetry.log")]
    pub logfile: String,

    /// Serial device to read length-prefixed packets from
    #[arg(short = 'd', long = "device")]
    pub device: Option<String>,

    /// Generate this many synthetic packets instead of reading hardware
    #[arg(long = "simulate", conflicts_with = "device")]
    pub simulate: Option<usize>,
}

#[derive(Debug, Args, Clone)]
#[command(version, about)]
pub struct ExportCommand {
    /// Telemetry log file to read microphone readings from
    #[arg(short = 'l', long = "log", default_value = "telemetry.log")]
    pub logfile: String,

    /// Filename for the filtered audio output
    #[arg(short = 'o', long = "out", default_value = "output_filtered.wav")]
    pub outfile: String,

    /// Optional filename for the pre-filter, gain-only audio output
    #[arg(long = "gained-out")]
    pub gained_outfile: Option<String>,

    /// Target sample rate of the output, in Hz
    #[arg(short = 'r', long = "rate", default_value_t = 8000)]
    pub rate: u32,

    /// Constant gain factor applied after resampling. 1.0 means no gain
    #[arg(short = 'g', long = "gain", default_value_t = 1.0)]
    pub gain: f64,

    /// Low-pass cutoff frequency in Hz
    #[arg(short = 'c', long = "cutoff", default_value_t = 3500.0)]
    pub cutoff: f64,
}

#[derive(Debug, Args, Clone)]
#[command(version, about)]
pub struct StatsCommand {
    /// Telemetry log file to read from
    #[arg(short = 'l', long = "log", default_value = "telemetry.log")]
    pub logfile: String,

    /// Sensor kind to summarize: microphone, luminosity, temperature,
    /// or humidity
    #[arg(short = 'k', long = "kind", default_value = "microphone")]
    pub kind: String,
}
