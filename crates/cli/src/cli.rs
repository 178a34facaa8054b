//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Kinect Stream - depth camera + body tracking acquisition pipeline
#[derive(Parser, Debug)]
#[command(
    name = "kinect-stream",
    author,
    version,
    about = "Depth camera and body tracking acquisition pipeline",
    long_about = "Opens a depth camera, runs skeletal tracking on every capture and \n\
                  publishes the latest assembled frame to consumers polling at their \n\
                  own rate. Without hardware attached it runs against the mock device."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "KINECT_STREAM_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "KINECT_STREAM_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start a session and consume frames
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "config.toml",
        env = "KINECT_STREAM_CONFIG"
    )]
    pub config: PathBuf,

    /// Override the device index from configuration
    #[arg(long, env = "KINECT_STREAM_DEVICE_INDEX")]
    pub device_index: Option<u32>,

    /// Override the simulated body count
    #[arg(long)]
    pub bodies: Option<u32>,

    /// Stop after consuming this many frames (0 = unlimited)
    #[arg(long, default_value = "0", env = "KINECT_STREAM_MAX_FRAMES")]
    pub max_frames: u64,

    /// Stop after this many seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "KINECT_STREAM_TIMEOUT")]
    pub timeout: u64,

    /// Validate configuration and exit without opening the device
    #[arg(long)]
    pub dry_run: bool,

    /// Prometheus metrics port (0 = disabled)
    #[arg(long, default_value = "0", env = "KINECT_STREAM_METRICS_PORT")]
    pub metrics_port: u16,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show the calibration the mock device reports for this mode
    #[arg(long)]
    pub calibration: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
