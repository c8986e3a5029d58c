//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "trainer", version, about = "Smart trainer control CLI")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/trainer_config.toml")]
    pub config: PathBuf,

    /// Log as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace)
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum RideMode {
    Idle,
    Erg,
    Sim,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum TableName {
    Power,
    Erg,
    Sim,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a simulated ride against the bench rig and stream snapshots
    Ride {
        /// Simulated ride length in seconds (virtual time)
        #[arg(long, value_name = "SECS", default_value_t = 30)]
        duration_s: u64,
        /// Simulated wheel speed in mph
        #[arg(long, value_name = "MPH", default_value_t = 18.0)]
        speed_mph: f32,
        /// Control mode for the ride
        #[arg(long, value_enum, default_value_t = RideMode::Erg)]
        mode: RideMode,
        /// ERG watt target (erg mode)
        #[arg(long, value_name = "WATTS")]
        watts: Option<u16>,
        /// Grade in percent (sim mode)
        #[arg(long, value_name = "PCT", allow_hyphen_values = true)]
        grade: Option<f32>,
        /// Snapshot print interval in virtual milliseconds
        #[arg(long, value_name = "MS", default_value_t = 1000)]
        report_ms: u64,
        /// Directory for persisted calibration (file-backed settings store)
        #[arg(long, value_name = "DIR")]
        settings_dir: Option<PathBuf>,
    },
    /// Run the homing sequence and report the outcome
    Home {
        /// Simulated carriage start offset in steps above the switch
        #[arg(long, value_name = "STEPS", default_value_t = 300)]
        start_steps: i64,
    },
    /// Interpolate one calibration table at a query point
    Lookup {
        /// Which table to query
        #[arg(long, value_enum)]
        table: TableName,
        /// Wheel speed in mph
        #[arg(long, value_name = "MPH")]
        speed: f64,
        /// Second coordinate: position (power), watts (erg) or grade % (sim)
        #[arg(long, value_name = "VALUE", allow_hyphen_values = true)]
        at: f64,
    },
    /// Quick health check (hardware presence / sim ok)
    SelfCheck,
}
