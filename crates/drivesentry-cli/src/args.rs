//! Command-line arguments.
use crate::logging::LogFormat;
use clap::Parser;
use drivesentry_core::WatchMode;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone, Default, PartialEq)]
#[command(name = "drivesentry", version)]
#[command(about = "Watch logical disks and portable devices for insertion, change and removal")]
#[command(
    after_help = "Type q and press Enter (or press Ctrl-C) to stop all watchers and exit."
)]
pub struct Args {
    /// Watch logical disks (drive letters / mount points)
    #[arg(long, short)]
    pub logical: bool,

    /// Watch portable devices (phones, cameras, media players)
    #[arg(long, short)]
    pub portable: bool,

    /// Watch modes to run, comma separated [default: all]
    #[arg(long, value_delimiter = ',', value_name = "create,modify,delete,operation")]
    pub events: Option<Vec<WatchMode>>,

    /// Report logical disks of every type, not only removable ones
    #[arg(long)]
    pub all_drives: bool,

    /// Bounded wait per poll, in milliseconds [default: 100]
    #[arg(long, value_name = "MS")]
    pub timeout_ms: Option<u64>,

    /// Drive every watcher from one thread instead of one thread each
    #[arg(long)]
    pub cooperative: bool,

    /// JSON settings file; command-line flags override its values
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, short)]
    pub verbose: bool,

    /// Log line format
    #[arg(long, value_enum, value_name = "FORMAT")]
    pub log_format: Option<LogFormat>,
}
