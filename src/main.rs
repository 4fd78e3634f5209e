//! DriveSentry: watch logical disks and portable devices for insertion,
//! change and removal.
//!
//! Thin binary entry point. All logic lives in the `drivesentry-core`
//! and `drivesentry-cli` crates.
use clap::Parser;
use std::process::ExitCode;

fn main() -> anyhow::Result<ExitCode> {
    drivesentry_cli::run(drivesentry_cli::Args::parse())
}
