//! DriveSentry CLI: argument parsing, the JSON settings file, logging
//! setup and interactive control around `drivesentry-core`.
pub mod app;
pub mod args;
pub mod control;
pub mod logging;
pub mod settings;

pub use app::{run, run_plan, Outcome};
pub use args::Args;
