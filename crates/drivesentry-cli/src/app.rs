//! Application wiring: settings → watchers → supervisor → exit code.
use crate::args::Args;
use crate::control::{self, Control};
use crate::logging;
use crate::settings::{Settings, WatchPlan};
use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::CommandFactory;
use crossbeam_channel::{never, select, unbounded, Receiver};
use drivesentry_core::notify::{NotificationSink, TracingSink};
use drivesentry_core::source::EventSource;
use drivesentry_core::{DeviceKind, Supervisor, SystemSource, Watcher, WatcherConfig, WatcherExit};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Why the main loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The operator asked to quit.
    Requested,
    /// Every watcher terminated without being asked to.
    AllWatchersStopped,
}

impl Outcome {
    pub fn exit_code(self) -> ExitCode {
        match self {
            Self::Requested => ExitCode::SUCCESS,
            Self::AllWatchersStopped => ExitCode::FAILURE,
        }
    }
}

/// Entry point for the binary.
pub fn run(args: Args) -> Result<ExitCode> {
    let mut settings = match &args.config {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    settings.apply_args(&args);

    let plan = match settings.validate() {
        Ok(plan) => plan,
        // Exits with clap's usage-error status (2).
        Err(e) => Args::command().error(ErrorKind::ValueValidation, e).exit(),
    };

    logging::init_logging(&settings.logging())?;
    logging::setup_panic_hook();

    info!(
        "DriveSentry starting: {} watchers ({}), poll timeout {:?}",
        plan.kinds.len() * plan.modes.len(),
        plan.discipline,
        plan.poll_timeout
    );

    let (control_tx, control_rx) = unbounded();
    control::install_interrupt_handler(control_tx.clone())
        .context("Failed to install Ctrl-C handler")?;
    control::spawn_input_reader(std::io::BufReader::new(std::io::stdin()), control_tx)
        .context("Failed to start input reader")?;
    println!("Watching. Type q and press Enter (or press Ctrl-C) to quit.");

    let outcome = run_plan(
        &plan,
        Arc::new(SystemSource::new()),
        Arc::new(TracingSink),
        &control_rx,
    )?;
    Ok(outcome.exit_code())
}

/// One watcher per (selected kind, selected mode).
pub fn build_watchers(
    plan: &WatchPlan,
    source: Arc<dyn EventSource>,
    sink: Arc<dyn NotificationSink>,
) -> Vec<Watcher> {
    plan.kinds
        .iter()
        .flat_map(|&kind| plan.modes.iter().map(move |&mode| (kind, mode)))
        .map(|(kind, mode)| {
            let config = WatcherConfig::new(kind, mode)
                .with_only_removable(kind == DeviceKind::LogicalDisk && plan.only_removable)
                .with_poll_timeout(plan.poll_timeout);
            Watcher::new(config, Arc::clone(&source), Arc::clone(&sink))
        })
        .collect()
}

/// Start the watchers for `plan` and block until a quit request arrives on
/// `control` or every watcher has terminated. All watchers are stopped
/// before this returns.
pub fn run_plan(
    plan: &WatchPlan,
    source: Arc<dyn EventSource>,
    sink: Arc<dyn NotificationSink>,
    control: &Receiver<Control>,
) -> Result<Outcome> {
    let watchers = build_watchers(plan, source, sink);
    let supervisor =
        Supervisor::start(watchers, plan.discipline).context("Failed to start watchers")?;

    let outcome = wait_for_quit(&supervisor, control);
    match outcome {
        Outcome::Requested => info!("Stopping watchers"),
        Outcome::AllWatchersStopped => error!("Every watcher has stopped; nothing left to watch"),
    }
    supervisor.stop();
    supervisor.take_exits().iter().for_each(report_exit);
    info!("DriveSentry stopped");
    Ok(outcome)
}

fn wait_for_quit(supervisor: &Supervisor, control: &Receiver<Control>) -> Outcome {
    let mut control = control.clone();
    let exits = supervisor.exits();
    loop {
        select! {
            recv(control) -> msg => match msg {
                Ok(Control::Quit) => {
                    info!("Quit requested");
                    return Outcome::Requested;
                }
                Ok(Control::Interrupt) => {
                    info!("Interrupted");
                    return Outcome::Requested;
                }
                // No one left to ask for a quit; only the watchers can end
                // the loop now.
                Err(_) => control = never(),
            },
            recv(exits) -> exit => match exit {
                Ok(exit) => report_exit(&exit),
                Err(_) => return Outcome::AllWatchersStopped,
            },
        }
    }
}

fn report_exit(exit: &WatcherExit) {
    match &exit.result {
        Ok(stats) => debug!("Watcher {} exited: {:?}", exit.name, stats),
        Err(e) => warn!("Watcher {} is no longer watching: {}", exit.name, e),
    }
}
