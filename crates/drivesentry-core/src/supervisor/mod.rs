//! Supervisor: owns a fixed set of watchers, drives them under one
//! concurrency discipline, and shuts them down together.
//!
//! # Usage
//!
//! ```ignore
//! let supervisor = Supervisor::start(watchers, Discipline::ThreadPerWatcher)?;
//! // ... later, from any thread:
//! supervisor.stop();
//! for exit in supervisor.take_exits() { /* ... */ }
//! ```
//!
//! Both disciplines host the same [`Watcher::step`] loop body and produce
//! the same notifications. They differ only in where that loop runs.
pub mod cooperative;
pub mod threaded;

pub use cooperative::{CooperativeDriver, CooperativeTask, Resume};

use crate::error::WatchError;
use crate::watcher::{Watcher, WatcherHandle, WatcherStats};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError};
use parking_lot::Mutex;
use serde::Deserialize;
use std::fmt;
use std::io;
use std::str::FromStr;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// How watchers are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(try_from = "String")]
pub enum Discipline {
    /// One OS thread per watcher.
    #[default]
    ThreadPerWatcher,
    /// All watchers resumed in turn from a single driver thread.
    Cooperative,
}

impl Discipline {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ThreadPerWatcher => "threaded",
            Self::Cooperative => "cooperative",
        }
    }
}

impl fmt::Display for Discipline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown discipline {0:?} (expected threaded or cooperative)")]
pub struct ParseDisciplineError(pub String);

impl FromStr for Discipline {
    type Err = ParseDisciplineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "threaded" | "thread" | "threads" => Ok(Self::ThreadPerWatcher),
            "cooperative" | "coop" => Ok(Self::Cooperative),
            other => Err(ParseDisciplineError(other.to_owned())),
        }
    }
}

impl TryFrom<String> for Discipline {
    type Error = ParseDisciplineError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// Final report of a watcher that left its loop.
#[derive(Debug)]
pub struct WatcherExit {
    pub name: String,
    /// Counters on a clean stop, or the fatal error that ended it.
    pub result: Result<WatcherStats, WatchError>,
}

/// Owner of a running watcher set.
pub struct Supervisor {
    discipline: Discipline,
    handles: Vec<WatcherHandle>,
    threads: Mutex<Vec<JoinHandle<()>>>,
    exit_rx: Receiver<WatcherExit>,
    /// Exits received while waiting, not yet handed to `take_exits`.
    received: Mutex<Vec<WatcherExit>>,
}

impl Supervisor {
    /// Start every watcher under `discipline`.
    ///
    /// Fails only if the OS refuses to spawn a thread; in that case no
    /// watcher is left running.
    pub fn start(watchers: Vec<Watcher>, discipline: Discipline) -> io::Result<Self> {
        let handles: Vec<WatcherHandle> = watchers.iter().map(Watcher::handle).collect();
        let (exit_tx, exit_rx) = unbounded();

        let threads = match discipline {
            Discipline::ThreadPerWatcher => threaded::spawn_watchers(watchers, &exit_tx)?,
            Discipline::Cooperative => {
                let driver = CooperativeDriver::new(watchers);
                vec![thread::Builder::new()
                    .name("drivesentry-driver".to_owned())
                    .spawn(move || driver.run(exit_tx))?]
            }
        };

        info!(
            "Supervisor started {} watchers ({} discipline)",
            handles.len(),
            discipline
        );

        Ok(Self {
            discipline,
            handles,
            threads: Mutex::new(threads),
            exit_rx,
            received: Mutex::new(Vec::new()),
        })
    }

    pub fn discipline(&self) -> Discipline {
        self.discipline
    }

    pub fn handles(&self) -> &[WatcherHandle] {
        &self.handles
    }

    /// Whether every managed watcher has reached `Stopped`.
    pub fn all_stopped(&self) -> bool {
        self.handles.iter().all(WatcherHandle::is_stopped)
    }

    /// Ask every watcher to stop, then block until all of them have.
    ///
    /// Idempotent and safe to call from several threads at once: a second
    /// caller waits for the first to finish joining.
    pub fn stop(&self) {
        debug!("Supervisor: requesting shutdown of {} watchers", self.handles.len());
        for handle in &self.handles {
            handle.destroy();
        }
        self.join();
        info!("Supervisor: all watchers stopped");
    }

    /// Block until every watcher has finished on its own, without
    /// requesting shutdown.
    pub fn wait(&self) {
        self.join();
    }

    /// Like [`Supervisor::wait`], but gives up after `timeout`. Returns
    /// whether every watcher stopped in time.
    ///
    /// The exit channel disconnects once the last watcher thread has
    /// reported and ended.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            match self.exit_rx.recv_deadline(deadline) {
                Ok(exit) => self.received.lock().push(exit),
                Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => return false,
            }
        }
        self.join();
        true
    }

    /// Exit reports, in arrival order. Disconnects once every watcher
    /// thread has finished. Reports read here are not returned by
    /// [`Supervisor::take_exits`].
    pub fn exits(&self) -> &Receiver<WatcherExit> {
        &self.exit_rx
    }

    /// Exit reports received so far. Each report is returned once.
    pub fn take_exits(&self) -> Vec<WatcherExit> {
        let mut exits = std::mem::take(&mut *self.received.lock());
        exits.extend(self.exit_rx.try_iter());
        exits
    }

    fn join(&self) {
        let mut threads = self.threads.lock();
        for t in threads.drain(..) {
            let name = t.thread().name().unwrap_or("watcher").to_owned();
            if t.join().is_err() {
                error!("Supervisor: thread {} panicked", name);
            }
        }
    }
}

impl Drop for Supervisor {
    fn drop(&mut self) {
        if !self.threads.get_mut().is_empty() {
            self.stop();
        }
    }
}
