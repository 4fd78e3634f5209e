//! Thread-per-watcher discipline.
//!
//! Each watcher runs its own loop on a dedicated OS thread. The only state
//! shared with the rest of the process is the watcher's shutdown flag and
//! lifecycle state, both atomics behind its [`WatcherHandle`].
//!
//! [`WatcherHandle`]: crate::watcher::WatcherHandle
use super::WatcherExit;
use crate::watcher::Watcher;
use crossbeam_channel::Sender;
use std::io;
use std::thread::{self, JoinHandle};
use tracing::debug;

/// Spawn one named thread per watcher. Each thread reports its exit on
/// `exit_tx` before terminating.
pub fn spawn_watchers(
    watchers: Vec<Watcher>,
    exit_tx: &Sender<WatcherExit>,
) -> io::Result<Vec<JoinHandle<()>>> {
    let handles: Vec<_> = watchers.iter().map(Watcher::handle).collect();
    let mut threads = Vec::with_capacity(watchers.len());
    for mut watcher in watchers {
        let exit_tx = exit_tx.clone();
        let name = watcher.name().to_owned();
        let spawned = thread::Builder::new()
            .name(format!("drivesentry-{name}"))
            .spawn(move || {
                debug!("Watcher {}: thread started", name);
                let result = watcher.run();
                drop(watcher);
                let _ = exit_tx.send(WatcherExit { name, result });
            });
        match spawned {
            Ok(t) => threads.push(t),
            Err(e) => {
                // Do not leave the already-started watchers running behind
                // a failed start.
                for h in &handles {
                    h.destroy();
                }
                for t in threads {
                    let _ = t.join();
                }
                return Err(e);
            }
        }
    }
    Ok(threads)
}
