//! Single-threaded cooperative discipline.
//!
//! Every watcher becomes a [`CooperativeTask`]: a resumable computation
//! that runs one loop iteration per resume, then yields back to the
//! driver. One driver thread round-robins over the tasks, so a watcher that
//! keeps failing or keeps emitting cannot hold the thread. A round takes at
//! most `tasks × poll_timeout`.
use super::WatcherExit;
use crate::error::WatchError;
use crate::watcher::{Step, Watcher, WatcherStats};
use crossbeam_channel::Sender;
use tracing::{debug, error};

/// Result of resuming a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resume {
    /// One poll completed; the task is suspended until the next resume.
    Yielded,
    /// The watcher stopped or failed. The task must not be resumed again.
    Completed,
}

/// A watcher hosted as a resumable task.
pub struct CooperativeTask {
    watcher: Watcher,
    completed: bool,
    outcome: Option<Result<WatcherStats, WatchError>>,
}

impl CooperativeTask {
    pub fn new(watcher: Watcher) -> Self {
        Self {
            watcher,
            completed: false,
            outcome: None,
        }
    }

    pub fn name(&self) -> &str {
        self.watcher.name()
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Run one iteration of the watcher loop.
    ///
    /// Resuming a completed task is a driver bug and is rejected with
    /// [`WatchError::ResumedAfterCompletion`].
    pub fn resume(&mut self) -> Result<Resume, WatchError> {
        if self.completed {
            return Err(WatchError::ResumedAfterCompletion {
                name: self.watcher.name().to_owned(),
            });
        }
        match self.watcher.step() {
            Step::Timeout | Step::Emitted | Step::Skipped => Ok(Resume::Yielded),
            Step::Stopped => Ok(self.complete(Ok(self.watcher.stats()))),
            Step::Fatal(e) => Ok(self.complete(Err(e))),
        }
    }

    /// Take the final outcome of a completed task. `None` before completion
    /// or once taken.
    pub fn take_outcome(&mut self) -> Option<Result<WatcherStats, WatchError>> {
        self.outcome.take()
    }

    fn complete(&mut self, outcome: Result<WatcherStats, WatchError>) -> Resume {
        self.completed = true;
        self.outcome = Some(outcome);
        Resume::Completed
    }
}

/// Round-robin driver over a fixed set of tasks.
pub struct CooperativeDriver {
    tasks: Vec<CooperativeTask>,
}

impl CooperativeDriver {
    pub fn new(watchers: Vec<Watcher>) -> Self {
        Self {
            tasks: watchers.into_iter().map(CooperativeTask::new).collect(),
        }
    }

    /// Number of tasks that have not completed.
    pub fn running(&self) -> usize {
        self.tasks.iter().filter(|t| !t.is_completed()).count()
    }

    /// Resume every unfinished task once. Returns the exits of tasks that
    /// completed during this round.
    pub fn drive_once(&mut self) -> Vec<WatcherExit> {
        let mut exits = Vec::new();
        for task in self.tasks.iter_mut().filter(|t| !t.is_completed()) {
            match task.resume() {
                Ok(Resume::Yielded) => {}
                Ok(Resume::Completed) => {
                    if let Some(result) = task.take_outcome() {
                        exits.push(WatcherExit {
                            name: task.name().to_owned(),
                            result,
                        });
                    }
                }
                Err(e) => error!("Cooperative driver: {}", e),
            }
        }
        exits
    }

    /// Drive until every task has completed, reporting each exit as it
    /// happens.
    pub fn run(mut self, exit_tx: Sender<WatcherExit>) {
        debug!("Cooperative driver: starting {} tasks", self.tasks.len());
        while self.running() > 0 {
            for exit in self.drive_once() {
                let _ = exit_tx.send(exit);
            }
        }
        debug!("Cooperative driver: all tasks completed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChangeEvent, DeviceClassCode, DeviceKind, DeviceSnapshot, WatchMode};
    use crate::notify::ChannelSink;
    use crate::source::ChannelSource;
    use crate::watcher::WatcherConfig;
    use std::sync::Arc;
    use std::time::Duration;

    fn watcher(source: &ChannelSource, sink: &ChannelSink, mode: WatchMode) -> Watcher {
        Watcher::new(
            WatcherConfig::new(DeviceKind::LogicalDisk, mode)
                .with_poll_timeout(Duration::from_millis(10)),
            Arc::new(source.clone()),
            Arc::new(sink.clone()),
        )
    }

    #[test]
    fn test_task_yields_after_every_poll() {
        let source = ChannelSource::new();
        let (sink, rx) = ChannelSink::new();
        let feed = source.feeder(DeviceKind::LogicalDisk, WatchMode::Creation);
        for id in ["E:", "F:"] {
            feed.send(Ok(ChangeEvent::created(DeviceSnapshot::new(
                id,
                DeviceClassCode::Removable,
            ))))
            .unwrap();
        }

        let mut task = CooperativeTask::new(watcher(&source, &sink, WatchMode::Creation));
        assert_eq!(task.resume().unwrap(), Resume::Yielded);
        assert_eq!(rx.len(), 1);
        assert_eq!(task.resume().unwrap(), Resume::Yielded);
        assert_eq!(rx.len(), 2);
        assert_eq!(task.resume().unwrap(), Resume::Yielded);
        assert_eq!(rx.len(), 2);
        assert!(!task.is_completed());
    }

    #[test]
    fn test_resume_after_completion_is_rejected() {
        let source = ChannelSource::new();
        let (sink, _rx) = ChannelSink::new();
        let w = watcher(&source, &sink, WatchMode::Deletion);
        w.destroy();
        let mut task = CooperativeTask::new(w);

        assert_eq!(task.resume().unwrap(), Resume::Completed);
        assert!(matches!(task.take_outcome(), Some(Ok(_))));
        assert!(matches!(
            task.resume(),
            Err(WatchError::ResumedAfterCompletion { name }) if name == "logical-disk/delete"
        ));
    }

    #[test]
    fn test_subscription_failure_completes_only_that_task() {
        let source = ChannelSource::new();
        let (sink, _rx) = ChannelSink::new();
        // Hold the creation feed so the watcher's own subscribe fails.
        let _holder = crate::source::EventSource::subscribe(
            &source,
            DeviceKind::LogicalDisk,
            WatchMode::Creation,
            crate::source::SubscriptionFilter::any(),
        )
        .unwrap();

        let mut driver = CooperativeDriver::new(vec![
            watcher(&source, &sink, WatchMode::Creation),
            watcher(&source, &sink, WatchMode::Deletion),
        ]);
        let exits = driver.drive_once();
        assert_eq!(exits.len(), 1);
        assert_eq!(exits[0].name, "logical-disk/create");
        assert!(exits[0].result.is_err());
        assert_eq!(driver.running(), 1);

        // The surviving task keeps yielding; the completed one is skipped.
        assert!(driver.drive_once().is_empty());
        assert_eq!(driver.running(), 1);
    }
}
