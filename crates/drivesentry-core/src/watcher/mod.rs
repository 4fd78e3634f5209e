//! Device watcher: one per (device kind, watch mode).
//!
//! A watcher subscribes once, then polls its subscription with a bounded
//! timeout, filters what arrives, builds a notification and hands it to the
//! sink. The loop body is [`Watcher::step`]; [`Watcher::run`] simply calls
//! it until the watcher stops, which is how the thread-per-watcher
//! supervisor hosts it. The cooperative driver calls `step` directly.
//!
//! # Cancellation
//!
//! [`WatcherHandle::destroy`] sets a flag that `step` reads at the top of
//! every iteration. A poll already in progress runs to completion (at most
//! one poll timeout), so at most one in-flight event can still be emitted
//! after the request.
pub mod handle;

pub use handle::{WatcherHandle, WatcherState};

use crate::classify::is_included;
use crate::error::WatchError;
use crate::model::{ChangeEvent, DeviceKind, WatchMode};
use crate::notify::{builder_for, BuildFn, NotificationSink};
use crate::source::{EventSource, PollOutcome, Subscription, SubscriptionFilter};
use handle::Shared;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// Default bounded wait per poll. Trades shutdown latency against wakeups.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// What a watcher watches and how.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatcherConfig {
    pub kind: DeviceKind,
    pub mode: WatchMode,
    /// Drop events for anything that is not a removable disk.
    pub only_removable: bool,
    pub poll_timeout: Duration,
}

impl WatcherConfig {
    /// Logical-disk watchers default to removable-only; portable devices
    /// carry no drive type and are never class-filtered.
    pub fn new(kind: DeviceKind, mode: WatchMode) -> Self {
        Self {
            kind,
            mode,
            only_removable: kind == DeviceKind::LogicalDisk,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
        }
    }

    pub fn with_only_removable(mut self, only_removable: bool) -> Self {
        self.only_removable = only_removable;
        self
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    fn filter(&self) -> SubscriptionFilter {
        if self.only_removable {
            SubscriptionFilter::removable_only()
        } else {
            SubscriptionFilter::any()
        }
    }
}

/// Outcome of one loop iteration.
#[derive(Debug)]
pub enum Step {
    /// The poll window elapsed with nothing to report.
    Timeout,
    /// An event arrived but nothing was emitted: it was filtered out, the
    /// poll reported a transient error, or the event broke the source
    /// contract.
    Skipped,
    /// A notification was handed to the sink.
    Emitted,
    /// The subscription could not be established. The watcher is stopped.
    Fatal(WatchError),
    /// Shutdown was observed and the subscription released.
    Stopped,
}

/// Per-watcher counters, logged when the watcher stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatcherStats {
    pub emitted: u64,
    pub filtered: u64,
    pub poll_errors: u64,
    pub contract_violations: u64,
}

/// A single (device kind, watch mode) event watcher.
pub struct Watcher {
    name: Arc<str>,
    config: WatcherConfig,
    source: Arc<dyn EventSource>,
    sink: Arc<dyn NotificationSink>,
    build: BuildFn,
    shared: Arc<Shared>,
    subscription: Option<Box<dyn Subscription>>,
    stats: WatcherStats,
}

impl Watcher {
    pub fn new(
        config: WatcherConfig,
        source: Arc<dyn EventSource>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let name: Arc<str> = Arc::from(format!("{}/{}", config.kind, config.mode));
        Self {
            name,
            config,
            source,
            sink,
            build: builder_for(config.mode),
            shared: Arc::new(Shared::new()),
            subscription: None,
            stats: WatcherStats::default(),
        }
    }

    /// `"<kind>/<mode>"`, e.g. `"logical-disk/create"`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &WatcherConfig {
        &self.config
    }

    pub fn handle(&self) -> WatcherHandle {
        WatcherHandle::new(Arc::clone(&self.name), Arc::clone(&self.shared))
    }

    pub fn state(&self) -> WatcherState {
        self.shared.state()
    }

    pub fn stats(&self) -> WatcherStats {
        self.stats
    }

    /// Request shutdown; same as [`WatcherHandle::destroy`].
    pub fn destroy(&self) {
        self.handle().destroy();
    }

    /// Subscribe to the event source. No-op once subscribed or stopped.
    ///
    /// A failure is fatal: the watcher moves to `Stopped` and is never
    /// retried.
    pub fn start(&mut self) -> Result<(), WatchError> {
        if self.subscription.is_some() || self.state() == WatcherState::Stopped {
            return Ok(());
        }
        let (kind, mode) = (self.config.kind, self.config.mode);
        match self.source.subscribe(kind, mode, self.config.filter()) {
            Ok(sub) => {
                self.subscription = Some(sub);
                self.shared.set_state(WatcherState::Subscribed);
                debug!("Watcher {}: subscribed", self.name);
                Ok(())
            }
            Err(source) => {
                self.shared.set_state(WatcherState::Stopped);
                error!("Watcher {}: subscription failed: {}", self.name, source);
                Err(WatchError::Subscription { kind, mode, source })
            }
        }
    }

    /// Run one loop iteration.
    pub fn step(&mut self) -> Step {
        if self.state() == WatcherState::Stopped {
            return Step::Stopped;
        }
        if self.shared.shutdown_requested() {
            self.finish();
            return Step::Stopped;
        }
        if let Err(e) = self.start() {
            return Step::Fatal(e);
        }
        let Some(sub) = self.subscription.as_mut() else {
            return Step::Stopped;
        };

        self.shared.set_state(WatcherState::Polling);
        let outcome = sub.poll(self.config.poll_timeout);
        self.shared.set_state(WatcherState::Subscribed);

        match outcome {
            PollOutcome::Timeout => {
                trace!("Watcher {}: poll timed out", self.name);
                Step::Timeout
            }
            PollOutcome::Error(e) => {
                self.stats.poll_errors += 1;
                warn!("Watcher {}: poll failed, continuing: {}", self.name, e);
                Step::Skipped
            }
            PollOutcome::Event(event) => self.accept(event),
        }
    }

    /// Loop until shutdown or a fatal subscription error.
    pub fn run(&mut self) -> Result<WatcherStats, WatchError> {
        loop {
            match self.step() {
                Step::Stopped => return Ok(self.stats),
                Step::Fatal(e) => return Err(e),
                Step::Timeout | Step::Skipped | Step::Emitted => {}
            }
        }
    }

    fn accept(&mut self, event: ChangeEvent) -> Step {
        if !is_included(event.current.class_code, self.config.only_removable) {
            self.stats.filtered += 1;
            return Step::Skipped;
        }
        match (self.build)(self.config.kind, &event) {
            Ok(notification) => {
                self.sink.emit(&notification);
                self.stats.emitted += 1;
                Step::Emitted
            }
            Err(e) => {
                self.stats.contract_violations += 1;
                error!("Watcher {}: event source contract violated: {}", self.name, e);
                Step::Skipped
            }
        }
    }

    /// Release the subscription and publish `Stopped`.
    fn finish(&mut self) {
        self.shared.set_state(WatcherState::ShuttingDown);
        drop(self.subscription.take());
        self.shared.set_state(WatcherState::Stopped);
        let s = self.stats;
        info!(
            "Watcher {} stopped ({} emitted, {} filtered, {} poll errors, {} contract violations)",
            self.name, s.emitted, s.filtered, s.poll_errors, s.contract_violations
        );
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        // Covers panics and owners that drop a watcher without stopping it:
        // the subscription is released and waiters see `Stopped`.
        if self.state() != WatcherState::Stopped {
            self.finish();
        }
    }
}
