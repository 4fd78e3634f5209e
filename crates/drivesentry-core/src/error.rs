//! Error types for event sources and watchers.

use crate::model::{DeviceKind, WatchMode};
use thiserror::Error;

/// Failure reported by an [`EventSource`](crate::source::EventSource) or one
/// of its subscriptions.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("{kind} monitoring is not supported on this platform")]
    Unsupported { kind: DeviceKind },
    #[error("{kind}/{mode} already has an active subscription")]
    AlreadySubscribed { kind: DeviceKind, mode: WatchMode },
    #[error("event feed for {kind}/{mode} was closed")]
    FeedClosed { kind: DeviceKind, mode: WatchMode },
    #[error("device query failed: {0}")]
    Platform(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by a watcher or the driver hosting it.
#[derive(Error, Debug)]
pub enum WatchError {
    /// The event source refused the subscription. Fatal for this watcher;
    /// not retried.
    #[error("could not subscribe {kind}/{mode}: {source}")]
    Subscription {
        kind: DeviceKind,
        mode: WatchMode,
        #[source]
        source: SourceError,
    },
    /// A Modified event arrived without its previous snapshot. Indicates a
    /// broken event source adapter.
    #[error("modification event for {identifier} carries no previous snapshot")]
    MissingPreviousSnapshot { identifier: String },
    /// A cooperative driver tried to resume a watcher that already finished.
    #[error("watcher {name} resumed after it completed")]
    ResumedAfterCompletion { name: String },
}
