//! In-process event source fed through crossbeam channels.
//!
//! For hosts that already receive device notifications from somewhere else
//! (a service control handler, a udev monitor, a test harness) and want to
//! run them through DriveSentry's watchers. Each (kind, mode) pair has one
//! feed; callers push events with the [`Sender`] from
//! [`ChannelSource::feeder`]. The class filter is not pushed down: every
//! fed event reaches the watcher, which filters it itself.
use super::{EventSource, PollOutcome, Subscription, SubscriptionFilter};
use crate::error::SourceError;
use crate::model::{ChangeEvent, DeviceKind, WatchMode};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// One item on a feed: an event, or a transient failure to report.
pub type Feed = Result<ChangeEvent, SourceError>;

type FeedKey = (DeviceKind, WatchMode);

struct FeedSlot {
    tx: Sender<Feed>,
    /// `None` while a subscription holds the receiver.
    rx: Option<Receiver<Feed>>,
}

impl FeedSlot {
    fn new() -> Self {
        let (tx, rx) = unbounded();
        Self { tx, rx: Some(rx) }
    }
}

/// Event source backed by one unbounded channel per (kind, mode).
#[derive(Clone, Default)]
pub struct ChannelSource {
    feeds: Arc<Mutex<HashMap<FeedKey, FeedSlot>>>,
}

impl ChannelSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sender for the (kind, mode) feed. Events sent before anyone
    /// subscribes are buffered.
    pub fn feeder(&self, kind: DeviceKind, mode: WatchMode) -> Sender<Feed> {
        self.feeds
            .lock()
            .entry((kind, mode))
            .or_insert_with(FeedSlot::new)
            .tx
            .clone()
    }

    /// Whether a subscription currently holds the (kind, mode) feed.
    pub fn is_subscribed(&self, kind: DeviceKind, mode: WatchMode) -> bool {
        self.feeds
            .lock()
            .get(&(kind, mode))
            .is_some_and(|slot| slot.rx.is_none())
    }
}

impl EventSource for ChannelSource {
    fn subscribe(
        &self,
        kind: DeviceKind,
        mode: WatchMode,
        _filter: SubscriptionFilter,
    ) -> Result<Box<dyn Subscription>, SourceError> {
        let rx = self
            .feeds
            .lock()
            .entry((kind, mode))
            .or_insert_with(FeedSlot::new)
            .rx
            .take()
            .ok_or(SourceError::AlreadySubscribed { kind, mode })?;

        Ok(Box::new(ChannelSubscription {
            key: (kind, mode),
            rx: Some(rx),
            feeds: Arc::clone(&self.feeds),
        }))
    }
}

struct ChannelSubscription {
    key: FeedKey,
    rx: Option<Receiver<Feed>>,
    feeds: Arc<Mutex<HashMap<FeedKey, FeedSlot>>>,
}

impl Subscription for ChannelSubscription {
    fn poll(&mut self, timeout: Duration) -> PollOutcome {
        let Some(rx) = self.rx.as_ref() else {
            return PollOutcome::Timeout;
        };
        match rx.recv_timeout(timeout) {
            Ok(Ok(event)) => PollOutcome::Event(event),
            Ok(Err(e)) => PollOutcome::Error(e),
            Err(RecvTimeoutError::Timeout) => PollOutcome::Timeout,
            Err(RecvTimeoutError::Disconnected) => {
                // The slot keeps a sender alive, so this only happens if the
                // source was torn down underneath us. Honour the bound.
                std::thread::sleep(timeout);
                PollOutcome::Error(SourceError::FeedClosed {
                    kind: self.key.0,
                    mode: self.key.1,
                })
            }
        }
    }
}

impl Drop for ChannelSubscription {
    fn drop(&mut self) {
        // Hand the receiver back so the feed can be subscribed again.
        if let Some(slot) = self.feeds.lock().get_mut(&self.key) {
            slot.rx = self.rx.take();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DeviceClassCode, DeviceSnapshot};

    const KIND: DeviceKind = DeviceKind::LogicalDisk;

    #[test]
    fn test_buffered_event_is_delivered() {
        let source = ChannelSource::new();
        let tx = source.feeder(KIND, WatchMode::Creation);
        tx.send(Ok(ChangeEvent::created(DeviceSnapshot::new(
            "E:",
            DeviceClassCode::Removable,
        ))))
        .unwrap();

        let mut sub = source
            .subscribe(KIND, WatchMode::Creation, SubscriptionFilter::any())
            .unwrap();
        match sub.poll(Duration::from_millis(50)) {
            PollOutcome::Event(ev) => assert_eq!(ev.current.identifier, "E:"),
            other => panic!("expected event, got {other:?}"),
        }
        assert!(matches!(
            sub.poll(Duration::from_millis(10)),
            PollOutcome::Timeout
        ));
    }

    #[test]
    fn test_second_subscription_is_rejected() {
        let source = ChannelSource::new();
        let _first = source
            .subscribe(KIND, WatchMode::Deletion, SubscriptionFilter::any())
            .unwrap();
        let second = source.subscribe(KIND, WatchMode::Deletion, SubscriptionFilter::any());
        assert!(matches!(
            second,
            Err(SourceError::AlreadySubscribed { .. })
        ));
    }

    #[test]
    fn test_drop_releases_feed() {
        let source = ChannelSource::new();
        let sub = source
            .subscribe(KIND, WatchMode::Modification, SubscriptionFilter::any())
            .unwrap();
        assert!(source.is_subscribed(KIND, WatchMode::Modification));
        drop(sub);
        assert!(!source.is_subscribed(KIND, WatchMode::Modification));
        assert!(source
            .subscribe(KIND, WatchMode::Modification, SubscriptionFilter::any())
            .is_ok());
    }

    #[test]
    fn test_fed_error_is_transient() {
        let source = ChannelSource::new();
        let tx = source.feeder(KIND, WatchMode::Operation);
        tx.send(Err(SourceError::Platform("provider restarted".into())))
            .unwrap();
        let mut sub = source
            .subscribe(KIND, WatchMode::Operation, SubscriptionFilter::any())
            .unwrap();
        assert!(matches!(
            sub.poll(Duration::from_millis(50)),
            PollOutcome::Error(SourceError::Platform(_))
        ));
    }
}
