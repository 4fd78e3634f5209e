//! Event source contract: the boundary to whatever facility reports device
//! changes on the host.
//!
//! A source hands out one [`Subscription`] per (device kind, watch mode).
//! Each subscription is owned by exactly one watcher and released when it is
//! dropped. `poll` never blocks longer than the timeout it is given; that
//! bound is what lets watchers observe a shutdown request promptly.
pub mod channel;

pub use channel::{ChannelSource, Feed};

use crate::error::SourceError;
use crate::model::{ChangeEvent, DeviceClassCode, DeviceKind, DeviceSnapshot, WatchMode};
use std::time::Duration;

/// Result of one bounded wait on a subscription.
#[derive(Debug)]
pub enum PollOutcome {
    /// Nothing arrived within the timeout. The steady state.
    Timeout,
    Event(ChangeEvent),
    /// Transport or provider hiccup. The subscription stays usable.
    Error(SourceError),
}

/// Server-side restriction a source may apply before delivering events.
///
/// Sources that cannot push the restriction down deliver everything;
/// watchers always re-check locally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscriptionFilter {
    pub class_code: Option<DeviceClassCode>,
}

impl SubscriptionFilter {
    pub fn any() -> Self {
        Self { class_code: None }
    }

    pub fn removable_only() -> Self {
        Self {
            class_code: Some(DeviceClassCode::Removable),
        }
    }

    /// Whether devices of `class` pass the filter.
    pub fn admits(&self, class: DeviceClassCode) -> bool {
        self.class_code.is_none_or(|wanted| wanted == class)
    }

    pub fn matches(&self, snapshot: &DeviceSnapshot) -> bool {
        self.admits(snapshot.class_code)
    }
}

/// A live subscription to one event stream.
pub trait Subscription: Send {
    /// Wait at most `timeout` for the next event.
    fn poll(&mut self, timeout: Duration) -> PollOutcome;
}

/// Host facility that can establish subscriptions.
pub trait EventSource: Send + Sync {
    fn subscribe(
        &self,
        kind: DeviceKind,
        mode: WatchMode,
        filter: SubscriptionFilter,
    ) -> Result<Box<dyn Subscription>, SourceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_matches() {
        let usb = DeviceSnapshot::new("E:", DeviceClassCode::Removable);
        let ssd = DeviceSnapshot::new("C:", DeviceClassCode::FixedLocal);

        assert!(SubscriptionFilter::any().matches(&usb));
        assert!(SubscriptionFilter::any().matches(&ssd));
        assert!(SubscriptionFilter::removable_only().matches(&usb));
        assert!(!SubscriptionFilter::removable_only().matches(&ssd));
        assert!(!SubscriptionFilter::removable_only().admits(DeviceClassCode::Network));
        assert!(SubscriptionFilter::any().admits(DeviceClassCode::Network));
    }
}
