//! Notification sinks.
//!
//! [`TracingSink`] is what the binary uses: one structured `info!` line per
//! record. [`ChannelSink`] forwards records to an embedding host.
use super::Notification;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::{debug, info};

/// Maximum number of records that may queue up in a [`ChannelSink`].
/// Records beyond it are dropped so a stalled consumer cannot block a
/// watcher.
pub const NOTIFICATION_CHANNEL_CAPACITY: usize = 2048;

/// Destination for notification records. Shared by every watcher of a
/// supervisor, so implementations must be thread-safe.
pub trait NotificationSink: Send + Sync {
    fn emit(&self, notification: &Notification);
}

/// Emits each record as a single structured log event on the
/// `drivesentry::event` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

fn or_dash(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("-")
}

impl NotificationSink for TracingSink {
    fn emit(&self, n: &Notification) {
        let (change, delta, delta_bytes) = match &n.space_change {
            Some(sc) => (sc.direction.label(), sc.magnitude_display(), sc.magnitude),
            None => ("-", "-".to_owned(), 0),
        };
        info!(
            target: "drivesentry::event",
            device = %n.device,
            kind = ?n.kind,
            identifier = %n.identifier,
            volume_name = or_dash(&n.volume_name),
            description = or_dash(&n.description),
            drive_type = n.class_label.unwrap_or("-"),
            size = or_dash(&n.size),
            free_space = or_dash(&n.free_space),
            serial_number = or_dash(&n.serial_number),
            manufacturer = or_dash(&n.manufacturer),
            space_change = change,
            space_delta = %delta,
            space_delta_bytes = delta_bytes,
            observed_at = %n.observed_at.format("%Y-%m-%d %H:%M:%S%.3f"),
            "{}",
            n.headline
        );
    }
}

/// Forwards records over a bounded crossbeam channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<Notification>,
}

impl ChannelSink {
    /// Create a sink and the receiver that drains it.
    pub fn new() -> (Self, Receiver<Notification>) {
        Self::with_capacity(NOTIFICATION_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> (Self, Receiver<Notification>) {
        let (tx, rx) = bounded(capacity);
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelSink {
    fn emit(&self, notification: &Notification) {
        match self.tx.try_send(notification.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(n)) => {
                debug!("Notification channel full, dropping {} for {}", n.headline, n.identifier);
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChangeEvent, DeviceClassCode, DeviceKind, DeviceSnapshot, WatchMode};
    use crate::notify::builder_for;

    fn record(id: &str) -> Notification {
        let event = ChangeEvent::deleted(DeviceSnapshot::new(id, DeviceClassCode::Removable));
        builder_for(WatchMode::Deletion)(DeviceKind::LogicalDisk, &event).unwrap()
    }

    #[test]
    fn test_channel_sink_forwards() {
        let (sink, rx) = ChannelSink::new();
        sink.emit(&record("E:"));
        assert_eq!(rx.try_recv().unwrap().identifier, "E:");
    }

    #[test]
    fn test_channel_sink_drops_when_full() {
        let (sink, rx) = ChannelSink::with_capacity(1);
        sink.emit(&record("E:"));
        sink.emit(&record("F:"));
        assert_eq!(rx.len(), 1);
        assert_eq!(rx.try_recv().unwrap().identifier, "E:");
    }

    #[test]
    fn test_channel_sink_ignores_closed_receiver() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        sink.emit(&record("E:"));
    }

    #[test]
    fn test_tracing_sink_does_not_panic_without_subscriber() {
        TracingSink.emit(&record("G:"));
    }
}
