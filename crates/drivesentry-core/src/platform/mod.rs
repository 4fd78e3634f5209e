//! Platform event source: device sampling plus change detection.
//!
//! Neither Windows nor Linux offers a single synchronous "wait for the next
//! volume change with a timeout" primitive that covers both drive letters
//! and portable devices, so [`SystemSource`] samples the attached devices
//! on every poll and diffs the sample against the previous one. Each
//! subscription keeps its own last-seen table; nothing is shared between
//! watchers.
//!
//! - [`drives`]: logical disks (drive letters / mount points).
//! - [`portable`]: portable devices (WPD / MTP).
pub mod drives;
pub mod portable;

pub use drives::LogicalDiskProbe;
pub use portable::PortableDeviceProbe;

use crate::error::SourceError;
use crate::model::{ChangeEvent, DeviceKind, DeviceSnapshot, WatchMode};
use crate::source::{EventSource, PollOutcome, Subscription, SubscriptionFilter};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Something that can list the devices of one kind currently attached.
pub trait DeviceProbe: Send + Sync {
    /// List attached devices. A probe may leave out devices `filter`
    /// rejects, and should not query them at all when that can block.
    fn sample(&self, filter: SubscriptionFilter) -> Result<Vec<DeviceSnapshot>, SourceError>;
}

/// Event source for the host the process runs on.
#[derive(Clone)]
pub struct SystemSource {
    disks: Arc<dyn DeviceProbe>,
    portable: Arc<dyn DeviceProbe>,
}

impl SystemSource {
    /// Source backed by this platform's probes.
    pub fn new() -> Self {
        Self::with_probes(Arc::new(LogicalDiskProbe), Arc::new(PortableDeviceProbe))
    }

    pub fn with_probes(disks: Arc<dyn DeviceProbe>, portable: Arc<dyn DeviceProbe>) -> Self {
        Self { disks, portable }
    }

    fn probe(&self, kind: DeviceKind) -> Arc<dyn DeviceProbe> {
        match kind {
            DeviceKind::LogicalDisk => Arc::clone(&self.disks),
            DeviceKind::PortableDevice => Arc::clone(&self.portable),
        }
    }
}

impl Default for SystemSource {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSource for SystemSource {
    fn subscribe(
        &self,
        kind: DeviceKind,
        mode: WatchMode,
        filter: SubscriptionFilter,
    ) -> Result<Box<dyn Subscription>, SourceError> {
        let probe = self.probe(kind);
        // The baseline sample doubles as the subscription check: a probe
        // that cannot list devices now will not do better later.
        let baseline = probe.sample(filter)?;
        debug!(
            "SystemSource: {}/{} baseline has {} devices",
            kind,
            mode,
            baseline.len()
        );
        Ok(Box::new(PollingSubscription {
            mode,
            filter,
            probe,
            known: index(baseline),
            pending: VecDeque::new(),
        }))
    }
}

struct PollingSubscription {
    mode: WatchMode,
    filter: SubscriptionFilter,
    probe: Arc<dyn DeviceProbe>,
    known: HashMap<String, DeviceSnapshot>,
    /// Events from the last sample not yet handed out.
    pending: VecDeque<ChangeEvent>,
}

impl Subscription for PollingSubscription {
    fn poll(&mut self, timeout: Duration) -> PollOutcome {
        if let Some(event) = self.pending.pop_front() {
            return PollOutcome::Event(event);
        }

        let started = Instant::now();
        match self.probe.sample(self.filter) {
            Ok(current) => {
                let filter = self.filter;
                self.pending.extend(
                    detect_changes(&self.known, &current, self.mode)
                        .into_iter()
                        .filter(|e| filter.matches(&e.current)),
                );
                self.known = index(current);
            }
            Err(e) => {
                std::thread::sleep(timeout.saturating_sub(started.elapsed()));
                return PollOutcome::Error(e);
            }
        }

        if let Some(event) = self.pending.pop_front() {
            return PollOutcome::Event(event);
        }
        std::thread::sleep(timeout.saturating_sub(started.elapsed()));
        PollOutcome::Timeout
    }
}

fn index(snapshots: Vec<DeviceSnapshot>) -> HashMap<String, DeviceSnapshot> {
    snapshots
        .into_iter()
        .map(|s| (s.identifier.clone(), s))
        .collect()
}

/// Events a watcher in `mode` should see, given the previous and current
/// samples.
///
/// Additions and modifications follow the order of `current`; removals are
/// ordered by identifier. In [`WatchMode::Operation`] every change is
/// reported as `Operated`, carrying the device's latest known snapshot.
pub(crate) fn detect_changes(
    known: &HashMap<String, DeviceSnapshot>,
    current: &[DeviceSnapshot],
    mode: WatchMode,
) -> Vec<ChangeEvent> {
    let mut events = Vec::new();

    for snap in current {
        match known.get(&snap.identifier) {
            None => match mode {
                WatchMode::Creation => events.push(ChangeEvent::created(snap.clone())),
                WatchMode::Operation => events.push(ChangeEvent::operated(snap.clone())),
                _ => {}
            },
            Some(previous) if previous != snap => match mode {
                WatchMode::Modification => {
                    events.push(ChangeEvent::modified(snap.clone(), previous.clone()))
                }
                WatchMode::Operation => events.push(ChangeEvent::operated(snap.clone())),
                _ => {}
            },
            Some(_) => {}
        }
    }

    if matches!(mode, WatchMode::Deletion | WatchMode::Operation) {
        let mut removed: Vec<&DeviceSnapshot> = known
            .values()
            .filter(|k| !current.iter().any(|c| c.identifier == k.identifier))
            .collect();
        removed.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        for snap in removed {
            events.push(match mode {
                WatchMode::Deletion => ChangeEvent::deleted(snap.clone()),
                _ => ChangeEvent::operated(snap.clone()),
            });
        }
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ChangeKind, DeviceClassCode};
    use parking_lot::Mutex;

    /// Probe that replays a scripted sequence of samples, repeating the
    /// last one forever.
    struct ScriptedProbe {
        samples: Mutex<VecDeque<Result<Vec<DeviceSnapshot>, SourceError>>>,
        last: Mutex<Vec<DeviceSnapshot>>,
        filters: Mutex<Vec<SubscriptionFilter>>,
    }

    impl ScriptedProbe {
        fn new(samples: Vec<Result<Vec<DeviceSnapshot>, SourceError>>) -> Arc<Self> {
            Arc::new(Self {
                samples: Mutex::new(samples.into()),
                last: Mutex::new(Vec::new()),
                filters: Mutex::new(Vec::new()),
            })
        }
    }

    impl DeviceProbe for ScriptedProbe {
        fn sample(&self, filter: SubscriptionFilter) -> Result<Vec<DeviceSnapshot>, SourceError> {
            self.filters.lock().push(filter);
            match self.samples.lock().pop_front() {
                Some(Ok(s)) => {
                    *self.last.lock() = s.clone();
                    Ok(s)
                }
                Some(Err(e)) => Err(e),
                None => Ok(self.last.lock().clone()),
            }
        }
    }

    fn usb(id: &str, free: u64) -> DeviceSnapshot {
        DeviceSnapshot::new(id, DeviceClassCode::Removable).with_space(1_000_000, free)
    }

    fn fixed(id: &str) -> DeviceSnapshot {
        DeviceSnapshot::new(id, DeviceClassCode::FixedLocal).with_space(9_000_000, 1)
    }

    fn known(snaps: &[DeviceSnapshot]) -> HashMap<String, DeviceSnapshot> {
        index(snaps.to_vec())
    }

    #[test]
    fn test_detect_creation() {
        let before = known(&[fixed("C:")]);
        let now = [fixed("C:"), usb("E:", 10)];
        let events = detect_changes(&before, &now, WatchMode::Creation);
        assert_eq!(events, vec![ChangeEvent::created(usb("E:", 10))]);
    }

    #[test]
    fn test_detect_modification_carries_previous() {
        let before = known(&[usb("E:", 1000)]);
        let now = [usb("E:", 600)];
        let events = detect_changes(&before, &now, WatchMode::Modification);
        assert_eq!(events, vec![ChangeEvent::modified(usb("E:", 600), usb("E:", 1000))]);
        assert!(detect_changes(&before, &now, WatchMode::Creation).is_empty());
    }

    #[test]
    fn test_detect_deletion_uses_last_known_snapshot() {
        let before = known(&[usb("F:", 5), usb("E:", 7), fixed("C:")]);
        let now = [fixed("C:")];
        let events = detect_changes(&before, &now, WatchMode::Deletion);
        assert_eq!(
            events,
            vec![
                ChangeEvent::deleted(usb("E:", 7)),
                ChangeEvent::deleted(usb("F:", 5)),
            ]
        );
    }

    #[test]
    fn test_operation_reports_every_change() {
        let before = known(&[usb("E:", 10), usb("F:", 10)]);
        let now = [usb("E:", 20), usb("G:", 30)];
        let events = detect_changes(&before, &now, WatchMode::Operation);
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|e| e.kind == ChangeKind::Operated));
        assert!(events.iter().all(|e| e.previous.is_none()));
        let ids: Vec<&str> = events.iter().map(|e| e.current.identifier.as_str()).collect();
        assert_eq!(ids, ["E:", "G:", "F:"]);
    }

    #[test]
    fn test_unchanged_sample_yields_nothing() {
        let snaps = [usb("E:", 10), fixed("C:")];
        for mode in WatchMode::ALL {
            assert!(detect_changes(&known(&snaps), &snaps, mode).is_empty());
        }
    }

    #[test]
    fn test_subscribe_failure_propagates() {
        let probe = ScriptedProbe::new(vec![Err(SourceError::Platform("access denied".into()))]);
        let source = SystemSource::with_probes(probe.clone(), probe);
        let result = source.subscribe(
            DeviceKind::LogicalDisk,
            WatchMode::Creation,
            SubscriptionFilter::any(),
        );
        assert!(matches!(result, Err(SourceError::Platform(_))));
    }

    #[test]
    fn test_poll_reports_insert_then_times_out() {
        let probe = ScriptedProbe::new(vec![
            Ok(vec![fixed("C:")]),
            Ok(vec![fixed("C:"), usb("E:", 10), usb("F:", 10)]),
        ]);
        let source = SystemSource::with_probes(probe.clone(), probe);
        let mut sub = source
            .subscribe(
                DeviceKind::LogicalDisk,
                WatchMode::Creation,
                SubscriptionFilter::any(),
            )
            .unwrap();

        let timeout = Duration::from_millis(20);
        let first = sub.poll(timeout);
        let second = sub.poll(timeout);
        assert!(matches!(first, PollOutcome::Event(ref e) if e.current.identifier == "E:"));
        assert!(matches!(second, PollOutcome::Event(ref e) if e.current.identifier == "F:"));

        let started = Instant::now();
        assert!(matches!(sub.poll(timeout), PollOutcome::Timeout));
        assert!(started.elapsed() >= timeout);
    }

    #[test]
    fn test_poll_applies_pushed_down_filter() {
        let probe = ScriptedProbe::new(vec![
            Ok(vec![]),
            Ok(vec![fixed("D:"), usb("E:", 10)]),
        ]);
        let source = SystemSource::with_probes(probe.clone(), probe.clone());
        let mut sub = source
            .subscribe(
                DeviceKind::LogicalDisk,
                WatchMode::Creation,
                SubscriptionFilter::removable_only(),
            )
            .unwrap();
        let timeout = Duration::from_millis(10);
        assert!(matches!(sub.poll(timeout), PollOutcome::Event(ref e) if e.current.identifier == "E:"));
        assert!(matches!(sub.poll(timeout), PollOutcome::Timeout));
        // Every sample, baseline included, is asked for removable drives only.
        let filters = probe.filters.lock();
        assert_eq!(filters.len(), 3);
        assert!(filters.iter().all(|f| *f == SubscriptionFilter::removable_only()));
    }

    #[test]
    fn test_sample_error_is_transient() {
        let probe = ScriptedProbe::new(vec![
            Ok(vec![usb("E:", 10)]),
            Err(SourceError::Platform("busy".into())),
            Ok(vec![]),
        ]);
        let source = SystemSource::with_probes(probe.clone(), probe);
        let mut sub = source
            .subscribe(
                DeviceKind::LogicalDisk,
                WatchMode::Deletion,
                SubscriptionFilter::any(),
            )
            .unwrap();
        let timeout = Duration::from_millis(10);
        assert!(matches!(sub.poll(timeout), PollOutcome::Error(_)));
        assert!(matches!(sub.poll(timeout), PollOutcome::Event(ref e) if e.kind == ChangeKind::Deleted));
    }

    #[test]
    fn test_probe_is_chosen_by_kind() {
        let disks = ScriptedProbe::new(vec![Ok(vec![]), Ok(vec![usb("E:", 1)])]);
        let phones = ScriptedProbe::new(vec![Err(SourceError::Unsupported {
            kind: DeviceKind::PortableDevice,
        })]);
        let source = SystemSource::with_probes(disks, phones);
        assert!(source
            .subscribe(DeviceKind::PortableDevice, WatchMode::Creation, SubscriptionFilter::any())
            .is_err());
        assert!(source
            .subscribe(DeviceKind::LogicalDisk, WatchMode::Creation, SubscriptionFilter::any())
            .is_ok());
    }
}
