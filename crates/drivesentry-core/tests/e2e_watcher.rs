/// End-to-end watcher tests.
///
/// These drive a real `Watcher` loop on its own thread against the
/// in-memory `ChannelSource`, checking the cancellation bound, filtering,
/// and that nothing is emitted once a watcher reports `Stopped`.
use drivesentry_core::model::{ChangeEvent, DeviceClassCode, DeviceKind, DeviceSnapshot, WatchMode};
use drivesentry_core::notify::{ChannelSink, Notification};
use drivesentry_core::source::ChannelSource;
use drivesentry_core::{Watcher, WatcherConfig, WatcherState};
use crossbeam_channel::Receiver;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

// ── Helpers ──────────────────────────────────────────────────────────────────

const POLL: Duration = Duration::from_millis(50);

fn removable(id: &str) -> DeviceSnapshot {
    DeviceSnapshot::new(id, DeviceClassCode::Removable)
        .with_volume_name("STICK")
        .with_space(8_000_000_000, 4_000_000_000)
}

fn fixed(id: &str) -> DeviceSnapshot {
    DeviceSnapshot::new(id, DeviceClassCode::FixedLocal).with_space(500_000_000_000, 1)
}

fn watcher(
    source: &ChannelSource,
    mode: WatchMode,
    only_removable: bool,
) -> (Watcher, Receiver<Notification>) {
    let (sink, rx) = ChannelSink::new();
    let config = WatcherConfig::new(DeviceKind::LogicalDisk, mode)
        .with_only_removable(only_removable)
        .with_poll_timeout(POLL);
    (Watcher::new(config, Arc::new(source.clone()), Arc::new(sink)), rx)
}

/// Wait until `cond` holds, panicking after a generous deadline.
fn wait_for(what: &str, cond: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(2));
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[test]
fn destroy_while_polling_stops_within_one_timeout() {
    let source = ChannelSource::new();
    let (mut w, _rx) = watcher(&source, WatchMode::Creation, true);
    let handle = w.handle();
    let runner = thread::spawn(move || w.run());

    wait_for("polling", || handle.state() == WatcherState::Polling);
    let requested = Instant::now();
    handle.destroy();
    wait_for("stopped", || handle.is_stopped());
    let latency = requested.elapsed();

    // One poll timeout plus scheduling slack.
    assert!(latency < POLL + Duration::from_millis(500), "took {latency:?}");
    let stats = runner.join().unwrap().unwrap();
    assert_eq!(stats.emitted, 0);
    assert!(!source.is_subscribed(DeviceKind::LogicalDisk, WatchMode::Creation));
}

#[test]
fn no_notification_after_stopped() {
    let source = ChannelSource::new();
    let feed = source.feeder(DeviceKind::LogicalDisk, WatchMode::Creation);
    let (mut w, rx) = watcher(&source, WatchMode::Creation, true);
    let handle = w.handle();
    let runner = thread::spawn(move || w.run());

    feed.send(Ok(ChangeEvent::created(removable("E:")))).unwrap();
    let first = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(first.identifier, "E:");

    handle.destroy();
    runner.join().unwrap().unwrap();
    assert!(handle.is_stopped());

    // The subscription is released; anything fed now goes nowhere.
    let _ = feed.send(Ok(ChangeEvent::created(removable("F:"))));
    thread::sleep(POLL * 2);
    assert!(rx.try_recv().is_err());
}

#[test]
fn removable_only_watcher_filters_fixed_disks() {
    let source = ChannelSource::new();
    let feed = source.feeder(DeviceKind::LogicalDisk, WatchMode::Deletion);
    let (mut w, rx) = watcher(&source, WatchMode::Deletion, true);
    let handle = w.handle();
    let runner = thread::spawn(move || w.run());

    feed.send(Ok(ChangeEvent::deleted(fixed("D:")))).unwrap();
    feed.send(Ok(ChangeEvent::deleted(removable("E:")))).unwrap();

    let got = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(got.identifier, "E:");
    assert_eq!(got.headline, "Drive Ejected");

    handle.destroy();
    let stats = runner.join().unwrap().unwrap();
    assert_eq!(stats.emitted, 1);
    assert_eq!(stats.filtered, 1);
    assert!(rx.try_recv().is_err());
}

#[test]
fn unfiltered_watcher_reports_every_class() {
    let source = ChannelSource::new();
    let feed = source.feeder(DeviceKind::LogicalDisk, WatchMode::Creation);
    let (mut w, rx) = watcher(&source, WatchMode::Creation, false);
    let handle = w.handle();
    let runner = thread::spawn(move || w.run());

    feed.send(Ok(ChangeEvent::created(fixed("D:")))).unwrap();
    feed.send(Ok(ChangeEvent::created(removable("E:")))).unwrap();
    let ids: Vec<String> = (0..2)
        .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap().identifier)
        .collect();
    assert_eq!(ids, ["D:", "E:"]);

    handle.destroy();
    runner.join().unwrap().unwrap();
}

#[test]
fn modification_without_previous_is_not_emitted() {
    let source = ChannelSource::new();
    let feed = source.feeder(DeviceKind::LogicalDisk, WatchMode::Modification);
    let (mut w, rx) = watcher(&source, WatchMode::Modification, true);
    let handle = w.handle();
    let runner = thread::spawn(move || w.run());

    let mut broken = ChangeEvent::modified(removable("E:"), removable("E:"));
    broken.previous = None;
    feed.send(Ok(broken)).unwrap();
    feed.send(Ok(ChangeEvent::modified(
        removable("E:").with_free_bytes(3_000_000_000),
        removable("E:"),
    )))
    .unwrap();

    let got = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    let change = got.space_change.expect("space change");
    assert_eq!(change.magnitude, 1_000_000_000);

    handle.destroy();
    let stats = runner.join().unwrap().unwrap();
    assert_eq!(stats.contract_violations, 1);
    assert_eq!(stats.emitted, 1);
}
