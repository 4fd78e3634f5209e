//! Notification records: what a watcher reports for each accepted event.
//!
//! Building a record is a pure derivation from the event. Each watch mode
//! has its own builder, picked from a table by [`builder_for`]; sinks then
//! decide where the record goes.
pub mod sink;

pub use sink::{ChannelSink, NotificationSink, TracingSink, NOTIFICATION_CHANNEL_CAPACITY};

use crate::error::WatchError;
use crate::model::size::{format_optional_size, format_size};
use crate::model::{ChangeEvent, ChangeKind, DeviceKind, WatchMode};

/// Sign of a free-space change between two snapshots of the same volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpaceDirection {
    /// Free space went down: data was written.
    Consumed,
    /// Free space went up: data was deleted.
    Freed,
    Unchanged,
}

impl SpaceDirection {
    pub fn label(self) -> &'static str {
        match self {
            Self::Consumed => "space consumed",
            Self::Freed => "space freed",
            Self::Unchanged => "space unchanged",
        }
    }
}

/// Free-space delta derived from a modification event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpaceChange {
    pub direction: SpaceDirection,
    /// Absolute change in bytes.
    pub magnitude: u64,
}

impl SpaceChange {
    /// Classify `previous_free - current_free`.
    pub fn between(previous_free: u64, current_free: u64) -> Self {
        let direction = match previous_free.cmp(&current_free) {
            std::cmp::Ordering::Greater => SpaceDirection::Consumed,
            std::cmp::Ordering::Less => SpaceDirection::Freed,
            std::cmp::Ordering::Equal => SpaceDirection::Unchanged,
        };
        Self {
            direction,
            magnitude: previous_free.abs_diff(current_free),
        }
    }

    pub fn magnitude_display(&self) -> String {
        format_size(self.magnitude)
    }
}

/// Structured record for one accepted event.
///
/// Fields a mode does not report are `None`; so are attributes the device
/// did not expose.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub device: DeviceKind,
    pub kind: ChangeKind,
    /// Short human-readable summary, e.g. "New Disk Inserted".
    pub headline: &'static str,
    pub identifier: String,
    pub volume_name: Option<String>,
    pub description: Option<String>,
    /// Drive-type label. Only logical-disk insertions carry one.
    pub class_label: Option<&'static str>,
    pub size: Option<String>,
    pub free_space: Option<String>,
    pub serial_number: Option<String>,
    pub manufacturer: Option<String>,
    pub space_change: Option<SpaceChange>,
    pub observed_at: chrono::DateTime<chrono::Local>,
}

impl Notification {
    fn base(device: DeviceKind, mode: WatchMode, event: &ChangeEvent) -> Self {
        Self {
            device,
            kind: mode.change_kind(),
            headline: headline(device, mode),
            identifier: event.current.display_identifier().to_owned(),
            volume_name: event.current.volume_name.clone(),
            description: None,
            class_label: None,
            size: None,
            free_space: None,
            serial_number: None,
            manufacturer: None,
            space_change: None,
            observed_at: chrono::Local::now(),
        }
    }
}

/// Summary line for each (device kind, mode) pair.
pub fn headline(device: DeviceKind, mode: WatchMode) -> &'static str {
    match (device, mode) {
        (DeviceKind::LogicalDisk, WatchMode::Creation) => "New Disk Inserted",
        (DeviceKind::LogicalDisk, WatchMode::Modification) => "Drive Modified",
        (DeviceKind::LogicalDisk, WatchMode::Deletion) => "Drive Ejected",
        (DeviceKind::LogicalDisk, WatchMode::Operation) => "Drive Operation",
        (DeviceKind::PortableDevice, WatchMode::Creation) => "Portable Device Connected",
        (DeviceKind::PortableDevice, WatchMode::Modification) => "Portable Device Modification",
        (DeviceKind::PortableDevice, WatchMode::Deletion) => "Portable Device Ejected",
        (DeviceKind::PortableDevice, WatchMode::Operation) => "Portable Device Operation",
    }
}

/// Builds the record for one event seen by a watcher of a given device kind.
pub type BuildFn = fn(DeviceKind, &ChangeEvent) -> Result<Notification, WatchError>;

/// The builder for a watch mode.
pub fn builder_for(mode: WatchMode) -> BuildFn {
    match mode {
        WatchMode::Creation => build_created,
        WatchMode::Modification => build_modified,
        WatchMode::Deletion => build_deleted,
        WatchMode::Operation => build_operated,
    }
}

fn build_created(device: DeviceKind, event: &ChangeEvent) -> Result<Notification, WatchError> {
    let snap = &event.current;
    let mut n = Notification::base(device, WatchMode::Creation, event);
    n.description = snap.description.clone();
    n.serial_number = snap.serial_number.clone();
    n.manufacturer = snap.manufacturer.clone();
    if device == DeviceKind::LogicalDisk {
        n.class_label = Some(snap.class_code.label());
        n.size = Some(format_optional_size(snap.size_bytes));
        n.free_space = Some(format_optional_size(snap.free_bytes));
    }
    Ok(n)
}

fn build_modified(device: DeviceKind, event: &ChangeEvent) -> Result<Notification, WatchError> {
    let previous = event
        .previous
        .as_ref()
        .ok_or_else(|| WatchError::MissingPreviousSnapshot {
            identifier: event.current.display_identifier().to_owned(),
        })?;
    let mut n = Notification::base(device, WatchMode::Modification, event);
    n.space_change = match (previous.free_bytes, event.current.free_bytes) {
        (Some(before), Some(after)) => Some(SpaceChange::between(before, after)),
        _ => None,
    };
    Ok(n)
}

fn build_deleted(device: DeviceKind, event: &ChangeEvent) -> Result<Notification, WatchError> {
    let mut n = Notification::base(device, WatchMode::Deletion, event);
    n.manufacturer = event.current.manufacturer.clone();
    Ok(n)
}

fn build_operated(device: DeviceKind, event: &ChangeEvent) -> Result<Notification, WatchError> {
    Ok(Notification::base(device, WatchMode::Operation, event))
}
