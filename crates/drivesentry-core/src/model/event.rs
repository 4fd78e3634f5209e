//! Change events and the watch modes that select them.

use crate::model::DeviceSnapshot;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Which underlying event stream a watcher subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum WatchMode {
    Creation,
    Modification,
    Deletion,
    /// Any of the above, reported as a single generic "operation" kind.
    Operation,
}

impl WatchMode {
    /// Every mode, in the order watchers are created for them.
    pub const ALL: [WatchMode; 4] = [
        WatchMode::Creation,
        WatchMode::Modification,
        WatchMode::Deletion,
        WatchMode::Operation,
    ];

    /// Name used on the command line and in settings files.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Creation => "create",
            Self::Modification => "modify",
            Self::Deletion => "delete",
            Self::Operation => "operation",
        }
    }

    /// The event kind a watcher in this mode delivers.
    pub fn change_kind(self) -> ChangeKind {
        match self {
            Self::Creation => ChangeKind::Created,
            Self::Modification => ChangeKind::Modified,
            Self::Deletion => ChangeKind::Deleted,
            Self::Operation => ChangeKind::Operated,
        }
    }
}

impl fmt::Display for WatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown watch mode name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown event kind {0:?} (expected create, modify, delete or operation)")]
pub struct ParseWatchModeError(pub String);

impl FromStr for WatchMode {
    type Err = ParseWatchModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "create" | "creation" => Ok(Self::Creation),
            "modify" | "modification" => Ok(Self::Modification),
            "delete" | "deletion" => Ok(Self::Deletion),
            "operation" => Ok(Self::Operation),
            other => Err(ParseWatchModeError(other.to_owned())),
        }
    }
}

impl TryFrom<String> for WatchMode {
    type Error = ParseWatchModeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// What happened to a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
    Operated,
}

/// A single device change delivered by an event source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    /// Device state after the change (before it, for deletions).
    pub current: DeviceSnapshot,
    /// Device state before the change. Present only for `Modified`.
    pub previous: Option<DeviceSnapshot>,
}

impl ChangeEvent {
    pub fn created(current: DeviceSnapshot) -> Self {
        Self {
            kind: ChangeKind::Created,
            current,
            previous: None,
        }
    }

    pub fn modified(current: DeviceSnapshot, previous: DeviceSnapshot) -> Self {
        Self {
            kind: ChangeKind::Modified,
            current,
            previous: Some(previous),
        }
    }

    pub fn deleted(current: DeviceSnapshot) -> Self {
        Self {
            kind: ChangeKind::Deleted,
            current,
            previous: None,
        }
    }

    pub fn operated(current: DeviceSnapshot) -> Self {
        Self {
            kind: ChangeKind::Operated,
            current,
            previous: None,
        }
    }
}
