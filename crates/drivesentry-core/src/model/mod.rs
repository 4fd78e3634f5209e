//! Data model for DriveSentry.
//!
//! Snapshots and events are produced once per underlying update, consumed
//! within a single poll iteration, then dropped. Nothing here is retained.
pub mod device;
pub mod event;
pub mod size;

pub use device::{DeviceClassCode, DeviceKind, DeviceSnapshot};
pub use event::{ChangeEvent, ChangeKind, ParseWatchModeError, WatchMode};
