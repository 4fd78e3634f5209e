//! DriveSentry Core: device watchers, notification building, and the
//! supervisor that runs them.
//!
//! This crate contains all business logic with zero UI dependencies. The
//! command-line frontend lives in `drivesentry-cli`.
//!
//! # Modules
//!
//! - [`model`]: Device snapshots, change events, and size formatting.
//! - [`classify`]: Drive-type code mapping and the removable-only filter.
//! - [`source`]: The event-source contract plus an in-memory source.
//! - [`platform`]: Sampling-based event source for Windows and Linux.
//! - [`notify`]: Per-mode notification builders and sinks.
//! - [`watcher`]: The watcher state machine and its shutdown handle.
//! - [`supervisor`]: Thread-per-watcher and cooperative scheduling.
pub mod classify;
pub mod error;
pub mod model;
pub mod notify;
pub mod platform;
pub mod source;
pub mod supervisor;
pub mod watcher;

pub use error::{SourceError, WatchError};
pub use model::{ChangeEvent, ChangeKind, DeviceClassCode, DeviceKind, DeviceSnapshot, WatchMode};
pub use notify::{Notification, NotificationSink, TracingSink};
pub use platform::SystemSource;
pub use supervisor::{Discipline, ParseDisciplineError, Supervisor, WatcherExit};
pub use watcher::{Watcher, WatcherConfig, WatcherHandle, WatcherState, WatcherStats};
