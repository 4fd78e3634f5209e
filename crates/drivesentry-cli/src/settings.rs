//! JSON settings file, merged with command-line flags.
//!
//! Every field is optional in the file. Flags given on the command line
//! replace the corresponding file value; [`Settings::validate`] then turns
//! the merged result into a [`WatchPlan`] or a usage error.
//!
//! ```json
//! {
//!   "logical": true,
//!   "portable": false,
//!   "events": ["create", "delete"],
//!   "only_removable": true,
//!   "poll_timeout_ms": 100,
//!   "discipline": "threaded",
//!   "log_level": "info",
//!   "log_format": "compact"
//! }
//! ```
use crate::args::Args;
use crate::logging::{LogFormat, LoggingConfig};
use anyhow::{Context, Result};
use drivesentry_core::{DeviceKind, Discipline, WatchMode};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub logical: bool,
    pub portable: bool,
    pub events: Vec<WatchMode>,
    pub only_removable: bool,
    pub poll_timeout_ms: u64,
    pub discipline: Discipline,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            logical: false,
            portable: false,
            events: WatchMode::ALL.to_vec(),
            only_removable: true,
            poll_timeout_ms: 100,
            discipline: Discipline::default(),
            log_level: "info".to_owned(),
            log_format: LogFormat::default(),
        }
    }
}

/// Reasons a merged configuration cannot start any watcher.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SettingsError {
    #[error("no device class selected: pass --logical and/or --portable")]
    NoDeviceClass,
    #[error("the event list is empty")]
    NoEvents,
    #[error("poll timeout must be greater than zero")]
    ZeroTimeout,
}

/// What to watch and how, after validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchPlan {
    pub kinds: Vec<DeviceKind>,
    /// Modes in the order given, without duplicates.
    pub modes: Vec<WatchMode>,
    pub only_removable: bool,
    pub poll_timeout: Duration,
    pub discipline: Discipline,
}

impl Settings {
    /// Read a settings file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Invalid settings file {}", path.display()))
    }

    /// Overlay command-line flags. Selecting any device class on the
    /// command line replaces the file's selection rather than adding to it.
    pub fn apply_args(&mut self, args: &Args) {
        if args.logical || args.portable {
            self.logical = args.logical;
            self.portable = args.portable;
        }
        if let Some(events) = &args.events {
            self.events = events.clone();
        }
        if args.all_drives {
            self.only_removable = false;
        }
        if let Some(ms) = args.timeout_ms {
            self.poll_timeout_ms = ms;
        }
        if args.cooperative {
            self.discipline = Discipline::Cooperative;
        }
        if args.verbose {
            self.log_level = "debug".to_owned();
        }
        if let Some(format) = args.log_format {
            self.log_format = format;
        }
    }

    pub fn validate(&self) -> Result<WatchPlan, SettingsError> {
        let mut kinds = Vec::new();
        if self.logical {
            kinds.push(DeviceKind::LogicalDisk);
        }
        if self.portable {
            kinds.push(DeviceKind::PortableDevice);
        }
        if kinds.is_empty() {
            return Err(SettingsError::NoDeviceClass);
        }

        if self.events.is_empty() {
            return Err(SettingsError::NoEvents);
        }
        let mut modes = Vec::with_capacity(self.events.len());
        for &mode in &self.events {
            if !modes.contains(&mode) {
                modes.push(mode);
            }
        }

        if self.poll_timeout_ms == 0 {
            return Err(SettingsError::ZeroTimeout);
        }
        Ok(WatchPlan {
            kinds,
            modes,
            only_removable: self.only_removable,
            poll_timeout: Duration::from_millis(self.poll_timeout_ms),
            discipline: self.discipline,
        })
    }

    pub fn logging(&self) -> LoggingConfig {
        let verbose = matches!(self.log_level.as_str(), "debug" | "trace");
        LoggingConfig {
            level: self.log_level.clone(),
            format: self.log_format,
            include_thread_names: verbose,
        }
    }
}
