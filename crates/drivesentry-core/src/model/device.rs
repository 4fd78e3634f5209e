//! Device descriptions captured at event time.

use std::fmt;

/// Storage medium category derived from the platform's integer drive-type
/// code. See [`crate::classify::classify`] for the code mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceClassCode {
    Removable,
    FixedLocal,
    Network,
    Compact,
    Unknown,
}

impl DeviceClassCode {
    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            Self::Removable => "Removable Disk",
            Self::FixedLocal => "Fixed Local Disk",
            Self::Network => "Network Disk",
            Self::Compact => "Compact Disk",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for DeviceClassCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The device class a watcher is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    /// Mounted volumes / drive letters.
    LogicalDisk,
    /// Portable devices (phones, cameras, media players) that do not
    /// necessarily expose a volume.
    PortableDevice,
}

impl DeviceKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::LogicalDisk => "logical-disk",
            Self::PortableDevice => "portable-device",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Immutable description of one device at the moment an event fired.
///
/// Every attribute other than the identifier and class may be missing on a
/// given platform or device; consumers render a missing value as `"-"`
/// rather than dropping the whole record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSnapshot {
    /// Drive letter / mount point for disks, PnP instance id for portable
    /// devices.
    pub identifier: String,
    pub description: Option<String>,
    /// Volume label for disks, friendly name for portable devices.
    pub volume_name: Option<String>,
    /// Total capacity in bytes.
    pub size_bytes: Option<u64>,
    /// Free space available to the caller, in bytes.
    pub free_bytes: Option<u64>,
    pub serial_number: Option<String>,
    pub class_code: DeviceClassCode,
    /// Filesystem name (e.g. "NTFS", "vfat").
    pub file_system: Option<String>,
    /// Device manufacturer. Only portable devices report one.
    pub manufacturer: Option<String>,
}

impl DeviceSnapshot {
    /// A snapshot carrying only an identifier and class; every optional
    /// attribute is absent.
    pub fn new(identifier: impl Into<String>, class_code: DeviceClassCode) -> Self {
        Self {
            identifier: identifier.into(),
            description: None,
            volume_name: None,
            size_bytes: None,
            free_bytes: None,
            serial_number: None,
            class_code,
            file_system: None,
            manufacturer: None,
        }
    }

    pub fn with_volume_name(mut self, name: impl Into<String>) -> Self {
        self.volume_name = Some(name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_space(mut self, size_bytes: u64, free_bytes: u64) -> Self {
        self.size_bytes = Some(size_bytes);
        self.free_bytes = Some(free_bytes);
        self
    }

    pub fn with_free_bytes(mut self, free_bytes: u64) -> Self {
        self.free_bytes = Some(free_bytes);
        self
    }

    pub fn with_serial_number(mut self, serial: impl Into<String>) -> Self {
        self.serial_number = Some(serial.into());
        self
    }

    pub fn with_file_system(mut self, fs: impl Into<String>) -> Self {
        self.file_system = Some(fs.into());
        self
    }

    pub fn with_manufacturer(mut self, manufacturer: impl Into<String>) -> Self {
        self.manufacturer = Some(manufacturer.into());
        self
    }

    /// Identifier for display; an empty identifier renders as `"-"`.
    pub fn display_identifier(&self) -> &str {
        if self.identifier.is_empty() {
            "-"
        } else {
            &self.identifier
        }
    }
}
