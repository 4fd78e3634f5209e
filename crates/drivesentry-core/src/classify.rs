//! Drive-type classification and the removable-only inclusion filter.

use crate::model::DeviceClassCode;

// Drive type codes reported by the platform (Win32 `GetDriveTypeW` values,
// which the Linux probe reuses).
pub const DRIVE_REMOVABLE: u32 = 2;
pub const DRIVE_FIXED: u32 = 3;
pub const DRIVE_REMOTE: u32 = 4;
pub const DRIVE_CDROM: u32 = 5;

/// Map a raw drive-type code to its class. Total: every undocumented code
/// (including 0 "unknown" and 1 "no root dir") is [`DeviceClassCode::Unknown`].
pub fn classify(code: u32) -> DeviceClassCode {
    match code {
        DRIVE_REMOVABLE => DeviceClassCode::Removable,
        DRIVE_FIXED => DeviceClassCode::FixedLocal,
        DRIVE_REMOTE => DeviceClassCode::Network,
        DRIVE_CDROM => DeviceClassCode::Compact,
        _ => DeviceClassCode::Unknown,
    }
}

/// Whether an event for a device of class `class` passes the filter.
pub fn is_included(class: DeviceClassCode, only_removable: bool) -> bool {
    !only_removable || class == DeviceClassCode::Removable
}
