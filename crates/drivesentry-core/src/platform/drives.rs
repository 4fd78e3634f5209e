//! Logical disk sampling.
//!
//! On Windows every drive letter is listed with its type, label, serial,
//! filesystem and space. On Linux the mounted volumes reported by
//! `sysinfo` stand in for drive letters, one snapshot per mount point.
//!
//! Drives whose class the subscription filter rejects are dropped before
//! any volume or space query, so a removable-only watcher never touches a
//! network share.
use super::DeviceProbe;
use crate::error::SourceError;
use crate::model::DeviceSnapshot;
use crate::source::SubscriptionFilter;

/// Probe for mounted volumes.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogicalDiskProbe;

impl DeviceProbe for LogicalDiskProbe {
    #[cfg(windows)]
    fn sample(&self, filter: SubscriptionFilter) -> Result<Vec<DeviceSnapshot>, SourceError> {
        windows_impl::enumerate_drives(filter)
    }

    #[cfg(target_os = "linux")]
    fn sample(&self, filter: SubscriptionFilter) -> Result<Vec<DeviceSnapshot>, SourceError> {
        Ok(linux::enumerate_volumes(filter))
    }

    #[cfg(not(any(windows, target_os = "linux")))]
    fn sample(&self, _filter: SubscriptionFilter) -> Result<Vec<DeviceSnapshot>, SourceError> {
        Err(SourceError::Unsupported {
            kind: crate::model::DeviceKind::LogicalDisk,
        })
    }
}

#[cfg(windows)]
mod windows_impl {
    use super::*;
    use crate::classify::classify;
    use std::ffi::OsString;
    use std::os::windows::ffi::OsStringExt;
    use windows::Win32::Storage::FileSystem::{
        GetDiskFreeSpaceExW, GetDriveTypeW, GetLogicalDriveStringsW, GetVolumeInformationW,
    };

    fn wide_to_string(buf: &[u16]) -> String {
        String::from_utf16_lossy(&buf[..buf.iter().position(|&c| c == 0).unwrap_or(buf.len())])
    }

    /// Enumerate the drive letters `filter` admits. Network drives are only
    /// queried when the filter lets every class through.
    pub(super) fn enumerate_drives(
        filter: SubscriptionFilter,
    ) -> Result<Vec<DeviceSnapshot>, SourceError> {
        let mut drives = Vec::new();

        // GetLogicalDriveStringsW returns null-separated drive root strings.
        let mut buffer = [0u16; 256];
        let len = unsafe { GetLogicalDriveStringsW(Some(&mut buffer)) };
        if len == 0 {
            return Err(std::io::Error::last_os_error().into());
        }

        let full = OsString::from_wide(&buffer[..(len as usize).min(buffer.len())]);
        let full_str = full.to_string_lossy();

        for root in full_str.split('\0').filter(|s| !s.is_empty()) {
            let root_wide: Vec<u16> = root.encode_utf16().chain(std::iter::once(0)).collect();
            let root_pcwstr = windows::core::PCWSTR(root_wide.as_ptr());

            let class_code = classify(unsafe { GetDriveTypeW(root_pcwstr) });
            if !filter.admits(class_code) {
                continue;
            }
            let letter = root.trim_end_matches('\\');
            let mut snapshot =
                DeviceSnapshot::new(letter, class_code).with_description(class_code.label());

            let mut label_buf = [0u16; 256];
            let mut fs_buf = [0u16; 256];
            let mut serial: u32 = 0;
            let has_volume_info = unsafe {
                GetVolumeInformationW(
                    root_pcwstr,
                    Some(&mut label_buf),
                    Some(&mut serial as *mut u32),
                    None,
                    None,
                    Some(&mut fs_buf),
                )
                .is_ok()
            };
            if has_volume_info {
                let label = wide_to_string(&label_buf);
                if !label.is_empty() {
                    snapshot = snapshot.with_volume_name(label);
                }
                let fs = wide_to_string(&fs_buf);
                if !fs.is_empty() {
                    snapshot = snapshot.with_file_system(fs);
                }
                snapshot = snapshot.with_serial_number(format!("{serial:08X}"));
            }

            // Empty card readers and disconnected shares fail here; their
            // space is reported as missing, not zero.
            let mut free_caller: u64 = 0;
            let mut total: u64 = 0;
            let has_space = unsafe {
                GetDiskFreeSpaceExW(
                    root_pcwstr,
                    Some(&mut free_caller as *mut u64),
                    Some(&mut total as *mut u64),
                    None,
                )
                .is_ok()
            };
            if has_space {
                snapshot = snapshot.with_space(total, free_caller);
            }

            drives.push(snapshot);
        }

        Ok(drives)
    }
}

#[cfg(target_os = "linux")]
mod linux {
    use super::*;
    use crate::classify::{classify, DRIVE_CDROM, DRIVE_FIXED, DRIVE_REMOTE, DRIVE_REMOVABLE};
    use std::collections::{HashMap, HashSet};
    use std::fs;
    use std::path::{Path, PathBuf};
    use sysinfo::Disks;

    const NETWORK_FS: &[&str] = &[
        "nfs", "nfs4", "cifs", "smb3", "smbfs", "9p", "afs", "fuse.sshfs",
    ];
    const OPTICAL_FS: &[&str] = &["iso9660", "udf"];

    /// A mounted volume as `sysinfo` reports it.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub(super) struct Volume {
        pub device: String,
        pub mount_point: String,
        pub fs_type: String,
        pub removable: bool,
        pub total: u64,
        pub available: u64,
    }

    /// sysinfo leaves NFS and CIFS mounts out under its default features,
    /// so no network share is stat'ed here.
    pub(super) fn enumerate_volumes(filter: SubscriptionFilter) -> Vec<DeviceSnapshot> {
        let disks = Disks::new_with_refreshed_list();
        let volumes = disks.list().iter().map(|disk| Volume {
            device: disk.name().to_string_lossy().into_owned(),
            mount_point: disk.mount_point().to_string_lossy().into_owned(),
            fs_type: disk.file_system().to_string_lossy().into_owned(),
            removable: disk.is_removable(),
            total: disk.total_space(),
            available: disk.available_space(),
        });
        let labels = link_names(Path::new("/dev/disk/by-label"));
        let uuids = link_names(Path::new("/dev/disk/by-uuid"));
        snapshots(volumes, filter, &labels, &uuids)
    }

    /// Turn volumes into snapshots keyed by mount point. Volumes not backed
    /// by a `/dev` node (overlays, tmpfs) are skipped unless they are
    /// network mounts.
    pub(super) fn snapshots(
        volumes: impl IntoIterator<Item = Volume>,
        filter: SubscriptionFilter,
        labels: &HashMap<PathBuf, String>,
        uuids: &HashMap<PathBuf, String>,
    ) -> Vec<DeviceSnapshot> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for volume in volumes {
            let network = NETWORK_FS.contains(&volume.fs_type.as_str());
            if !network && !volume.device.starts_with("/dev/") {
                continue;
            }
            let class_code = classify(drive_type_code(&volume.fs_type, network, volume.removable));
            if !filter.admits(class_code) {
                continue;
            }
            // Bind mounts repeat a mount point; keep the first.
            if !seen.insert(volume.mount_point.clone()) {
                continue;
            }

            let device = fs::canonicalize(&volume.device)
                .unwrap_or_else(|_| PathBuf::from(&volume.device));
            let mut snapshot = DeviceSnapshot::new(volume.mount_point, class_code)
                .with_description(class_code.label())
                .with_file_system(volume.fs_type)
                .with_space(volume.total, volume.available);
            if let Some(label) = labels.get(&device) {
                snapshot = snapshot.with_volume_name(label.clone());
            }
            if let Some(uuid) = uuids.get(&device) {
                snapshot = snapshot.with_serial_number(uuid.clone());
            }
            out.push(snapshot);
        }
        out
    }

    pub(super) fn drive_type_code(fs_type: &str, network: bool, removable: bool) -> u32 {
        if network {
            DRIVE_REMOTE
        } else if OPTICAL_FS.contains(&fs_type) {
            DRIVE_CDROM
        } else if removable {
            DRIVE_REMOVABLE
        } else {
            DRIVE_FIXED
        }
    }

    /// Map canonical device path to link name for a `/dev/disk/by-*`
    /// directory. udev escapes spaces in labels as `\x20`.
    fn link_names(dir: &Path) -> HashMap<PathBuf, String> {
        let Ok(entries) = fs::read_dir(dir) else {
            return HashMap::new();
        };
        entries
            .flatten()
            .filter_map(|e| {
                let target = fs::canonicalize(e.path()).ok()?;
                let name = e.file_name().to_string_lossy().replace("\\x20", " ");
                Some((target, name))
            })
            .collect()
    }

}
