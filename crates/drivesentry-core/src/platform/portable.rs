//! Portable device sampling.
//!
//! Portable devices (phones, cameras, media players) often expose no
//! volume, so they are listed by their device node instead: the WPD setup
//! class on Windows, and USB still-image (PTP/MTP) interfaces on Linux.
use super::DeviceProbe;
use crate::error::SourceError;
use crate::model::DeviceSnapshot;
use crate::source::SubscriptionFilter;

/// Probe for attached portable devices.
#[derive(Debug, Clone, Copy, Default)]
pub struct PortableDeviceProbe;

/// Portable devices carry no drive type, so the class filter never
/// narrows the sample.
impl DeviceProbe for PortableDeviceProbe {
    #[cfg(windows)]
    fn sample(&self, _filter: SubscriptionFilter) -> Result<Vec<DeviceSnapshot>, SourceError> {
        windows_impl::enumerate_wpd()
    }

    #[cfg(target_os = "linux")]
    fn sample(&self, _filter: SubscriptionFilter) -> Result<Vec<DeviceSnapshot>, SourceError> {
        linux::enumerate_usb(std::path::Path::new(linux::USB_DEVICES))
    }

    #[cfg(not(any(windows, target_os = "linux")))]
    fn sample(&self, _filter: SubscriptionFilter) -> Result<Vec<DeviceSnapshot>, SourceError> {
        Err(SourceError::Unsupported {
            kind: crate::model::DeviceKind::PortableDevice,
        })
    }
}

#[cfg(windows)]
mod windows_impl {
    use super::*;
    use crate::model::DeviceClassCode;
    use windows::core::{GUID, PCWSTR};
    use windows::Win32::Devices::DeviceAndDriverInstallation::{
        SetupDiDestroyDeviceInfoList, SetupDiEnumDeviceInfo, SetupDiGetClassDevsW,
        SetupDiGetDeviceInstanceIdW, SetupDiGetDeviceRegistryPropertyW, DIGCF_PRESENT, HDEVINFO,
        SETUP_DI_REGISTRY_PROPERTY, SPDRP_DEVICEDESC, SPDRP_FRIENDLYNAME, SPDRP_MFG,
        SP_DEVINFO_DATA,
    };
    use windows::Win32::Foundation::HWND;

    /// Setup class of Windows Portable Devices.
    const GUID_DEVCLASS_WPD: GUID = GUID::from_u128(0xeec5ad98_8080_425f_922a_dabf3de3f69a);

    /// Device information set, destroyed on drop.
    struct DeviceInfoSet(HDEVINFO);

    impl Drop for DeviceInfoSet {
        fn drop(&mut self) {
            unsafe {
                let _ = SetupDiDestroyDeviceInfoList(self.0);
            }
        }
    }

    pub(super) fn enumerate_wpd() -> Result<Vec<DeviceSnapshot>, SourceError> {
        let set = unsafe {
            SetupDiGetClassDevsW(
                Some(&GUID_DEVCLASS_WPD as *const GUID),
                PCWSTR::null(),
                HWND::default(),
                DIGCF_PRESENT,
            )
        }
        .map(DeviceInfoSet)
        .map_err(|e| SourceError::Platform(format!("SetupDiGetClassDevsW: {e}")))?;

        let mut devices = Vec::new();
        for index in 0u32.. {
            let mut data = SP_DEVINFO_DATA {
                cbSize: std::mem::size_of::<SP_DEVINFO_DATA>() as u32,
                ..Default::default()
            };
            if unsafe { SetupDiEnumDeviceInfo(set.0, index, &mut data) }.is_err() {
                break;
            }
            let Some(id) = instance_id(&set, &data) else {
                continue;
            };

            let mut snapshot = DeviceSnapshot::new(id, DeviceClassCode::Unknown);
            snapshot.volume_name = registry_string(&set, &data, SPDRP_FRIENDLYNAME);
            snapshot.description = registry_string(&set, &data, SPDRP_DEVICEDESC);
            snapshot.manufacturer = registry_string(&set, &data, SPDRP_MFG);
            devices.push(snapshot);
        }
        Ok(devices)
    }

    fn instance_id(set: &DeviceInfoSet, data: &SP_DEVINFO_DATA) -> Option<String> {
        let mut buf = [0u16; 512];
        unsafe { SetupDiGetDeviceInstanceIdW(set.0, data, Some(&mut buf), None) }.ok()?;
        let id = String::from_utf16_lossy(&buf[..buf.iter().position(|&c| c == 0)?]);
        (!id.is_empty()).then_some(id)
    }

    /// A REG_SZ device property, or `None` when the device has none.
    fn registry_string(
        set: &DeviceInfoSet,
        data: &SP_DEVINFO_DATA,
        property: SETUP_DI_REGISTRY_PROPERTY,
    ) -> Option<String> {
        let mut buf = [0u8; 1024];
        unsafe {
            SetupDiGetDeviceRegistryPropertyW(set.0, data, property, None, Some(&mut buf), None)
        }
        .ok()?;
        let wide: Vec<u16> = buf
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .take_while(|&c| c != 0)
            .collect();
        let value = String::from_utf16_lossy(&wide);
        (!value.is_empty()).then_some(value)
    }
}

#[cfg(target_os = "linux")]
mod linux {
    use super::*;
    use crate::model::DeviceClassCode;
    use std::collections::BTreeSet;
    use std::fs;
    use std::io;
    use std::path::Path;

    pub(super) const USB_DEVICES: &str = "/sys/bus/usb/devices";

    /// USB interface class of still-image devices, which covers PTP and
    /// most MTP implementations.
    const STILL_IMAGE_CLASS: &str = "06";

    /// List USB devices under `root` (a `/sys/bus/usb/devices` layout) that
    /// expose a still-image interface. A missing root means no USB bus.
    pub(super) fn enumerate_usb(root: &Path) -> Result<Vec<DeviceSnapshot>, SourceError> {
        let entries = match fs::read_dir(root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        // Interface directories are named "<device>:<config>.<interface>".
        let mut devices = BTreeSet::new();
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some((device, _)) = name.split_once(':') else {
                continue;
            };
            if attr(&entry.path(), "bInterfaceClass").as_deref() == Some(STILL_IMAGE_CLASS) {
                devices.insert(device.to_owned());
            }
        }

        Ok(devices
            .into_iter()
            .map(|device| snapshot(&root.join(&device), &device))
            .collect())
    }

    fn snapshot(dir: &Path, device: &str) -> DeviceSnapshot {
        let vid = attr(dir, "idVendor").unwrap_or_default().to_uppercase();
        let pid = attr(dir, "idProduct").unwrap_or_default().to_uppercase();
        let serial = attr(dir, "serial");
        // Mirrors the PnP instance id shape so identifiers read the same
        // on both platforms.
        let identifier = format!(
            "USB\\VID_{vid}&PID_{pid}\\{}",
            serial.as_deref().unwrap_or(device)
        );

        let mut snap = DeviceSnapshot::new(identifier, DeviceClassCode::Unknown)
            .with_description("Portable Device");
        snap.volume_name = attr(dir, "product");
        snap.manufacturer = attr(dir, "manufacturer");
        snap.serial_number = serial;
        snap
    }

    fn attr(dir: &Path, name: &str) -> Option<String> {
        let value = fs::read_to_string(dir.join(name)).ok()?;
        let value = value.trim();
        (!value.is_empty()).then(|| value.to_owned())
    }

}
