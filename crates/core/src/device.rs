//! Device model: discovery and the enumerated hardware settings.

use crate::error::{Error, Result};
use crate::{BEASTX_PID, BEASTX_VID};
use tracing::{debug, info};

/// Usage page of the Beast X vendor configuration interface.
const CONFIG_USAGE_PAGE: u16 = 0xFF00;

/// Interface number of the configuration endpoint on hosts that do not
/// report usage pages.
const CONFIG_INTERFACE: i32 = 1;

/// Information about a discovered Beast X HID interface.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub vid: u16,
    pub pid: u16,
    pub path: String,
    pub serial: Option<String>,
    pub usage_page: u16,
    pub interface_number: i32,
}

impl DeviceInfo {
    /// Whether this interface is the vendor configuration endpoint.
    ///
    /// The mouse exposes several HID interfaces; settings writes only work
    /// on the vendor-defined one (usage page 0xFF00, or interface 1 on
    /// platforms that do not expose usage pages).
    pub fn is_config_interface(&self) -> bool {
        self.usage_page == CONFIG_USAGE_PAGE || self.interface_number == CONFIG_INTERFACE
    }
}

/// Discover all connected Beast X HID interfaces.
///
/// The vendor configuration interface sorts first so callers can open the
/// first entry.
pub fn discover_devices() -> Result<Vec<DeviceInfo>> {
    debug!("Starting HID device enumeration");
    let api = hidapi::HidApi::new().map_err(|e| Error::IoFailure(e.to_string()))?;

    let mut devices = Vec::new();
    for info in api.device_list() {
        if info.vendor_id() != BEASTX_VID || info.product_id() != BEASTX_PID {
            continue;
        }

        let dev = DeviceInfo {
            vid: info.vendor_id(),
            pid: info.product_id(),
            path: info.path().to_string_lossy().into_owned(),
            serial: info.serial_number().map(|s| s.to_string()),
            usage_page: info.usage_page(),
            interface_number: info.interface_number(),
        };
        info!(
            vid = format_args!("0x{:04X}", dev.vid),
            pid = format_args!("0x{:04X}", dev.pid),
            path = %dev.path,
            usage_page = format_args!("0x{:04X}", dev.usage_page),
            interface = dev.interface_number,
            "Found Beast X interface"
        );
        devices.push(dev);
    }

    devices.sort_by_key(|d| !d.is_config_interface());
    debug!(count = devices.len(), "Device enumeration complete");
    Ok(devices)
}

/// Polling rate options supported by the Beast X.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[repr(u16)]
pub enum PollingRate {
    Hz125 = 125,
    Hz250 = 250,
    Hz500 = 500,
    Hz1000 = 1000,
    Hz2000 = 2000,
    Hz4000 = 4000,
}

impl PollingRate {
    /// Convert from raw Hz value.
    pub fn from_hz(hz: u16) -> Option<Self> {
        match hz {
            125 => Some(Self::Hz125),
            250 => Some(Self::Hz250),
            500 => Some(Self::Hz500),
            1000 => Some(Self::Hz1000),
            2000 => Some(Self::Hz2000),
            4000 => Some(Self::Hz4000),
            _ => None,
        }
    }

    /// Get the Hz value.
    pub fn as_hz(&self) -> u16 {
        *self as u16
    }

    /// All supported rates.
    pub const ALL: &'static [PollingRate] = &[
        PollingRate::Hz125,
        PollingRate::Hz250,
        PollingRate::Hz500,
        PollingRate::Hz1000,
        PollingRate::Hz2000,
        PollingRate::Hz4000,
    ];
}

impl std::fmt::Display for PollingRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} Hz", self.as_hz())
    }
}

/// Lift-off distance options supported by the Beast X sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum LiftOffDistance {
    Mm1,
    Mm2,
}

impl LiftOffDistance {
    /// Convert from raw millimeter value.
    pub fn from_mm(mm: u8) -> Option<Self> {
        match mm {
            1 => Some(Self::Mm1),
            2 => Some(Self::Mm2),
            _ => None,
        }
    }

    /// Get the millimeter value.
    pub fn as_mm(&self) -> u8 {
        match self {
            Self::Mm1 => 1,
            Self::Mm2 => 2,
        }
    }

    /// All supported distances.
    pub const ALL: &'static [LiftOffDistance] = &[LiftOffDistance::Mm1, LiftOffDistance::Mm2];
}

impl std::fmt::Display for LiftOffDistance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}mm", self.as_mm())
    }
}
