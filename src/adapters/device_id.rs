//! Device identity derived from the ESP32 factory MAC address.
//!
//! Produces a stable, human-readable device ID in the form `EN-XXYYZZ`
//! (last 3 bytes of the 6-byte MAC in uppercase hex). It is reported in every
//! telemetry payload and in `get_config`.

use core::fmt::Write;

use crate::app::ports::{DeviceIdString, DeviceIdentity};

/// Full 6-byte MAC address.
pub type MacAddress = [u8; 6];

/// Read the factory MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    unsafe {
        esp_idf_svc::sys::esp_efuse_mac_get_default(mac.as_mut_ptr());
    }
    mac
}

/// Simulation: returns a deterministic fake MAC.
#[cfg(not(target_os = "espidf"))]
pub fn read_mac() -> MacAddress {
    [0xDE, 0xAD, 0xBE, 0xEF, 0xCA, 0xFE]
}

/// Derive the short device ID from the last 3 MAC bytes.
pub fn device_id(mac: &MacAddress) -> DeviceIdString {
    let mut id = DeviceIdString::new();
    let _ = write!(id, "EN-{:02X}{:02X}{:02X}", mac[3], mac[4], mac[5]);
    id
}

/// Identity of this board running this firmware build.
pub fn local_identity() -> DeviceIdentity {
    DeviceIdentity {
        device_id: device_id(&read_mac()),
        firmware_version: crate::FIRMWARE_VERSION,
    }
}
