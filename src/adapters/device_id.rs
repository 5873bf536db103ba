//! Device identity derived from the ESP32 factory MAC address.
//!
//! Produces a stable, human-readable device ID in the form `HL-XXYYZZ`
//! (last 3 bytes of the 6-byte MAC in uppercase hex). The ID is:
//! - Deterministic across reboots (factory-burned eFuse MAC)
//! - The last path segment of the identity URL printed at boot

use core::fmt::Write;

use crate::app::ports::IdentityUrl;

/// Base of the identity URL; the lowercase device ID is appended.
pub const IDENTITY_URL_BASE: &str = "https://blecon.dev/";

/// Fixed-size device ID string: "HL-XXYYZZ".
pub type DeviceIdString = heapless::String<16>;

/// Full 6-byte MAC address.
pub type MacAddress = [u8; 6];

/// Read the factory MAC address from eFuse.
#[cfg(target_os = "espidf")]
pub fn read_mac() -> MacAddress {
    let mut mac: MacAddress = [0u8; 6];
    // SAFETY: mac is a valid 6-byte buffer, as the call requires.
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

/// Format: `HL-XXYYZZ` (e.g., `HL-EFCAFE`).
pub fn device_id(mac: &MacAddress) -> DeviceIdString {
    let mut id = DeviceIdString::new();
    let _ = write!(id, "HL-{:02X}{:02X}{:02X}", mac[3], mac[4], mac[5]);
    id
}

/// Format: `https://blecon.dev/hl-xxyyzz`.
pub fn identity_url(mac: &MacAddress) -> IdentityUrl {
    let mut url = IdentityUrl::new();
    let _ = write!(
        url,
        "{}hl-{:02x}{:02x}{:02x}",
        IDENTITY_URL_BASE, mac[3], mac[4], mac[5]
    );
    url
}
