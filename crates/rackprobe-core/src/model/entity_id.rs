// ── Core identity types ──
//
// Inventory records are keyed by opaque UUIDs; discovered hardware is
// matched by MAC address (devices) and WWN (shared storage). Both are
// normalized on construction so the same hardware always maps to the
// same key no matter which tool printed it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ── Record ids ──────────────────────────────────────────────────────

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(u: Uuid) -> Self {
                Self(u)
            }
        }
    };
}

uuid_id!(
    /// Inventory id of a device.
    DeviceId
);

uuid_id!(
    /// Inventory id of a system-wide disk share.
    ShareId
);

// ── MacAddress ──────────────────────────────────────────────────────

/// MAC address, normalized to lowercase colon-separated format (aa:bb:cc:dd:ee:ff).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MacAddress(String);

impl MacAddress {
    /// Create a normalized MAC address from any common format.
    /// Accepts colon-separated, dash-separated, dotted, or bare hex.
    pub fn new(raw: impl AsRef<str>) -> Self {
        let hex: String = raw
            .as_ref()
            .chars()
            .filter(char::is_ascii_hexdigit)
            .map(|c| c.to_ascii_lowercase())
            .collect();

        if hex.len() == 12 {
            let pairs: Vec<&str> = (0..6).map(|i| &hex[i * 2..i * 2 + 2]).collect();
            Self(pairs.join(":"))
        } else {
            Self(raw.as_ref().to_lowercase().replace('-', ":"))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// All-zero and broadcast addresses never identify a device.
    pub fn is_identifying(&self) -> bool {
        self.0.len() == 17 && self.0 != "00:00:00:00:00:00" && self.0 != "ff:ff:ff:ff:ff:ff"
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MacAddress {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

// ── Wwn ─────────────────────────────────────────────────────────────

/// World Wide Name of a storage volume, upper-case hex without separators.
///
/// Linux multipath prints NAA identifiers with a leading `3` (the SCSI
/// designator type); it is dropped so the value matches what storage
/// arrays report.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Wwn(String);

impl Wwn {
    pub fn new(raw: impl AsRef<str>) -> Self {
        let trimmed = raw.as_ref().trim();
        let trimmed = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        let mut hex: String = trimmed
            .chars()
            .filter(|c| !matches!(c, ':' | '-' | '.' | ' '))
            .map(|c| c.to_ascii_uppercase())
            .collect();

        if hex.len() == 33 && hex.starts_with('3') {
            hex.remove(0);
        }
        Self(hex)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Wwn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Wwn {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn device_id_round_trips_through_display() {
        let id = DeviceId::new();
        let parsed: DeviceId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn mac_address_normalizes_dashes() {
        let mac = MacAddress::new("AA-BB-CC-DD-EE-FF");
        assert_eq!(mac.as_str(), "aa:bb:cc:dd:ee:ff");
    }

    #[test]
    fn mac_address_normalizes_bare_and_dotted_hex() {
        assert_eq!(MacAddress::new("5254.0012.3456").as_str(), "52:54:00:12:34:56");
        assert_eq!(MacAddress::new("525400123456").as_str(), "52:54:00:12:34:56");
    }

    #[test]
    fn null_mac_is_not_identifying() {
        assert!(!MacAddress::new("00:00:00:00:00:00").is_identifying());
        assert!(MacAddress::new("52:54:00:12:34:56").is_identifying());
    }

    #[test]
    fn wwn_strips_naa_prefix_and_separators() {
        let wwn = Wwn::new("360002ac000000000000000030000e3c2");
        assert_eq!(wwn.as_str(), "60002AC000000000000000030000E3C2");

        let wwn = Wwn::new("60:00:2a:c0:00:00:00:00:00:00:00:03:00:00:e3:c2");
        assert_eq!(wwn.as_str(), "60002AC000000000000000030000E3C2");
    }

    #[test]
    fn short_wwn_is_kept() {
        assert_eq!(Wwn::new("0x50060e80").as_str(), "50060E80");
    }
}
