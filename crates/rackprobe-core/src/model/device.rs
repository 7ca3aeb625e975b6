// ── Device domain types ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{Display, EnumString};

use super::common::{FirmwareTable, Priority};
use super::entity_id::{DeviceId, MacAddress};

/// Coarse device classification.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum DeviceType {
    #[default]
    Unknown,
    Server,
    Virtual,
    Switch,
    Storage,
}

/// Device fields that carry their own write priority.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DeviceField {
    Name,
    ModelName,
    DeviceType,
    SerialNumber,
    Manufacturer,
    BiosVersion,
    Firmware,
    Ethernets,
}

/// A network interface reported by the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ethernet {
    pub label: String,
    pub mac: MacAddress,
    /// Link speed in Mbit/s, 0 when unknown.
    pub speed: u32,
}

impl Ethernet {
    pub fn new(label: impl Into<String>, mac: MacAddress, speed: u32) -> Self {
        Self {
            label: label.into(),
            mac,
            speed,
        }
    }
}

/// Partial field update. `None` leaves the field alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceUpdate {
    pub name: Option<String>,
    pub model_name: Option<String>,
    pub device_type: Option<DeviceType>,
    pub serial_number: Option<String>,
    pub manufacturer: Option<String>,
    pub bios_version: Option<String>,
    pub firmware: Option<FirmwareTable>,
}

impl DeviceUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// The canonical inventory device.
///
/// Identity is the set of MACs in `ethernets`: any discovery that reports
/// one of them converges on this record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub name: Option<String>,
    pub model_name: Option<String>,
    pub device_type: DeviceType,

    // Hardware
    pub serial_number: Option<String>,
    pub manufacturer: Option<String>,
    pub bios_version: Option<String>,
    #[serde(default)]
    pub firmware: FirmwareTable,

    // Interfaces
    pub ethernets: Vec<Ethernet>,

    // Lifecycle
    pub created_at: DateTime<Utc>,
    pub last_seen: Option<DateTime<Utc>>,

    /// Priority each field was last written with.
    #[serde(default)]
    pub field_priorities: BTreeMap<DeviceField, Priority>,
}

impl Device {
    pub fn new(id: DeviceId) -> Self {
        Self {
            id,
            name: None,
            model_name: None,
            device_type: DeviceType::Unknown,
            serial_number: None,
            manufacturer: None,
            bios_version: None,
            firmware: FirmwareTable::new(),
            ethernets: Vec::new(),
            created_at: Utc::now(),
            last_seen: None,
            field_priorities: BTreeMap::new(),
        }
    }

    pub fn macs(&self) -> impl Iterator<Item = &MacAddress> {
        self.ethernets.iter().map(|e| &e.mac)
    }

    pub fn field_priority(&self, field: DeviceField) -> Option<Priority> {
        self.field_priorities.get(&field).copied()
    }

    /// Apply `update` field by field. Returns the fields that were written;
    /// fields held at a higher priority are left untouched.
    pub fn apply(&mut self, update: DeviceUpdate, priority: Priority) -> Vec<DeviceField> {
        let mut written = Vec::new();
        let DeviceUpdate {
            name,
            model_name,
            device_type,
            serial_number,
            manufacturer,
            bios_version,
            firmware,
        } = update;

        if let Some(v) = name {
            self.write(DeviceField::Name, priority, &mut written, |d| d.name = Some(v));
        }
        if let Some(v) = model_name {
            self.write(DeviceField::ModelName, priority, &mut written, |d| {
                d.model_name = Some(v);
            });
        }
        if let Some(v) = device_type {
            self.write(DeviceField::DeviceType, priority, &mut written, |d| {
                d.device_type = v;
            });
        }
        if let Some(v) = serial_number {
            self.write(DeviceField::SerialNumber, priority, &mut written, |d| {
                d.serial_number = Some(v);
            });
        }
        if let Some(v) = manufacturer {
            self.write(DeviceField::Manufacturer, priority, &mut written, |d| {
                d.manufacturer = Some(v);
            });
        }
        if let Some(v) = bios_version {
            self.write(DeviceField::BiosVersion, priority, &mut written, |d| {
                d.bios_version = Some(v);
            });
        }
        if let Some(v) = firmware {
            self.write(DeviceField::Firmware, priority, &mut written, |d| d.firmware = v);
        }

        written
    }

    /// Merge reported interfaces by MAC. New MACs are always added (they
    /// are identity, not opinion); label and speed of known interfaces
    /// follow the priority rule.
    pub fn merge_ethernets(&mut self, reported: &[Ethernet], priority: Priority) -> bool {
        let may_overwrite = priority.overrides(self.field_priority(DeviceField::Ethernets));
        let mut changed = false;

        for eth in reported.iter().filter(|e| e.mac.is_identifying()) {
            match self.ethernets.iter_mut().find(|e| e.mac == eth.mac) {
                Some(existing) => {
                    if may_overwrite {
                        if !eth.label.is_empty() && existing.label != eth.label {
                            existing.label.clone_from(&eth.label);
                            changed = true;
                        }
                        if eth.speed != 0 && existing.speed != eth.speed {
                            existing.speed = eth.speed;
                            changed = true;
                        }
                    }
                }
                None => {
                    self.ethernets.push(eth.clone());
                    changed = true;
                }
            }
        }

        if may_overwrite && !reported.is_empty() {
            self.field_priorities.insert(DeviceField::Ethernets, priority);
        }
        changed
    }

    /// Mark the device as seen by a successful discovery.
    pub fn touch(&mut self, at: DateTime<Utc>) {
        self.last_seen = Some(at);
    }

    fn write(
        &mut self,
        field: DeviceField,
        priority: Priority,
        written: &mut Vec<DeviceField>,
        set: impl FnOnce(&mut Self),
    ) {
        if priority.overrides(self.field_priority(field)) {
            set(self);
            self.field_priorities.insert(field, priority);
            written.push(field);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn eth(label: &str, mac: &str, speed: u32) -> Ethernet {
        Ethernet::new(label, MacAddress::new(mac), speed)
    }

    #[test]
    fn higher_priority_field_is_preserved() {
        let mut dev = Device::new(DeviceId::new());
        dev.apply(
            DeviceUpdate {
                model_name: Some("PowerEdge R640".into()),
                ..DeviceUpdate::default()
            },
            Priority(50),
        );

        let written = dev.apply(
            DeviceUpdate {
                model_name: Some("Linux".into()),
                serial_number: Some("ABC123".into()),
                ..DeviceUpdate::default()
            },
            Priority(5),
        );

        assert_eq!(dev.model_name.as_deref(), Some("PowerEdge R640"));
        assert_eq!(dev.serial_number.as_deref(), Some("ABC123"));
        assert_eq!(written, vec![DeviceField::SerialNumber]);
        assert_eq!(dev.field_priority(DeviceField::ModelName), Some(Priority(50)));
    }

    #[test]
    fn equal_priority_refreshes_value() {
        let mut dev = Device::new(DeviceId::new());
        let update = |v: &str| DeviceUpdate {
            bios_version: Some(v.into()),
            ..DeviceUpdate::default()
        };
        dev.apply(update("1.0"), Priority(5));
        dev.apply(update("1.1"), Priority(5));
        assert_eq!(dev.bios_version.as_deref(), Some("1.1"));
    }

    #[test]
    fn merge_ethernets_adds_new_macs_and_skips_null() {
        let mut dev = Device::new(DeviceId::new());
        assert!(dev.merge_ethernets(
            &[eth("eth0", "52:54:00:00:00:01", 0), eth("", "00:00:00:00:00:00", 0)],
            Priority(5),
        ));
        assert_eq!(dev.ethernets.len(), 1);

        // Lower priority may still add identity but not relabel.
        dev.merge_ethernets(
            &[eth("mgmt", "52:54:00:00:00:01", 1000), eth("eth1", "52:54:00:00:00:02", 0)],
            Priority(1),
        );
        assert_eq!(dev.ethernets.len(), 2);
        assert_eq!(dev.ethernets[0].label, "eth0");
        assert_eq!(dev.ethernets[0].speed, 0);
    }

    #[test]
    fn device_type_parses_case_insensitively() {
        let t: DeviceType = "Server".parse().unwrap();
        assert_eq!(t, DeviceType::Server);
        assert_eq!(DeviceType::Virtual.to_string(), "virtual");
    }
}
