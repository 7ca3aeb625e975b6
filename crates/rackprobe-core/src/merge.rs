// ── Upsert-merge engine ──
//
// Converges freshly extracted facts onto the inventory. Devices are
// get-or-created by MAC set and updated field by field under the priority
// rule. Disk share mounts are upserted, then pruned of links the device
// no longer reports.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::facts::{DeviceIdentity, DiskShareFacts};
use crate::model::{
    Device, DeviceId, DeviceUpdate, DiskShare, Ethernet, FirmwareTable, MacAddress, Priority,
};
use crate::store::Inventory;

/// SMBIOS values vendors ship instead of leaving a field empty.
const FIRMWARE_PLACEHOLDERS: &[&str] = &[
    "",
    "None",
    "Not Specified",
    "Not Present",
    "To Be Filled By O.E.M.",
    "System Serial Number",
    "System Product Name",
    "Default string",
];

/// What one `reconcile_disk_shares` pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
}

/// Applies discovered facts to an inventory.
#[derive(Clone)]
pub struct Reconciler {
    inventory: Arc<dyn Inventory>,
}

impl Reconciler {
    pub fn new(inventory: Arc<dyn Inventory>) -> Self {
        Self { inventory }
    }

    pub fn inventory(&self) -> &Arc<dyn Inventory> {
        &self.inventory
    }

    /// Get-or-create the device owning `identity`'s MACs, merge the
    /// identity into it and mark it seen.
    pub fn upsert_device(
        &self,
        identity: &DeviceIdentity,
        priority: Priority,
    ) -> Result<Device, CoreError> {
        let macs: Vec<MacAddress> = identity.ethernets.iter().map(|e| e.mac.clone()).collect();
        let (id, created) = self.inventory.get_or_create_device(&macs)?;

        let update = DeviceUpdate {
            model_name: identity.model_name.clone(),
            device_type: identity.device_type,
            ..DeviceUpdate::default()
        };
        let now = Utc::now();
        let device = self.inventory.modify_device(id, &mut |d| {
            d.merge_ethernets(&identity.ethernets, priority);
            d.apply(update.clone(), priority);
            d.touch(now);
        })?;

        debug!(device = %id, created, %priority, "upserted device");
        Ok(device)
    }

    /// Merge reported interfaces into an existing device.
    pub fn apply_identity(
        &self,
        device: DeviceId,
        ethernets: &[Ethernet],
        priority: Priority,
    ) -> Result<Device, CoreError> {
        self.inventory.modify_device(device, &mut |d| {
            d.merge_ethernets(ethernets, priority);
        })
    }

    /// Apply an SMBIOS-style table: well-known scalars become device
    /// fields, the whole table is stored as the firmware field.
    pub fn apply_firmware(
        &self,
        device: DeviceId,
        table: &FirmwareTable,
        priority: Priority,
    ) -> Result<Device, CoreError> {
        let update = firmware_update(table);
        if update.is_empty() {
            return self
                .inventory
                .device(device)
                .ok_or_else(|| CoreError::DeviceNotFound {
                    identifier: device.to_string(),
                });
        }
        self.inventory.modify_device(device, &mut |d| {
            let written = d.apply(update.clone(), priority);
            if !written.is_empty() {
                debug!(device = %device, fields = ?written, "applied firmware facts");
            }
        })
    }

    /// Make the device's disk share mounts match `facts` exactly.
    ///
    /// Every WWN is resolved before anything is written, so an unknown
    /// share fails the whole pass with `UnknownResource` and leaves the
    /// device's mounts as they were. Sizes always follow the facts; a
    /// mount's volume name is only filled in while empty. Non-virtual
    /// mounts whose share is no longer reported are deleted.
    pub fn reconcile_disk_shares(
        &self,
        device: DeviceId,
        facts: &DiskShareFacts,
        priority: Priority,
    ) -> Result<ReconcileSummary, CoreError> {
        let resolved = facts
            .iter()
            .map(|(volume, fact)| {
                self.inventory
                    .share_by_wwn(&fact.wwn)
                    .map(|share| (volume, fact.size_mb, share))
                    .ok_or_else(|| CoreError::UnknownResource {
                        wwn: fact.wwn.to_string(),
                    })
            })
            .collect::<Result<Vec<(&String, u64, DiskShare)>, CoreError>>()?;

        if self.inventory.device(device).is_none() {
            return Err(CoreError::DeviceNotFound {
                identifier: device.to_string(),
            });
        }

        let mut summary = ReconcileSummary::default();
        let mut reported = HashSet::with_capacity(resolved.len());

        for (volume, size_mb, share) in resolved {
            let (_, created) = self.inventory.get_or_create_mount(share.id, device);
            self.inventory.modify_mount(share.id, device, &mut |mount| {
                mount.size_mb = Some(size_mb);
                if mount.volume.as_deref().is_none_or(str::is_empty) {
                    mount.volume = Some(volume.clone());
                }
                mount.priority = priority;
            })?;
            reported.insert(share.id);
            if created {
                summary.created += 1;
            } else {
                summary.updated += 1;
            }
        }

        for stale in self.inventory.mounts_for_device(device) {
            if stale.is_virtual || reported.contains(&stale.share) {
                continue;
            }
            if self.inventory.delete_mount(stale.share, device) {
                warn!(
                    device = %device,
                    share = %stale.share,
                    volume = stale.volume.as_deref().unwrap_or(""),
                    "removed mount no longer reported"
                );
                summary.deleted += 1;
            }
        }

        debug!(device = %device, ?summary, "reconciled disk shares");
        Ok(summary)
    }
}

fn firmware_update(table: &FirmwareTable) -> DeviceUpdate {
    let field = |section: &str, key: &str| {
        table
            .get(section)
            .and_then(|fields| fields.get(key))
            .map(|v| v.trim())
            .filter(|v| !FIRMWARE_PLACEHOLDERS.contains(v))
            .map(str::to_owned)
    };

    DeviceUpdate {
        model_name: field("System Information", "Product Name"),
        serial_number: field("System Information", "Serial Number"),
        manufacturer: field("System Information", "Manufacturer"),
        bios_version: field("BIOS Information", "Version"),
        firmware: (!table.is_empty()).then(|| table.clone()),
        ..DeviceUpdate::default()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::DeviceType;
    use crate::store::MemoryInventory;
    use std::collections::BTreeMap;

    fn identity(mac: &str) -> DeviceIdentity {
        DeviceIdentity::new(vec![Ethernet::new("eth0", MacAddress::new(mac), 0)])
            .with_model("Linux", DeviceType::Unknown)
    }

    fn table(entries: &[(&str, &str, &str)]) -> FirmwareTable {
        let mut t = FirmwareTable::new();
        for (section, key, value) in entries {
            t.entry((*section).to_owned())
                .or_insert_with(BTreeMap::new)
                .insert((*key).to_owned(), (*value).to_owned());
        }
        t
    }

    #[test]
    fn upsert_sets_last_seen_and_reuses_device() {
        let reconciler = Reconciler::new(Arc::new(MemoryInventory::new()));
        let first = reconciler
            .upsert_device(&identity("52:54:00:00:00:01"), Priority(5))
            .unwrap();
        assert!(first.last_seen.is_some());
        assert_eq!(first.model_name.as_deref(), Some("Linux"));

        let second = reconciler
            .upsert_device(&identity("52:54:00:00:00:01"), Priority(5))
            .unwrap();
        assert_eq!(first.id, second.id);
        assert!(second.last_seen >= first.last_seen);
        assert_eq!(reconciler.inventory().devices().len(), 1);
    }

    #[test]
    fn firmware_placeholders_are_ignored() {
        let reconciler = Reconciler::new(Arc::new(MemoryInventory::new()));
        let dev = reconciler
            .upsert_device(&identity("52:54:00:00:00:01"), Priority(5))
            .unwrap();

        let smbios = table(&[
            ("System Information", "Manufacturer", "Dell Inc."),
            ("System Information", "Product Name", "PowerEdge R640"),
            ("System Information", "Serial Number", "Not Specified"),
            ("BIOS Information", "Version", "2.10.2"),
        ]);
        let dev = reconciler
            .apply_firmware(dev.id, &smbios, Priority(5))
            .unwrap();

        assert_eq!(dev.manufacturer.as_deref(), Some("Dell Inc."));
        assert_eq!(dev.model_name.as_deref(), Some("PowerEdge R640"));
        assert_eq!(dev.serial_number, None);
        assert_eq!(dev.bios_version.as_deref(), Some("2.10.2"));
        assert_eq!(dev.firmware, smbios);
    }

    #[test]
    fn firmware_does_not_override_manual_entry() {
        let reconciler = Reconciler::new(Arc::new(MemoryInventory::new()));
        let dev = reconciler
            .upsert_device(&identity("52:54:00:00:00:01"), Priority(5))
            .unwrap();
        reconciler
            .inventory()
            .modify_device(dev.id, &mut |d| {
                d.apply(
                    DeviceUpdate {
                        serial_number: Some("ASSET-7".into()),
                        ..DeviceUpdate::default()
                    },
                    Priority::MANUAL,
                );
            })
            .unwrap();

        let dev = reconciler
            .apply_firmware(
                dev.id,
                &table(&[("System Information", "Serial Number", "CZJ1234")]),
                Priority(5),
            )
            .unwrap();
        assert_eq!(dev.serial_number.as_deref(), Some("ASSET-7"));
    }

    #[test]
    fn apply_identity_adds_interfaces() {
        let reconciler = Reconciler::new(Arc::new(MemoryInventory::new()));
        let dev = reconciler
            .upsert_device(&identity("52:54:00:00:00:01"), Priority(5))
            .unwrap();
        let dev = reconciler
            .apply_identity(
                dev.id,
                &[Ethernet::new("eth1", MacAddress::new("52:54:00:00:00:02"), 1000)],
                Priority(5),
            )
            .unwrap();
        assert_eq!(dev.ethernets.len(), 2);
        assert!(
            reconciler
                .inventory()
                .device_by_mac(&MacAddress::new("52:54:00:00:00:02"))
                .is_some()
        );
    }
}
