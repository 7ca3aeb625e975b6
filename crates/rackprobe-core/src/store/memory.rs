// ── In-memory inventory ──
//
// DashMap-backed implementation of `Inventory`. Per-record updates run
// under the owning shard's lock; MAC identity resolution additionally
// takes `identity_lock`, because a device is keyed by a *set* of MACs and
// no single shard lock covers the whole set.

use std::path::Path;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use tracing::debug;

use super::{Inventory, InventorySnapshot};
use crate::error::CoreError;
use crate::model::{Device, DeviceId, DiskShare, DiskShareMount, MacAddress, ShareId, Wwn};

/// Thread-safe in-memory inventory, optionally persisted as a JSON snapshot.
#[derive(Default)]
pub struct MemoryInventory {
    devices: DashMap<DeviceId, Device>,
    /// Secondary index: MAC -> owning device.
    by_mac: DashMap<MacAddress, DeviceId>,
    identity_lock: Mutex<()>,

    shares: DashMap<ShareId, DiskShare>,
    /// Secondary index: WWN -> share.
    share_index: DashMap<Wwn, ShareId>,

    mounts: DashMap<(ShareId, DeviceId), DiskShareMount>,
}

impl MemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild an inventory (and its indexes) from a snapshot.
    pub fn from_snapshot(snapshot: InventorySnapshot) -> Self {
        let inv = Self::new();
        for device in snapshot.devices {
            for mac in device.macs() {
                inv.by_mac.insert(mac.clone(), device.id);
            }
            inv.devices.insert(device.id, device);
        }
        for share in snapshot.shares {
            inv.share_index.insert(share.wwn.clone(), share.id);
            inv.shares.insert(share.id, share);
        }
        for mount in snapshot.mounts {
            inv.mounts.insert(mount.key(), mount);
        }
        inv
    }

    pub fn snapshot(&self) -> InventorySnapshot {
        InventorySnapshot {
            devices: self.devices(),
            shares: self.shares(),
            mounts: self.mounts(),
        }
    }

    /// Load a snapshot file. A missing file yields an empty inventory.
    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let raw = match std::fs::read(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no inventory file yet, starting empty");
                return Ok(Self::new());
            }
            Err(source) => {
                return Err(CoreError::Io {
                    path: path.to_owned(),
                    source,
                });
            }
        };
        let snapshot: InventorySnapshot = serde_json::from_slice(&raw)?;
        Ok(Self::from_snapshot(snapshot))
    }

    /// Write a snapshot file via a temporary sibling and rename.
    pub fn save(&self, path: &Path) -> Result<(), CoreError> {
        let io_err = |source| CoreError::Io {
            path: path.to_owned(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let body = serde_json::to_vec_pretty(&self.snapshot())?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, body).map_err(io_err)?;
        std::fs::rename(&tmp, path).map_err(io_err)?;
        Ok(())
    }

    fn index_macs(&self, id: DeviceId, macs: impl IntoIterator<Item = MacAddress>) {
        for mac in macs {
            self.by_mac.entry(mac).or_insert(id);
        }
    }
}

impl Inventory for MemoryInventory {
    fn get_or_create_device(&self, macs: &[MacAddress]) -> Result<(DeviceId, bool), CoreError> {
        let mut macs: Vec<MacAddress> = macs
            .iter()
            .filter(|m| m.is_identifying())
            .cloned()
            .collect();
        if macs.is_empty() {
            return Err(CoreError::MissingIdentity);
        }
        macs.sort();
        macs.dedup();

        let _guard = self.identity_lock.lock();

        let existing = macs
            .iter()
            .find_map(|mac| self.by_mac.get(mac).map(|id| *id));

        if let Some(id) = existing {
            self.index_macs(id, macs);
            return Ok((id, false));
        }

        let id = DeviceId::new();
        self.devices.insert(id, Device::new(id));
        self.index_macs(id, macs);
        debug!(device = %id, "created device");
        Ok((id, true))
    }

    fn device(&self, id: DeviceId) -> Option<Device> {
        self.devices.get(&id).map(|d| d.clone())
    }

    fn device_by_mac(&self, mac: &MacAddress) -> Option<Device> {
        let id = self.by_mac.get(mac).map(|id| *id)?;
        self.device(id)
    }

    fn devices(&self) -> Vec<Device> {
        let mut all: Vec<Device> = self.devices.iter().map(|r| r.value().clone()).collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        all
    }

    fn modify_device(
        &self,
        id: DeviceId,
        f: &mut dyn FnMut(&mut Device),
    ) -> Result<Device, CoreError> {
        // `f` may add MACs; they must be indexed before any identity
        // lookup can observe the record.
        let _guard = self.identity_lock.lock();
        let updated = {
            let mut entry = self
                .devices
                .get_mut(&id)
                .ok_or_else(|| CoreError::DeviceNotFound {
                    identifier: id.to_string(),
                })?;
            f(entry.value_mut());
            entry.value().clone()
        };
        self.index_macs(id, updated.macs().cloned());
        Ok(updated)
    }

    fn register_share(&self, share: DiskShare) -> DiskShare {
        match self.share_index.entry(share.wwn.clone()) {
            Entry::Occupied(e) => {
                let id = *e.get();
                if let Some(existing) = self.shares.get(&id) {
                    return existing.clone();
                }
                self.shares.insert(id, DiskShare { id, ..share.clone() });
                DiskShare { id, ..share }
            }
            Entry::Vacant(e) => {
                e.insert(share.id);
                self.shares.insert(share.id, share.clone());
                share
            }
        }
    }

    fn share(&self, id: ShareId) -> Option<DiskShare> {
        self.shares.get(&id).map(|s| s.clone())
    }

    fn share_by_wwn(&self, wwn: &Wwn) -> Option<DiskShare> {
        let id = self.share_index.get(wwn).map(|id| *id)?;
        self.share(id)
    }

    fn shares(&self) -> Vec<DiskShare> {
        let mut all: Vec<DiskShare> = self.shares.iter().map(|r| r.value().clone()).collect();
        all.sort_by(|a, b| a.wwn.cmp(&b.wwn));
        all
    }

    fn get_or_create_mount(&self, share: ShareId, device: DeviceId) -> (DiskShareMount, bool) {
        match self.mounts.entry((share, device)) {
            Entry::Occupied(e) => (e.get().clone(), false),
            Entry::Vacant(e) => {
                let mount = DiskShareMount::new(share, device);
                e.insert(mount.clone());
                (mount, true)
            }
        }
    }

    fn modify_mount(
        &self,
        share: ShareId,
        device: DeviceId,
        f: &mut dyn FnMut(&mut DiskShareMount),
    ) -> Result<DiskShareMount, CoreError> {
        let mut entry =
            self.mounts
                .get_mut(&(share, device))
                .ok_or_else(|| CoreError::Persistence {
                    message: format!("no mount of share {share} on device {device}"),
                })?;
        f(entry.value_mut());
        Ok(entry.value().clone())
    }

    fn save_mount(&self, mount: DiskShareMount) -> Result<(), CoreError> {
        if !self.shares.contains_key(&mount.share) {
            return Err(CoreError::Persistence {
                message: format!("mount references missing share {}", mount.share),
            });
        }
        if !self.devices.contains_key(&mount.device) {
            return Err(CoreError::DeviceNotFound {
                identifier: mount.device.to_string(),
            });
        }
        self.mounts.insert(mount.key(), mount);
        Ok(())
    }

    fn delete_mount(&self, share: ShareId, device: DeviceId) -> bool {
        self.mounts.remove(&(share, device)).is_some()
    }

    fn mounts_for_device(&self, device: DeviceId) -> Vec<DiskShareMount> {
        let mut found: Vec<DiskShareMount> = self
            .mounts
            .iter()
            .filter(|r| r.value().device == device)
            .map(|r| r.value().clone())
            .collect();
        found.sort_by(|a, b| a.volume.cmp(&b.volume).then(a.share.cmp(&b.share)));
        found
    }

    fn mounts(&self) -> Vec<DiskShareMount> {
        let mut all: Vec<DiskShareMount> = self.mounts.iter().map(|r| r.value().clone()).collect();
        all.sort_by(|a, b| a.key().cmp(&b.key()));
        all
    }
}
