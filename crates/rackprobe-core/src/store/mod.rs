// ── Inventory persistence ──
//
// The reconciler only talks to the `Inventory` trait. Every method is a
// single atomic step; composite read-modify-write on a device goes through
// `modify_device` so concurrent discoveries never interleave inside one
// record.

mod memory;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::model::{Device, DeviceId, DiskShare, DiskShareMount, MacAddress, ShareId, Wwn};

pub use memory::MemoryInventory;

/// Persistence contract consumed by the reconciler.
pub trait Inventory: Send + Sync {
    // ── Devices ──────────────────────────────────────────────────────

    /// Find the device owning any of `macs`, or create one owning all of
    /// them. Two concurrent calls with overlapping MACs resolve to the same
    /// device. Returns the id and whether it was created.
    fn get_or_create_device(&self, macs: &[MacAddress]) -> Result<(DeviceId, bool), CoreError>;

    fn device(&self, id: DeviceId) -> Option<Device>;

    fn device_by_mac(&self, mac: &MacAddress) -> Option<Device>;

    fn devices(&self) -> Vec<Device>;

    /// Atomically apply `f` to a stored device and return the result.
    fn modify_device(
        &self,
        id: DeviceId,
        f: &mut dyn FnMut(&mut Device),
    ) -> Result<Device, CoreError>;

    // ── Disk shares ──────────────────────────────────────────────────

    /// Register a share, or return the existing one with the same WWN.
    fn register_share(&self, share: DiskShare) -> DiskShare;

    fn share(&self, id: ShareId) -> Option<DiskShare>;

    fn share_by_wwn(&self, wwn: &Wwn) -> Option<DiskShare>;

    fn shares(&self) -> Vec<DiskShare>;

    // ── Mounts ───────────────────────────────────────────────────────

    /// Atomic get-or-create of the `(share, device)` link.
    fn get_or_create_mount(&self, share: ShareId, device: DeviceId) -> (DiskShareMount, bool);

    /// Atomically apply `f` to a stored link and return the result.
    fn modify_mount(
        &self,
        share: ShareId,
        device: DeviceId,
        f: &mut dyn FnMut(&mut DiskShareMount),
    ) -> Result<DiskShareMount, CoreError>;

    /// Insert or replace a link. Both ends must exist.
    fn save_mount(&self, mount: DiskShareMount) -> Result<(), CoreError>;

    /// Returns `true` if a link was removed.
    fn delete_mount(&self, share: ShareId, device: DeviceId) -> bool;

    fn mounts_for_device(&self, device: DeviceId) -> Vec<DiskShareMount>;

    fn mounts(&self) -> Vec<DiskShareMount>;
}

/// Serializable copy of a whole inventory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySnapshot {
    #[serde(default)]
    pub devices: Vec<Device>,
    #[serde(default)]
    pub shares: Vec<DiskShare>,
    #[serde(default)]
    pub mounts: Vec<DiskShareMount>,
}
