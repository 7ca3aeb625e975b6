// ── Domain model ──
//
// Canonical inventory types shared by probes, the reconciler, and the
// inventory store.

pub mod common;
pub mod device;
pub mod disk_share;
pub mod entity_id;

pub use common::{FirmwareTable, Priority};
pub use device::{Device, DeviceField, DeviceType, DeviceUpdate, Ethernet};
pub use disk_share::{DiskShare, DiskShareMount};
pub use entity_id::{DeviceId, MacAddress, ShareId, Wwn};
