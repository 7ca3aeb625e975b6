// ── Shared storage ──
//
// A DiskShare is a system-wide storage volume (one LUN on an array).
// Devices link to it through DiskShareMount, one per (share, device).

use serde::{Deserialize, Serialize};

use super::common::Priority;
use super::entity_id::{DeviceId, ShareId, Wwn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskShare {
    pub id: ShareId,
    pub wwn: Wwn,
    pub label: Option<String>,
    pub size_mb: Option<u64>,
}

impl DiskShare {
    pub fn new(wwn: Wwn) -> Self {
        Self {
            id: ShareId::new(),
            wwn,
            label: None,
            size_mb: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_size_mb(mut self, size_mb: u64) -> Self {
        self.size_mb = Some(size_mb);
        self
    }
}

/// Link between a device and a share it mounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskShareMount {
    pub share: ShareId,
    pub device: DeviceId,
    pub size_mb: Option<u64>,
    /// Logical volume the device knows the share as.
    pub volume: Option<String>,
    /// Virtual mounts (e.g. passed through to guests) are maintained by
    /// other sources and never pruned by discovery.
    #[serde(default)]
    pub is_virtual: bool,
    /// Priority of the last discovery that wrote this link.
    #[serde(default)]
    pub priority: Priority,
}

impl DiskShareMount {
    pub fn new(share: ShareId, device: DeviceId) -> Self {
        Self {
            share,
            device,
            size_mb: None,
            volume: None,
            is_virtual: false,
            priority: Priority::default(),
        }
    }

    pub fn key(&self) -> (ShareId, DeviceId) {
        (self.share, self.device)
    }
}
