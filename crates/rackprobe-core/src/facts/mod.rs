// ── Fact extraction ──
//
// Extractors turn a live remote shell into structured hardware facts.
// They do no inventory writes; the reconciler applies what they return.

pub mod linux;

use std::collections::BTreeMap;

use async_trait::async_trait;
use rackprobe_net::{Error, RemoteShell};
use serde::{Deserialize, Serialize};

use crate::model::{DeviceType, Ethernet, FirmwareTable, Wwn};

pub use linux::LinuxFactExtractor;

/// One logical volume backed by a shared disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskShareFact {
    pub wwn: Wwn,
    pub size_mb: u64,
}

impl DiskShareFact {
    pub fn new(wwn: impl AsRef<str>, size_mb: u64) -> Self {
        Self {
            wwn: Wwn::new(wwn),
            size_mb,
        }
    }
}

/// Logical volume name -> the share behind it.
pub type DiskShareFacts = BTreeMap<String, DiskShareFact>;

/// Network identity plus what the discovering probe knows about the
/// device's kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub ethernets: Vec<Ethernet>,
    pub model_name: Option<String>,
    pub device_type: Option<DeviceType>,
}

impl DeviceIdentity {
    pub fn new(ethernets: Vec<Ethernet>) -> Self {
        Self {
            ethernets,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_model(mut self, model_name: impl Into<String>, device_type: DeviceType) -> Self {
        self.model_name = Some(model_name.into());
        self.device_type = Some(device_type);
        self
    }
}

/// Source of hardware facts over a remote shell. Every error is a
/// transport error and is treated as transient by the scheduler.
#[async_trait]
pub trait FactExtractor: Send + Sync {
    async fn extract_facts(&self, shell: &dyn RemoteShell) -> Result<DiskShareFacts, Error>;

    async fn extract_identity(&self, shell: &dyn RemoteShell) -> Result<Vec<Ethernet>, Error>;

    async fn extract_firmware(&self, shell: &dyn RemoteShell) -> Result<FirmwareTable, Error>;
}
