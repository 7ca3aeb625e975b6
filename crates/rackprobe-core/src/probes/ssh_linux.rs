use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rackprobe_net::{Reachability, ShellConnector};
use tracing::debug;

use super::{OPEN_PORTS, SCANNED_PORTS, parse_open_ports};
use crate::error::ProbeError;
use crate::facts::{DeviceIdentity, FactExtractor};
use crate::merge::Reconciler;
use crate::model::{DeviceType, Priority};
use crate::probe::{Probe, ProbeOutcome, TargetContext};

const SSH_PORT: u16 = 22;
const SAVE_PRIORITY: Priority = Priority(5);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_PORT_TIMEOUT: Duration = Duration::from_secs(2);

/// Logs into a Linux host over SSH, then converges its interfaces, disk
/// share mounts and SMBIOS data onto the inventory.
///
/// Every remote command runs before the first inventory write, so a
/// connection dropped mid-way leaves the inventory untouched.
pub struct SshLinuxProbe {
    reachability: Arc<dyn Reachability>,
    connector: Arc<dyn ShellConnector>,
    extractor: Arc<dyn FactExtractor>,
    reconciler: Reconciler,
    port: u16,
    connect_timeout: Duration,
    port_timeout: Duration,
    priority: Priority,
}

impl SshLinuxProbe {
    pub fn new(
        reachability: Arc<dyn Reachability>,
        connector: Arc<dyn ShellConnector>,
        extractor: Arc<dyn FactExtractor>,
        reconciler: Reconciler,
    ) -> Self {
        Self {
            reachability,
            connector,
            extractor,
            reconciler,
            port: SSH_PORT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            port_timeout: DEFAULT_PORT_TIMEOUT,
            priority: SAVE_PRIORITY,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Reuse `port_scan`'s finding when it covered our port, otherwise
    /// check the port ourselves.
    async fn port_open(&self, ctx: &TargetContext) -> bool {
        let scanned = ctx
            .attribute(SCANNED_PORTS)
            .is_some_and(|s| parse_open_ports(s).contains(&self.port));
        if scanned {
            if let Some(open) = ctx.attribute(OPEN_PORTS) {
                return parse_open_ports(open).contains(&self.port);
            }
        }
        self.reachability
            .is_port_open(ctx.address(), self.port, self.port_timeout)
            .await
    }
}

#[async_trait]
impl Probe for SshLinuxProbe {
    async fn run(&self, ctx: &mut TargetContext) -> Result<ProbeOutcome, ProbeError> {
        let address = ctx.address();
        if !self.port_open(ctx).await {
            return Ok(ProbeOutcome::failure("closed."));
        }

        let shell = self.connector.connect(address, self.connect_timeout).await?;
        let ethernets = self.extractor.extract_identity(shell.as_ref()).await?;
        if !ethernets.iter().any(|e| e.mac.is_identifying()) {
            return Ok(ProbeOutcome::failure("no network identity reported."));
        }
        let shares = self.extractor.extract_facts(shell.as_ref()).await?;
        let firmware = self.extractor.extract_firmware(shell.as_ref()).await?;
        debug!(
            %address,
            interfaces = ethernets.len(),
            shares = shares.len(),
            firmware_sections = firmware.len(),
            "collected linux facts"
        );

        let identity = DeviceIdentity::new(ethernets).with_model("Linux", DeviceType::Unknown);
        let device = self.reconciler.upsert_device(&identity, self.priority)?;
        ctx.set_device(device.id);

        let summary = self
            .reconciler
            .reconcile_disk_shares(device.id, &shares, self.priority)?;
        self.reconciler
            .apply_firmware(device.id, &firmware, self.priority)?;

        Ok(ProbeOutcome::success(format!(
            "device {}: {} mounts, {} removed",
            device.id,
            summary.created + summary.updated,
            summary.deleted
        )))
    }
}
