use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rackprobe_net::Reachability;

use super::{OPEN_PORTS, SCANNED_PORTS};
use crate::error::ProbeError;
use crate::probe::{Probe, ProbeOutcome, TargetContext};

/// TCP connect scan of a fixed port list. Always succeeds; the finding is
/// the `open_ports` attribute later probes gate on.
pub struct PortScanProbe {
    reachability: Arc<dyn Reachability>,
    ports: Vec<u16>,
    timeout: Duration,
}

impl PortScanProbe {
    pub fn new(reachability: Arc<dyn Reachability>, ports: Vec<u16>, timeout: Duration) -> Self {
        Self {
            reachability,
            ports,
            timeout,
        }
    }
}

#[async_trait]
impl Probe for PortScanProbe {
    async fn run(&self, ctx: &mut TargetContext) -> Result<ProbeOutcome, ProbeError> {
        let mut open = Vec::new();
        for &port in &self.ports {
            if self
                .reachability
                .is_port_open(ctx.address(), port, self.timeout)
                .await
            {
                open.push(port);
            }
        }

        let listed = join_ports(&open);
        ctx.set_attribute(SCANNED_PORTS, join_ports(&self.ports));
        ctx.set_attribute(OPEN_PORTS, listed.clone());
        if open.is_empty() {
            Ok(ProbeOutcome::success("no open ports."))
        } else {
            Ok(ProbeOutcome::success(format!("open: {listed}")))
        }
    }
}

fn join_ports(ports: &[u16]) -> String {
    ports
        .iter()
        .map(u16::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
