use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rackprobe_net::Reachability;

use super::RTT_MS;
use crate::error::ProbeError;
use crate::probe::{Probe, ProbeOutcome, TargetContext};

/// ICMP echo. Everything else in the stock chain requires it.
pub struct PingProbe {
    reachability: Arc<dyn Reachability>,
    timeout: Duration,
}

impl PingProbe {
    pub fn new(reachability: Arc<dyn Reachability>, timeout: Duration) -> Self {
        Self {
            reachability,
            timeout,
        }
    }
}

#[async_trait]
impl Probe for PingProbe {
    async fn run(&self, ctx: &mut TargetContext) -> Result<ProbeOutcome, ProbeError> {
        match self.reachability.ping(ctx.address(), self.timeout).await {
            Some(rtt) => {
                let ms = rtt.as_secs_f64() * 1000.0;
                ctx.set_attribute(RTT_MS, format!("{ms:.3}"));
                Ok(ProbeOutcome::success(format!("{ms:.1} ms")))
            }
            None => Ok(ProbeOutcome::failure("no response.")),
        }
    }
}
