//! Builds the probe registry from configuration.
//!
//! The registry is assembled once per invocation and frozen; the scheduler
//! only ever sees the immutable `ProbeRegistry`.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use rackprobe_config::Config;
use rackprobe_core::probes::{BuiltinProbes, PingProbe, PortScanProbe, SshLinuxProbe};
use rackprobe_core::{Inventory, LinuxFactExtractor, Priority, ProbeRegistry, Reconciler};
use rackprobe_net::{Reachability, ShellConnector, SshConnector, SystemReachability};

use crate::error::CliError;

/// Register every built-in probe not listed in `probes.disabled`.
pub fn build_registry(
    cfg: &Config,
    inventory: Arc<dyn Inventory>,
) -> Result<ProbeRegistry, CliError> {
    let reachability: Arc<dyn Reachability> = Arc::new(SystemReachability);
    let connector: Arc<dyn ShellConnector> =
        Arc::new(SshConnector::new(cfg.ssh.to_ssh_options()));

    let builtin = BuiltinProbes {
        ping: PingProbe::new(
            Arc::clone(&reachability),
            Duration::from_secs(cfg.ping.timeout_secs),
        ),
        port_scan: PortScanProbe::new(
            Arc::clone(&reachability),
            cfg.port_scan.ports.clone(),
            Duration::from_secs(cfg.port_scan.timeout_secs),
        ),
        ssh_linux: SshLinuxProbe::new(
            reachability,
            connector,
            Arc::new(LinuxFactExtractor::new()),
            Reconciler::new(inventory),
        )
        .with_port(cfg.ssh.port)
        .with_connect_timeout(cfg.ssh.connect_timeout())
        .with_priority(Priority(cfg.ssh.priority)),
    };

    let mut builder = ProbeRegistry::builder();
    for registration in builtin.into_registrations() {
        if cfg.is_probe_enabled(registration.name()) {
            builder.register(registration)?;
        } else {
            debug!(probe = registration.name(), "probe disabled by config");
        }
    }
    Ok(builder.build()?)
}

/// Resolve `chain`, naming the chains that do exist when it is unknown.
pub fn resolve_chain<'r>(
    registry: &'r ProbeRegistry,
    chain: &str,
) -> Result<Vec<&'r rackprobe_core::Registration>, CliError> {
    registry.resolve_order(chain).map_err(|_| {
        let available: Vec<&str> = registry.chains().collect();
        CliError::UnknownChain {
            chain: chain.to_owned(),
            available: if available.is_empty() {
                "(none)".into()
            } else {
                available.join(", ")
            },
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rackprobe_core::MemoryInventory;
    use rackprobe_core::probes::{DISCOVERY_CHAIN, PING, PORT_SCAN, SSH_LINUX};

    fn names(registry: &ProbeRegistry) -> Vec<String> {
        resolve_chain(registry, DISCOVERY_CHAIN)
            .unwrap()
            .iter()
            .map(|r| r.name().to_owned())
            .collect()
    }

    #[test]
    fn default_config_registers_the_stock_chain() {
        let registry = build_registry(&Config::default(), Arc::new(MemoryInventory::new())).unwrap();
        assert_eq!(names(&registry), [PING, PORT_SCAN, SSH_LINUX]);
    }

    #[test]
    fn disabled_probe_is_left_out() {
        let mut cfg = Config::default();
        cfg.probes.disabled = vec![PORT_SCAN.into()];
        let registry = build_registry(&cfg, Arc::new(MemoryInventory::new())).unwrap();
        assert_eq!(names(&registry), [PING, SSH_LINUX]);
    }

    #[test]
    fn disabling_a_requirement_is_rejected() {
        let mut cfg = Config::default();
        cfg.probes.disabled = vec![PING.into()];
        let err = build_registry(&cfg, Arc::new(MemoryInventory::new())).unwrap_err();
        assert!(matches!(err, CliError::Registry(_)));
    }

    #[test]
    fn unknown_chain_lists_available_ones() {
        let registry = build_registry(&Config::default(), Arc::new(MemoryInventory::new())).unwrap();
        let err = resolve_chain(&registry, "postprocess").unwrap_err();
        assert!(
            matches!(err, CliError::UnknownChain { ref available, .. } if available == DISCOVERY_CHAIN)
        );
    }
}
