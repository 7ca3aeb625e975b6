// ── Built-in probes ──
//
// The stock `discovery` chain:
//
//   ping ─┬─ port_scan
//         └─ ssh_linux

mod ping;
mod port_scan;
mod ssh_linux;

pub use ping::PingProbe;
pub use port_scan::PortScanProbe;
pub use ssh_linux::SshLinuxProbe;

use crate::probe::Registration;

/// Chain the built-in probes register into.
pub const DISCOVERY_CHAIN: &str = "discovery";

pub const PING: &str = "ping";
pub const PORT_SCAN: &str = "port_scan";
pub const SSH_LINUX: &str = "ssh_linux";

/// Context attribute holding the comma-separated open TCP ports.
pub const OPEN_PORTS: &str = "open_ports";
/// Context attribute holding the comma-separated ports `port_scan` tried.
pub const SCANNED_PORTS: &str = "scanned_ports";
/// Context attribute holding the ping round trip in milliseconds.
pub const RTT_MS: &str = "rtt_ms";

/// The stock probe set, ready to register.
pub struct BuiltinProbes {
    pub ping: PingProbe,
    pub port_scan: PortScanProbe,
    pub ssh_linux: SshLinuxProbe,
}

impl BuiltinProbes {
    pub fn into_registrations(self) -> Vec<Registration> {
        vec![
            Registration::new(PING, self.ping).chain(DISCOVERY_CHAIN),
            Registration::new(PORT_SCAN, self.port_scan)
                .chain(DISCOVERY_CHAIN)
                .requires([PING]),
            Registration::new(SSH_LINUX, self.ssh_linux)
                .chain(DISCOVERY_CHAIN)
                .requires([PING]),
        ]
    }
}

/// Parse the `open_ports` attribute written by `port_scan`.
pub fn parse_open_ports(raw: &str) -> Vec<u16> {
    raw.split(',')
        .filter_map(|p| p.trim().parse().ok())
        .collect()
}
