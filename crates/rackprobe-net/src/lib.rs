// rackprobe-net: reachability checks and remote shell transport

pub mod error;
pub mod reachability;
pub mod shell;
pub mod transport;

pub use error::Error;
pub use reachability::{Reachability, SystemReachability};
pub use shell::{CommandOutput, RemoteShell, ShellConnector, SshConnector};
pub use transport::{Credential, SshOptions};
