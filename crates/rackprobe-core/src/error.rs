// ── Core error types ──
//
// Registry errors are configuration mistakes and surface at startup.
// CoreError covers everything that can go wrong while converging facts
// onto the inventory. Transport failures never appear here: they are
// `rackprobe_net::Error`, recorded as failed probe outcomes.

use std::path::PathBuf;

use thiserror::Error;

/// Probe registry misconfiguration. Fatal: the service must not start.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("probe '{name}' is registered more than once")]
    DuplicateProbe { name: String },

    #[error("chain '{chain}' has a requirement cycle between: {}", probes.join(", "))]
    Cycle { chain: String, probes: Vec<String> },

    #[error(
        "probe '{probe}' in chain '{chain}' requires '{dependency}', which is not registered for that chain"
    )]
    UnknownDependency {
        chain: String,
        probe: String,
        dependency: String,
    },

    #[error("no probes registered for chain '{chain}'")]
    UnknownChain { chain: String },
}

/// Error returned by a probe.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The target could not be reached over this probe's transport.
    /// Recorded as a failed outcome; the chain continues.
    #[error(transparent)]
    Transient(#[from] rackprobe_net::Error),

    /// Anything else. Aborts the target's run.
    #[error(transparent)]
    Fatal(#[from] CoreError),
}

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Configuration ────────────────────────────────────────────────
    #[error(transparent)]
    Registry(#[from] RegistryError),

    // ── Data errors ──────────────────────────────────────────────────
    /// A discovered fact references a shared resource the inventory has
    /// never registered. Never created implicitly.
    #[error("Unknown disk share: no share with WWN {wwn} is registered")]
    UnknownResource { wwn: String },

    #[error("Device not found: {identifier}")]
    DeviceNotFound { identifier: String },

    #[error("Device reported no usable network identity")]
    MissingIdentity,

    #[error("Persistence error: {message}")]
    Persistence { message: String },

    // ── Snapshot I/O ─────────────────────────────────────────────────
    #[error("Inventory file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Inventory snapshot is malformed: {0}")]
    Serialization(#[from] serde_json::Error),

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}
