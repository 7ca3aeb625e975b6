//! CLI error types with miette diagnostics.
//!
//! Maps core and config errors into user-facing errors with actionable
//! help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use rackprobe_config::ConfigError;
use rackprobe_core::{CoreError, RegistryError};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Probe registry ───────────────────────────────────────────────
    #[error("no probes are registered for chain '{chain}'")]
    #[diagnostic(
        code(rackprobe::unknown_chain),
        help(
            "Available chains: {available}\n\
             Run: rackprobe plan --chain <CHAIN>"
        )
    )]
    UnknownChain { chain: String, available: String },

    #[error(transparent)]
    #[diagnostic(
        code(rackprobe::registry),
        help("Check probes.disabled in your config: a disabled probe may still be required by another.")
    )]
    Registry(RegistryError),

    // ── Inventory ────────────────────────────────────────────────────
    #[error("Unknown disk share: no share with WWN {wwn} is registered")]
    #[diagnostic(
        code(rackprobe::unknown_share),
        help(
            "Discovery never creates disk shares. Register it first:\n\
             rackprobe inventory add-share --wwn {wwn} --label <LABEL>"
        )
    )]
    UnknownShare { wwn: String },

    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(rackprobe::not_found),
        help("Run: rackprobe inventory {list_command} to see what is stored")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error(transparent)]
    #[diagnostic(code(rackprobe::inventory))]
    Inventory(CoreError),

    // ── Discovery ────────────────────────────────────────────────────
    #[error("{failed} of {total} targets could not be reached")]
    #[diagnostic(
        code(rackprobe::unreachable),
        help("Re-run with -v to see each probe's outcome as it happens.")
    )]
    Unreachable { failed: usize, total: usize },

    #[error("discovery aborted for {failed} of {total} targets")]
    #[diagnostic(code(rackprobe::targets_failed))]
    TargetsFailed { failed: usize, total: usize },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(rackprobe::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(
        code(rackprobe::config),
        help(
            "Check the config file and RACKPROBE_* environment variables.\n\
             Run: rackprobe config show"
        )
    )]
    Config(ConfigError),

    #[error("Config file already exists at {path}")]
    #[diagnostic(
        code(rackprobe::config_exists),
        help("Use --force to overwrite it.")
    )]
    ConfigExists { path: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render output: {0}")]
    #[diagnostic(code(rackprobe::json))]
    Json(#[from] serde_json::Error),

    #[error("Failed to render output: {0}")]
    #[diagnostic(code(rackprobe::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Unreachable { .. } => exit_code::CONNECTION,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::UnknownChain { .. }
            | Self::Registry(_)
            | Self::Validation { .. }
            | Self::Config(_)
            | Self::ConfigExists { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Registry(e) => e.into(),
            CoreError::UnknownResource { wwn } => Self::UnknownShare { wwn },
            CoreError::DeviceNotFound { identifier } => Self::NotFound {
                resource_type: "device".into(),
                identifier,
                list_command: "devices".into(),
            },
            other => Self::Inventory(other),
        }
    }
}

impl From<RegistryError> for CliError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::UnknownChain { chain } => Self::UnknownChain {
                chain,
                available: "(none)".into(),
            },
            other => Self::Registry(other),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::Io(e) => Self::Io(e),
            other => Self::Config(other),
        }
    }
}
