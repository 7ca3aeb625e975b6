//! Shared configuration for the rackprobe CLI.
//!
//! TOML file plus `RACKPROBE_` environment overrides, layered over
//! built-in defaults with figment, and translation to the transport's
//! `rackprobe_net::SshOptions`. The CLI adds flag-aware wrappers on top.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use rackprobe_net::SshOptions;
use secrecy::SecretString;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub discovery: DiscoverySettings,

    #[serde(default)]
    pub ping: PingSettings,

    #[serde(default)]
    pub port_scan: PortScanSettings,

    #[serde(default)]
    pub ssh: SshSettings,

    #[serde(default)]
    pub probes: ProbeSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DiscoverySettings {
    /// Chain run by `discover` when none is given.
    #[serde(default = "default_chain")]
    pub chain: String,

    /// Targets scanned at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Per-target budget in seconds, 0 for none.
    #[serde(default)]
    pub target_timeout_secs: u64,

    /// Inventory snapshot file. Defaults to the platform data directory.
    pub inventory_path: Option<PathBuf>,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            chain: default_chain(),
            concurrency: default_concurrency(),
            target_timeout_secs: 0,
            inventory_path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PingSettings {
    #[serde(default = "default_ping_timeout")]
    pub timeout_secs: u64,
}

impl Default for PingSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_ping_timeout(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PortScanSettings {
    #[serde(default = "default_ports")]
    pub ports: Vec<u16>,

    #[serde(default = "default_port_timeout")]
    pub timeout_secs: u64,
}

impl Default for PortScanSettings {
    fn default() -> Self {
        Self {
            ports: default_ports(),
            timeout_secs: default_port_timeout(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SshSettings {
    #[serde(default = "default_ssh_user")]
    pub user: String,

    #[serde(default = "default_ssh_port")]
    pub port: u16,

    /// Private key file. Without one, the agent and default keys are used.
    pub identity_file: Option<PathBuf>,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Upper bound for one remote command.
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,

    /// Write priority of facts discovered over SSH.
    #[serde(default = "default_ssh_priority")]
    pub priority: i32,

    /// Password, tried after the key. Prefer `RACKPROBE_SSH__PASSWORD`
    /// over writing it to the file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// OpenSSH `known_hosts` file to verify and learn host keys in.
    /// Unset, any host key is accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub known_hosts: Option<PathBuf>,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            user: default_ssh_user(),
            port: default_ssh_port(),
            identity_file: None,
            connect_timeout_secs: default_connect_timeout(),
            command_timeout_secs: default_command_timeout(),
            priority: default_ssh_priority(),
            password: None,
            known_hosts: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProbeSettings {
    /// Built-in probes left out of the registry.
    #[serde(default)]
    pub disabled: Vec<String>,
}

fn default_chain() -> String {
    "discovery".into()
}
fn default_concurrency() -> usize {
    16
}
fn default_ping_timeout() -> u64 {
    2
}
fn default_ports() -> Vec<u16> {
    vec![22, 80, 161, 443]
}
fn default_port_timeout() -> u64 {
    2
}
fn default_ssh_user() -> String {
    "root".into()
}
fn default_ssh_port() -> u16 {
    22
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_command_timeout() -> u64 {
    60
}
fn default_ssh_priority() -> i32 {
    5
}

// ── Validation / translation ────────────────────────────────────────

impl Config {
    /// Reject values that would make discovery hang or do nothing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.discovery.chain.trim().is_empty() {
            return Err(invalid("discovery.chain", "must not be empty"));
        }
        if self.discovery.concurrency == 0 {
            return Err(invalid("discovery.concurrency", "must be at least 1"));
        }
        if self.ping.timeout_secs == 0 {
            return Err(invalid("ping.timeout_secs", "must be at least 1"));
        }
        if self.port_scan.timeout_secs == 0 {
            return Err(invalid("port_scan.timeout_secs", "must be at least 1"));
        }
        if self.ssh.user.trim().is_empty() {
            return Err(invalid("ssh.user", "must not be empty"));
        }
        if self.ssh.port == 0 {
            return Err(invalid("ssh.port", "must not be 0"));
        }
        if self.ssh.connect_timeout_secs == 0 {
            return Err(invalid("ssh.connect_timeout_secs", "must be at least 1"));
        }
        Ok(())
    }

    pub fn target_timeout(&self) -> Option<Duration> {
        (self.discovery.target_timeout_secs > 0)
            .then(|| Duration::from_secs(self.discovery.target_timeout_secs))
    }

    pub fn is_probe_enabled(&self, name: &str) -> bool {
        !self.probes.disabled.iter().any(|d| d == name)
    }
}

impl SshSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Translate to transport options.
    pub fn to_ssh_options(&self) -> SshOptions {
        SshOptions {
            user: self.user.clone(),
            port: self.port,
            identity_file: self.identity_file.clone(),
            password: self.password.clone().map(SecretString::from),
            known_hosts: self.known_hosts.clone(),
            connect_timeout: self.connect_timeout(),
            command_timeout: Duration::from_secs(self.command_timeout_secs),
        }
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "rackprobe", "rackprobe")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || home_fallback(".config").join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Default inventory snapshot location.
pub fn default_inventory_path() -> PathBuf {
    project_dirs().map_or_else(
        || home_fallback(".local/share").join("inventory.json"),
        |dirs| dirs.data_dir().join("inventory.json"),
    )
}

fn home_fallback(base: &str) -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(base);
    p.push("rackprobe");
    p
}

impl DiscoverySettings {
    pub fn inventory_path(&self) -> PathBuf {
        self.inventory_path
            .clone()
            .unwrap_or_else(default_inventory_path)
    }
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` (if it exists) + environment, then validate.
///
/// Environment variables use the `RACKPROBE_` prefix and `__` between
/// levels, e.g. `RACKPROBE_SSH__USER=admin`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("RACKPROBE_").split("__"));

    let config: Config = figment.extract()?;
    config.validate()?;
    Ok(config)
}

/// Load config, returning a default if it can't be read.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    #[test]
    fn defaults_round_trip_through_toml() {
        let cfg = Config::default();
        let text = toml::to_string_pretty(&cfg).unwrap();
        let back: Config = toml::from_str(&text).unwrap();
        assert_eq!(back, cfg);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[ssh]\nuser = \"admin\"\npriority = 20\n\n[probes]\ndisabled = [\"port_scan\"]\n",
        )
        .unwrap();

        let cfg = load_config_from(&path).unwrap();
        assert_eq!(cfg.ssh.user, "admin");
        assert_eq!(cfg.ssh.priority, 20);
        assert_eq!(cfg.ssh.port, 22);
        assert_eq!(cfg.discovery.chain, "discovery");
        assert!(!cfg.is_probe_enabled("port_scan"));
        assert!(cfg.is_probe_enabled("ssh_linux"));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.port_scan.ports, [22, 80, 161, 443]);
        assert_eq!(cfg.target_timeout(), None);
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[discovery]\nconcurrency = 0\n").unwrap();

        let err = load_config_from(&path).unwrap_err();
        assert!(
            matches!(err, ConfigError::Validation { ref field, .. } if field == "discovery.concurrency")
        );
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = Config::default();
        cfg.discovery.target_timeout_secs = 30;
        cfg.ssh.identity_file = Some(PathBuf::from("/etc/rackprobe/id_ed25519"));

        save_config_to(&cfg, &path).unwrap();
        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded, cfg);
        assert_eq!(loaded.target_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn ssh_settings_translate_to_transport_options() {
        let settings = SshSettings {
            user: "deploy".into(),
            port: 2222,
            password: Some("hunter2".into()),
            known_hosts: Some(PathBuf::from("/var/lib/rackprobe/known_hosts")),
            ..SshSettings::default()
        };
        let opts = settings.to_ssh_options();
        assert_eq!(opts.user, "deploy");
        assert_eq!(opts.port, 2222);
        assert_eq!(opts.connect_timeout, Duration::from_secs(10));
        assert_eq!(opts.password.unwrap().expose_secret(), "hunter2");
        assert!(opts.known_hosts.is_some());
    }
}
