//! Clap derive structures for the `rackprobe` CLI.
//!
//! Defines the command tree, global flags, and shared value enums. Kept
//! free of crate-internal imports so `build.rs` can compile it for man
//! page generation.

use std::net::IpAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// rackprobe -- discover data-center hosts into a device inventory
#[derive(Debug, Parser)]
#[command(
    name = "rackprobe",
    version,
    about = "Discover data-center hosts and converge them into an inventory",
    long_about = "Runs a chain of discovery probes (ping, port scan, SSH fact collection)\n\
        against target addresses and merges what they find into a device inventory.\n\n\
        Devices are matched by MAC address, disk shares by WWN. Re-running discovery\n\
        against the same hosts converges to the same records.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "RACKPROBE_CONFIG", global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Inventory snapshot file (overrides discovery.inventory_path)
    #[arg(long, global = true, value_name = "FILE")]
    pub inventory: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "RACKPROBE_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Also write logs to this file
    #[arg(long, global = true, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a discovery chain against one or more addresses
    #[command(alias = "scan")]
    Discover(DiscoverArgs),

    /// Show the order a chain's probes would run in
    Plan(PlanArgs),

    /// Inspect and seed the device inventory
    #[command(alias = "inv")]
    Inventory(InventoryArgs),

    /// Manage the configuration file
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  DISCOVER
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct DiscoverArgs {
    /// Target addresses
    #[arg(required = true, value_name = "ADDR")]
    pub targets: Vec<IpAddr>,

    /// Chain to run (defaults to discovery.chain)
    #[arg(long)]
    pub chain: Option<String>,

    /// Targets scanned at once
    #[arg(long, short = 'j')]
    pub concurrency: Option<usize>,

    /// Per-target budget in seconds, checked between probes
    #[arg(long, value_name = "SECS")]
    pub target_timeout: Option<u64>,

    /// Run the chain but leave the inventory file untouched
    #[arg(long)]
    pub no_save: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  PLAN
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct PlanArgs {
    /// Chain to resolve (defaults to discovery.chain)
    #[arg(long)]
    pub chain: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  INVENTORY
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct InventoryArgs {
    #[command(subcommand)]
    pub command: InventoryCommand,
}

#[derive(Debug, Subcommand)]
pub enum InventoryCommand {
    /// List stored devices
    #[command(alias = "ls")]
    Devices,

    /// Show one device by id or any of its MAC addresses
    Device {
        /// Device UUID or MAC address
        id_or_mac: String,
    },

    /// List registered disk shares
    Shares,

    /// List device-to-share mounts
    Mounts {
        /// Only mounts of this device (UUID or MAC)
        #[arg(long)]
        device: Option<String>,
    },

    /// Register a disk share so discovery can link devices to it
    AddShare {
        /// World Wide Name of the LUN
        #[arg(long)]
        wwn: String,

        /// Human-readable label
        #[arg(long)]
        label: Option<String>,

        /// Size in MiB
        #[arg(long, value_name = "MB")]
        size: Option<u64>,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current resolved configuration
    Show,

    /// Write a config file populated with the defaults
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the config file location
    Path,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
