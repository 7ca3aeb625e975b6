//! Command dispatch.

pub mod config_cmd;
pub mod discover;
pub mod inventory;
pub mod plan;

use std::path::PathBuf;
use std::sync::Arc;

use rackprobe_config::Config;
use rackprobe_core::MemoryInventory;

use crate::cli::{Command, GlobalOpts};
use crate::config;
use crate::error::CliError;

pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Discover(args) => discover::handle(args, global).await,
        Command::Plan(args) => plan::handle(&args, global),
        Command::Inventory(args) => inventory::handle(args, global),
        Command::Config(args) => config_cmd::handle(&args, global),
        Command::Completions(_) => Ok(()),
    }
}

/// An inventory loaded from the snapshot file this invocation uses.
pub(crate) struct OpenInventory {
    pub store: Arc<MemoryInventory>,
    pub path: PathBuf,
}

impl OpenInventory {
    pub fn open(global: &GlobalOpts, cfg: &Config) -> Result<Self, CliError> {
        let path = config::inventory_path(global, cfg);
        let store = Arc::new(MemoryInventory::load(&path)?);
        Ok(Self { store, path })
    }

    pub fn save(&self) -> Result<(), CliError> {
        self.store.save(&self.path)?;
        tracing::info!(path = %self.path.display(), "inventory saved");
        Ok(())
    }
}
