//! Discovery chain orchestration and inventory reconciliation.
//!
//! This crate owns the domain model and the logic that turns probe results
//! into inventory records:
//!
//! - **[`ProbeRegistry`]**: immutable set of named [`Probe`]s, each
//!   registered into one or more chains with the probes it requires.
//!   [`RegistryBuilder::build`] resolves every chain up front (Kahn's
//!   algorithm, ties in registration order) and rejects cycles and dangling
//!   requirements.
//!
//! - **[`Scheduler`]**: runs a chain against a target in resolved order,
//!   threading a [`TargetContext`] through the probes. Transport failures
//!   become failed outcomes and the chain continues; probes whose
//!   requirements failed are skipped with a reason. [`Scheduler::run_many`]
//!   fans out across targets under a concurrency bound.
//!
//! - **[`Reconciler`]**: upsert-merge of extracted facts onto an
//!   [`Inventory`]. Devices are keyed by MAC set, fields follow the
//!   [`Priority`] rule, disk share mounts are upserted and pruned.
//!
//! - **Fact extraction** ([`facts`]): the [`FactExtractor`] interface and a
//!   Linux implementation over [`rackprobe_net::RemoteShell`].
//!
//! - **Built-in probes** ([`probes`]): `ping`, `port_scan` and `ssh_linux`
//!   forming the `discovery` chain.

pub mod codec;
pub mod error;
pub mod facts;
pub mod merge;
pub mod model;
pub mod probe;
pub mod probes;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use error::{CoreError, ProbeError, RegistryError};
pub use facts::{DeviceIdentity, DiskShareFact, DiskShareFacts, FactExtractor, LinuxFactExtractor};
pub use merge::{ReconcileSummary, Reconciler};
pub use probe::{
    DiscoveryReport, Probe, ProbeOutcome, ProbeRecord, ProbeRegistry, Registration,
    RegistryBuilder, RunOptions, RunState, Scheduler, TargetContext, TargetRun,
};
pub use store::{Inventory, InventorySnapshot, MemoryInventory};

pub use model::{
    Device, DeviceField, DeviceId, DeviceType, DeviceUpdate, DiskShare, DiskShareMount, Ethernet,
    FirmwareTable, MacAddress, Priority, ShareId, Wwn,
};
