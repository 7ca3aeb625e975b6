// ── Per-target run state ──

use std::collections::BTreeMap;
use std::net::IpAddr;

use indexmap::IndexMap;

use super::ProbeOutcome;
use crate::model::DeviceId;

/// Where a target's chain run currently is. Only ever moves forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunState {
    NotStarted,
    Probing(String),
    Done,
}

/// Accumulator passed by `&mut` through one target's chain run.
///
/// Later probes read what earlier ones recorded here to skip work they
/// already know will fail.
#[derive(Debug)]
pub struct TargetContext {
    address: IpAddr,
    state: RunState,
    results: IndexMap<String, ProbeOutcome>,
    attributes: BTreeMap<String, String>,
    device: Option<DeviceId>,
}

impl TargetContext {
    pub fn new(address: IpAddr) -> Self {
        Self {
            address,
            state: RunState::NotStarted,
            results: IndexMap::new(),
            attributes: BTreeMap::new(),
            device: None,
        }
    }

    pub fn address(&self) -> IpAddr {
        self.address
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    // ── Results of earlier probes ────────────────────────────────────

    pub fn outcome(&self, probe: &str) -> Option<&ProbeOutcome> {
        self.results.get(probe)
    }

    pub fn succeeded(&self, probe: &str) -> bool {
        self.outcome(probe).is_some_and(|o| o.ok)
    }

    /// Recorded outcomes, in run order.
    pub fn results(&self) -> impl Iterator<Item = (&str, &ProbeOutcome)> {
        self.results.iter().map(|(k, v)| (k.as_str(), v))
    }

    // ── Shared attributes ────────────────────────────────────────────

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    // ── Inventory link ───────────────────────────────────────────────

    pub fn device(&self) -> Option<DeviceId> {
        self.device
    }

    pub fn set_device(&mut self, id: DeviceId) {
        self.device = Some(id);
    }

    // ── Scheduler transitions ────────────────────────────────────────

    pub(crate) fn begin(&mut self, probe: &str) {
        if self.state != RunState::Done {
            self.state = RunState::Probing(probe.to_owned());
        }
    }

    pub(crate) fn record(&mut self, probe: &str, outcome: ProbeOutcome) {
        self.results.insert(probe.to_owned(), outcome);
    }

    pub(crate) fn finish(&mut self) {
        self.state = RunState::Done;
    }
}
