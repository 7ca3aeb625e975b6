// ── Discovery probes ──
//
// A probe is one discovery step. Probes are registered with the chains
// they belong to and the probes that must have succeeded before them,
// then frozen into an immutable `ProbeRegistry` shared by the scheduler.

pub mod context;
pub mod registry;
pub mod report;
pub mod scheduler;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ProbeError;

pub use context::{RunState, TargetContext};
pub use registry::{ProbeRegistry, RegistryBuilder};
pub use report::{DiscoveryReport, ProbeRecord};
pub use scheduler::{RunOptions, Scheduler, TargetRun};

/// What a probe reports back: whether it succeeded and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeOutcome {
    pub ok: bool,
    pub message: String,
}

impl ProbeOutcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    /// Expected "not reachable this way" result. Never an error.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }
}

/// A single discovery step.
///
/// Expected conditions (closed port, no answer) are returned as a failed
/// `ProbeOutcome`. Transport failures go in `ProbeError::Transient` and
/// are recorded the same way by the scheduler. Only `ProbeError::Fatal`
/// aborts the target's run.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn run(&self, ctx: &mut TargetContext) -> Result<ProbeOutcome, ProbeError>;
}

/// A probe plus its chain membership and prerequisites.
#[derive(Clone)]
pub struct Registration {
    name: String,
    chains: Vec<String>,
    requires: Vec<String>,
    probe: Arc<dyn Probe>,
}

impl Registration {
    pub fn new(name: impl Into<String>, probe: impl Probe + 'static) -> Self {
        Self::from_arc(name, Arc::new(probe))
    }

    pub fn from_arc(name: impl Into<String>, probe: Arc<dyn Probe>) -> Self {
        Self {
            name: name.into(),
            chains: Vec::new(),
            requires: Vec::new(),
            probe,
        }
    }

    /// Add the probe to a chain.
    #[must_use]
    pub fn chain(mut self, chain: impl Into<String>) -> Self {
        let chain = chain.into();
        if !self.chains.contains(&chain) {
            self.chains.push(chain);
        }
        self
    }

    /// Declare probes that must succeed first, in the same chain.
    #[must_use]
    pub fn requires<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            if !self.requires.contains(&name) {
                self.requires.push(name);
            }
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn chains(&self) -> &[String] {
        &self.chains
    }

    pub fn required(&self) -> &[String] {
        &self.requires
    }

    pub fn in_chain(&self, chain: &str) -> bool {
        self.chains.iter().any(|c| c == chain)
    }

    pub fn probe(&self) -> &Arc<dyn Probe> {
        &self.probe
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("name", &self.name)
            .field("chains", &self.chains)
            .field("requires", &self.requires)
            .finish_non_exhaustive()
    }
}
