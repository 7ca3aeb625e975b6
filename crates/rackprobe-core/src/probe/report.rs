// ── Per-target discovery report ──

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ProbeOutcome;
use crate::model::DeviceId;

/// One probe's outcome within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeRecord {
    pub probe: String,
    pub ok: bool,
    pub message: String,
    /// Not invoked because a requirement failed.
    #[serde(default)]
    pub skipped: bool,
    pub elapsed_ms: u64,
}

impl ProbeRecord {
    pub fn outcome(&self) -> ProbeOutcome {
        ProbeOutcome {
            ok: self.ok,
            message: self.message.clone(),
        }
    }
}

/// Everything one chain run produced for one target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryReport {
    pub address: IpAddr,
    pub chain: String,
    /// One entry per probe that ran or was skipped, in run order.
    pub records: Vec<ProbeRecord>,
    pub device: Option<DeviceId>,
    /// The run stopped at a probe boundary before the chain completed.
    #[serde(default)]
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl DiscoveryReport {
    pub fn record(&self, probe: &str) -> Option<&ProbeRecord> {
        self.records.iter().find(|r| r.probe == probe)
    }

    pub fn outcomes(&self) -> Vec<ProbeOutcome> {
        self.records.iter().map(ProbeRecord::outcome).collect()
    }

    pub fn succeeded(&self) -> usize {
        self.records.iter().filter(|r| r.ok).count()
    }

    pub fn failed(&self) -> usize {
        self.records.len() - self.succeeded()
    }
}
