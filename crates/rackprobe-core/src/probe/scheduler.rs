// ── Chain scheduler ──
//
// One target's chain runs strictly in resolved order on a single task.
// Parallelism exists only across targets (`run_many`). Cancellation and
// deadlines take effect between probes, never inside one.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::context::TargetContext;
use super::registry::ProbeRegistry;
use super::report::{DiscoveryReport, ProbeRecord};
use super::ProbeOutcome;
use crate::error::{CoreError, ProbeError};

const DEFAULT_CONCURRENCY: usize = 16;

/// Options for running a chain against many targets.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Maximum targets in flight at once.
    pub concurrency: usize,
    /// Per-target budget, checked before each probe.
    pub target_timeout: Option<Duration>,
    /// Cancels every target at its next probe boundary.
    pub cancel: CancellationToken,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            target_timeout: None,
            cancel: CancellationToken::new(),
        }
    }
}

/// Result of one target within `run_many`.
#[derive(Debug)]
pub struct TargetRun {
    pub address: IpAddr,
    pub result: Result<DiscoveryReport, CoreError>,
}

/// Executes chains from an immutable registry.
#[derive(Debug, Clone)]
pub struct Scheduler {
    registry: Arc<ProbeRegistry>,
}

impl Scheduler {
    pub fn new(registry: Arc<ProbeRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ProbeRegistry {
        &self.registry
    }

    /// Run `chain` against one target to completion.
    pub async fn run_chain(
        &self,
        chain: &str,
        address: IpAddr,
    ) -> Result<DiscoveryReport, CoreError> {
        self.run_chain_with_cancel(chain, address, &CancellationToken::new())
            .await
    }

    /// Run `chain` against one target, stopping at the next probe
    /// boundary once `cancel` fires.
    pub async fn run_chain_with_cancel(
        &self,
        chain: &str,
        address: IpAddr,
        cancel: &CancellationToken,
    ) -> Result<DiscoveryReport, CoreError> {
        self.execute(chain, address, cancel, None).await
    }

    /// Run `chain` against every target concurrently. Results come back in
    /// the order the targets were given.
    pub async fn run_many<I>(&self, chain: &str, targets: I, opts: &RunOptions) -> Vec<TargetRun>
    where
        I: IntoIterator<Item = IpAddr>,
    {
        let semaphore = Arc::new(Semaphore::new(opts.concurrency.max(1)));
        let mut set = JoinSet::new();

        for (index, address) in targets.into_iter().enumerate() {
            let scheduler = self.clone();
            let chain = chain.to_owned();
            let semaphore = Arc::clone(&semaphore);
            let cancel = opts.cancel.clone();
            let timeout = opts.target_timeout;

            set.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => {
                        let deadline = timeout.map(|t| Instant::now() + t);
                        scheduler.execute(&chain, address, &cancel, deadline).await
                    }
                    Err(_) => Err(CoreError::Internal("target semaphore closed".into())),
                };
                (index, TargetRun { address, result })
            });
        }

        let mut runs = Vec::with_capacity(set.len());
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(run) => runs.push(run),
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(e) => warn!(error = %e, "target task ended without a result"),
            }
        }
        runs.sort_by_key(|(index, _)| *index);
        runs.into_iter().map(|(_, run)| run).collect()
    }

    async fn execute(
        &self,
        chain: &str,
        address: IpAddr,
        cancel: &CancellationToken,
        deadline: Option<Instant>,
    ) -> Result<DiscoveryReport, CoreError> {
        let order = self.registry.resolve_order(chain)?;
        let started_at = Utc::now();
        let mut ctx = TargetContext::new(address);
        let mut records = Vec::with_capacity(order.len());
        let mut cancelled = false;

        for registration in order {
            if cancel.is_cancelled() || deadline.is_some_and(|d| Instant::now() >= d) {
                debug!(%address, chain, next = registration.name(), "run cancelled");
                cancelled = true;
                break;
            }

            let name = registration.name();
            ctx.begin(name);

            // Requirements must have succeeded, not merely run.
            if let Some(missing) = registration
                .required()
                .iter()
                .find(|dep| !ctx.succeeded(dep))
            {
                let outcome =
                    ProbeOutcome::failure(format!("requires {missing}, which did not succeed"));
                debug!(%address, probe = name, requirement = %missing, "probe skipped");
                records.push(ProbeRecord {
                    probe: name.to_owned(),
                    ok: false,
                    message: outcome.message.clone(),
                    skipped: true,
                    elapsed_ms: 0,
                });
                ctx.record(name, outcome);
                continue;
            }

            debug!(%address, probe = name, "probe started");
            let clock = Instant::now();
            let outcome = match registration.probe().run(&mut ctx).await {
                Ok(outcome) => outcome,
                Err(ProbeError::Transient(e)) => {
                    warn!(%address, probe = name, error = %e, "probe failed");
                    ProbeOutcome::failure(e.to_string())
                }
                Err(ProbeError::Fatal(e)) => {
                    warn!(%address, probe = name, error = %e, "probe aborted target run");
                    return Err(e);
                }
            };
            let elapsed_ms = u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX);
            debug!(
                %address,
                probe = name,
                ok = outcome.ok,
                message = %outcome.message,
                elapsed_ms,
                "probe finished"
            );

            records.push(ProbeRecord {
                probe: name.to_owned(),
                ok: outcome.ok,
                message: outcome.message.clone(),
                skipped: false,
                elapsed_ms,
            });
            ctx.record(name, outcome);
        }

        ctx.finish();
        let report = DiscoveryReport {
            address,
            chain: chain.to_owned(),
            device: ctx.device(),
            records,
            cancelled,
            started_at,
            finished_at: Utc::now(),
        };
        info!(
            %address,
            chain,
            succeeded = report.succeeded(),
            failed = report.failed(),
            cancelled,
            "target finished"
        );
        Ok(report)
    }
}
