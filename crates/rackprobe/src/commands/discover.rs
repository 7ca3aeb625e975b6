//! `discover`: run a chain against targets and merge into the inventory.

use std::fmt::Write as _;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tabled::Tabled;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use rackprobe_core::{DiscoveryReport, Inventory, RunOptions, Scheduler, TargetRun};

use crate::cli::{DiscoverArgs, GlobalOpts, OutputFormat};
use crate::commands::OpenInventory;
use crate::error::CliError;
use crate::{config, output, registry};

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct OutcomeRow {
    #[tabled(rename = "Target")]
    target: String,
    #[tabled(rename = "Probe")]
    probe: String,
    #[tabled(rename = "OK")]
    ok: String,
    #[tabled(rename = "Message")]
    message: String,
    #[tabled(rename = "Elapsed")]
    elapsed: String,
}

/// Structured-output view of one target.
#[derive(Serialize)]
struct TargetResult<'a> {
    address: IpAddr,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<&'a DiscoveryReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<'a> From<&'a TargetRun> for TargetResult<'a> {
    fn from(run: &'a TargetRun) -> Self {
        match &run.result {
            Ok(report) => Self {
                address: run.address,
                report: Some(report),
                error: None,
            },
            Err(e) => Self {
                address: run.address,
                report: None,
                error: Some(e.to_string()),
            },
        }
    }
}

fn outcome_rows(runs: &[TargetRun], color: bool) -> Vec<OutcomeRow> {
    let mut rows = Vec::new();
    for run in runs {
        match &run.result {
            Ok(report) => {
                rows.extend(report.records.iter().map(|r| OutcomeRow {
                    target: run.address.to_string(),
                    probe: r.probe.clone(),
                    ok: output::outcome_cell(r.ok, r.skipped, color),
                    message: r.message.clone(),
                    elapsed: humantime::format_duration(Duration::from_millis(r.elapsed_ms))
                        .to_string(),
                }));
                if report.cancelled {
                    rows.push(OutcomeRow {
                        target: run.address.to_string(),
                        probe: "-".into(),
                        ok: output::outcome_cell(false, true, color),
                        message: "cancelled before the chain completed".into(),
                        elapsed: String::new(),
                    });
                }
            }
            Err(e) => rows.push(OutcomeRow {
                target: run.address.to_string(),
                probe: "-".into(),
                ok: output::outcome_cell(false, false, color),
                message: e.to_string(),
                elapsed: String::new(),
            }),
        }
    }
    rows
}

/// `<address>\t<device id or ->` per target.
fn plain_lines(runs: &[TargetRun]) -> String {
    let mut out = String::new();
    for run in runs {
        let device = match &run.result {
            Ok(report) => report
                .device
                .map_or_else(|| "-".to_owned(), |d| d.to_string()),
            Err(_) => "-".to_owned(),
        };
        let _ = writeln!(out, "{}\t{device}", run.address);
    }
    out.trim_end().to_owned()
}

fn spinner(global: &GlobalOpts, targets: usize, chain: &str) -> ProgressBar {
    if global.quiet || global.output != OutputFormat::Table {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg} [{elapsed}]")
    {
        pb.set_style(style);
    }
    pb.set_message(format!("running chain '{chain}' against {targets} target(s)"));
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

/// Cancel `token` on the first Ctrl-C.
fn cancel_on_interrupt(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, stopping each target at its next probe boundary");
            token.cancel();
        }
    });
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: DiscoverArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load(global)?;
    let inventory = OpenInventory::open(global, &cfg)?;
    let registry =
        registry::build_registry(&cfg, Arc::clone(&inventory.store) as Arc<dyn Inventory>)?;

    let chain = args.chain.unwrap_or_else(|| cfg.discovery.chain.clone());
    registry::resolve_chain(&registry, &chain)?;

    let concurrency = args.concurrency.unwrap_or(cfg.discovery.concurrency);
    if concurrency == 0 {
        return Err(CliError::Validation {
            field: "concurrency".into(),
            reason: "must be at least 1".into(),
        });
    }
    let target_timeout = match args.target_timeout {
        Some(0) => None,
        Some(secs) => Some(Duration::from_secs(secs)),
        None => cfg.target_timeout(),
    };

    let opts = RunOptions {
        concurrency,
        target_timeout,
        cancel: CancellationToken::new(),
    };
    cancel_on_interrupt(opts.cancel.clone());

    let total = args.targets.len();
    let pb = spinner(global, total, &chain);
    let scheduler = Scheduler::new(Arc::new(registry));
    let runs = scheduler.run_many(&chain, args.targets, &opts).await;
    pb.finish_and_clear();

    if args.no_save {
        info!("--no-save given, inventory file left untouched");
    } else {
        inventory.save()?;
    }

    // ── Render ──
    let rendered = match global.output {
        OutputFormat::Table => {
            output::render_table(&outcome_rows(&runs, output::should_color(global.color)))
        }
        OutputFormat::Plain => plain_lines(&runs),
        OutputFormat::Json | OutputFormat::JsonCompact => {
            let results: Vec<TargetResult<'_>> = runs.iter().map(TargetResult::from).collect();
            output::render_json(&results, global.output == OutputFormat::JsonCompact)?
        }
        OutputFormat::Yaml => {
            let results: Vec<TargetResult<'_>> = runs.iter().map(TargetResult::from).collect();
            output::render_yaml(&results)?
        }
    };
    output::print_output(&rendered, global.quiet);

    exit_status(runs, total)
}

/// Aborted targets fail the command; so does a run where no target
/// answered a single probe.
fn exit_status(runs: Vec<TargetRun>, total: usize) -> Result<(), CliError> {
    let mut aborted = 0;
    let mut unreachable = 0;
    for run in runs {
        match run.result {
            Ok(report) if report.succeeded() == 0 => unreachable += 1,
            Ok(_) => {}
            Err(e) => {
                aborted += 1;
                let err = CliError::from(e);
                eprintln!("{}: {:?}", run.address, miette::Report::new(err));
            }
        }
    }

    if aborted > 0 {
        return Err(CliError::TargetsFailed {
            failed: aborted,
            total,
        });
    }
    if total > 0 && unreachable == total {
        return Err(CliError::Unreachable {
            failed: unreachable,
            total,
        });
    }
    Ok(())
}
