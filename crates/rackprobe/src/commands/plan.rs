//! `plan`: print a chain's resolved probe order without running it.

use std::sync::Arc;

use serde::Serialize;
use tabled::Tabled;

use rackprobe_core::MemoryInventory;

use crate::cli::{GlobalOpts, PlanArgs};
use crate::error::CliError;
use crate::{config, output, registry};

#[derive(Debug, Serialize)]
struct PlanStep {
    step: usize,
    probe: String,
    requires: Vec<String>,
}

#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "#")]
    step: usize,
    #[tabled(rename = "Probe")]
    probe: String,
    #[tabled(rename = "Requires")]
    requires: String,
}

fn plan_row(s: &PlanStep) -> PlanRow {
    PlanRow {
        step: s.step,
        probe: s.probe.clone(),
        requires: if s.requires.is_empty() {
            "-".into()
        } else {
            s.requires.join(", ")
        },
    }
}

pub fn handle(args: &PlanArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load(global)?;
    // Resolution never touches the inventory.
    let registry = registry::build_registry(&cfg, Arc::new(MemoryInventory::new()))?;
    let chain = args
        .chain
        .clone()
        .unwrap_or_else(|| cfg.discovery.chain.clone());

    let steps: Vec<PlanStep> = registry::resolve_chain(&registry, &chain)?
        .into_iter()
        .enumerate()
        .map(|(i, reg)| PlanStep {
            step: i + 1,
            probe: reg.name().to_owned(),
            requires: reg.required().to_vec(),
        })
        .collect();

    let out = output::render_list(global.output, &steps, plan_row, |s| s.probe.clone())?;
    output::print_output(&out, global.quiet);
    Ok(())
}
