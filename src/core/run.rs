// src/core/run.rs

use chrono::Utc;
use color_eyre::eyre::Result;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

use crate::core::budget::BudgetTracker;
use crate::core::collector::{self, CollectionReport};
use crate::core::governor::NetworkGovernor;
use crate::core::ledger::NetworkLedger;
use crate::core::manifest::{self, RunManifest};
use crate::core::models::RunConfig;
use crate::core::policy::Policy;

/// What a finished run hands back to the CLI.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_path: String,
    pub manifest: RunManifest,
    pub report: CollectionReport,
}

/// Executes one governed reconnaissance run end to end.
///
/// Builds the run directory, wires budget → ledger → governor, runs the
/// collectors concurrently, then closes the ledger and writes the manifest
/// as the run's final action. The governor and ledger live exactly as long
/// as this function.
pub async fn execute(config: RunConfig, policy: Policy) -> Result<RunSummary> {
    let started_at = Utc::now();
    let run_path = config
        .out_dir
        .join(&config.domain)
        .join(started_at.format("%Y%m%d_%H%M%S").to_string());
    let raw_dir = run_path.join("raw");
    std::fs::create_dir_all(&raw_dir)?;
    info!(run_id = %config.run_id, path = %run_path.display(), mode = %policy.mode, "run started");

    let budget = BudgetTracker::new(config.budget.clone());
    let ledger = NetworkLedger::create(&raw_dir)?;
    let governor = NetworkGovernor::new(policy.clone(), budget, ledger);

    let report = collector::run_collectors(&governor, config.timeout_seconds).await?;
    write_json(&raw_dir.join("dns_profile.json"), &report.dns_profile)?;
    write_json(&raw_dir.join("http_probe.json"), &report.http_probe)?;

    let entries = governor.close()?;
    let finished_at = Utc::now();
    let manifest = manifest::build(&policy, &config, &entries, started_at, finished_at);
    manifest::write(&manifest, &raw_dir)?;

    info!(
        entries = entries.len(),
        duration_ms = (finished_at - started_at).num_milliseconds(),
        "run finished"
    );
    Ok(RunSummary {
        run_path: run_path.display().to_string(),
        manifest,
        report,
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    Ok(())
}
