// src/core/manifest.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;
use uuid::Uuid;

use crate::core::budget::BudgetConfig;
use crate::core::errors::GovernorError;
use crate::core::models::{LedgerEntry, OutcomeStatus, RequestKind, RunConfig, Verdict};
use crate::core::policy::Policy;

pub const MANIFEST_FILE: &str = "run_manifest.json";

/// Decision and outcome counts for one request kind.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct KindTotals {
    pub allowed: u64,
    pub denied: u64,
    pub success: u64,
    pub failure: u64,
    pub timeout: u64,
}

/// Exact aggregation of the closed ledger, by kind, decision and outcome.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerTotals {
    pub dns: KindTotals,
    pub http: KindTotals,
    pub total_entries: u64,
}

impl LedgerTotals {
    pub fn aggregate(entries: &[LedgerEntry]) -> Self {
        let mut totals = Self::default();
        for entry in entries {
            let kind_totals = match entry.kind {
                RequestKind::Dns => &mut totals.dns,
                RequestKind::Http => &mut totals.http,
            };
            match entry.decision {
                Verdict::Allowed => kind_totals.allowed += 1,
                Verdict::Denied => kind_totals.denied += 1,
            }
            if let Some(outcome) = &entry.outcome {
                match outcome.status {
                    OutcomeStatus::Success => kind_totals.success += 1,
                    OutcomeStatus::Failure => kind_totals.failure += 1,
                    OutcomeStatus::Timeout => kind_totals.timeout += 1,
                }
            }
            totals.total_entries += 1;
        }
        totals
    }
}

/// Configuration copy embedded in the manifest. Credential fields
/// (Shodan/Censys keys) are not carried at all, so they cannot leak through
/// serialization.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SanitizedConfig {
    pub domain: String,
    pub run_id: Uuid,
    pub out_dir: String,
    pub allow_get: bool,
    pub timeout_seconds: u64,
    pub policy: Policy,
    pub budget: BudgetConfig,
}

impl SanitizedConfig {
    pub fn from_run(policy: &Policy, config: &RunConfig) -> Self {
        Self {
            domain: config.domain.clone(),
            run_id: config.run_id,
            out_dir: config.out_dir.display().to_string(),
            allow_get: config.allow_get,
            timeout_seconds: config.timeout_seconds,
            policy: policy.clone(),
            budget: config.budget.clone(),
        }
    }
}

/// End-of-run summary artifact. Writing it is the last action of a run; its
/// absence marks the run incomplete, never "zero activity".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunManifest {
    pub sanitized_config: SanitizedConfig,
    pub ledger_totals: LedgerTotals,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

pub fn build(
    policy: &Policy,
    config: &RunConfig,
    entries: &[LedgerEntry],
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
) -> RunManifest {
    RunManifest {
        sanitized_config: SanitizedConfig::from_run(policy, config),
        ledger_totals: LedgerTotals::aggregate(entries),
        started_at,
        finished_at,
    }
}

pub fn write(manifest: &RunManifest, raw_dir: &Path) -> Result<(), GovernorError> {
    let path = raw_dir.join(MANIFEST_FILE);
    let file = File::create(&path).map_err(GovernorError::ManifestWrite)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, manifest)
        .map_err(|e| GovernorError::ManifestWrite(e.into()))?;
    writer.flush().map_err(GovernorError::ManifestWrite)?;
    info!(path = %path.display(), "run manifest written");
    Ok(())
}
