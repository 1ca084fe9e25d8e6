// tests/run_flow.rs
//
// End-to-end governed-run scenarios driven without any network contact:
// submit descriptors, report outcomes, close the ledger, build the manifest,
// then recompute the totals independently from the exported artifact.

use chrono::Utc;
use std::fs::File;
use std::path::PathBuf;
use uuid::Uuid;

use warden_rs_recon::core::budget::{BudgetConfig, BudgetTracker};
use warden_rs_recon::core::governor::NetworkGovernor;
use warden_rs_recon::core::ledger::{NetworkLedger, EXPORT_FILE};
use warden_rs_recon::core::manifest::{self, LedgerTotals};
use warden_rs_recon::core::models::{
    DnsRecordType, HttpMethod, LedgerEntry, Outcome, RequestDescriptor, RunConfig, Verdict,
};
use warden_rs_recon::core::policy;

fn run_config(budget: BudgetConfig) -> RunConfig {
    RunConfig {
        domain: "example.com".to_string(),
        out_dir: PathBuf::from("./output"),
        budget,
        allow_get: false,
        timeout_seconds: 8,
        run_id: Uuid::new_v4(),
        shodan_key: Some("super-secret-key".to_string()),
        censys_id: None,
        censys_secret: None,
    }
}

#[test]
fn low_noise_full_sixty_one_heads_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let started_at = Utc::now();

    let policy = policy::resolve("low-noise", "full", "example.com", false).unwrap();
    let budget_config = BudgetConfig::new(60, None).unwrap();
    let budget = BudgetTracker::new(budget_config.clone());
    let ledger = NetworkLedger::create(dir.path()).unwrap();
    let governor = NetworkGovernor::new(policy.clone(), budget, ledger);

    let head = RequestDescriptor::http("https://example.com", HttpMethod::Head, "http-prober");
    let mut granted_ids = Vec::new();
    let mut denied = Vec::new();
    for _ in 0..61 {
        let decision = governor.check(&head).unwrap();
        if decision.is_allowed() {
            granted_ids.push(decision.request_id);
        } else {
            denied.push(decision.reason);
        }
    }
    assert_eq!(granted_ids.len(), 60);
    assert_eq!(denied, vec!["rate limit exceeded".to_string()]);

    // Report a mix of outcomes back, exactly once each.
    for (i, id) in granted_ids.iter().enumerate() {
        let outcome = match i % 3 {
            0 => Outcome::success(12, Some("200".to_string())),
            1 => Outcome::failure(30, "connection refused"),
            _ => Outcome::timeout(8000),
        };
        governor.finalize(*id, outcome).unwrap();
    }

    let entries = governor.close().unwrap();
    assert_eq!(entries.len(), 61);
    let sequences: Vec<u64> = entries.iter().map(|e| e.sequence).collect();
    assert_eq!(sequences, (1..=61).collect::<Vec<u64>>());

    let config = run_config(budget_config);
    let finished_at = Utc::now();
    let manifest = manifest::build(&policy, &config, &entries, started_at, finished_at);
    manifest::write(&manifest, dir.path()).unwrap();

    assert_eq!(manifest.ledger_totals.http.allowed, 60);
    assert_eq!(manifest.ledger_totals.http.denied, 1);
    assert_eq!(manifest.ledger_totals.total_entries, 61);
    assert_eq!(manifest.ledger_totals.http.success, 20);
    assert_eq!(manifest.ledger_totals.http.failure, 20);
    assert_eq!(manifest.ledger_totals.http.timeout, 20);

    // The totals must equal an independent recomputation from the exported
    // ledger artifact.
    let exported: Vec<LedgerEntry> =
        serde_json::from_reader(File::open(dir.path().join(EXPORT_FILE)).unwrap()).unwrap();
    assert_eq!(LedgerTotals::aggregate(&exported), manifest.ledger_totals);

    // And the manifest never carries the configured credential.
    let manifest_json = std::fs::read_to_string(dir.path().join("run_manifest.json")).unwrap();
    assert!(!manifest_json.contains("super-secret-key"));
}

#[test]
fn concurrent_checks_never_overgrant_the_last_slot() {
    let dir = tempfile::tempdir().unwrap();

    let policy = policy::resolve("low-noise", "full", "example.com", false).unwrap();
    let budget = BudgetTracker::new(BudgetConfig::new(1, None).unwrap());
    let ledger = NetworkLedger::create(dir.path()).unwrap();
    let governor = NetworkGovernor::new(policy, budget, ledger);

    let head = RequestDescriptor::http("https://example.com", HttpMethod::Head, "http-prober");

    // Eight threads race for a one-slot window; the governor's critical
    // section must hand out exactly one grant.
    let decisions: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| governor.check(&head).unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let granted = decisions.iter().filter(|d| d.is_allowed()).count();
    assert_eq!(granted, 1);
    for denied in decisions.iter().filter(|d| !d.is_allowed()) {
        assert_eq!(denied.reason, "rate limit exceeded");
    }

    // Every racing submission is on the ledger, in a gap-free linear order.
    let entries = governor.close().unwrap();
    assert_eq!(entries.len(), 8);
    let sequences: Vec<u64> = entries.iter().map(|e| e.sequence).collect();
    assert_eq!(sequences, (1..=8).collect::<Vec<u64>>());
    let allowed_entries = entries
        .iter()
        .filter(|e| e.decision == Verdict::Allowed)
        .count();
    assert_eq!(allowed_entries, 1);
}

#[test]
fn passive_run_denies_http_and_executes_nothing() {
    let dir = tempfile::tempdir().unwrap();

    let policy = policy::resolve("passive", "minimal", "example.com", false).unwrap();
    let budget_config = BudgetConfig::new(60, None).unwrap();
    let budget = BudgetTracker::new(budget_config.clone());
    let ledger = NetworkLedger::create(dir.path()).unwrap();
    let governor = NetworkGovernor::new(policy.clone(), budget, ledger);

    let get = RequestDescriptor::http("https://example.com", HttpMethod::Get, "http-prober");
    let decision = governor.check(&get).unwrap();
    assert_eq!(decision.verdict, Verdict::Denied);
    assert!(decision.reason.contains("passive mode"));

    // A permitted minimal-policy DNS query still goes through and gets its
    // outcome attached.
    let txt = RequestDescriptor::dns("example.com", DnsRecordType::Txt, "dns-mail-profile");
    let granted = governor.check(&txt).unwrap();
    assert!(granted.is_allowed());
    governor
        .finalize(granted.request_id, Outcome::success(7, Some("2 records".to_string())))
        .unwrap();

    let entries = governor.close().unwrap();
    assert_eq!(entries.len(), 2);
    // The denied HTTP entry has no outcome: nothing was ever executed.
    assert_eq!(entries[0].decision, Verdict::Denied);
    assert!(entries[0].outcome.is_none());
    assert!(entries[1].outcome.is_some());

    let config = run_config(budget_config);
    let manifest = manifest::build(&policy, &config, &entries, Utc::now(), Utc::now());
    assert_eq!(manifest.ledger_totals.http.denied, 1);
    assert_eq!(manifest.ledger_totals.http.allowed, 0);
    assert_eq!(manifest.ledger_totals.dns.allowed, 1);
    assert_eq!(manifest.ledger_totals.dns.success, 1);
}
