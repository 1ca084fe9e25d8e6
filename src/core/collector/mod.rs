// src/core/collector/mod.rs

// This file acts as the public interface for the `collector` module.
// Collectors are the only parts of the crate that touch the network, and
// every one of them goes through the governor first.
pub mod dns_collector;
pub mod http_prober;

use serde::{Deserialize, Serialize};

use self::dns_collector::{run_dns_profile, DnsProfile};
use self::http_prober::{run_http_probe, HttpProbe};
use crate::core::errors::GovernorError;
use crate::core::governor::NetworkGovernor;

/// Aggregated findings of all collectors for one run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CollectionReport {
    pub dns_profile: DnsProfile,
    pub http_probe: HttpProbe,
}

/// Runs all collectors concurrently against one shared governor.
///
/// The collectors are independent tasks; the governor serializes their
/// admission checks, so the combined request volume still respects the
/// budgets exactly.
pub async fn run_collectors(
    governor: &NetworkGovernor,
    timeout_seconds: u64,
) -> Result<CollectionReport, GovernorError> {
    let (dns_profile, http_probe) = tokio::join!(
        run_dns_profile(governor),
        run_http_probe(governor, timeout_seconds)
    );
    Ok(CollectionReport {
        dns_profile: dns_profile?,
        http_probe: http_probe?,
    })
}
