// src/core/collector/http_prober.rs

use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::core::errors::GovernorError;
use crate::core::governor::NetworkGovernor;
use crate::core::models::{HttpMethod, Outcome, RequestDescriptor};

const PURPOSE: &str = "http-prober";

/// Security headers whose presence the probe reports on.
const SECURITY_HEADERS: &[&str] = &[
    "strict-transport-security",
    "content-security-policy",
    "x-frame-options",
    "x-content-type-options",
];

/// Result of the single governed HEAD probe against the apex.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HttpProbe {
    pub url: String,
    pub status: Option<u16>,
    pub present: Vec<String>,
    pub missing: Vec<String>,
    /// Denial reason when the governor refused the probe.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Probes `https://<apex>` with one HEAD request for security-header
/// presence.
///
/// The descriptor goes through the governor first; in passive mode the
/// probe is denied and recorded, and no network contact happens. Execution
/// runs under a strict timeout; a timed-out request keeps its consumed
/// budget slot and is reported back as `timeout`.
pub async fn run_http_probe(
    governor: &NetworkGovernor,
    timeout_seconds: u64,
) -> Result<HttpProbe, GovernorError> {
    let client = reqwest::Client::builder()
        .user_agent("WardenRS/0.1")
        .redirect(reqwest::redirect::Policy::none())
        .build();
    probe_with_client(governor, client, timeout_seconds).await
}

/// Probe body with the client construction result injected.
///
/// The client is built before anything is submitted to the governor: a
/// builder failure means no descriptor, no ledger entry and no consumed
/// budget slot, because no network contact was ever possible.
async fn probe_with_client(
    governor: &NetworkGovernor,
    client: reqwest::Result<reqwest::Client>,
    timeout_seconds: u64,
) -> Result<HttpProbe, GovernorError> {
    let url = format!("https://{}", governor.policy().domain);
    let mut probe = HttpProbe {
        url: url.clone(),
        ..Default::default()
    };

    let client = match client {
        Ok(client) => client,
        Err(e) => {
            warn!(error = %e, "failed to build HTTP client");
            probe.error = Some(format!("failed to build HTTP client: {e}"));
            return Ok(probe);
        }
    };

    let descriptor = RequestDescriptor::http(&url, HttpMethod::Head, PURPOSE);
    let decision = governor.check(&descriptor)?;
    if !decision.is_allowed() {
        info!(%url, reason = %decision.reason, "HTTP probe denied, skipping");
        probe.skipped = Some(decision.reason);
        return Ok(probe);
    }

    let started = Instant::now();
    let response = tokio::time::timeout(
        Duration::from_secs(timeout_seconds),
        client.head(&url).send(),
    )
    .await;
    let duration_ms = started.elapsed().as_millis() as u64;

    match response {
        Err(_elapsed) => {
            warn!(%url, timeout_seconds, "HTTP probe timed out");
            governor.finalize(decision.request_id, Outcome::timeout(duration_ms))?;
            probe.error = Some(format!("timed out after {timeout_seconds}s"));
        }
        Ok(Err(e)) => {
            warn!(%url, error = %e, "HTTP probe failed");
            governor.finalize(decision.request_id, Outcome::failure(duration_ms, e.to_string()))?;
            probe.error = Some(e.to_string());
        }
        Ok(Ok(response)) => {
            let status = response.status();
            info!(%url, status = %status, "HTTP probe completed");
            for name in SECURITY_HEADERS {
                if response.headers().contains_key(*name) {
                    probe.present.push(name.to_string());
                } else {
                    probe.missing.push(name.to_string());
                }
            }
            probe.status = Some(status.as_u16());
            governor.finalize(
                decision.request_id,
                Outcome::success(duration_ms, Some(status.as_u16().to_string())),
            )?;
        }
    }

    Ok(probe)
}
