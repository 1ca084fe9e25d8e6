// src/core/collector/dns_collector.rs

use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::core::errors::GovernorError;
use crate::core::governor::NetworkGovernor;
use crate::core::models::{DnsRecordType, Outcome, RequestDescriptor};
use crate::core::policy::{DnsPolicy, Mode};
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::proto::rr::RecordType;
use hickory_resolver::TokioAsyncResolver;

const PURPOSE: &str = "dns-mail-profile";

/// A DKIM key found at one of the safelisted selectors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DkimRecord {
    pub selector: String,
    pub record: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DmarcData {
    pub record: String,
    pub policy: Option<String>,
}

/// Mail-security posture gathered through governed DNS lookups.
///
/// `skipped` lists every lookup the governor denied, with its reason; a
/// denial surfaces here as a gap in the profile, never as an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DnsProfile {
    pub mx: Vec<String>,
    pub spf: Option<String>,
    pub dmarc: Option<DmarcData>,
    pub dkim: Vec<DkimRecord>,
    pub skipped: Vec<String>,
}

/// Collects the mail-posture DNS profile for the run's domain.
///
/// Every lookup is submitted to the governor first; only granted lookups hit
/// the resolver, and each one reports its outcome back. Under the minimal
/// DNS policy this degrades to apex MX/TXT and `_dmarc` TXT; under `none`
/// everything lands in `skipped`.
pub async fn run_dns_profile(governor: &NetworkGovernor) -> Result<DnsProfile, GovernorError> {
    let policy = governor.policy().clone();
    info!(domain = %policy.domain, dns_policy = %policy.dns_policy, "starting DNS mail profile");

    let resolver = TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default());
    let mut profile = DnsProfile::default();

    // Same query order the minimal policy is defined around: MX, apex TXT,
    // then _dmarc TXT.
    if let Some(records) = governed_lookup(
        governor,
        &resolver,
        &policy.domain,
        DnsRecordType::Mx,
        &mut profile.skipped,
    )
    .await?
    {
        profile.mx = records;
    }

    if let Some(records) = governed_lookup(
        governor,
        &resolver,
        &policy.domain,
        DnsRecordType::Txt,
        &mut profile.skipped,
    )
    .await?
    {
        profile.spf = records.into_iter().find(|r| r.starts_with("v=spf1"));
    }

    if let Some(records) = governed_lookup(
        governor,
        &resolver,
        &policy.dmarc_name(),
        DnsRecordType::Txt,
        &mut profile.skipped,
    )
    .await?
    {
        if let Some(record) = records.into_iter().next() {
            // Parse the policy (p=) tag from the record.
            let dmarc_policy = record
                .split(';')
                .find(|s| s.trim().starts_with("p="))
                .and_then(|s| s.trim().split('=').nth(1))
                .map(|s| s.to_string());
            profile.dmarc = Some(DmarcData {
                record,
                policy: dmarc_policy,
            });
        }
    }

    // DKIM probes only exist under the full policy in low-noise mode; the
    // governor enforces the same rule, so these descriptors are only built
    // when they can pass.
    if policy.dns_policy == DnsPolicy::Full && policy.mode == Mode::LowNoise {
        for selector in &policy.dkim_selector_safelist {
            let name = policy.dkim_name(selector);
            if let Some(records) = governed_lookup(
                governor,
                &resolver,
                &name,
                DnsRecordType::Txt,
                &mut profile.skipped,
            )
            .await?
            {
                for record in records {
                    if record.starts_with("v=DKIM1") {
                        debug!(selector, "found valid DKIM record");
                        profile.dkim.push(DkimRecord {
                            selector: selector.clone(),
                            record,
                        });
                    }
                }
            }
        }
    }

    info!(
        mx = profile.mx.len(),
        dkim = profile.dkim.len(),
        skipped = profile.skipped.len(),
        "DNS mail profile finished"
    );
    Ok(profile)
}

/// Submits one lookup to the governor and executes it when granted.
///
/// Returns `None` when the governor denied the lookup, `Some(records)` when
/// it ran (empty on resolver failure, mirroring a fruitless lookup).
async fn governed_lookup(
    governor: &NetworkGovernor,
    resolver: &TokioAsyncResolver,
    name: &str,
    record_type: DnsRecordType,
    skipped: &mut Vec<String>,
) -> Result<Option<Vec<String>>, GovernorError> {
    let descriptor = RequestDescriptor::dns(name, record_type, PURPOSE);
    let decision = governor.check(&descriptor)?;
    if !decision.is_allowed() {
        debug!(name, %record_type, reason = %decision.reason, "lookup denied, skipping");
        skipped.push(format!("{name} {record_type}: {}", decision.reason));
        return Ok(None);
    }

    let started = Instant::now();
    let result = resolver.lookup(name, to_hickory(record_type)).await;
    let duration_ms = started.elapsed().as_millis() as u64;

    match result {
        Ok(lookup) => {
            let records: Vec<String> = lookup.iter().map(|r| r.to_string()).collect();
            governor.finalize(
                decision.request_id,
                Outcome::success(duration_ms, Some(format!("{} records", records.len()))),
            )?;
            Ok(Some(records))
        }
        Err(e) => {
            warn!(name, %record_type, error = %e, "lookup failed");
            governor.finalize(decision.request_id, Outcome::failure(duration_ms, e.to_string()))?;
            Ok(Some(Vec::new()))
        }
    }
}

fn to_hickory(record_type: DnsRecordType) -> RecordType {
    match record_type {
        DnsRecordType::A => RecordType::A,
        DnsRecordType::Aaaa => RecordType::AAAA,
        DnsRecordType::Ns => RecordType::NS,
        DnsRecordType::Mx => RecordType::MX,
        DnsRecordType::Txt => RecordType::TXT,
    }
}
