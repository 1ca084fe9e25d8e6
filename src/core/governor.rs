// src/core/governor.rs

use std::collections::HashSet;
use std::sync::Mutex;

use chrono::Utc;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::core::budget::BudgetTracker;
use crate::core::errors::GovernorError;
use crate::core::ledger::NetworkLedger;
use crate::core::models::{
    Decision, DnsRecordType, LedgerEntry, Outcome, RequestDescriptor, Verdict,
};
use crate::core::policy::{DnsPolicy, Mode, Policy};

pub const REASON_GRANTED: &str = "granted within policy and budget";

/// The single gate every outbound DNS query and HTTP request must pass.
///
/// `check` renders a decision from the policy clauses, the static allowlists
/// and the budget, and appends it to the ledger before returning; no caller
/// can observe a decision that is not already durably recorded. `finalize`
/// attaches the execution outcome a collector reports back. Budget counters,
/// sequence numbers and the pending-request set live behind one mutex, so
/// concurrent checks observe a linear history.
pub struct NetworkGovernor {
    policy: Policy,
    state: Mutex<GovernorState>,
}

struct GovernorState {
    budget: BudgetTracker,
    ledger: NetworkLedger,
    /// Granted requests whose outcome has not been reported yet.
    pending: HashSet<Uuid>,
}

impl NetworkGovernor {
    pub fn new(policy: Policy, budget: BudgetTracker, ledger: NetworkLedger) -> Self {
        Self {
            policy,
            state: Mutex::new(GovernorState {
                budget,
                ledger,
                pending: HashSet::new(),
            }),
        }
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Decides whether one descriptor may proceed.
    ///
    /// Clause order, first failing clause wins: HTTP mode clause, DNS policy
    /// clause, method/selector allowlist, budget. A denial is final for this
    /// descriptor; the governor never retries on a collector's behalf.
    pub fn check(&self, descriptor: &RequestDescriptor) -> Result<Decision, GovernorError> {
        let request_id = Uuid::new_v4();
        let policy_denial = self.evaluate_policy(descriptor);

        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        let (verdict, reason) = match policy_denial {
            Some(reason) => (Verdict::Denied, reason),
            None => {
                let admission = state.budget.try_consume(descriptor.kind());
                if admission.granted {
                    (Verdict::Allowed, REASON_GRANTED.to_string())
                } else {
                    (Verdict::Denied, admission.reason.to_string())
                }
            }
        };

        let entry = LedgerEntry {
            sequence: 0, // assigned by the ledger
            timestamp: Utc::now(),
            request_id,
            kind: descriptor.kind(),
            target: descriptor.target().to_string(),
            method: descriptor.method_label(),
            purpose: descriptor.purpose().to_string(),
            decision: verdict,
            reason: reason.clone(),
            outcome: None,
        };
        // Log-before-return: the decision must be durable before the caller
        // sees it.
        let sequence = state.ledger.append(entry)?;

        match verdict {
            Verdict::Allowed => {
                state.pending.insert(request_id);
                debug!(%request_id, sequence, target = descriptor.target(), "request granted");
            }
            Verdict::Denied => {
                info!(%request_id, sequence, target = descriptor.target(), %reason, "request denied");
            }
        }

        Ok(Decision {
            request_id,
            verdict,
            reason,
        })
    }

    /// Attaches the execution outcome of a granted request.
    ///
    /// Exactly one report per grant: an unknown id, a denied id, or a second
    /// report all fail with `UnknownRequest`, which indicates a collector
    /// executed something it was never granted.
    pub fn finalize(&self, request_id: Uuid, outcome: Outcome) -> Result<(), GovernorError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if !state.pending.remove(&request_id) {
            return Err(GovernorError::UnknownRequest(request_id));
        }
        state.ledger.append_outcome(request_id, outcome)
    }

    /// Flushes and closes the ledger, returning the full entry sequence for
    /// manifest aggregation.
    pub fn close(self) -> Result<Vec<LedgerEntry>, GovernorError> {
        let state = self
            .state
            .into_inner()
            .unwrap_or_else(|e| e.into_inner());
        if !state.pending.is_empty() {
            warn!(
                unreported = state.pending.len(),
                "granted requests were never reported back"
            );
        }
        state.ledger.close()
    }

    /// Policy and allowlist clauses. Pure; budget is deliberately excluded
    /// so denials here never consume a slot.
    fn evaluate_policy(&self, descriptor: &RequestDescriptor) -> Option<String> {
        match descriptor {
            RequestDescriptor::Http { url, method, .. } => {
                if self.policy.mode != Mode::LowNoise {
                    return Some("target HTTP is disabled in passive mode".to_string());
                }
                let host = match Url::parse(url).ok().and_then(|u| {
                    u.host_str().map(|h| h.to_ascii_lowercase())
                }) {
                    Some(host) => host,
                    None => return Some(format!("target URL is not parseable: {url}")),
                };
                if !self.policy.is_in_scope(&host) {
                    return Some("host outside target domain scope".to_string());
                }
                if !self.policy.allowed_http_methods.contains(method) {
                    return Some(format!(
                        "HTTP method {method} is not in the allowed method set"
                    ));
                }
                None
            }
            RequestDescriptor::Dns {
                name, record_type, ..
            } => {
                let name = name.trim_end_matches('.').to_ascii_lowercase();
                match self.policy.dns_policy {
                    DnsPolicy::None => {
                        Some("DNS policy is none; DNS queries are disabled".to_string())
                    }
                    DnsPolicy::Minimal => {
                        let apex = self.policy.domain.as_str();
                        let allowed = (name == apex && *record_type == DnsRecordType::Txt)
                            || (name == apex && *record_type == DnsRecordType::Mx)
                            || (name == self.policy.dmarc_name()
                                && *record_type == DnsRecordType::Txt);
                        if allowed {
                            None
                        } else {
                            Some(format!(
                                "DNS query blocked by minimal policy: {name} {record_type}"
                            ))
                        }
                    }
                    DnsPolicy::Full => {
                        if name.contains("._domainkey.") {
                            let Some(selector) = self.policy.dkim_selector_of(&name) else {
                                return Some(format!(
                                    "DKIM selector query not permitted: {name}"
                                ));
                            };
                            if *record_type != DnsRecordType::Txt {
                                return Some(format!(
                                    "DKIM selector queries must be TXT, got {record_type}"
                                ));
                            }
                            if self.policy.mode != Mode::LowNoise {
                                return Some(
                                    "DKIM selector queries require low-noise mode".to_string(),
                                );
                            }
                            if !self
                                .policy
                                .dkim_selector_safelist
                                .iter()
                                .any(|s| s == selector)
                            {
                                return Some(format!(
                                    "DKIM selector not in safelist: {selector}"
                                ));
                            }
                            None
                        } else if !self.policy.is_in_scope(&name) {
                            Some("DNS query outside target domain scope".to_string())
                        } else {
                            None
                        }
                    }
                }
            }
        }
    }
}
