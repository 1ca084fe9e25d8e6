// src/core/models.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use strum::Display;
use uuid::Uuid;

use crate::core::budget::BudgetConfig;

// --- Request Descriptors ---

/// The kind of outbound contact a collector is asking permission for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Display, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RequestKind {
    Dns,
    Http,
}

/// HTTP verbs a collector may request. Anything outside this set is
/// unrepresentable, so it cannot reach the governor at all.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Display, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum HttpMethod {
    Head,
    Get,
}

/// DNS record types the tool knows how to ask for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Display, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum DnsRecordType {
    A,
    Aaaa,
    Ns,
    Mx,
    Txt,
}

/// A collector's request for permission to touch the network.
///
/// Collectors never talk to the network directly; they build one of these,
/// submit it to the governor, and only act if the returned decision allows it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestDescriptor {
    Dns {
        /// Fully qualified query name, e.g. `_dmarc.example.com`.
        name: String,
        record_type: DnsRecordType,
        /// Free-text collector identifier, e.g. "dns-mail-profile".
        purpose: String,
    },
    Http {
        url: String,
        method: HttpMethod,
        purpose: String,
    },
}

impl RequestDescriptor {
    pub fn dns(name: impl Into<String>, record_type: DnsRecordType, purpose: &str) -> Self {
        Self::Dns {
            name: name.into(),
            record_type,
            purpose: purpose.to_string(),
        }
    }

    pub fn http(url: impl Into<String>, method: HttpMethod, purpose: &str) -> Self {
        Self::Http {
            url: url.into(),
            method,
            purpose: purpose.to_string(),
        }
    }

    pub fn kind(&self) -> RequestKind {
        match self {
            Self::Dns { .. } => RequestKind::Dns,
            Self::Http { .. } => RequestKind::Http,
        }
    }

    /// The domain or URL the request is aimed at, as recorded in the ledger.
    pub fn target(&self) -> &str {
        match self {
            Self::Dns { name, .. } => name,
            Self::Http { url, .. } => url,
        }
    }

    /// HTTP verb or DNS record type as a ledger-friendly label.
    pub fn method_label(&self) -> String {
        match self {
            Self::Dns { record_type, .. } => record_type.to_string(),
            Self::Http { method, .. } => method.to_string(),
        }
    }

    pub fn purpose(&self) -> &str {
        match self {
            Self::Dns { purpose, .. } | Self::Http { purpose, .. } => purpose,
        }
    }
}

// --- Decisions and Outcomes ---

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Display, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Verdict {
    Allowed,
    Denied,
}

/// What the governor told a collector about one descriptor.
///
/// A denial is final for this descriptor; retrying, backing off, or giving up
/// is the collector's call, never the governor's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub request_id: Uuid,
    pub verdict: Verdict,
    /// The policy or budget clause that produced the verdict.
    pub reason: String,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        self.verdict == Verdict::Allowed
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Display, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Failure,
    Timeout,
}

/// Execution result a collector reports back after performing a granted
/// request. Denied requests never have one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Outcome {
    pub status: OutcomeStatus,
    pub duration_ms: u64,
    /// HTTP status code or error text, when there is one worth keeping.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Outcome {
    pub fn success(duration_ms: u64, detail: Option<String>) -> Self {
        Self {
            status: OutcomeStatus::Success,
            duration_ms,
            detail,
        }
    }

    pub fn failure(duration_ms: u64, error: impl Into<String>) -> Self {
        Self {
            status: OutcomeStatus::Failure,
            duration_ms,
            detail: Some(error.into()),
        }
    }

    pub fn timeout(duration_ms: u64) -> Self {
        Self {
            status: OutcomeStatus::Timeout,
            duration_ms,
            detail: None,
        }
    }
}

// --- Ledger Entries ---

/// One row of the append-only network ledger.
///
/// Exactly one entry exists per submitted descriptor, denied ones included.
/// The ledger assigns `sequence` at append time; `outcome` is attached later
/// by a follow-up journal event and is absent for denied entries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LedgerEntry {
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub request_id: Uuid,
    pub kind: RequestKind,
    pub target: String,
    pub method: String,
    pub purpose: String,
    pub decision: Verdict,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
}

// --- Run Configuration ---

/// Everything a run needs beyond the resolved policy. Constructed once at
/// startup and read-only afterwards.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub domain: String,
    pub out_dir: PathBuf,
    pub budget: BudgetConfig,
    pub allow_get: bool,
    pub timeout_seconds: u64,
    pub run_id: Uuid,
    pub shodan_key: Option<String>,
    pub censys_id: Option<String>,
    pub censys_secret: Option<String>,
}
