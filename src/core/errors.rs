// src/core/errors.rs

use thiserror::Error;
use uuid::Uuid;

/// Failures the governor and its artifacts can raise.
///
/// Policy and budget denials are deliberately *not* here: a denial is an
/// ordinary `Decision` recorded in the ledger and handed back to the
/// collector. Everything in this enum is either a startup failure or a bug
/// that voids the run's auditability guarantee.
#[derive(Debug, Error)]
pub enum GovernorError {
    /// Unrecognized mode or dns-policy value. Fatal at startup.
    #[error("invalid policy value: {0}")]
    InvalidPolicy(String),

    /// A collector reported an outcome for a request it was never granted,
    /// or reported the same request twice. Indicates a governor-bypass bug.
    #[error("outcome reported for unknown or already finalized request {0}")]
    UnknownRequest(Uuid),

    /// Durable append to the ledger failed. The run cannot continue
    /// unaudited.
    #[error("ledger write failed: {0}")]
    LedgerWrite(#[source] std::io::Error),

    /// The end-of-run manifest could not be written; the run is incomplete
    /// without it.
    #[error("manifest write failed: {0}")]
    ManifestWrite(#[source] std::io::Error),
}
