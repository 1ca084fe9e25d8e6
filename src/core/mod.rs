// src/core/mod.rs

// The `core` module is the whole of the network access governor plus the
// collectors that call through it. Leaf modules first.

/// Shared data structures: request descriptors, decisions, ledger entries
/// and the run configuration.
pub mod models;

/// The governor's error taxonomy.
pub mod errors;

/// Mode and DNS-policy resolution into one immutable `Policy` per run.
pub mod policy;

/// Per-minute and lifetime request budgets.
pub mod budget;

/// Append-only, durable ledger of every network-access decision.
pub mod ledger;

/// The single gate every outbound request must pass.
pub mod governor;

/// End-of-run manifest aggregation and sanitization.
pub mod manifest;

/// Governed collectors: the only code that actually touches the network.
pub mod collector;

/// Run orchestration: wires budget, ledger, governor and collectors.
pub mod run;
