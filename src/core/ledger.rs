// src/core/ledger.rs

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

use crate::core::errors::GovernorError;
use crate::core::models::{LedgerEntry, Outcome, Verdict};

pub const JOURNAL_FILE: &str = "network_ledger.jsonl";
pub const EXPORT_FILE: &str = "network_ledger.json";

/// One line of the durable journal. Outcome attachment is realized as a
/// follow-up append, never as a rewrite of the decision line.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum JournalEvent {
    Decision(LedgerEntry),
    Outcome { request_id: Uuid, outcome: Outcome },
}

/// Append-only, durable record of every network-access decision.
///
/// Every append is flushed and synced before returning, so a crash mid-run
/// leaves the journal consistent with all decisions made up to that point.
/// `close` exports the merged, ordered entry array (`network_ledger.json`)
/// exactly once; the journal itself is never rewritten or reordered.
#[derive(Debug)]
pub struct NetworkLedger {
    writer: BufWriter<File>,
    export_path: PathBuf,
    entries: Vec<LedgerEntry>,
    by_request: HashMap<Uuid, usize>,
}

impl NetworkLedger {
    /// Creates the journal inside `raw_dir` (which must already exist).
    pub fn create(raw_dir: &Path) -> Result<Self, GovernorError> {
        let journal_path = raw_dir.join(JOURNAL_FILE);
        let file = File::create(&journal_path).map_err(GovernorError::LedgerWrite)?;
        info!(path = %journal_path.display(), "network ledger opened");
        Ok(Self {
            writer: BufWriter::new(file),
            export_path: raw_dir.join(EXPORT_FILE),
            entries: Vec::new(),
            by_request: HashMap::new(),
        })
    }

    /// Appends one decision entry, assigning its sequence number.
    ///
    /// Sequence numbers start at 1 and are gap-free; the governor's critical
    /// section guarantees no two appends interleave.
    pub fn append(&mut self, mut entry: LedgerEntry) -> Result<u64, GovernorError> {
        entry.sequence = self.entries.len() as u64 + 1;
        let sequence = entry.sequence;
        self.write_event(&JournalEvent::Decision(entry.clone()))?;
        self.by_request.insert(entry.request_id, self.entries.len());
        self.entries.push(entry);
        Ok(sequence)
    }

    /// Attaches an execution outcome to an already-recorded allowed entry.
    pub fn append_outcome(
        &mut self,
        request_id: Uuid,
        outcome: Outcome,
    ) -> Result<(), GovernorError> {
        let index = *self
            .by_request
            .get(&request_id)
            .ok_or(GovernorError::UnknownRequest(request_id))?;
        let entry = &self.entries[index];
        if entry.decision == Verdict::Denied || entry.outcome.is_some() {
            return Err(GovernorError::UnknownRequest(request_id));
        }
        self.write_event(&JournalEvent::Outcome {
            request_id,
            outcome: outcome.clone(),
        })?;
        self.entries[index].outcome = Some(outcome);
        Ok(())
    }

    /// The ordered entry sequence with outcomes merged in.
    pub fn read_all(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// Flushes the journal and writes the ordered entry array artifact,
    /// consuming the ledger. Returns the entries for manifest aggregation.
    pub fn close(mut self) -> Result<Vec<LedgerEntry>, GovernorError> {
        self.writer.flush().map_err(GovernorError::LedgerWrite)?;
        let export = File::create(&self.export_path).map_err(GovernorError::LedgerWrite)?;
        let mut export = BufWriter::new(export);
        serde_json::to_writer_pretty(&mut export, &self.entries)
            .map_err(|e| GovernorError::LedgerWrite(e.into()))?;
        export.flush().map_err(GovernorError::LedgerWrite)?;
        info!(entries = self.entries.len(), path = %self.export_path.display(), "network ledger closed");
        Ok(self.entries)
    }

    /// Replays a journal file into the ordered entry sequence. Used to
    /// recover the decision history of a crashed run.
    pub(crate) fn replay(journal_path: &Path) -> Result<Vec<LedgerEntry>, GovernorError> {
        let file = File::open(journal_path).map_err(GovernorError::LedgerWrite)?;
        let mut entries: Vec<LedgerEntry> = Vec::new();
        let mut by_request: HashMap<Uuid, usize> = HashMap::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(GovernorError::LedgerWrite)?;
            if line.trim().is_empty() {
                continue;
            }
            let event: JournalEvent =
                serde_json::from_str(&line).map_err(|e| GovernorError::LedgerWrite(e.into()))?;
            match event {
                JournalEvent::Decision(entry) => {
                    by_request.insert(entry.request_id, entries.len());
                    entries.push(entry);
                }
                JournalEvent::Outcome {
                    request_id,
                    outcome,
                } => {
                    let index = *by_request
                        .get(&request_id)
                        .ok_or(GovernorError::UnknownRequest(request_id))?;
                    entries[index].outcome = Some(outcome);
                }
            }
        }
        Ok(entries)
    }

    fn write_event(&mut self, event: &JournalEvent) -> Result<(), GovernorError> {
        let mut line =
            serde_json::to_string(event).map_err(|e| GovernorError::LedgerWrite(e.into()))?;
        line.push('\n');
        self.writer
            .write_all(line.as_bytes())
            .map_err(GovernorError::LedgerWrite)?;
        // Durability before control returns to the caller: flush the buffer
        // and push the bytes to storage.
        self.writer.flush().map_err(GovernorError::LedgerWrite)?;
        self.writer
            .get_ref()
            .sync_data()
            .map_err(GovernorError::LedgerWrite)?;
        debug!("ledger event flushed");
        Ok(())
    }
}
