//! Recovery Flow: rebuild ledger state by journal replay
//!
//! Recovery process:
//! 1. Scan every segment, validating checksums and sequences
//! 2. Cut a torn final record back to the last complete one
//! 3. Decode each commit record and apply it to an empty state
//! 4. Report where the writer must resume

use crate::journal::{JournalRecord, RecordKind};
use crate::reader::{JournalReader, ReaderError};
use crate::state::{ChangeSet, LedgerState};
use std::fs::OpenOptions;
use std::path::Path;
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum RecoveryError {
    #[error("Reader error: {0}")]
    Reader(#[from] ReaderError),

    #[error("Cannot decode commit at sequence {sequence}: {reason}")]
    Decode { sequence: u64, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// ── Outcome ─────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct Recovered {
    pub state: LedgerState,
    /// Sequence the writer must use for its next record
    pub next_sequence: u64,
    pub replayed: u64,
    /// Bytes dropped from a torn final record, if any
    pub truncated_bytes: u64,
    pub elapsed_ms: u64,
}

/// Decode a commit record's payload.
pub fn decode_commit(record: &JournalRecord) -> Result<ChangeSet, RecoveryError> {
    match record.kind {
        RecordKind::LedgerCommit => {
            bincode::deserialize(&record.payload).map_err(|e| RecoveryError::Decode {
                sequence: record.sequence,
                reason: e.to_string(),
            })
        }
    }
}

/// Replay the journal in `dir` onto an empty state.
pub fn recover(dir: &Path) -> Result<Recovered, RecoveryError> {
    let started = Instant::now();
    let scan = JournalReader::open(dir)?.scan()?;

    let mut truncated_bytes = 0;
    if let Some(tail) = &scan.torn_tail {
        warn!(
            file = %tail.file.display(),
            valid_len = tail.valid_len,
            dangling_bytes = tail.dangling_bytes,
            "Discarding torn journal tail"
        );
        OpenOptions::new()
            .write(true)
            .open(&tail.file)?
            .set_len(tail.valid_len)?;
        truncated_bytes = tail.dangling_bytes;
    }

    let mut state = LedgerState::default();
    let mut replayed = 0u64;
    for record in &scan.records {
        state.apply(decode_commit(record)?);
        replayed += 1;
    }

    let next_sequence = scan.last_sequence().map_or(1, |last| last + 1);
    let elapsed_ms = started.elapsed().as_millis() as u64;
    info!(
        replayed,
        next_sequence,
        accounts = state.accounts.len(),
        orders = state.orders.len(),
        elapsed_ms,
        "Ledger recovered from journal"
    );

    Ok(Recovered {
        state,
        next_sequence,
        replayed,
        truncated_bytes,
        elapsed_ms,
    })
}

// ── Tests ───────────────────────────────────────────────────────────
