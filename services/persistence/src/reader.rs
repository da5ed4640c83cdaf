//! Journal Reader: sequential replay source with corruption detection
//!
//! Reads every segment in index order, validating CRC32C checksums and
//! gapless sequences. A record cut short at the very end of the newest
//! segment is a torn write from a crash and is reported, not fatal.
//! Anything else that fails to decode is corruption.

use crate::journal::{list_segments, JournalError, JournalRecord};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum ReaderError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Checksum mismatch in {file} at byte offset {offset}: seq={sequence}")]
    ChecksumMismatch {
        file: PathBuf,
        offset: u64,
        sequence: u64,
    },

    #[error("Corruption in {file} at byte offset {offset}: {source}")]
    Corruption {
        file: PathBuf,
        offset: u64,
        #[source]
        source: JournalError,
    },

    #[error("Sequence gap: expected {expected}, got {got}")]
    SequenceGap { expected: u64, got: u64 },
}

// ── Torn Tail ───────────────────────────────────────────────────────

/// Location of an incomplete final record.
#[derive(Debug, Clone, PartialEq)]
pub struct TornTail {
    pub file: PathBuf,
    /// Length of the valid prefix; the file should be cut back to this.
    pub valid_len: u64,
    pub dangling_bytes: u64,
}

#[derive(Debug, Default)]
pub struct JournalScan {
    pub records: Vec<JournalRecord>,
    pub torn_tail: Option<TornTail>,
}

impl JournalScan {
    pub fn last_sequence(&self) -> Option<u64> {
        self.records.last().map(|r| r.sequence)
    }
}

// ── Reader ──────────────────────────────────────────────────────────

pub struct JournalReader {
    segments: Vec<PathBuf>,
}

impl JournalReader {
    pub fn open(dir: &Path) -> Result<Self, ReaderError> {
        let segments = list_segments(dir)?
            .into_iter()
            .map(|(_, path)| path)
            .collect();
        Ok(Self { segments })
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Read and validate every record in every segment.
    pub fn scan(&self) -> Result<JournalScan, ReaderError> {
        let mut scan = JournalScan::default();
        let mut expected: Option<u64> = None;

        for (position, file) in self.segments.iter().enumerate() {
            let is_newest = position + 1 == self.segments.len();
            let data = fs::read(file)?;
            let mut offset = 0usize;

            while offset < data.len() {
                let (record, consumed) = match JournalRecord::decode(&data[offset..]) {
                    Ok(decoded) => decoded,
                    Err(JournalError::Truncated { .. }) if is_newest => {
                        scan.torn_tail = Some(TornTail {
                            file: file.clone(),
                            valid_len: offset as u64,
                            dangling_bytes: (data.len() - offset) as u64,
                        });
                        break;
                    }
                    Err(source) => {
                        return Err(ReaderError::Corruption {
                            file: file.clone(),
                            offset: offset as u64,
                            source,
                        })
                    }
                };

                if !record.verify_checksum() {
                    return Err(ReaderError::ChecksumMismatch {
                        file: file.clone(),
                        offset: offset as u64,
                        sequence: record.sequence,
                    });
                }
                if let Some(expected) = expected {
                    if record.sequence != expected {
                        return Err(ReaderError::SequenceGap {
                            expected,
                            got: record.sequence,
                        });
                    }
                }

                expected = Some(record.sequence + 1);
                offset += consumed;
                scan.records.push(record);
            }
        }

        Ok(scan)
    }
}

// ── Tests ───────────────────────────────────────────────────────────
