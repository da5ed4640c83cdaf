//! Commit Journal: append-only write-ahead log of committed units of work
//!
//! Every unit of work that changes ledger state is written here before it is
//! applied in memory, so the store can be rebuilt by replay after a crash.
//!
//! # Binary Format (per record)
//! ```text
//! [body_len:     u32]
//! [sequence:     u64]
//! [committed_at: i64]   // unix millis
//! [kind:         u8]
//! [payload_len:  u32][payload: bytes]
//! [checksum:     u32]   // CRC32C over sequence+committed_at+kind+payload
//! ```

use crc32c::crc32c;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::error;

/// Fixed bytes in a record body besides the payload.
const BODY_OVERHEAD: usize = 8 + 8 + 1 + 4 + 4;

/// Upper bound on a single body; anything larger is treated as corruption.
const MAX_BODY_LEN: usize = 64 * 1024 * 1024;

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum JournalError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Record truncated while reading {field}")]
    Truncated { field: &'static str },

    #[error("Malformed record: {0}")]
    Malformed(String),

    #[error("Unknown record kind: {0}")]
    UnknownKind(u8),

    #[error("Sequence error: expected {expected}, got {got}")]
    SequenceError { expected: u64, got: u64 },

    #[error("Journal writer failed and no longer accepts records")]
    WriterFailed,
}

// ── Record ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordKind {
    /// Bincode-encoded `ChangeSet` of one committed unit of work
    LedgerCommit = 1,
}

impl RecordKind {
    fn from_byte(byte: u8) -> Result<Self, JournalError> {
        match byte {
            1 => Ok(RecordKind::LedgerCommit),
            other => Err(JournalError::UnknownKind(other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JournalRecord {
    pub sequence: u64,
    pub committed_at: i64,
    pub kind: RecordKind,
    pub payload: Vec<u8>,
    pub checksum: u32,
}

impl JournalRecord {
    pub fn new(sequence: u64, committed_at: i64, kind: RecordKind, payload: Vec<u8>) -> Self {
        let checksum = Self::checksum_of(sequence, committed_at, kind, &payload);
        Self {
            sequence,
            committed_at,
            kind,
            payload,
            checksum,
        }
    }

    fn checksum_of(sequence: u64, committed_at: i64, kind: RecordKind, payload: &[u8]) -> u32 {
        let mut buf = Vec::with_capacity(17 + payload.len());
        buf.extend_from_slice(&sequence.to_le_bytes());
        buf.extend_from_slice(&committed_at.to_le_bytes());
        buf.push(kind as u8);
        buf.extend_from_slice(payload);
        crc32c(&buf)
    }

    pub fn verify_checksum(&self) -> bool {
        self.checksum == Self::checksum_of(self.sequence, self.committed_at, self.kind, &self.payload)
    }

    pub fn encode(&self) -> Vec<u8> {
        let body_len = (BODY_OVERHEAD + self.payload.len()) as u32;
        let mut buf = Vec::with_capacity(4 + body_len as usize);
        buf.extend_from_slice(&body_len.to_le_bytes());
        buf.extend_from_slice(&self.sequence.to_le_bytes());
        buf.extend_from_slice(&self.committed_at.to_le_bytes());
        buf.push(self.kind as u8);
        buf.extend_from_slice(&(self.payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(&self.payload);
        buf.extend_from_slice(&self.checksum.to_le_bytes());
        buf
    }

    /// Decode one record from the front of `data`.
    ///
    /// Returns `(record, bytes_consumed)`. A short buffer yields
    /// `Truncated`, which readers treat as a torn write at the tail.
    pub fn decode(data: &[u8]) -> Result<(Self, usize), JournalError> {
        let mut cursor = Cursor::new(data);
        let body_len = cursor.u32("body_len")? as usize;
        if !(BODY_OVERHEAD..=MAX_BODY_LEN).contains(&body_len) {
            return Err(JournalError::Malformed(format!(
                "implausible body length {}",
                body_len
            )));
        }
        let mut body = Cursor::new(cursor.take(body_len, "body")?);

        let sequence = body.u64("sequence")?;
        let committed_at = body.i64("committed_at")?;
        let kind = RecordKind::from_byte(body.u8("kind")?)?;
        let payload_len = body.u32("payload_len")? as usize;
        if payload_len != body_len - BODY_OVERHEAD {
            return Err(JournalError::Malformed(format!(
                "payload length {} does not match body length {}",
                payload_len, body_len
            )));
        }
        let payload = body.take(payload_len, "payload")?.to_vec();
        let checksum = body.u32("checksum")?;

        let record = Self {
            sequence,
            committed_at,
            kind,
            payload,
            checksum,
        };
        Ok((record, 4 + body_len))
    }
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, len: usize, field: &'static str) -> Result<&'a [u8], JournalError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.buf.len())
            .ok_or(JournalError::Truncated { field })?;
        let bytes = &self.buf[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N], JournalError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, field)?);
        Ok(out)
    }

    fn u8(&mut self, field: &'static str) -> Result<u8, JournalError> {
        Ok(self.array::<1>(field)?[0])
    }

    fn u32(&mut self, field: &'static str) -> Result<u32, JournalError> {
        self.array(field).map(u32::from_le_bytes)
    }

    fn u64(&mut self, field: &'static str) -> Result<u64, JournalError> {
        self.array(field).map(u64::from_le_bytes)
    }

    fn i64(&mut self, field: &'static str) -> Result<i64, JournalError> {
        self.array(field).map(i64::from_le_bytes)
    }
}

// ── Writer Configuration ────────────────────────────────────────────

/// Controls when `fsync` is called after a record is written. Records are
/// always flushed to the OS before `append` returns.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FsyncPolicy {
    EveryWrite,
    EveryN(usize),
    /// Only on rotation and explicit `sync`.
    OnRotation,
}

#[derive(Debug, Clone)]
pub struct JournalConfig {
    pub dir: PathBuf,
    /// Rotate to a new segment once the current one reaches this size.
    pub max_segment_size: u64,
    pub fsync_policy: FsyncPolicy,
}

impl JournalConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            max_segment_size: 64 * 1024 * 1024,
            fsync_policy: FsyncPolicy::EveryWrite,
        }
    }
}

/// Segment file name for `index`.
pub fn segment_path(dir: &Path, index: u64) -> PathBuf {
    dir.join(format!("ledger-{:06}.wal", index))
}

/// All segment files in `dir`, ordered by index.
pub fn list_segments(dir: &Path) -> io::Result<Vec<(u64, PathBuf)>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut segments: Vec<(u64, PathBuf)> = fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .filter_map(|e| {
            let name = e.file_name().to_string_lossy().to_string();
            let index = name
                .strip_prefix("ledger-")?
                .strip_suffix(".wal")?
                .parse::<u64>()
                .ok()?;
            Some((index, e.path()))
        })
        .collect();
    segments.sort_by_key(|(index, _)| *index);
    Ok(segments)
}

// ── Journal Writer ──────────────────────────────────────────────────

/// File operations the writer needs from an open segment.
trait Segment: Write + Send {
    fn truncate(&mut self, len: u64) -> io::Result<()>;
    fn sync_data(&mut self) -> io::Result<()>;
    fn sync_all(&mut self) -> io::Result<()>;
}

impl Segment for File {
    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }

    fn sync_data(&mut self) -> io::Result<()> {
        File::sync_data(self)
    }

    fn sync_all(&mut self) -> io::Result<()> {
        File::sync_all(self)
    }
}

/// Appends records to the newest segment.
///
/// A failed append is cut back off the segment before the error is
/// returned, so the next record lands where the failed one started and
/// takes its sequence number. If the cut itself fails the writer refuses
/// every later record with `WriterFailed`.
pub struct JournalWriter {
    config: JournalConfig,
    segment: Box<dyn Segment>,
    segment_index: u64,
    segment_size: u64,
    next_sequence: u64,
    writes_since_fsync: usize,
    failed: bool,
}

impl JournalWriter {
    /// Open the newest segment for appending, creating the directory if needed.
    pub fn open(config: JournalConfig) -> Result<Self, JournalError> {
        fs::create_dir_all(&config.dir)?;
        let segment_index = list_segments(&config.dir)?
            .last()
            .map(|(index, _)| *index)
            .unwrap_or(0);
        let file = Self::open_segment(&config.dir, segment_index)?;
        let segment_size = file.metadata()?.len();

        Ok(Self {
            config,
            segment: Box::new(file),
            segment_index,
            segment_size,
            next_sequence: 1,
            writes_since_fsync: 0,
            failed: false,
        })
    }

    /// Position the writer after recovery.
    pub fn set_next_sequence(&mut self, sequence: u64) {
        self.next_sequence = sequence;
    }

    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    pub fn current_segment(&self) -> PathBuf {
        segment_path(&self.config.dir, self.segment_index)
    }

    /// Write `payload` as the next record in sequence.
    pub fn commit(
        &mut self,
        kind: RecordKind,
        committed_at: i64,
        payload: Vec<u8>,
    ) -> Result<JournalRecord, JournalError> {
        let record = JournalRecord::new(self.next_sequence, committed_at, kind, payload);
        self.append(&record)?;
        Ok(record)
    }

    pub fn append(&mut self, record: &JournalRecord) -> Result<(), JournalError> {
        if self.failed {
            return Err(JournalError::WriterFailed);
        }
        if record.sequence != self.next_sequence {
            return Err(JournalError::SequenceError {
                expected: self.next_sequence,
                got: record.sequence,
            });
        }
        if self.segment_size >= self.config.max_segment_size {
            self.rotate()?;
        }

        let bytes = record.encode();
        if let Err(e) = self.write_record(&bytes) {
            self.cut_back();
            return Err(e.into());
        }

        self.segment_size += bytes.len() as u64;
        self.next_sequence = record.sequence + 1;
        Ok(())
    }

    /// Write one encoded record and fsync it as the policy requires.
    fn write_record(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.segment.write_all(bytes)?;
        self.segment.flush()?;
        self.writes_since_fsync += 1;

        let fsync = match self.config.fsync_policy {
            FsyncPolicy::EveryWrite => true,
            FsyncPolicy::EveryN(n) => self.writes_since_fsync >= n,
            FsyncPolicy::OnRotation => false,
        };
        if fsync {
            self.segment.sync_data()?;
            self.writes_since_fsync = 0;
        }
        Ok(())
    }

    /// Drop whatever part of a failed record reached the segment.
    fn cut_back(&mut self) {
        if let Err(e) = self.segment.truncate(self.segment_size) {
            error!(
                segment = %self.current_segment().display(),
                valid_len = self.segment_size,
                error = %e,
                "Cannot cut failed record off journal segment, refusing further writes"
            );
            self.failed = true;
        }
    }

    pub fn sync(&mut self) -> Result<(), JournalError> {
        if self.failed {
            return Err(JournalError::WriterFailed);
        }
        self.segment.flush()?;
        self.segment.sync_all()?;
        self.writes_since_fsync = 0;
        Ok(())
    }

    fn rotate(&mut self) -> Result<(), JournalError> {
        self.sync()?;
        self.segment_index += 1;
        let file = Self::open_segment(&self.config.dir, self.segment_index)?;
        self.segment = Box::new(file);
        self.segment_size = 0;
        Ok(())
    }

    fn open_segment(dir: &Path, index: u64) -> Result<File, JournalError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(segment_path(dir, index))?;
        Ok(file)
    }
}

// ── Tests ───────────────────────────────────────────────────────────
