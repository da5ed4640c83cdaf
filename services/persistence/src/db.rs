//! LedgerDb: the journaled, in-process Ledger Store
//!
//! Units of work are serialized by one lock, which gives them serializable
//! isolation: the conditional holds in `reserve_cash` / `reserve_asset`
//! behave like a guarded `UPDATE ... WHERE available >= amount`. A unit's
//! change set is journaled before it is applied, and a failed journal write
//! aborts the unit.

use crate::journal::{JournalConfig, JournalError, JournalWriter, RecordKind};
use crate::recovery::{self, RecoveryError};
use crate::state::{ChangeSet, LedgerState};
use crate::store::{LedgerStore, LedgerTx};
use crate::unit::UnitOfWork;
use chrono::Utc;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, error};
use types::errors::LedgerError;

#[derive(Error, Debug)]
pub enum OpenError {
    #[error("Recovery failed: {0}")]
    Recovery(#[from] RecoveryError),

    #[error("Journal error: {0}")]
    Journal(#[from] JournalError),
}

struct Inner {
    state: LedgerState,
    journal: Option<JournalWriter>,
}

impl Inner {
    fn commit(&mut self, changes: ChangeSet) -> Result<(), LedgerError> {
        if let Some(journal) = self.journal.as_mut() {
            let payload = bincode::serialize(&changes)
                .map_err(|e| LedgerError::Storage(format!("cannot encode change set: {}", e)))?;
            let record = journal
                .commit(RecordKind::LedgerCommit, Utc::now().timestamp_millis(), payload)
                .map_err(|e| {
                    error!(error = %e, "Journal write failed, unit of work aborted");
                    LedgerError::Storage(format!("journal write failed: {}", e))
                })?;
            debug!(sequence = record.sequence, bytes = record.payload.len(), "Unit of work journaled");
        }
        self.state.apply(changes);
        Ok(())
    }
}

pub struct LedgerDb {
    inner: Mutex<Inner>,
}

impl LedgerDb {
    /// A store without a journal. State is lost when dropped.
    pub fn in_memory() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: LedgerState::default(),
                journal: None,
            }),
        }
    }

    /// Recover state from the journal in `config.dir`, then keep journaling.
    pub fn open(config: JournalConfig) -> Result<Self, OpenError> {
        let recovered = recovery::recover(&config.dir)?;
        let mut journal = JournalWriter::open(config)?;
        journal.set_next_sequence(recovered.next_sequence);
        Ok(Self {
            inner: Mutex::new(Inner {
                state: recovered.state,
                journal: Some(journal),
            }),
        })
    }

    /// Copy of the committed state, for inspection and audits.
    pub fn snapshot(&self) -> Result<LedgerState, LedgerError> {
        Ok(self.lock()?.state.clone())
    }

    /// Flush and fsync the journal.
    pub fn sync(&self) -> Result<(), LedgerError> {
        let mut inner = self.lock()?;
        if let Some(journal) = inner.journal.as_mut() {
            journal
                .sync()
                .map_err(|e| LedgerError::Storage(format!("journal sync failed: {}", e)))?;
        }
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, LedgerError> {
        self.inner
            .lock()
            .map_err(|_| LedgerError::Storage("ledger lock poisoned".to_string()))
    }
}

impl LedgerStore for LedgerDb {
    fn atomic<T, F>(&self, work: F) -> Result<T, LedgerError>
    where
        F: FnOnce(&mut dyn LedgerTx) -> Result<T, LedgerError>,
    {
        let mut inner = self.lock()?;
        let mut unit = UnitOfWork::new(&inner.state, Utc::now());
        let value = work(&mut unit)?;
        let changes = unit.into_changes();
        if !changes.is_empty() {
            inner.commit(changes)?;
        }
        Ok(value)
    }
}
