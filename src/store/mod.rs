//! Catalog Store
//!
//! Durable mapping from record id to enrichment status and payload.
//! Discovery only ever calls [`CatalogStore::ensure`], which never touches an
//! existing record, so rediscovery cannot regress a finished record.

pub mod persistence;

use crate::enrich::{Outcome, StatusPolicy};
use crate::error::StorageError;
use crate::types::{RecordId, StatusCode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use persistence::SledCatalogStore;

/// Record: one catalog entry keyed by external identifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    /// Last enrichment status; `None` until the first attempt
    pub status: Option<StatusCode>,
    /// Response body, present only when `status` is the success code
    pub payload: Option<Vec<u8>>,
    /// Time of the last `record_result` write
    pub updated_at: Option<DateTime<Utc>>,
}

impl Record {
    pub fn new_pending(id: RecordId) -> Self {
        Self {
            id,
            status: None,
            payload: None,
            updated_at: None,
        }
    }

    /// Pending means never attempted or last attempt was non-terminal.
    pub fn is_pending(&self, policy: &StatusPolicy) -> bool {
        !policy.is_terminal(self.status)
    }
}

/// Record counts by state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CatalogStats {
    pub total: usize,
    /// Never attempted
    pub unattempted: usize,
    pub succeeded: usize,
    pub absent: usize,
    /// Attempted with a non-terminal status
    pub retryable: usize,
}

impl CatalogStats {
    pub fn pending(&self) -> usize {
        self.unattempted + self.retryable
    }

    pub(crate) fn count(&mut self, status: Option<StatusCode>, policy: &StatusPolicy) {
        self.total += 1;
        match status.map(|code| policy.classify(code)) {
            None => self.unattempted += 1,
            Some(Outcome::Success) => self.succeeded += 1,
            Some(Outcome::Absent) => self.absent += 1,
            Some(Outcome::Retry) => self.retryable += 1,
        }
    }
}

/// Catalog Store interface
///
/// Every mutating call is durable when it returns. The store owns the status
/// policy: it decides which stored statuses are terminal and which results
/// keep their payload.
pub trait CatalogStore: Send + Sync {
    /// Success and definitive-absence codes this store classifies with.
    fn policy(&self) -> StatusPolicy;

    /// Insert a pending record for `id` unless one exists. Returns true when inserted.
    fn ensure(&self, id: RecordId) -> Result<bool, StorageError>;

    /// Batch form of [`ensure`](Self::ensure) with a single commit. Returns the number inserted.
    fn ensure_many(&self, ids: &[RecordId]) -> Result<usize, StorageError>;

    /// Records with no status or a non-terminal status, ascending by id.
    fn list_pending(&self) -> Result<Vec<Record>, StorageError>;

    /// Overwrite the status of `id`. The payload is kept only for the success code.
    fn record_result(
        &self,
        id: RecordId,
        status: StatusCode,
        payload: Option<Vec<u8>>,
    ) -> Result<(), StorageError>;

    fn get(&self, id: RecordId) -> Result<Option<Record>, StorageError>;

    fn stats(&self) -> Result<CatalogStats, StorageError>;
}
