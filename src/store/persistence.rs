//! Sled-backed catalog.
//!
//! One tree, `records`, keyed by big-endian record id so iteration order is
//! ascending id order. Values are bincode-encoded [`StoredRecord`]s.
//! Insert-if-absent is a compare-and-swap against an empty slot; every
//! mutating operation ends in a flush.

use super::{CatalogStats, CatalogStore, Record};
use crate::enrich::{Outcome, StatusPolicy};
use crate::error::StorageError;
use crate::types::{record_id_from_key, record_key, RecordId, StatusCode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

const RECORDS_TREE: &str = "records";

/// On-disk value for a record. The id lives in the key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredRecord {
    status: Option<StatusCode>,
    payload: Option<Vec<u8>>,
    updated_at: Option<DateTime<Utc>>,
}

impl StoredRecord {
    fn into_record(self, id: RecordId) -> Record {
        Record {
            id,
            status: self.status,
            payload: self.payload,
            updated_at: self.updated_at,
        }
    }
}

pub struct SledCatalogStore {
    db: sled::Db,
    records: sled::Tree,
    policy: StatusPolicy,
}

impl SledCatalogStore {
    /// Open (or create) the catalog at `path`.
    pub fn open(path: &Path, policy: StatusPolicy) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let db = sled::open(path)?;
        Self::from_db(db, policy)
    }

    pub fn from_db(db: sled::Db, policy: StatusPolicy) -> Result<Self, StorageError> {
        let records = db.open_tree(RECORDS_TREE)?;
        Ok(Self {
            db,
            records,
            policy,
        })
    }

    /// Block until all writes are on disk.
    pub fn flush(&self) -> Result<(), StorageError> {
        self.records.flush()?;
        Ok(())
    }

    fn insert_if_absent(&self, id: RecordId) -> Result<bool, StorageError> {
        let value = bincode::serialize(&StoredRecord::default())?;
        let swapped =
            self.records
                .compare_and_swap(record_key(id), None::<&[u8]>, Some(value))?;
        Ok(swapped.is_ok())
    }

    fn decode(key: &[u8], value: &[u8]) -> Result<Record, StorageError> {
        let id = record_id_from_key(key).ok_or(StorageError::CorruptKey(key.len()))?;
        let stored: StoredRecord = bincode::deserialize(value)?;
        Ok(stored.into_record(id))
    }

    fn for_each_record(
        &self,
        mut visit: impl FnMut(Record) -> Result<(), StorageError>,
    ) -> Result<(), StorageError> {
        for entry in self.records.iter() {
            let (key, value) = entry?;
            visit(Self::decode(&key, &value)?)?;
        }
        Ok(())
    }
}

impl CatalogStore for SledCatalogStore {
    fn policy(&self) -> StatusPolicy {
        self.policy
    }

    fn ensure(&self, id: RecordId) -> Result<bool, StorageError> {
        let inserted = self.insert_if_absent(id)?;
        self.flush()?;
        Ok(inserted)
    }

    fn ensure_many(&self, ids: &[RecordId]) -> Result<usize, StorageError> {
        let mut inserted = 0;
        for id in ids {
            if self.insert_if_absent(*id)? {
                inserted += 1;
            }
        }
        self.flush()?;
        debug!(offered = ids.len(), inserted, "Catalog batch committed");
        Ok(inserted)
    }

    fn list_pending(&self) -> Result<Vec<Record>, StorageError> {
        let mut pending = Vec::new();
        self.for_each_record(|record| {
            if record.is_pending(&self.policy) {
                pending.push(record);
            }
            Ok(())
        })?;
        Ok(pending)
    }

    fn record_result(
        &self,
        id: RecordId,
        status: StatusCode,
        payload: Option<Vec<u8>>,
    ) -> Result<(), StorageError> {
        let key = record_key(id);
        if !self.records.contains_key(key)? {
            return Err(StorageError::UnknownRecord(id));
        }

        let payload = match self.policy.classify(status) {
            Outcome::Success => Some(payload.ok_or_else(|| StorageError::InvalidRecord {
                id,
                message: format!("status {} requires a payload", status),
            })?),
            Outcome::Absent | Outcome::Retry => None,
        };

        let stored = StoredRecord {
            status: Some(status),
            payload,
            updated_at: Some(Utc::now()),
        };
        self.records.insert(key, bincode::serialize(&stored)?)?;
        self.flush()
    }

    fn get(&self, id: RecordId) -> Result<Option<Record>, StorageError> {
        let key = record_key(id);
        match self.records.get(key)? {
            Some(value) => Ok(Some(Self::decode(&key, &value)?)),
            None => Ok(None),
        }
    }

    fn stats(&self) -> Result<CatalogStats, StorageError> {
        let mut stats = CatalogStats::default();
        self.for_each_record(|record| {
            stats.count(record.status, &self.policy);
            Ok(())
        })?;
        Ok(stats)
    }
}

impl Drop for SledCatalogStore {
    fn drop(&mut self) {
        if let Err(e) = self.db.flush() {
            tracing::warn!("Failed to flush catalog on close: {}", e);
        }
    }
}
