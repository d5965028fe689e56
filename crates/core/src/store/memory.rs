//! In-memory record store.
//!
//! The reference [`Records`] implementation: a `BTreeMap` behind an `RwLock`,
//! with conditional updates checked under the write lock. Used by the server
//! binary, the CLI (via snapshots) and every engine test.

use super::{RecordId, Records, Versioned};
use crate::error::{QueueError, QueueResult};
use std::collections::BTreeMap;
use std::sync::RwLock;

/// A single typed collection held in memory.
#[derive(Debug)]
pub struct MemoryRecords<T> {
    inner: RwLock<BTreeMap<RecordId, Versioned<T>>>,
}

impl<T> Default for MemoryRecords<T> {
    fn default() -> Self {
        Self {
            inner: RwLock::new(BTreeMap::new()),
        }
    }
}

impl<T: Clone> MemoryRecords<T> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(BTreeMap::new()),
        }
    }

    /// Rebuilds the collection from a snapshot map, replacing all contents.
    pub fn restore(&self, records: BTreeMap<RecordId, Versioned<T>>) -> QueueResult<()> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        *inner = records;
        Ok(())
    }

    /// Copies the collection out for snapshotting.
    pub fn dump(&self) -> QueueResult<BTreeMap<RecordId, Versioned<T>>> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner.clone())
    }
}

fn poisoned<G>(_: std::sync::PoisonError<G>) -> QueueError {
    QueueError::Store("record store lock poisoned".into())
}

impl<T: Clone + Send + Sync> Records<T> for MemoryRecords<T> {
    fn find(&self, id: &str) -> QueueResult<Option<Versioned<T>>> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner.get(id).cloned())
    }

    fn list(&self) -> QueueResult<Vec<(RecordId, Versioned<T>)>> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner
            .iter()
            .map(|(id, record)| (id.clone(), record.clone()))
            .collect())
    }

    fn insert(&self, id: RecordId, doc: T) -> QueueResult<Versioned<T>> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        if inner.contains_key(&id) {
            return Err(QueueError::Conflict(format!("record {id} already exists")));
        }
        let record = Versioned { version: 1, doc };
        inner.insert(id, record.clone());
        Ok(record)
    }

    fn update(&self, id: &str, expected_version: u64, doc: T) -> QueueResult<Versioned<T>> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        let current = inner
            .get(id)
            .ok_or_else(|| QueueError::not_found("record", id))?;
        if current.version != expected_version {
            return Err(QueueError::Conflict(format!(
                "record {id} is at version {}, expected {expected_version}",
                current.version
            )));
        }
        let record = Versioned {
            version: expected_version + 1,
            doc,
        };
        inner.insert(id.to_owned(), record.clone());
        Ok(record)
    }

    fn delete(&self, id: &str) -> QueueResult<()> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        inner.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_rejects_duplicate_ids() {
        let records = MemoryRecords::new();
        records.insert("a".into(), 1u32).expect("first insert");
        let err = records.insert("a".into(), 2u32).expect_err("duplicate");
        assert!(matches!(err, QueueError::Conflict(_)));
    }

    #[test]
    fn conditional_update_lets_exactly_one_racer_win() {
        let records = MemoryRecords::new();
        let v1 = records.insert("a".into(), 10u32).expect("insert");

        // Two writers read version 1; only the first conditional write applies.
        let winner = records.update("a", v1.version, 11).expect("winner");
        assert_eq!(winner.version, 2);

        let err = records.update("a", v1.version, 12).expect_err("loser");
        assert!(matches!(err, QueueError::Conflict(_)));

        let current = records.find("a").expect("find").expect("present");
        assert_eq!(current.doc, 11);
    }

    #[test]
    fn update_of_missing_record_is_not_found() {
        let records: MemoryRecords<u32> = MemoryRecords::new();
        let err = records.update("ghost", 1, 5).expect_err("missing");
        assert!(matches!(err, QueueError::NotFound { .. }));
    }

    #[test]
    fn delete_is_idempotent() {
        let records = MemoryRecords::new();
        records.insert("a".into(), 1u32).expect("insert");
        records.delete("a").expect("first delete");
        records.delete("a").expect("second delete");
        assert!(records.find("a").expect("find").is_none());
    }
}
