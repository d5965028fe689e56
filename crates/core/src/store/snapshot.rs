//! Snapshot persistence and the store bundle.
//!
//! [`StoreSet`] groups one in-memory collection per document type; the whole
//! record store of a deployment. [`Snapshot`] is its JSON-serialisable form,
//! used by the CLI to persist state between invocations and by tests to seed
//! known worlds. The server binary runs on a fresh `StoreSet`; durable storage
//! is an external collaborator, not part of this core.

use super::memory::MemoryRecords;
use super::{RecordId, Versioned};
use crate::error::{QueueError, QueueResult};
use crate::journey::{HospitalTicket, Room};
use crate::sequence::SequenceRecord;
use crate::ticket::{BankTicket, Counter};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Every collection the engines read and write.
#[derive(Clone, Default)]
pub struct StoreSet {
    pub bank_tickets: Arc<MemoryRecords<BankTicket>>,
    pub counters: Arc<MemoryRecords<Counter>>,
    pub hospital_tickets: Arc<MemoryRecords<HospitalTicket>>,
    pub rooms: Arc<MemoryRecords<Room>>,
    pub sequences: Arc<MemoryRecords<SequenceRecord>>,
}

impl StoreSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store set holding the snapshot's records.
    pub fn from_snapshot(snapshot: Snapshot) -> QueueResult<Self> {
        let stores = Self::new();
        stores.bank_tickets.restore(snapshot.bank_tickets)?;
        stores.counters.restore(snapshot.counters)?;
        stores.hospital_tickets.restore(snapshot.hospital_tickets)?;
        stores.rooms.restore(snapshot.rooms)?;
        stores.sequences.restore(snapshot.sequences)?;
        Ok(stores)
    }

    /// Copies all collections into a serialisable snapshot.
    pub fn to_snapshot(&self) -> QueueResult<Snapshot> {
        Ok(Snapshot {
            bank_tickets: self.bank_tickets.dump()?,
            counters: self.counters.dump()?,
            hospital_tickets: self.hospital_tickets.dump()?,
            rooms: self.rooms.dump()?,
            sequences: self.sequences.dump()?,
        })
    }
}

/// The full record store as a JSON document.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub bank_tickets: BTreeMap<RecordId, Versioned<BankTicket>>,
    #[serde(default)]
    pub counters: BTreeMap<RecordId, Versioned<Counter>>,
    #[serde(default)]
    pub hospital_tickets: BTreeMap<RecordId, Versioned<HospitalTicket>>,
    #[serde(default)]
    pub rooms: BTreeMap<RecordId, Versioned<Room>>,
    #[serde(default)]
    pub sequences: BTreeMap<RecordId, Versioned<SequenceRecord>>,
}

impl Snapshot {
    /// Loads a snapshot from `path`. A missing file is an empty store, so the
    /// first CLI invocation needs no setup step.
    pub fn load(path: &Path) -> QueueResult<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(QueueError::SnapshotRead(e)),
        };
        serde_json::from_str(&contents).map_err(QueueError::SnapshotParse)
    }

    /// Writes the snapshot to `path` as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> QueueResult<()> {
        let contents =
            serde_json::to_string_pretty(self).map_err(QueueError::SnapshotSerialize)?;
        std::fs::write(path, contents).map_err(QueueError::SnapshotWrite)
    }
}
