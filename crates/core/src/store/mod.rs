//! Record store abstraction.
//!
//! The core never talks to a concrete database. It consumes a narrow,
//! collection-per-type interface ([`Records`]) whose only non-trivial
//! guarantee is the conditional update: every stored document is wrapped in a
//! [`Versioned`] envelope, and `update` applies only when the caller's
//! expected version still matches. Two concurrent transitions on the same
//! record therefore cannot both apply; the loser gets a `Conflict` instead of
//! silently overwriting the winner's timestamps.

pub mod memory;
pub mod snapshot;

use crate::error::QueueResult;
use serde::{Deserialize, Serialize};

pub use memory::MemoryRecords;
pub use snapshot::{Snapshot, StoreSet};

/// Store document key. Plain strings so composite keys (e.g. per-branch,
/// per-day sequence records) use the same interface as UUID-keyed entities.
pub type RecordId = String;

/// A stored document plus its monotonic version.
///
/// The version increments on every successful write and is the precondition
/// for conditional updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Versioned<T> {
    pub version: u64,
    pub doc: T,
}

/// One typed collection of documents.
///
/// Implementations must make `insert` and `update` atomic with respect to each
/// other; the engines build every mutating operation as read → validate →
/// conditional write on top of that.
pub trait Records<T: Clone>: Send + Sync {
    /// The document with the given id, if present.
    fn find(&self, id: &str) -> QueueResult<Option<Versioned<T>>>;

    /// All documents, with their ids. Filter predicates stay in the core as
    /// pure functions; the store is not assumed to have a query language.
    fn list(&self) -> QueueResult<Vec<(RecordId, Versioned<T>)>>;

    /// Creates the document at version 1.
    ///
    /// # Errors
    /// `Conflict` if a document with this id already exists.
    fn insert(&self, id: RecordId, doc: T) -> QueueResult<Versioned<T>>;

    /// Replaces the document only if its current version equals
    /// `expected_version`.
    ///
    /// # Errors
    /// - `Conflict` if the version moved under the caller (racing writer won).
    /// - `NotFound` if the document vanished since it was read.
    fn update(&self, id: &str, expected_version: u64, doc: T) -> QueueResult<Versioned<T>>;

    /// Removes the document. Absent ids are not an error; deletion is
    /// administrative and idempotent.
    fn delete(&self, id: &str) -> QueueResult<()>;
}

/// Index of the unique element satisfying `pred`, or `None`.
///
/// The "find the open entry in a list" pattern, generalised: callers hold an
/// invariant that at most one element matches, so when several do (the
/// invariant was violated by external interference) this resolves to the most
/// recent, the last matching index in an append-only list.
pub fn unique_open_index<T>(items: &[T], pred: impl Fn(&T) -> bool) -> Option<usize> {
    items
        .iter()
        .enumerate()
        .filter(|(_, item)| pred(item))
        .map(|(idx, _)| idx)
        .next_back()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unique_open_index_resolves_to_most_recent_match() {
        let items = [1, 5, 2, 5, 3];
        assert_eq!(unique_open_index(&items, |n| *n == 5), Some(3));
        assert_eq!(unique_open_index(&items, |n| *n == 9), None);
    }
}
