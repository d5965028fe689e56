//! Ticket-number sequences.
//!
//! Ticket numbers are a per-branch, per-day monotonic sequence. The allocation
//! is an atomic increment-and-read against a per-(branch, date) counter record
//! in the store rather than an in-process counter, so numbering stays correct when
//! several service instances issue tickets for the same branch.

use crate::clock::Clock;
use crate::error::{QueueError, QueueResult};
use crate::store::Records;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uqm_types::{BranchCode, TicketNumber};

/// The stored cursor for one (branch, day). `next` is the number the next
/// ticket will receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceRecord {
    pub next: u32,
}

/// Allocates ticket numbers through conditional writes on sequence records.
///
/// Contention on the record is expected (every kiosk of a branch funnels
/// through it), so allocation retries internally up to `retry_limit` before
/// surfacing a `Conflict`. This is the only place in the core that retries on
/// its own behalf.
pub struct TicketSequence {
    records: Arc<dyn Records<SequenceRecord>>,
    retry_limit: u32,
}

impl TicketSequence {
    pub fn new(records: Arc<dyn Records<SequenceRecord>>, retry_limit: u32) -> Self {
        Self {
            records,
            retry_limit,
        }
    }

    /// The next ticket number for `branch` on `day`.
    ///
    /// # Errors
    /// `Conflict` if the sequence record could not be claimed within the
    /// retry limit.
    pub fn next_number(&self, branch: &BranchCode, day: NaiveDate) -> QueueResult<TicketNumber> {
        let key = sequence_key(branch, day);

        for _attempt in 0..self.retry_limit {
            match self.records.find(&key)? {
                Some(current) => {
                    let allocated = current.doc.next;
                    let bumped = SequenceRecord {
                        next: allocated + 1,
                    };
                    match self.records.update(&key, current.version, bumped) {
                        Ok(_) => return Ok(TicketNumber::new(allocated)?),
                        Err(QueueError::Conflict(_)) => continue,
                        Err(other) => return Err(other),
                    }
                }
                None => {
                    // First ticket of the day for this branch; the loser of a
                    // creation race falls through to the read path.
                    match self.records.insert(key.clone(), SequenceRecord { next: 2 }) {
                        Ok(_) => return Ok(TicketNumber::new(1)?),
                        Err(QueueError::Conflict(_)) => continue,
                        Err(other) => return Err(other),
                    }
                }
            }
        }

        Err(QueueError::Conflict(format!(
            "could not allocate a ticket number for {key} after {} attempts",
            self.retry_limit
        )))
    }
}

fn sequence_key(branch: &BranchCode, day: NaiveDate) -> String {
    format!("seq:{branch}:{day}")
}

/// The clock's current date, used to scope sequences and counter pools.
pub fn today(clock: &dyn Clock) -> NaiveDate {
    clock.now().date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryRecords;

    fn sequence() -> TicketSequence {
        TicketSequence::new(Arc::new(MemoryRecords::new()), 5)
    }

    #[test]
    fn numbers_are_sequential_within_a_day() {
        let seq = sequence();
        let branch = BranchCode::new("HQ-01").unwrap();
        let day = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();

        assert_eq!(seq.next_number(&branch, day).unwrap().value(), 1);
        assert_eq!(seq.next_number(&branch, day).unwrap().value(), 2);
        assert_eq!(seq.next_number(&branch, day).unwrap().value(), 3);
    }

    #[test]
    fn sequences_are_scoped_per_branch_and_day() {
        let seq = sequence();
        let hq = BranchCode::new("HQ-01").unwrap();
        let east = BranchCode::new("EAST-02").unwrap();
        let friday = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        let saturday = NaiveDate::from_ymd_opt(2025, 3, 15).unwrap();

        assert_eq!(seq.next_number(&hq, friday).unwrap().value(), 1);
        assert_eq!(seq.next_number(&east, friday).unwrap().value(), 1);
        assert_eq!(seq.next_number(&hq, saturday).unwrap().value(), 1);
        assert_eq!(seq.next_number(&hq, friday).unwrap().value(), 2);
    }
}
