//! Read-only aggregation over finished records.
//!
//! Reads are snapshots over already-completed tickets; nothing here mutates
//! state or takes locks beyond what the record store needs for a consistent
//! read.

use crate::clock::Clock;
use crate::error::QueueResult;
use crate::journey::HospitalTicket;
use crate::store::Records;
use crate::ticket::{BankTicket, TicketStatus};
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use uqm_types::BranchCode;

/// Served-ticket statistics for one branch on one day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BranchDaySummary {
    pub branch: BranchCode,
    pub day: NaiveDate,
    pub served: u64,
    pub waiting: u64,
    pub avg_wait_secs: u64,
    pub avg_serving_secs: u64,
    pub avg_total_secs: u64,
}

/// Outcome counts over all journey tickets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JourneyOutcomes {
    pub completed: u64,
    pub no_show: u64,
    pub in_progress: u64,
}

/// Aggregation queries over ticket records.
pub struct Reporting {
    bank_tickets: Arc<dyn Records<BankTicket>>,
    hospital_tickets: Arc<dyn Records<HospitalTicket>>,
    clock: Arc<dyn Clock>,
}

impl Reporting {
    pub fn new(
        bank_tickets: Arc<dyn Records<BankTicket>>,
        hospital_tickets: Arc<dyn Records<HospitalTicket>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            bank_tickets,
            hospital_tickets,
            clock,
        }
    }

    /// Averages over today's served tickets for `branch`, plus the current
    /// waiting count. Only tickets with finalised totals contribute to the
    /// averages.
    pub fn branch_day_summary(&self, branch: &BranchCode) -> QueueResult<BranchDaySummary> {
        let day = self.clock.now().date_naive();
        let todays: Vec<BankTicket> = self
            .bank_tickets
            .list()?
            .into_iter()
            .map(|(_, record)| record.doc)
            .filter(|t| &t.branch == branch && t.not_served_at.date_naive() == day)
            .collect();

        let waiting = todays
            .iter()
            .filter(|t| t.status == TicketStatus::NotServed)
            .count() as u64;

        let served: Vec<&BankTicket> = todays
            .iter()
            .filter(|t| t.status == TicketStatus::Served)
            .collect();
        let count = served.len() as u64;

        let avg = |total: u64| if count == 0 { 0 } else { total / count };
        let wait_total: u64 = served.iter().map(|t| t.not_served_secs).sum();
        let serving_total: u64 = served.iter().map(|t| t.serving_secs).sum();
        let total_total: u64 = served.iter().filter_map(|t| t.total_secs).sum();

        Ok(BranchDaySummary {
            branch: branch.clone(),
            day,
            served: count,
            waiting,
            avg_wait_secs: avg(wait_total),
            avg_serving_secs: avg(serving_total),
            avg_total_secs: avg(total_total),
        })
    }

    /// Completed / no-show / in-progress counts over all journey tickets.
    pub fn journey_outcomes(&self) -> QueueResult<JourneyOutcomes> {
        let mut outcomes = JourneyOutcomes {
            completed: 0,
            no_show: 0,
            in_progress: 0,
        };
        for (_, record) in self.hospital_tickets.list()? {
            if record.doc.no_show {
                outcomes.no_show += 1;
            } else if record.doc.completed {
                outcomes.completed += 1;
            } else {
                outcomes.in_progress += 1;
            }
        }
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::{CoreConfig, DEFAULT_CAS_RETRY_LIMIT};
    use crate::engines::BankTicketEngine;
    use crate::journey::JourneyCatalogue;
    use crate::store::StoreSet;
    use crate::ticket::Counter;
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    #[test]
    fn summary_averages_served_tickets_and_counts_waiting() {
        let t0 = Utc.with_ymd_and_hms(2025, 3, 14, 9, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::starting_at(t0));
        let stores = StoreSet::new();
        let cfg = Arc::new(
            CoreConfig::new(JourneyCatalogue::default(), DEFAULT_CAS_RETRY_LIMIT).unwrap(),
        );
        let branch = BranchCode::new("HQ-01").unwrap();
        let queue_id = Uuid::new_v4();
        let engine = BankTicketEngine::new(
            stores.bank_tickets.clone(),
            stores.counters.clone(),
            stores.sequences.clone(),
            clock.clone(),
            cfg,
        );
        let reporting = Reporting::new(
            stores.bank_tickets.clone(),
            stores.hospital_tickets.clone(),
            clock.clone(),
        );

        let counter = Counter {
            id: Uuid::new_v4(),
            branch: branch.clone(),
            counter_number: 1,
            user_id: Uuid::new_v4(),
            available: true,
            queue_id,
            created_at: clock.now(),
        };
        stores
            .counters
            .insert(counter.id.to_string(), counter.clone())
            .expect("insert counter");

        // Served ticket: 30s wait, 60s serve.
        let served = engine.issue(queue_id, branch.clone()).expect("issue");
        clock.advance_secs(30);
        engine
            .assign_to_counter(served.id, counter.id)
            .expect("assign");
        clock.advance_secs(60);
        engine.serve(served.id).expect("serve");

        // Still waiting.
        engine.issue(queue_id, branch.clone()).expect("issue");

        let summary = reporting.branch_day_summary(&branch).expect("summary");
        assert_eq!(summary.served, 1);
        assert_eq!(summary.waiting, 1);
        assert_eq!(summary.avg_wait_secs, 30);
        assert_eq!(summary.avg_serving_secs, 60);
        assert_eq!(summary.avg_total_secs, 90);
    }
}
