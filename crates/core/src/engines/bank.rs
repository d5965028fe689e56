//! Bank ticket state machine.
//!
//! Enforces the transition diagram `NotServed → Serving → {Hold ⇄ Serving} →
//! Served` for a single ticket, converting elapsed wall-clock time into the
//! duration bucket of the state being left on every transition.
//!
//! Counter exclusivity is handled here as well: claiming a counter is a single
//! conditional write on the counter record (claim only if `available`), so two
//! tickets racing for the same counter resolve to exactly one success and one
//! `Conflict`.

use crate::clock::Clock;
use crate::config::CoreConfig;
use crate::duration::elapsed_seconds;
use crate::error::{QueueError, QueueResult};
use crate::sequence::{today, SequenceRecord, TicketSequence};
use crate::store::{Records, Versioned};
use crate::ticket::{BankTicket, Counter, TicketStatus};
use std::sync::Arc;
use uqm_types::BranchCode;
use uuid::Uuid;

/// State-machine operations for bank tickets.
pub struct BankTicketEngine {
    tickets: Arc<dyn Records<BankTicket>>,
    counters: Arc<dyn Records<Counter>>,
    sequence: TicketSequence,
    clock: Arc<dyn Clock>,
    cfg: Arc<CoreConfig>,
}

impl BankTicketEngine {
    pub fn new(
        tickets: Arc<dyn Records<BankTicket>>,
        counters: Arc<dyn Records<Counter>>,
        sequences: Arc<dyn Records<SequenceRecord>>,
        clock: Arc<dyn Clock>,
        cfg: Arc<CoreConfig>,
    ) -> Self {
        let sequence = TicketSequence::new(sequences, cfg.cas_retry_limit());
        Self {
            tickets,
            counters,
            sequence,
            clock,
            cfg,
        }
    }

    /// Issues a ticket in `NotServed` with the next sequence number for
    /// (branch, today).
    pub fn issue(&self, queue_id: Uuid, branch: BranchCode) -> QueueResult<BankTicket> {
        let now = self.clock.now();
        let number = self.sequence.next_number(&branch, today(self.clock.as_ref()))?;
        let ticket = BankTicket::issued(number, queue_id, branch, now);

        let stored = self.tickets.insert(ticket.id.to_string(), ticket)?;
        tracing::info!(ticket = %stored.doc.id, number = %stored.doc.ticket_number, "issued bank ticket");
        Ok(stored.doc)
    }

    /// Starts (or resumes) serving the ticket at `counter_id`.
    ///
    /// Valid from `NotServed` (closes the waiting bucket) or `Hold` (closes
    /// the hold bucket). Binds the counter and marks it unavailable; when a
    /// held ticket resumes at the counter it already occupies, no fresh claim
    /// is needed.
    pub fn assign_to_counter(&self, ticket_id: Uuid, counter_id: Uuid) -> QueueResult<BankTicket> {
        let (key, current) = self.load_ticket(ticket_id)?;
        let ticket = &current.doc;

        match ticket.status {
            TicketStatus::NotServed | TicketStatus::Hold => {}
            other => {
                return Err(QueueError::InvalidTransition(format!(
                    "cannot assign a {other} ticket to a counter"
                )))
            }
        }

        let counter_key = counter_id.to_string();
        let counter = self
            .counters
            .find(&counter_key)?
            .ok_or_else(|| QueueError::not_found("counter", counter_id))?;

        if counter.doc.branch != ticket.branch {
            return Err(QueueError::InvalidInput(format!(
                "counter {} belongs to branch {}, ticket {} to branch {}",
                counter.doc.counter_number, counter.doc.branch, ticket.ticket_number, ticket.branch
            )));
        }

        // A held ticket still occupies its counter, so resuming there skips
        // the claim. Every other case claims atomically: the conditional
        // write fails for all but one of any concurrent claimants.
        let already_occupied_by_ticket =
            ticket.counter_id == Some(counter_id) && !counter.doc.available;
        let mut claimed = false;
        if !already_occupied_by_ticket {
            if !counter.doc.available {
                return Err(QueueError::Conflict(format!(
                    "counter {} is already occupied",
                    counter.doc.counter_number
                )));
            }
            let mut claimed_doc = counter.doc.clone();
            claimed_doc.available = false;
            self.counters
                .update(&counter_key, counter.version, claimed_doc)?;
            claimed = true;
        }

        let now = self.clock.now();
        let mut next = ticket.clone();
        match next.status {
            TicketStatus::NotServed => {
                // Fixed once the ticket first leaves NotServed.
                next.not_served_secs += elapsed_seconds(Some(next.not_served_at), now);
            }
            TicketStatus::Hold => {
                next.hold_secs += elapsed_seconds(next.hold_at, now);
            }
            _ => unreachable!("validated above"),
        }
        let previous_counter = next.counter_id;
        next.serving_at = Some(now);
        next.status = TicketStatus::Serving;
        next.counter_id = Some(counter_id);

        match self.tickets.update(&key, current.version, next) {
            Ok(updated) => {
                // Moving a held ticket to a different counter frees the old one.
                if let Some(previous) = previous_counter {
                    if previous != counter_id {
                        if let Err(e) = self.release_counter(previous) {
                            tracing::warn!(counter = %previous, error = %e, "failed to release previous counter");
                        }
                    }
                }
                Ok(updated.doc)
            }
            Err(e) => {
                // The ticket write lost; undo our counter claim so the loser
                // leaves no trace.
                if claimed {
                    if let Err(release_err) = self.release_counter(counter_id) {
                        tracing::warn!(counter = %counter_id, error = %release_err, "failed to roll back counter claim");
                    }
                }
                Err(e)
            }
        }
    }

    /// Puts a `Serving` ticket on hold. The counter remains bound, since a held
    /// ticket still occupies its counter, which is not the same as being
    /// unassigned.
    pub fn hold(&self, ticket_id: Uuid) -> QueueResult<BankTicket> {
        let (key, current) = self.load_ticket(ticket_id)?;
        if current.doc.status != TicketStatus::Serving {
            return Err(QueueError::InvalidTransition(format!(
                "cannot hold a {} ticket",
                current.doc.status
            )));
        }

        let now = self.clock.now();
        let mut next = current.doc.clone();
        next.serving_secs += elapsed_seconds(next.serving_at, now);
        next.hold_at = Some(now);
        next.status = TicketStatus::Hold;

        let updated = self.tickets.update(&key, current.version, next)?;
        Ok(updated.doc)
    }

    /// Completes service: finalises all duration buckets, marks the ticket
    /// `Served` (terminal) and releases its counter.
    pub fn serve(&self, ticket_id: Uuid) -> QueueResult<BankTicket> {
        let (key, current) = self.load_ticket(ticket_id)?;
        if current.doc.status != TicketStatus::Serving {
            return Err(QueueError::InvalidTransition(format!(
                "cannot serve a {} ticket",
                current.doc.status
            )));
        }

        let now = self.clock.now();
        let mut next = current.doc.clone();
        next.serving_secs += elapsed_seconds(next.serving_at, now);
        next.served_at = Some(now);
        next.total_secs = Some(next.not_served_secs + next.serving_secs + next.hold_secs);
        next.status = TicketStatus::Served;
        let counter_id = next.counter_id.take();

        let updated = self.tickets.update(&key, current.version, next)?;

        if let Some(counter_id) = counter_id {
            // The ticket is served either way; a release failure is an
            // operational problem for the counter, not for the ticket.
            if let Err(e) = self.release_counter(counter_id) {
                tracing::warn!(counter = %counter_id, error = %e, "failed to release counter after serve");
            }
        }

        tracing::info!(ticket = %updated.doc.id, total_secs = ?updated.doc.total_secs, "served bank ticket");
        Ok(updated.doc)
    }

    fn load_ticket(&self, ticket_id: Uuid) -> QueueResult<(String, Versioned<BankTicket>)> {
        let key = ticket_id.to_string();
        let current = self
            .tickets
            .find(&key)?
            .ok_or_else(|| QueueError::not_found("ticket", ticket_id))?;
        Ok((key, current))
    }

    /// Marks a counter available again, retrying around concurrent counter
    /// writes up to the configured limit.
    fn release_counter(&self, counter_id: Uuid) -> QueueResult<()> {
        let key = counter_id.to_string();

        for _attempt in 0..self.cfg.cas_retry_limit() {
            let current = self
                .counters
                .find(&key)?
                .ok_or_else(|| QueueError::not_found("counter", counter_id))?;
            if current.doc.available {
                return Ok(());
            }

            let mut freed = current.doc.clone();
            freed.available = true;
            match self.counters.update(&key, current.version, freed) {
                Ok(_) => return Ok(()),
                Err(QueueError::Conflict(_)) => continue,
                Err(other) => return Err(other),
            }
        }

        Err(QueueError::Conflict(format!(
            "could not release counter {counter_id} after {} attempts",
            self.cfg.cas_retry_limit()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::DEFAULT_CAS_RETRY_LIMIT;
    use crate::journey::JourneyCatalogue;
    use crate::store::StoreSet;
    use chrono::{TimeZone, Utc};

    struct Fixture {
        engine: BankTicketEngine,
        stores: StoreSet,
        clock: Arc<ManualClock>,
        branch: BranchCode,
        queue_id: Uuid,
    }

    fn fixture() -> Fixture {
        let t0 = Utc.with_ymd_and_hms(2025, 3, 14, 9, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::starting_at(t0));
        let stores = StoreSet::new();
        let cfg = Arc::new(
            CoreConfig::new(JourneyCatalogue::default(), DEFAULT_CAS_RETRY_LIMIT).unwrap(),
        );
        let engine = BankTicketEngine::new(
            stores.bank_tickets.clone(),
            stores.counters.clone(),
            stores.sequences.clone(),
            clock.clone(),
            cfg,
        );
        Fixture {
            engine,
            stores,
            clock,
            branch: BranchCode::new("HQ-01").unwrap(),
            queue_id: Uuid::new_v4(),
        }
    }

    impl Fixture {
        fn open_counter(&self, number: u32) -> Counter {
            let counter = Counter {
                id: Uuid::new_v4(),
                branch: self.branch.clone(),
                counter_number: number,
                user_id: Uuid::new_v4(),
                available: true,
                queue_id: self.queue_id,
                created_at: self.clock.now(),
            };
            self.stores
                .counters
                .insert(counter.id.to_string(), counter.clone())
                .expect("insert counter");
            counter
        }

        fn counter_available(&self, counter_id: Uuid) -> bool {
            self.stores
                .counters
                .find(&counter_id.to_string())
                .expect("find counter")
                .expect("counter present")
                .doc
                .available
        }
    }

    #[test]
    fn issue_assigns_sequential_numbers_and_starts_not_served() {
        let fx = fixture();
        let first = fx.engine.issue(fx.queue_id, fx.branch.clone()).expect("issue");
        let second = fx.engine.issue(fx.queue_id, fx.branch.clone()).expect("issue");

        assert_eq!(first.ticket_number.value(), 1);
        assert_eq!(second.ticket_number.value(), 2);
        assert_eq!(first.status, TicketStatus::NotServed);
        assert_eq!(first.counter_id, None);
        assert_eq!(first.total_secs, None);
    }

    // Ticket issued at t0, assigned at t0+30s, served at t0+90s: 30s waiting,
    // 60s serving, 90s total.
    #[test]
    fn wait_and_serve_durations_are_attributed_to_their_buckets() {
        let fx = fixture();
        let counter = fx.open_counter(1);
        let ticket = fx.engine.issue(fx.queue_id, fx.branch.clone()).expect("issue");

        fx.clock.advance_secs(30);
        let ticket = fx
            .engine
            .assign_to_counter(ticket.id, counter.id)
            .expect("assign");
        assert_eq!(ticket.status, TicketStatus::Serving);
        assert_eq!(ticket.not_served_secs, 30);
        assert_eq!(ticket.counter_id, Some(counter.id));
        assert!(!fx.counter_available(counter.id));

        fx.clock.advance_secs(60);
        let ticket = fx.engine.serve(ticket.id).expect("serve");
        assert_eq!(ticket.status, TicketStatus::Served);
        assert_eq!(ticket.serving_secs, 60);
        assert_eq!(ticket.total_secs, Some(90));
        assert_eq!(ticket.counter_id, None);
        assert!(fx.counter_available(counter.id));
    }

    #[test]
    fn hold_and_resume_accumulate_serving_across_intervals() {
        let fx = fixture();
        let counter = fx.open_counter(1);
        let ticket = fx.engine.issue(fx.queue_id, fx.branch.clone()).expect("issue");

        fx.clock.advance_secs(10);
        let ticket = fx
            .engine
            .assign_to_counter(ticket.id, counter.id)
            .expect("assign");

        fx.clock.advance_secs(30);
        let ticket = fx.engine.hold(ticket.id).expect("hold");
        assert_eq!(ticket.status, TicketStatus::Hold);
        assert_eq!(ticket.serving_secs, 30);
        // A held ticket still occupies its counter.
        assert_eq!(ticket.counter_id, Some(counter.id));
        assert!(!fx.counter_available(counter.id));

        fx.clock.advance_secs(60);
        let ticket = fx
            .engine
            .assign_to_counter(ticket.id, counter.id)
            .expect("resume");
        assert_eq!(ticket.status, TicketStatus::Serving);
        assert_eq!(ticket.hold_secs, 60);

        fx.clock.advance_secs(30);
        let ticket = fx.engine.serve(ticket.id).expect("serve");
        assert_eq!(ticket.not_served_secs, 10);
        assert_eq!(ticket.serving_secs, 60);
        assert_eq!(ticket.hold_secs, 60);
        assert_eq!(ticket.total_secs, Some(130));
        assert!(fx.counter_available(counter.id));
    }

    #[test]
    fn moving_a_held_ticket_frees_the_previous_counter() {
        let fx = fixture();
        let first = fx.open_counter(1);
        let second = fx.open_counter(2);
        let ticket = fx.engine.issue(fx.queue_id, fx.branch.clone()).expect("issue");

        let ticket = fx
            .engine
            .assign_to_counter(ticket.id, first.id)
            .expect("assign");
        let ticket = fx.engine.hold(ticket.id).expect("hold");

        let ticket = fx
            .engine
            .assign_to_counter(ticket.id, second.id)
            .expect("move");
        assert_eq!(ticket.counter_id, Some(second.id));
        assert!(fx.counter_available(first.id));
        assert!(!fx.counter_available(second.id));
    }

    #[test]
    fn two_tickets_cannot_claim_the_same_counter() {
        let fx = fixture();
        let counter = fx.open_counter(1);
        let first = fx.engine.issue(fx.queue_id, fx.branch.clone()).expect("issue");
        let second = fx.engine.issue(fx.queue_id, fx.branch.clone()).expect("issue");

        fx.engine
            .assign_to_counter(first.id, counter.id)
            .expect("first claim");
        let err = fx
            .engine
            .assign_to_counter(second.id, counter.id)
            .expect_err("second claim");
        assert!(matches!(err, QueueError::Conflict(_)));
    }

    #[test]
    fn cross_branch_assignment_is_rejected() {
        let fx = fixture();
        let foreign = Counter {
            id: Uuid::new_v4(),
            branch: BranchCode::new("EAST-02").unwrap(),
            counter_number: 9,
            user_id: Uuid::new_v4(),
            available: true,
            queue_id: fx.queue_id,
            created_at: fx.clock.now(),
        };
        fx.stores
            .counters
            .insert(foreign.id.to_string(), foreign.clone())
            .expect("insert");

        let ticket = fx.engine.issue(fx.queue_id, fx.branch.clone()).expect("issue");
        let err = fx
            .engine
            .assign_to_counter(ticket.id, foreign.id)
            .expect_err("cross-branch");
        assert!(matches!(err, QueueError::InvalidInput(_)));
        // Failed validation must not claim the counter.
        assert!(fx.counter_available(foreign.id));
    }

    #[test]
    fn invalid_transitions_are_rejected_without_mutation() {
        let fx = fixture();
        let counter = fx.open_counter(1);
        let ticket = fx.engine.issue(fx.queue_id, fx.branch.clone()).expect("issue");

        // Hold and serve both require Serving.
        assert!(matches!(
            fx.engine.hold(ticket.id),
            Err(QueueError::InvalidTransition(_))
        ));
        assert!(matches!(
            fx.engine.serve(ticket.id),
            Err(QueueError::InvalidTransition(_))
        ));

        let stored = fx
            .stores
            .bank_tickets
            .find(&ticket.id.to_string())
            .expect("find")
            .expect("present");
        assert_eq!(stored.version, 1);
        assert_eq!(stored.doc, ticket);

        // Served is terminal.
        fx.engine
            .assign_to_counter(ticket.id, counter.id)
            .expect("assign");
        fx.engine.serve(ticket.id).expect("serve");
        assert!(matches!(
            fx.engine.assign_to_counter(ticket.id, counter.id),
            Err(QueueError::InvalidTransition(_))
        ));
        assert!(matches!(
            fx.engine.hold(ticket.id),
            Err(QueueError::InvalidTransition(_))
        ));
        assert!(matches!(
            fx.engine.serve(ticket.id),
            Err(QueueError::InvalidTransition(_))
        ));
    }

    #[test]
    fn unknown_ticket_is_not_found() {
        let fx = fixture();
        let err = fx.engine.hold(Uuid::new_v4()).expect_err("missing ticket");
        assert!(matches!(err, QueueError::NotFound { .. }));
    }
}
