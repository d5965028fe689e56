//! Hospital journey state machine.
//!
//! Operates on a ticket's `department_history`: opening a visit on entry into
//! a department, targeting the unique open visit for room assignment and cash
//! clearance, and closing it on `advance`. Terminal flags (`completed`,
//! `no_show`) shut the ticket to all further transitions.

use crate::clock::Clock;
use crate::config::CoreConfig;
use crate::error::{QueueError, QueueResult};
use crate::journey::{CashClearance, DepartmentVisit, HospitalTicket, PayerType};
use crate::store::{Records, Versioned};
use std::sync::Arc;
use uqm_types::DepartmentName;
use uuid::Uuid;

/// State-machine operations for hospital journey tickets.
pub struct JourneyEngine {
    tickets: Arc<dyn Records<HospitalTicket>>,
    clock: Arc<dyn Clock>,
    cfg: Arc<CoreConfig>,
}

impl JourneyEngine {
    pub fn new(
        tickets: Arc<dyn Records<HospitalTicket>>,
        clock: Arc<dyn Clock>,
        cfg: Arc<CoreConfig>,
    ) -> Self {
        Self {
            tickets,
            clock,
            cfg,
        }
    }

    /// Creates a ticket at intake: the journey template is assigned and the
    /// first department is entered immediately.
    pub fn admit(&self, journey_id: &str, payer: PayerType) -> QueueResult<HospitalTicket> {
        let template = self
            .cfg
            .journeys()
            .get(journey_id)
            .ok_or_else(|| QueueError::not_found("journey template", journey_id))?;

        let now = self.clock.now();
        let first_department = template.steps[0].clone();
        let ticket = HospitalTicket {
            id: Uuid::new_v4(),
            journey_id: template.id.clone(),
            payer,
            current_step: 0,
            department_history: vec![DepartmentVisit::opened(first_department, payer, now)],
            completed: false,
            no_show: false,
            created_at: now,
        };

        let stored = self.tickets.insert(ticket.id.to_string(), ticket)?;
        tracing::info!(ticket = %stored.doc.id, journey = %stored.doc.journey_id, "admitted hospital ticket");
        Ok(stored.doc)
    }

    /// Opens a visit for `department`, unless one is already open there, in
    /// that case the call is an idempotent no-op (the ticket is already being
    /// handled in that department, which is not an error).
    pub fn enter_department(
        &self,
        ticket_id: Uuid,
        department: DepartmentName,
    ) -> QueueResult<HospitalTicket> {
        let (key, current) = self.load_open_ticket(ticket_id)?;

        if current.doc.open_visit_index(&department).is_some() {
            return Ok(current.doc);
        }

        let now = self.clock.now();
        let mut next = current.doc.clone();
        let visit = DepartmentVisit::opened(department, next.payer, now);
        next.department_history.push(visit);

        let updated = self.tickets.update(&key, current.version, next)?;
        Ok(updated.doc)
    }

    /// Assigns a room to the unique open visit for `department`.
    ///
    /// Room assignment arriving after the stage already closed is a benign
    /// race: the caller gets `NotFound` and the ticket is left unchanged.
    pub fn assign_room(
        &self,
        ticket_id: Uuid,
        department: &DepartmentName,
        room_id: Uuid,
    ) -> QueueResult<HospitalTicket> {
        let (key, current) = self.load_open_ticket(ticket_id)?;

        let Some(index) = current.doc.open_visit_index(department) else {
            return Err(QueueError::not_found("open visit for department", department));
        };

        let mut next = current.doc.clone();
        next.department_history[index].room_id = Some(room_id);

        let updated = self.tickets.update(&key, current.version, next)?;
        Ok(updated.doc)
    }

    /// Marks the cash payment for the unique open visit in `department` as
    /// cleared.
    pub fn clear_payment(
        &self,
        ticket_id: Uuid,
        department: &DepartmentName,
    ) -> QueueResult<HospitalTicket> {
        let (key, current) = self.load_open_ticket(ticket_id)?;

        if current.doc.payer != PayerType::Cash {
            return Err(QueueError::InvalidInput(
                "payment clearance only applies to cash tickets".into(),
            ));
        }

        let Some(index) = current.doc.open_visit_index(department) else {
            return Err(QueueError::not_found("open visit for department", department));
        };
        if current.doc.department_history[index].cash_cleared == Some(CashClearance::Cleared) {
            return Err(QueueError::Conflict(format!(
                "payment already cleared for {department}"
            )));
        }

        let now = self.clock.now();
        let mut next = current.doc.clone();
        next.department_history[index].cash_cleared = Some(CashClearance::Cleared);
        next.department_history[index].paid_at = Some(now);

        let updated = self.tickets.update(&key, current.version, next)?;
        Ok(updated.doc)
    }

    /// Closes the current open visit and moves the journey forward one step.
    /// Past the final step, the ticket is completed (terminal).
    ///
    /// A cash visit cannot be closed while its clearance is pending.
    pub fn advance(&self, ticket_id: Uuid) -> QueueResult<HospitalTicket> {
        let (key, current) = self.load_open_ticket(ticket_id)?;
        let template = self
            .cfg
            .journeys()
            .get(&current.doc.journey_id)
            .ok_or_else(|| QueueError::not_found("journey template", &current.doc.journey_id))?;

        let Some(index) = current.doc.current_open_index() else {
            return Err(QueueError::InvalidTransition(
                "no open department visit to close".into(),
            ));
        };
        let visit = &current.doc.department_history[index];
        if !visit.eligible_for_completion() {
            return Err(QueueError::InvalidTransition(format!(
                "cash payment not cleared for {}",
                visit.department
            )));
        }

        let now = self.clock.now();
        let mut next = current.doc.clone();
        next.department_history[index].completed = true;
        next.department_history[index].completed_at = Some(now);
        next.current_step += 1;
        if next.current_step >= template.steps.len() {
            next.completed = true;
        }

        let updated = self.tickets.update(&key, current.version, next)?;
        if updated.doc.completed {
            tracing::info!(ticket = %updated.doc.id, "journey completed");
        }
        Ok(updated.doc)
    }

    /// Terminal transition from any non-completed state: closes the current
    /// open visit (payment clearance is not required) and flags the ticket as
    /// a no-show.
    pub fn mark_no_show(&self, ticket_id: Uuid) -> QueueResult<HospitalTicket> {
        let (key, current) = self.load_open_ticket(ticket_id)?;

        let now = self.clock.now();
        let mut next = current.doc.clone();
        if let Some(index) = next.current_open_index() {
            next.department_history[index].completed = true;
            next.department_history[index].completed_at = Some(now);
        }
        next.no_show = true;

        let updated = self.tickets.update(&key, current.version, next)?;
        tracing::info!(ticket = %updated.doc.id, "journey marked no-show");
        Ok(updated.doc)
    }

    /// Loads the ticket and rejects any mutation of a terminal one.
    fn load_open_ticket(&self, ticket_id: Uuid) -> QueueResult<(String, Versioned<HospitalTicket>)> {
        let key = ticket_id.to_string();
        let current = self
            .tickets
            .find(&key)?
            .ok_or_else(|| QueueError::not_found("ticket", ticket_id))?;

        if current.doc.is_terminal() {
            let reason = if current.doc.no_show {
                "marked no-show"
            } else {
                "completed"
            };
            return Err(QueueError::InvalidTransition(format!(
                "ticket {ticket_id} is already {reason}"
            )));
        }

        Ok((key, current))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::DEFAULT_CAS_RETRY_LIMIT;
    use crate::journey::{JourneyCatalogue, JourneyTemplate};
    use crate::store::StoreSet;
    use chrono::{TimeZone, Utc};

    fn dept(name: &str) -> DepartmentName {
        DepartmentName::new(name).unwrap()
    }

    fn catalogue() -> JourneyCatalogue {
        JourneyCatalogue {
            templates: vec![
                JourneyTemplate {
                    id: "outpatient-standard".into(),
                    name: "Standard outpatient visit".into(),
                    steps: vec![dept("Registration"), dept("Consultation"), dept("Billing")],
                },
                JourneyTemplate {
                    id: "dialysis-cycle".into(),
                    name: "Dialysis with a follow-up consultation".into(),
                    // Consultation appears twice: revisits get their own entry.
                    steps: vec![dept("Consultation"), dept("Dialysis"), dept("Consultation")],
                },
            ],
        }
    }

    struct Fixture {
        engine: JourneyEngine,
        stores: StoreSet,
        clock: Arc<ManualClock>,
    }

    fn fixture() -> Fixture {
        let t0 = Utc.with_ymd_and_hms(2025, 3, 14, 8, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::starting_at(t0));
        let stores = StoreSet::new();
        let cfg = Arc::new(CoreConfig::new(catalogue(), DEFAULT_CAS_RETRY_LIMIT).unwrap());
        let engine = JourneyEngine::new(stores.hospital_tickets.clone(), clock.clone(), cfg);
        Fixture {
            engine,
            stores,
            clock,
        }
    }

    fn open_visits(ticket: &HospitalTicket) -> usize {
        ticket
            .department_history
            .iter()
            .filter(|v| !v.completed)
            .count()
    }

    #[test]
    fn admit_enters_the_first_department() {
        let fx = fixture();
        let ticket = fx
            .engine
            .admit("outpatient-standard", PayerType::Insurance)
            .expect("admit");

        assert_eq!(ticket.current_step, 0);
        assert_eq!(ticket.department_history.len(), 1);
        assert_eq!(
            ticket.department_history[0].department,
            dept("Registration")
        );
        assert!(!ticket.department_history[0].completed);
        assert_eq!(ticket.department_history[0].cash_cleared, None);
    }

    #[test]
    fn admit_with_unknown_template_is_not_found() {
        let fx = fixture();
        let err = fx
            .engine
            .admit("walk-in", PayerType::Cash)
            .expect_err("unknown template");
        assert!(matches!(err, QueueError::NotFound { .. }));
    }

    #[test]
    fn entering_an_already_open_department_is_idempotent() {
        let fx = fixture();
        let ticket = fx
            .engine
            .admit("outpatient-standard", PayerType::Insurance)
            .expect("admit");

        let again = fx
            .engine
            .enter_department(ticket.id, dept("Registration"))
            .expect("re-enter");
        assert_eq!(again.department_history.len(), 1);

        // No write happened, so the stored version is untouched.
        let stored = fx
            .stores
            .hospital_tickets
            .find(&ticket.id.to_string())
            .expect("find")
            .expect("present");
        assert_eq!(stored.version, 1);
    }

    #[test]
    fn a_full_journey_closes_every_visit_and_completes() {
        let fx = fixture();
        let ticket = fx
            .engine
            .admit("outpatient-standard", PayerType::Insurance)
            .expect("admit");

        fx.clock.advance_secs(300);
        let ticket = fx.engine.advance(ticket.id).expect("leave registration");
        assert_eq!(ticket.current_step, 1);
        assert!(ticket.department_history[0].completed);
        assert!(ticket.department_history[0].completed_at.is_some());

        let ticket = fx
            .engine
            .enter_department(ticket.id, dept("Consultation"))
            .expect("enter consultation");
        fx.clock.advance_secs(900);
        let ticket = fx.engine.advance(ticket.id).expect("leave consultation");

        let ticket = fx
            .engine
            .enter_department(ticket.id, dept("Billing"))
            .expect("enter billing");
        let ticket = fx.engine.advance(ticket.id).expect("leave billing");

        assert!(ticket.completed);
        assert!(!ticket.no_show);
        assert_eq!(ticket.current_step, 3);
        assert_eq!(open_visits(&ticket), 0);

        // Terminal: nothing may mutate the ticket any more.
        assert!(matches!(
            fx.engine.advance(ticket.id),
            Err(QueueError::InvalidTransition(_))
        ));
        assert!(matches!(
            fx.engine.enter_department(ticket.id, dept("Billing")),
            Err(QueueError::InvalidTransition(_))
        ));
    }

    #[test]
    fn at_most_one_visit_per_department_is_open() {
        let fx = fixture();
        let ticket = fx
            .engine
            .admit("dialysis-cycle", PayerType::Insurance)
            .expect("admit");

        let ticket = fx.engine.advance(ticket.id).expect("leave consultation");
        let ticket = fx
            .engine
            .enter_department(ticket.id, dept("Dialysis"))
            .expect("enter dialysis");
        let ticket = fx.engine.advance(ticket.id).expect("leave dialysis");

        // Second consultation: a fresh visit entry for a revisited department.
        let ticket = fx
            .engine
            .enter_department(ticket.id, dept("Consultation"))
            .expect("re-enter consultation");
        assert_eq!(ticket.department_history.len(), 3);
        assert_eq!(open_visits(&ticket), 1);
        assert_eq!(ticket.open_visit_index(&dept("Consultation")), Some(2));

        for department in [dept("Consultation"), dept("Dialysis")] {
            let open = ticket
                .department_history
                .iter()
                .filter(|v| v.department == department && !v.completed)
                .count();
            assert!(open <= 1, "{department} has {open} open visits");
        }
    }

    #[test]
    fn room_assignment_targets_the_open_visit_only() {
        let fx = fixture();
        let room_id = Uuid::new_v4();
        let ticket = fx
            .engine
            .admit("outpatient-standard", PayerType::Insurance)
            .expect("admit");

        let ticket = fx
            .engine
            .assign_room(ticket.id, &dept("Registration"), room_id)
            .expect("assign room");
        assert_eq!(ticket.department_history[0].room_id, Some(room_id));

        // After the stage closes, the late-arriving assignment is a benign
        // race: NotFound, ticket unchanged.
        let ticket = fx.engine.advance(ticket.id).expect("advance");
        let before = fx
            .stores
            .hospital_tickets
            .find(&ticket.id.to_string())
            .expect("find")
            .expect("present");
        let err = fx
            .engine
            .assign_room(ticket.id, &dept("Registration"), Uuid::new_v4())
            .expect_err("stage closed");
        assert!(matches!(err, QueueError::NotFound { .. }));

        let after = fx
            .stores
            .hospital_tickets
            .find(&ticket.id.to_string())
            .expect("find")
            .expect("present");
        assert_eq!(before, after);
    }

    #[test]
    fn cash_visits_block_advance_until_cleared() {
        let fx = fixture();
        let ticket = fx
            .engine
            .admit("outpatient-standard", PayerType::Cash)
            .expect("admit");
        assert_eq!(
            ticket.department_history[0].cash_cleared,
            Some(CashClearance::Pending)
        );

        let err = fx.engine.advance(ticket.id).expect_err("uncleared cash");
        assert!(matches!(err, QueueError::InvalidTransition(_)));

        fx.clock.advance_secs(120);
        let ticket = fx
            .engine
            .clear_payment(ticket.id, &dept("Registration"))
            .expect("clear");
        assert_eq!(
            ticket.department_history[0].cash_cleared,
            Some(CashClearance::Cleared)
        );
        assert!(ticket.department_history[0].paid_at.is_some());

        let ticket = fx.engine.advance(ticket.id).expect("advance after clearing");
        assert_eq!(ticket.current_step, 1);
    }

    #[test]
    fn clearing_twice_is_a_conflict() {
        let fx = fixture();
        let ticket = fx
            .engine
            .admit("outpatient-standard", PayerType::Cash)
            .expect("admit");

        fx.engine
            .clear_payment(ticket.id, &dept("Registration"))
            .expect("first clearance");
        let err = fx
            .engine
            .clear_payment(ticket.id, &dept("Registration"))
            .expect_err("second clearance");
        assert!(matches!(err, QueueError::Conflict(_)));
    }

    #[test]
    fn clearing_payment_for_non_cash_tickets_is_rejected() {
        let fx = fixture();
        let ticket = fx
            .engine
            .admit("outpatient-standard", PayerType::Insurance)
            .expect("admit");

        let err = fx
            .engine
            .clear_payment(ticket.id, &dept("Registration"))
            .expect_err("not a cash ticket");
        assert!(matches!(err, QueueError::InvalidInput(_)));
    }

    #[test]
    fn no_show_closes_the_open_visit_without_payment() {
        let fx = fixture();
        let ticket = fx
            .engine
            .admit("outpatient-standard", PayerType::Cash)
            .expect("admit");

        let ticket = fx.engine.mark_no_show(ticket.id).expect("no-show");
        assert!(ticket.no_show);
        assert!(!ticket.completed);
        assert_eq!(open_visits(&ticket), 0);

        // Terminal; mutually exclusive with further transitions.
        assert!(matches!(
            fx.engine.mark_no_show(ticket.id),
            Err(QueueError::InvalidTransition(_))
        ));
        assert!(matches!(
            fx.engine.advance(ticket.id),
            Err(QueueError::InvalidTransition(_))
        ));
    }
}
