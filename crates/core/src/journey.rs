//! Hospital-side data model.
//!
//! A [`HospitalTicket`] traverses an ordered journey template of departments.
//! The ticket owns an append-only `department_history`; each
//! [`DepartmentVisit`] tracks one stay in one department, with optional room
//! assignment and optional cash-payment clearance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uqm_types::DepartmentName;
use uuid::Uuid;

/// How the patient settles charges. Only cash requires in-journey clearance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayerType {
    Cash,
    Insurance,
}

/// Clearance state of a cash payment within one department visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CashClearance {
    Pending,
    Cleared,
}

/// One stay of a journey ticket within a single department.
///
/// Invariant: at most one visit per distinct department value may have
/// `completed == false` at a time. Room reassignment and payment clearance
/// always target that unique open entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepartmentVisit {
    pub department: DepartmentName,
    pub room_id: Option<Uuid>,
    pub entered_at: DateTime<Utc>,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    /// `Some(Pending)` from entry for cash payers; `None` for everyone else.
    pub cash_cleared: Option<CashClearance>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl DepartmentVisit {
    /// A visit opened at `entered_at`. Cash payers start with clearance
    /// pending; other payers carry no clearance state at all.
    pub fn opened(department: DepartmentName, payer: PayerType, entered_at: DateTime<Utc>) -> Self {
        Self {
            department,
            room_id: None,
            entered_at,
            completed: false,
            completed_at: None,
            cash_cleared: match payer {
                PayerType::Cash => Some(CashClearance::Pending),
                PayerType::Insurance => None,
            },
            paid_at: None,
        }
    }

    /// Whether `advance` may close this visit. Non-cash visits always may;
    /// cash visits only once cleared.
    pub fn eligible_for_completion(&self) -> bool {
        match self.cash_cleared {
            Some(CashClearance::Pending) => false,
            Some(CashClearance::Cleared) | None => true,
        }
    }
}

/// A multi-department hospital ticket.
///
/// `current_step` indexes into the journey template and advances
/// monotonically. `completed` and `no_show` are terminal flags, mutually
/// exclusive with further transitions. The document is retained indefinitely
/// for reporting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HospitalTicket {
    pub id: Uuid,
    /// The journey template this ticket follows.
    pub journey_id: String,
    pub payer: PayerType,
    pub current_step: usize,
    /// Append-only; entries are closed in place, never removed.
    pub department_history: Vec<DepartmentVisit>,
    pub completed: bool,
    pub no_show: bool,
    pub created_at: DateTime<Utc>,
}

impl HospitalTicket {
    /// Whether any further transition is allowed.
    pub fn is_terminal(&self) -> bool {
        self.completed || self.no_show
    }

    /// Index of the unique open visit for `department`, if any.
    ///
    /// A department may appear multiple times in a journey (revisits), each
    /// occurrence with its own history entry; by invariant only the most
    /// recent one can still be open.
    pub fn open_visit_index(&self, department: &DepartmentName) -> Option<usize> {
        crate::store::unique_open_index(&self.department_history, |v| {
            !v.completed && &v.department == department
        })
    }

    /// Index of the current open visit regardless of department, the most
    /// recently entered history entry that is not yet completed.
    pub fn current_open_index(&self) -> Option<usize> {
        crate::store::unique_open_index(&self.department_history, |v| !v.completed)
    }
}

/// An examination room, owned by exactly one staff member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: Uuid,
    /// One room per staff member, enforced by the assignment resolver.
    pub staff_id: Uuid,
    pub department: DepartmentName,
    /// Unique per department, enforced by the assignment resolver.
    pub room_number: u32,
}

/// An ordered template of departments a ticket is expected to traverse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JourneyTemplate {
    pub id: String,
    pub name: String,
    pub steps: Vec<DepartmentName>,
}

/// All journey templates known to the deployment, loaded once at startup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JourneyCatalogue {
    pub templates: Vec<JourneyTemplate>,
}

impl JourneyCatalogue {
    /// Look up a template by id.
    pub fn get(&self, journey_id: &str) -> Option<&JourneyTemplate> {
        self.templates.iter().find(|t| t.id == journey_id)
    }
}
