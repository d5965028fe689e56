//! Bank-side data model.
//!
//! A [`BankTicket`] is a single-department ticket bound to at most one
//! [`Counter`]. Its lifecycle is `NotServed → Serving → {Hold ⇄ Serving} →
//! Served`, and on every transition the time spent in the state being left is
//! converted into that state's duration bucket (see
//! [`crate::engines::bank`]).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uqm_types::{BranchCode, TicketNumber};
use uuid::Uuid;

/// Ticket status. Exactly one is active at a time; `Served` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketStatus {
    NotServed,
    Serving,
    Hold,
    Served,
}

impl TicketStatus {
    /// No operation may mutate a ticket once it reaches a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TicketStatus::Served)
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TicketStatus::NotServed => "not served",
            TicketStatus::Serving => "serving",
            TicketStatus::Hold => "hold",
            TicketStatus::Served => "served",
        };
        write!(f, "{name}")
    }
}

/// A unit of service demand occupying a queue position at a bank branch.
///
/// Per-state entry timestamps and duration buckets together implement the
/// duration accounting: `not_served_at` is set at creation and never changes;
/// `serving_at` and `hold_at` record the start of the *most recent* stay in
/// that state (a ticket may toggle `Hold ⇄ Serving` any number of times);
/// `served_at` is set exactly once. `total_secs` stays `None` until the ticket
/// is served, then equals the sum of the three buckets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankTicket {
    pub id: Uuid,
    /// Sequential number scoped per (branch, day); what the display boards show.
    pub ticket_number: TicketNumber,
    /// The service queue/menu item requested at issue time.
    pub queue_id: Uuid,
    /// Owning branch. Tickets never move between branches.
    pub branch: BranchCode,
    pub status: TicketStatus,
    /// Counter currently serving the ticket. Non-`None` only while `Serving`
    /// or `Hold`, as a held ticket still occupies its counter.
    pub counter_id: Option<Uuid>,

    pub not_served_at: DateTime<Utc>,
    pub serving_at: Option<DateTime<Utc>>,
    pub hold_at: Option<DateTime<Utc>>,
    pub served_at: Option<DateTime<Utc>>,

    pub not_served_secs: u64,
    pub serving_secs: u64,
    pub hold_secs: u64,
    /// Finalised only when `status == Served`; provisional before that.
    pub total_secs: Option<u64>,
}

impl BankTicket {
    /// A fresh ticket in `NotServed`, as created by ticket issuance.
    pub fn issued(
        ticket_number: TicketNumber,
        queue_id: Uuid,
        branch: BranchCode,
        issued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            ticket_number,
            queue_id,
            branch,
            status: TicketStatus::NotServed,
            counter_id: None,
            not_served_at: issued_at,
            serving_at: None,
            hold_at: None,
            served_at: None,
            not_served_secs: 0,
            serving_secs: 0,
            hold_secs: 0,
            total_secs: None,
        }
    }
}

/// A teller station capable of serving one ticket at a time.
///
/// Exactly one ticket may hold a counter while `available == false`. Counters
/// are registered per day; availability lookups only consider counters created
/// on the day of the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Counter {
    pub id: Uuid,
    pub branch: BranchCode,
    pub counter_number: u32,
    /// The teller assigned to the counter.
    pub user_id: Uuid,
    pub available: bool,
    /// The service type this counter currently handles.
    pub queue_id: Uuid,
    pub created_at: DateTime<Utc>,
}
