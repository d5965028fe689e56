//! Request and response bodies for the Operation API.
//!
//! Thin mirrors of the core entities with OpenAPI schemas attached. Branch
//! codes and department names travel as plain strings here; the handlers
//! re-validate them into core newtypes on the way in.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uqm_core::{
    BankTicket, BranchDaySummary, CashClearance, Counter, DepartmentVisit, HospitalTicket,
    JourneyOutcomes, PayerType, Room,
};
use utoipa::ToSchema;
use uuid::Uuid;

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

/// Error body returned with every non-2xx status.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    pub error: String,
}

// ============================================================================
// BANK
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IssueTicketReq {
    pub queue_id: Uuid,
    pub branch: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AssignCounterReq {
    pub counter_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OpenCounterReq {
    pub branch: String,
    pub counter_number: u32,
    pub user_id: Uuid,
    pub queue_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BankTicketRes {
    pub id: Uuid,
    pub ticket_number: u32,
    pub queue_id: Uuid,
    pub branch: String,
    pub status: String,
    pub counter_id: Option<Uuid>,
    pub not_served_at: DateTime<Utc>,
    pub serving_at: Option<DateTime<Utc>>,
    pub hold_at: Option<DateTime<Utc>>,
    pub served_at: Option<DateTime<Utc>>,
    pub not_served_secs: u64,
    pub serving_secs: u64,
    pub hold_secs: u64,
    pub total_secs: Option<u64>,
}

impl From<BankTicket> for BankTicketRes {
    fn from(ticket: BankTicket) -> Self {
        Self {
            id: ticket.id,
            ticket_number: ticket.ticket_number.value(),
            queue_id: ticket.queue_id,
            branch: ticket.branch.to_string(),
            status: format!("{:?}", ticket.status),
            counter_id: ticket.counter_id,
            not_served_at: ticket.not_served_at,
            serving_at: ticket.serving_at,
            hold_at: ticket.hold_at,
            served_at: ticket.served_at,
            not_served_secs: ticket.not_served_secs,
            serving_secs: ticket.serving_secs,
            hold_secs: ticket.hold_secs,
            total_secs: ticket.total_secs,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CounterRes {
    pub id: Uuid,
    pub branch: String,
    pub counter_number: u32,
    pub user_id: Uuid,
    pub available: bool,
    pub queue_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl From<Counter> for CounterRes {
    fn from(counter: Counter) -> Self {
        Self {
            id: counter.id,
            branch: counter.branch.to_string(),
            counter_number: counter.counter_number,
            user_id: counter.user_id,
            available: counter.available,
            queue_id: counter.queue_id,
            created_at: counter.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CountersRes {
    pub counters: Vec<CounterRes>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BranchSummaryRes {
    pub branch: String,
    pub day: NaiveDate,
    pub served: u64,
    pub waiting: u64,
    pub avg_wait_secs: u64,
    pub avg_serving_secs: u64,
    pub avg_total_secs: u64,
}

impl From<BranchDaySummary> for BranchSummaryRes {
    fn from(summary: BranchDaySummary) -> Self {
        Self {
            branch: summary.branch.to_string(),
            day: summary.day,
            served: summary.served,
            waiting: summary.waiting,
            avg_wait_secs: summary.avg_wait_secs,
            avg_serving_secs: summary.avg_serving_secs,
            avg_total_secs: summary.avg_total_secs,
        }
    }
}

// ============================================================================
// HOSPITAL
// ============================================================================

/// Payer kind as it appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum PayerDto {
    Cash,
    Insurance,
}

impl From<PayerDto> for PayerType {
    fn from(payer: PayerDto) -> Self {
        match payer {
            PayerDto::Cash => PayerType::Cash,
            PayerDto::Insurance => PayerType::Insurance,
        }
    }
}

impl From<PayerType> for PayerDto {
    fn from(payer: PayerType) -> Self {
        match payer {
            PayerType::Cash => PayerDto::Cash,
            PayerType::Insurance => PayerDto::Insurance,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AdmitReq {
    pub journey_id: String,
    pub payer: PayerDto,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EnterDepartmentReq {
    pub department: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AssignRoomReq {
    pub department: String,
    pub room_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ClearPaymentReq {
    pub department: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AssignRoomStaffReq {
    pub staff_id: Uuid,
    pub department: String,
    pub room_number: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VisitRes {
    pub department: String,
    pub room_id: Option<Uuid>,
    pub entered_at: DateTime<Utc>,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub cash_cleared: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
}

impl From<DepartmentVisit> for VisitRes {
    fn from(visit: DepartmentVisit) -> Self {
        Self {
            department: visit.department.to_string(),
            room_id: visit.room_id,
            entered_at: visit.entered_at,
            completed: visit.completed,
            completed_at: visit.completed_at,
            cash_cleared: visit.cash_cleared.map(|c| match c {
                CashClearance::Pending => "Pending".to_string(),
                CashClearance::Cleared => "Cleared".to_string(),
            }),
            paid_at: visit.paid_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HospitalTicketRes {
    pub id: Uuid,
    pub journey_id: String,
    pub payer: PayerDto,
    pub current_step: usize,
    pub department_history: Vec<VisitRes>,
    pub completed: bool,
    pub no_show: bool,
    pub created_at: DateTime<Utc>,
}

impl From<HospitalTicket> for HospitalTicketRes {
    fn from(ticket: HospitalTicket) -> Self {
        Self {
            id: ticket.id,
            journey_id: ticket.journey_id,
            payer: ticket.payer.into(),
            current_step: ticket.current_step,
            department_history: ticket
                .department_history
                .into_iter()
                .map(VisitRes::from)
                .collect(),
            completed: ticket.completed,
            no_show: ticket.no_show,
            created_at: ticket.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RoomRes {
    pub id: Uuid,
    pub staff_id: Uuid,
    pub department: String,
    pub room_number: u32,
}

impl From<Room> for RoomRes {
    fn from(room: Room) -> Self {
        Self {
            id: room.id,
            staff_id: room.staff_id,
            department: room.department.to_string(),
            room_number: room.room_number,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct JourneyOutcomesRes {
    pub completed: u64,
    pub no_show: u64,
    pub in_progress: u64,
}

impl From<JourneyOutcomes> for JourneyOutcomesRes {
    fn from(outcomes: JourneyOutcomes) -> Self {
        Self {
            completed: outcomes.completed,
            no_show: outcomes.no_show,
            in_progress: outcomes.in_progress,
        }
    }
}
