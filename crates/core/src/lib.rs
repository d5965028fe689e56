//! # UQM Core
//!
//! Core business logic for the unified queue-management system.
//!
//! This crate contains the ticket lifecycle and duration-accounting state
//! machines for both client domains:
//! - Bank tickets: `NotServed → Serving → {Hold ⇄ Serving} → Served`, bound
//!   to a counter, with per-state duration buckets.
//! - Hospital journeys: multi-department tickets traversing an ordered
//!   journey template, one department visit at a time.
//!
//! The environment is consumed through two narrow interfaces: a versioned
//! record store ([`store::Records`]) and a clock ([`clock::Clock`]). Every
//! mutating operation is a read → validate → conditional write, so concurrent
//! transitions resolve to one winner and typed `Conflict`s for the rest.
//!
//! **No API concerns**: HTTP servers, session handling and DTO translation
//! belong in `api-rest` and `api-shared`.

pub mod clock;
pub mod config;
pub mod duration;
pub mod engines;
pub mod error;
pub mod journey;
pub mod reporting;
pub mod sequence;
pub mod store;
pub mod ticket;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{CoreConfig, DEFAULT_CAS_RETRY_LIMIT};
pub use engines::{AssignmentResolver, BankTicketEngine, JourneyEngine};
pub use error::{QueueError, QueueResult};
pub use journey::{
    CashClearance, DepartmentVisit, HospitalTicket, JourneyCatalogue, JourneyTemplate, PayerType,
    Room,
};
pub use reporting::{BranchDaySummary, JourneyOutcomes, Reporting};
pub use sequence::{SequenceRecord, TicketSequence};
pub use store::{MemoryRecords, Records, Snapshot, StoreSet, Versioned};
pub use ticket::{BankTicket, Counter, TicketStatus};
