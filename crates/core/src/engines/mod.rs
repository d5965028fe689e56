//! The state-machine engines.
//!
//! One engine per subsystem, all built the same way: a service struct holding
//! its collaborators (record collections, clock, config) behind `Arc`, with
//! every mutating operation expressed as read → validate → conditional write.

pub mod assignment;
pub mod bank;
pub mod hospital;

pub use assignment::AssignmentResolver;
pub use bank::BankTicketEngine;
pub use hospital::JourneyEngine;
