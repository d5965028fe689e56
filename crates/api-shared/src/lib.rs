//! # API Shared
//!
//! Shared definitions for the UQM API surface.
//!
//! Contains:
//! - Request/response DTOs (`dto` module) with their OpenAPI schemas
//! - The shared `HealthService`
//!
//! The core crate knows nothing about these types; handlers convert core
//! entities into DTOs at the boundary.

pub mod dto;
pub mod health;

pub use health::HealthService;
