//! Data Transfer Objects
//!
//! Payloads crossing the orchestrator's boundaries: API requests, the
//! per-stage job queue, the demo event bus and the session relay. DTOs are
//! lightweight representations optimized for transfer, not persistence.

pub mod demo;
pub mod payload;
pub mod session;
pub mod step;
