//! Repository Module
//!
//! Data access layer for the orchestrator.
//! Each repository handles database operations for a specific domain entity.
//! Updates tolerate missing rows: an in-flight job finishing after its demo
//! was deleted is a no-op, not an error.

pub mod demo;
pub mod job;
pub mod step;

// Re-export for convenience
pub use demo as demo_repository;
pub use job as job_repository;
pub use step as step_repository;
