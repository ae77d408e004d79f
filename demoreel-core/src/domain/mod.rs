//! Core domain types
//!
//! This module contains the core domain structures used across Demoreel.
//! These types represent the fundamental business entities and are shared
//! between the orchestrator (for persistence) and the pipeline stages
//! (for execution).

pub mod demo;
pub mod job;
pub mod step;
