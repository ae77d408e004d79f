//! Demoreel Core
//!
//! Core types and abstractions for the Demoreel pipeline.
//!
//! This crate contains:
//! - Domain types: Core business entities (Demo, Step, PipelineJob)
//! - DTOs: Payloads for job enqueueing and the session relay
//! - Error taxonomy shared by all pipeline stages

pub mod domain;
pub mod dto;
pub mod error;
