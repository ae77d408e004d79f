//! Service Module
//!
//! Business logic layer for the orchestrator. Services sit between the API
//! handlers and the repositories and own all state machine enforcement.

pub mod demo;
pub mod events;
pub mod session;

pub use demo::DemoError;
pub use events::EventBus;
pub use session::{SessionError, SessionRegistry};
