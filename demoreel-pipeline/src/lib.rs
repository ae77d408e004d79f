//! Demoreel Pipeline
//!
//! The four stages of demo generation:
//! - [`planner`]: renders the target page and asks a language model to
//!   propose an ordered action list
//! - [`executor`]: replays steps against a real browser while recording
//! - [`narration`]: synthesizes per-step audio, falling back to measured
//!   silence when the backend is unavailable
//! - [`muxer`]: stitches segments and narration into the final artifact
//!
//! Stages are pure workers: they read their inputs from job payloads and
//! return outcomes. All status writes live in the orchestrator.

pub mod executor;
pub mod llm;
pub mod media;
pub mod muxer;
pub mod narration;
pub mod planner;
pub mod tts;
