//! Stage workers
//!
//! One module per pipeline stage. Each worker opens a job record, runs its
//! pipeline component, writes results, and either enqueues the next stage
//! or moves the demo to a recoverable or terminal state. Workers never
//! return errors upward; every failure ends in a status write.

pub mod merge;
pub mod parse;
pub mod record;
pub mod tts;
