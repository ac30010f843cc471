//! Testability harness utilities.
//!
//! Scripted sinks that stand in for audio hardware, so the pipeline can be
//! driven deterministically from unit and integration tests.

mod sinks;

pub use sinks::{FailingSink, GatedSink, RecordingOutput, RecordingSink, ShortWriteSink, SinkGate};
