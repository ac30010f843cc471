//! Consumer task - drains tone buffers into the audio sink.
//!
//! Each received buffer is written to the sink with a single blocking call.
//! A short write is reported and skipped over; a hard sink error ends the
//! task with no retry.

use std::convert::Infallible;
use std::sync::Arc;

use super::buffer_pool::{BufferDescriptor, RecycleSender};
use super::handoff::HandoffReceiver;
use crate::backend::AudioSink;
use crate::error::{log_pipeline_error, PipelineError};
use crate::telemetry::PipelineStats;

/// Result of draining one buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOutcome {
    pub slot: usize,
    pub requested: usize,
    pub written: usize,
}

impl WriteOutcome {
    pub fn is_short(&self) -> bool {
        self.written < self.requested
    }
}

pub struct SinkConsumer<S: AudioSink> {
    inbound: HandoffReceiver<BufferDescriptor>,
    recycle: RecycleSender,
    sink: S,
    stats: Arc<PipelineStats>,
}

impl<S: AudioSink> SinkConsumer<S> {
    pub fn new(
        inbound: HandoffReceiver<BufferDescriptor>,
        recycle: RecycleSender,
        sink: S,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            inbound,
            recycle,
            sink,
            stats,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Receives one buffer, writes it and returns the slot to the pool.
    pub fn drain_one(&mut self) -> Result<WriteOutcome, PipelineError> {
        let descriptor = self.inbound.receive()?;
        let requested = descriptor.len();

        let written = self.sink.write(descriptor.bytes()).map_err(|err| {
            log_pipeline_error(&err, "consumer write");
            err
        })?;

        let outcome = WriteOutcome {
            slot: descriptor.slot(),
            requested,
            written,
        };
        self.stats.record_write(requested, written);

        if outcome.is_short() {
            log_pipeline_error(
                &PipelineError::ShortWrite { requested, written },
                "consumer write",
            );
        }

        // The recycle queue holds every slot, so this never waits.
        self.recycle.send(descriptor)?;
        Ok(outcome)
    }

    /// Drains buffers until a fatal error occurs.
    pub fn run(mut self) -> Result<Infallible, PipelineError> {
        tracing::info!("[Consumer] Starting sink drain loop");

        loop {
            self.drain_one()?;
        }
    }
}
