//! Pipeline statistics.
//!
//! Lock-free counters updated by the producer and consumer threads and read
//! by whoever holds the pipeline handle.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared between the pipeline threads via `Arc`.
#[derive(Debug, Default)]
pub struct PipelineStats {
    buffers_produced: AtomicU64,
    buffers_written: AtomicU64,
    bytes_written: AtomicU64,
    short_writes: AtomicU64,
}

/// Point-in-time copy of [`PipelineStats`] for logging and CLI reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct StatsSnapshot {
    pub buffers_produced: u64,
    pub buffers_written: u64,
    pub bytes_written: u64,
    pub short_writes: u64,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_produced(&self) {
        self.buffers_produced.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_write(&self, requested: usize, written: usize) {
        self.buffers_written.fetch_add(1, Ordering::Relaxed);
        self.bytes_written
            .fetch_add(written as u64, Ordering::Relaxed);
        if written != requested {
            self.short_writes.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            buffers_produced: self.buffers_produced.load(Ordering::Relaxed),
            buffers_written: self.buffers_written.load(Ordering::Relaxed),
            bytes_written: self.bytes_written.load(Ordering::Relaxed),
            short_writes: self.short_writes.load(Ordering::Relaxed),
        }
    }
}
