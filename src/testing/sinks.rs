//! Scripted [`AudioSink`] implementations.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use crate::backend::{AudioOutput, AudioSink, PcmFormat};
use crate::error::PipelineError;

/// Sink that accepts every byte and keeps a copy.
///
/// Clones share the same recording, so a test can keep one while the
/// pipeline owns another. With a write limit, every write after the first
/// `limit` fails hard, which is how tests bring a running pipeline to an end.
#[derive(Clone, Default)]
pub struct RecordingSink {
    recorded: Arc<Mutex<Vec<u8>>>,
    writes: Arc<AtomicUsize>,
    limit: Option<usize>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_write_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }

    /// Everything written so far, in order
    pub fn bytes(&self) -> Vec<u8> {
        self.recorded
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Recorded bytes decoded as little-endian 16-bit samples
    pub fn samples(&self) -> Vec<i16> {
        self.bytes()
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect()
    }

    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl AudioSink for RecordingSink {
    fn write(&mut self, bytes: &[u8]) -> Result<usize, PipelineError> {
        if let Some(limit) = self.limit {
            if self.writes.load(Ordering::SeqCst) >= limit {
                return Err(PipelineError::SinkWriteFailure {
                    reason: format!("write limit of {} reached", limit),
                });
            }
        }
        self.recorded
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend_from_slice(bytes);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(bytes.len())
    }
}

/// Output that hands out clones of one [`RecordingSink`] and remembers the
/// format it was opened with.
#[derive(Clone, Default)]
pub struct RecordingOutput {
    sink: RecordingSink,
    opened: Arc<Mutex<Option<PcmFormat>>>,
    unavailable: bool,
}

impl RecordingOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// An output whose sink fails hard after `limit` writes
    pub fn with_write_limit(limit: usize) -> Self {
        Self {
            sink: RecordingSink::with_write_limit(limit),
            ..Self::default()
        }
    }

    /// An output whose `open` always fails
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn sink(&self) -> RecordingSink {
        self.sink.clone()
    }

    pub fn opened_format(&self) -> Option<PcmFormat> {
        *self.opened.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl AudioOutput for RecordingOutput {
    type Sink = RecordingSink;

    fn open(&self, format: PcmFormat) -> Result<RecordingSink, PipelineError> {
        if self.unavailable {
            return Err(PipelineError::SinkUnavailable {
                reason: "recording output disabled".to_string(),
            });
        }
        *self.opened.lock().unwrap_or_else(|e| e.into_inner()) = Some(format);
        Ok(self.sink.clone())
    }
}

/// Sink that accepts at most `limit` bytes per write.
pub struct ShortWriteSink {
    limit: usize,
}

impl ShortWriteSink {
    pub fn new(limit: usize) -> Self {
        Self { limit }
    }
}

impl AudioSink for ShortWriteSink {
    fn write(&mut self, bytes: &[u8]) -> Result<usize, PipelineError> {
        Ok(bytes.len().min(self.limit))
    }
}

/// Sink whose every write is a hard failure. Counts attempts.
#[derive(Default)]
pub struct FailingSink {
    attempts: Arc<AtomicUsize>,
}

impl FailingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.attempts)
    }
}

impl AudioSink for FailingSink {
    fn write(&mut self, _bytes: &[u8]) -> Result<usize, PipelineError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(PipelineError::SinkWriteFailure {
            reason: "scripted device failure".to_string(),
        })
    }
}

/// Release switch for a [`GatedSink`].
#[derive(Clone, Default)]
pub struct SinkGate {
    state: Arc<(Mutex<bool>, Condvar)>,
}

impl SinkGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lets all current and future writes through
    pub fn open(&self) {
        let (lock, cvar) = &*self.state;
        *lock.lock().unwrap_or_else(|e| e.into_inner()) = true;
        cvar.notify_all();
    }

    fn wait(&self) {
        let (lock, cvar) = &*self.state;
        let mut open = lock.lock().unwrap_or_else(|e| e.into_inner());
        while !*open {
            open = cvar.wait(open).unwrap_or_else(|e| e.into_inner());
        }
    }
}

/// Sink that blocks every write until its gate opens, simulating a stalled
/// device. Writes then record like a [`RecordingSink`].
pub struct GatedSink {
    gate: SinkGate,
    inner: RecordingSink,
    entered: Arc<AtomicUsize>,
}

impl GatedSink {
    pub fn new(gate: SinkGate, inner: RecordingSink) -> Self {
        Self {
            gate,
            inner,
            entered: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Counter of writes that have started (including ones still blocked)
    pub fn entered(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.entered)
    }
}

impl AudioSink for GatedSink {
    fn write(&mut self, bytes: &[u8]) -> Result<usize, PipelineError> {
        self.entered.fetch_add(1, Ordering::SeqCst);
        self.gate.wait();
        self.inner.write(bytes)
    }
}
