//! Producer task - synthesizes tone buffers and hands them to the consumer.
//!
//! ```text
//! ToneProducer::run()
//!   └─> produce_one() [forever]
//!       ├─> BufferPool::acquire()      [round-robin slot, blocks if none free]
//!       ├─> ToneGenerator::render()    [fills slot, advances Phase]
//!       └─> HandoffSender::send()      [blocks while channel is full]
//! ```

use std::convert::Infallible;
use std::sync::Arc;

use super::buffer_pool::{BufferDescriptor, BufferPool};
use super::handoff::HandoffSender;
use super::tone::{Phase, ToneGenerator};
use crate::error::PipelineError;
use crate::telemetry::PipelineStats;

pub struct ToneProducer {
    tone: ToneGenerator,
    phase: Phase,
    pool: BufferPool,
    outbound: HandoffSender<BufferDescriptor>,
    frames_per_slot: usize,
    stats: Arc<PipelineStats>,
}

impl ToneProducer {
    /// # Arguments
    /// * `tone` - Tone parameters and frame layout
    /// * `pool` - Producer side of the buffer pool
    /// * `outbound` - Sending half of the handoff channel
    /// * `frames_per_slot` - Frames rendered per buffer
    /// * `stats` - Shared counters
    pub fn new(
        tone: ToneGenerator,
        pool: BufferPool,
        outbound: HandoffSender<BufferDescriptor>,
        frames_per_slot: usize,
        stats: Arc<PipelineStats>,
    ) -> Self {
        Self {
            phase: Phase::new(tone.sample_rate),
            tone,
            pool,
            outbound,
            frames_per_slot,
            stats,
        }
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    /// Fills one slot and sends it. Returns the slot index that was sent.
    pub fn produce_one(&mut self) -> Result<usize, PipelineError> {
        let mut descriptor = self.pool.acquire()?;
        let slot = descriptor.slot();

        let buffer = descriptor.buffer_mut();
        let valid = self
            .frames_per_slot
            .saturating_mul(self.tone.bytes_per_frame())
            .min(buffer.capacity());
        let written = self
            .tone
            .render(&mut self.phase, &mut buffer.storage_mut()[..valid]);
        buffer.set_len(written);

        self.outbound.send(descriptor)?;
        self.stats.record_produced();
        tracing::trace!("[Producer] Sent slot {} ({} bytes)", slot, written);

        Ok(slot)
    }

    /// Produces buffers until a fatal error occurs.
    pub fn run(mut self) -> Result<Infallible, PipelineError> {
        tracing::info!(
            "[Producer] Starting: {} Hz tone, amplitude {}, {} frames per slot, {} slots",
            self.tone.frequency,
            self.tone.amplitude,
            self.frames_per_slot,
            self.pool.slot_count()
        );

        loop {
            self.produce_one()?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::handoff;
    use crate::audio::tone::BYTES_PER_SAMPLE;

    fn tone() -> ToneGenerator {
        ToneGenerator {
            sample_rate: 48000,
            frequency: 1000,
            amplitude: 10000,
            channel_count: 1,
        }
    }

    #[test]
    fn test_produce_fills_slots_in_round_robin_order() {
        let (pool, mut recycle) = BufferPool::new(3, 256 * BYTES_PER_SAMPLE).unwrap();
        let (tx, mut rx) = handoff::channel(2);
        let stats = Arc::new(PipelineStats::new());
        let mut producer = ToneProducer::new(tone(), pool, tx, 256, Arc::clone(&stats));

        let mut slots = Vec::new();
        for _ in 0..6 {
            slots.push(producer.produce_one().unwrap());
            let descriptor = rx.receive().unwrap();
            assert_eq!(descriptor.len(), 512);
            recycle.send(descriptor).unwrap();
        }

        assert_eq!(slots, vec![0, 1, 2, 0, 1, 2]);
        assert_eq!(stats.snapshot().buffers_produced, 6);
        assert_eq!(producer.phase().index(), (6 * 256) % 48000);
    }

    #[test]
    fn test_first_buffer_samples() {
        let (pool, _recycle) = BufferPool::new(3, 256 * BYTES_PER_SAMPLE).unwrap();
        let (tx, mut rx) = handoff::channel(2);
        let mut producer =
            ToneProducer::new(tone(), pool, tx, 256, Arc::new(PipelineStats::new()));

        producer.produce_one().unwrap();
        let descriptor = rx.receive().unwrap();
        let bytes = descriptor.bytes();
        let sample = |i: usize| i16::from_le_bytes([bytes[2 * i], bytes[2 * i + 1]]);

        assert_eq!(sample(0), 0);
        assert_eq!(sample(12), 10000);
        assert_eq!(sample(36), -10000);
    }

    #[test]
    fn test_partial_slot_use() {
        // Slot larger than one cycle's worth: only the rendered bytes are valid
        let (pool, _recycle) = BufferPool::new(2, 1024).unwrap();
        let (tx, mut rx) = handoff::channel(1);
        let mut producer =
            ToneProducer::new(tone(), pool, tx, 100, Arc::new(PipelineStats::new()));

        producer.produce_one().unwrap();
        assert_eq!(rx.receive().unwrap().len(), 200);
    }

    #[test]
    fn test_oversized_frame_count_fills_slot() {
        let (pool, _recycle) = BufferPool::new(2, 64).unwrap();
        let (tx, mut rx) = handoff::channel(1);
        let mut producer =
            ToneProducer::new(tone(), pool, tx, usize::MAX, Arc::new(PipelineStats::new()));

        producer.produce_one().unwrap();
        assert_eq!(rx.receive().unwrap().len(), 64);
    }

    #[test]
    fn test_send_fault_stops_producer() {
        let (pool, _recycle) = BufferPool::new(3, 64).unwrap();
        let (tx, rx) = handoff::channel(2);
        drop(rx);
        let producer = ToneProducer::new(tone(), pool, tx, 32, Arc::new(PipelineStats::new()));

        match producer.run() {
            Err(PipelineError::ChannelFault { .. }) => {}
            other => panic!("Expected ChannelFault, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_blocks_after_capacity_sends() {
        let (pool, _recycle) = BufferPool::new(3, 64).unwrap();
        let (tx, rx) = handoff::channel(2);
        let stats = Arc::new(PipelineStats::new());
        let producer = ToneProducer::new(tone(), pool, tx, 32, Arc::clone(&stats));

        // Nothing receives: the producer must stop after filling the channel
        let worker = std::thread::spawn(move || producer.run());
        std::thread::sleep(std::time::Duration::from_millis(100));
        assert_eq!(stats.snapshot().buffers_produced, 2);
        assert_eq!(rx.len(), 2);
        assert!(!worker.is_finished());

        drop(rx);
        assert!(matches!(
            worker.join().unwrap(),
            Err(PipelineError::ChannelFault { .. })
        ));
    }
}
