// BufferPool - fixed set of PCM slots recycled in round-robin order
//
// All slot memory is allocated once in BufferPool::new(). After that, slots
// only move between the producer and consumer as owned BufferDescriptor
// values:
//
// 1. Producer takes the next slot from the recycle queue (acquire)
// 2. Producer fills the slot with synthesized PCM
// 3. Producer sends the descriptor over the handoff channel
// 4. Consumer receives it and writes the valid bytes to the sink
// 5. Consumer returns the descriptor through the recycle queue
//
// Because the handoff channel is FIFO and the consumer recycles in the order
// it drains, slots come back in exactly the round-robin order the producer's
// cursor expects. acquire() checks this.

use super::handoff::{self, HandoffReceiver, HandoffSender};
use crate::error::PipelineError;

/// Default number of slots: one more than the default channel capacity
pub const DEFAULT_SLOT_COUNT: usize = 3;
/// Default number of frames per slot
pub const DEFAULT_SAMPLES_PER_SLOT: usize = 256;

/// Fixed-capacity block of raw PCM bytes plus its valid length.
#[derive(Debug, PartialEq, Eq)]
pub struct AudioBuffer {
    data: Box<[u8]>,
    len: usize,
}

impl AudioBuffer {
    fn allocate(capacity: usize) -> Result<Self, PipelineError> {
        let mut data = Vec::new();
        data.try_reserve_exact(capacity)
            .map_err(|_| PipelineError::ResourceExhausted {
                resource: format!("{} byte audio buffer", capacity),
            })?;
        data.resize(capacity, 0);

        Ok(Self {
            data: data.into_boxed_slice(),
            len: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Number of bytes valid for this cycle
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The valid bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// The whole slot, for filling
    pub fn storage_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Marks the first `len` bytes as valid.
    ///
    /// # Panics
    /// Panics if `len` exceeds the capacity
    pub fn set_len(&mut self, len: usize) {
        assert!(
            len <= self.data.len(),
            "valid length exceeds buffer capacity"
        );
        self.len = len;
    }
}

/// Ownership handle for one pool slot.
///
/// Holding the descriptor is the sole authority to read or write the slot.
/// It is deliberately not `Clone`.
#[derive(Debug, PartialEq, Eq)]
pub struct BufferDescriptor {
    slot: usize,
    buffer: AudioBuffer,
}

impl BufferDescriptor {
    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        self.buffer.as_bytes()
    }

    pub fn buffer(&self) -> &AudioBuffer {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut AudioBuffer {
        &mut self.buffer
    }
}

/// Consumer-side half used to hand drained slots back to the pool
pub type RecycleSender = HandoffSender<BufferDescriptor>;

/// Producer-side pool: round-robin cursor plus the recycle queue.
pub struct BufferPool {
    slot_count: usize,
    slot_bytes: usize,
    cursor: usize,
    recycled: HandoffReceiver<BufferDescriptor>,
}

impl BufferPool {
    /// Allocate `slot_count` slots of `slot_bytes` each.
    ///
    /// Returns the pool (for the producer) and the recycle sender (for the
    /// consumer). This is the only place slot memory is allocated.
    ///
    /// # Errors
    /// `ResourceExhausted` if the recycle queue or any slot cannot be
    /// allocated.
    ///
    /// # Panics
    /// Panics if slot_count is 0 or slot_bytes is 0
    pub fn new(
        slot_count: usize,
        slot_bytes: usize,
    ) -> Result<(BufferPool, RecycleSender), PipelineError> {
        assert!(slot_count > 0, "slot_count must be greater than 0");
        assert!(slot_bytes > 0, "slot_bytes must be greater than 0");

        let (mut recycle_tx, recycled) = handoff::try_channel(slot_count)?;

        for slot in 0..slot_count {
            let buffer = AudioBuffer::allocate(slot_bytes)?;
            if recycle_tx
                .try_send(BufferDescriptor { slot, buffer })
                .is_err()
            {
                return Err(PipelineError::channel_fault(
                    "recycle queue full during initialization",
                ));
            }
        }

        tracing::debug!(
            "[BufferPool] Allocated {} slots of {} bytes",
            slot_count,
            slot_bytes
        );

        Ok((
            BufferPool {
                slot_count,
                slot_bytes,
                cursor: 0,
                recycled,
            },
            recycle_tx,
        ))
    }

    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    pub fn slot_bytes(&self) -> usize {
        self.slot_bytes
    }

    /// Slots currently sitting in the recycle queue
    pub fn free_slots(&self) -> usize {
        self.recycled.len()
    }

    /// Returns the slot the producer fills next and advances the cursor.
    pub fn next_slot_index(&mut self) -> usize {
        let slot = self.cursor;
        self.cursor = (self.cursor + 1) % self.slot_count;
        slot
    }

    /// Takes ownership of the next round-robin slot, blocking until the
    /// consumer has recycled it.
    ///
    /// # Errors
    /// `ChannelFault` if the consumer is gone or a slot comes back out of
    /// round-robin order.
    pub fn acquire(&mut self) -> Result<BufferDescriptor, PipelineError> {
        let expected = self.next_slot_index();
        let mut descriptor = self.recycled.receive()?;

        if descriptor.slot != expected {
            return Err(PipelineError::channel_fault(format!(
                "slot {} recycled while slot {} was expected",
                descriptor.slot, expected
            )));
        }

        descriptor.buffer.set_len(0);
        Ok(descriptor)
    }
}
