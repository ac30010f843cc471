// Handoff - bounded blocking SPSC channel
//
// Wraps an rtrb lock-free ring buffer with a mutex/condvar doorbell so that
// both ends can block without spinning:
// - send() parks while the ring is full, woken when the receiver pops
// - receive() parks while the ring is empty, woken when the sender pushes
//
// Waits are indefinite. The only way out of a wait besides progress is the
// peer half being dropped, which surfaces as a ChannelFault.
//
// The waiter re-checks the ring while holding the doorbell lock, and the
// other side rings only after mutating the ring and taking the same lock,
// so a wakeup cannot slip between the check and the wait.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};

use rtrb::{Consumer, PopError, Producer, PushError, RingBuffer};

use crate::error::PipelineError;

struct Doorbell {
    lock: Mutex<()>,
    cvar: Condvar,
    sender_closed: AtomicBool,
    receiver_closed: AtomicBool,
}

impl Doorbell {
    fn ring(&self) {
        // Taking the lock orders this notify after any in-progress check.
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        self.cvar.notify_all();
    }

    /// Blocks until `ready()` holds or the peer closes.
    ///
    /// Returns `Ok(true)` when ready, `Ok(false)` when the peer closed first.
    fn wait_until(
        &self,
        peer_closed: &AtomicBool,
        mut ready: impl FnMut() -> bool,
    ) -> Result<bool, PipelineError> {
        let mut guard = self
            .lock
            .lock()
            .map_err(|_| PipelineError::channel_fault("doorbell mutex poisoned"))?;
        loop {
            if ready() {
                return Ok(true);
            }
            if peer_closed.load(Ordering::Acquire) {
                return Ok(false);
            }
            guard = self
                .cvar
                .wait(guard)
                .map_err(|_| PipelineError::channel_fault("doorbell mutex poisoned"))?;
        }
    }
}

/// Creates a bounded handoff channel holding at most `capacity` values.
///
/// # Panics
/// Panics if capacity is 0
pub fn channel<T>(capacity: usize) -> (HandoffSender<T>, HandoffReceiver<T>) {
    assert!(capacity > 0, "capacity must be greater than 0");

    let (producer, consumer) = RingBuffer::new(capacity);
    let doorbell = Arc::new(Doorbell {
        lock: Mutex::new(()),
        cvar: Condvar::new(),
        sender_closed: AtomicBool::new(false),
        receiver_closed: AtomicBool::new(false),
    });

    (
        HandoffSender {
            producer,
            doorbell: Arc::clone(&doorbell),
        },
        HandoffReceiver { consumer, doorbell },
    )
}

/// Like [`channel`], but reports a ring that cannot be allocated as
/// `ResourceExhausted` instead of aborting.
///
/// # Panics
/// Panics if capacity is 0
pub fn try_channel<T>(
    capacity: usize,
) -> Result<(HandoffSender<T>, HandoffReceiver<T>), PipelineError> {
    // rtrb allocates the ring infallibly, so check the reservation first
    let mut reservation: Vec<T> = Vec::new();
    reservation
        .try_reserve_exact(capacity)
        .map_err(|e| PipelineError::ResourceExhausted {
            resource: format!("handoff channel of {} entries: {}", capacity, e),
        })?;
    drop(reservation);

    Ok(channel(capacity))
}

/// Sending half of a handoff channel
pub struct HandoffSender<T> {
    producer: Producer<T>,
    doorbell: Arc<Doorbell>,
}

impl<T> HandoffSender<T> {
    /// Enqueues `value`, blocking indefinitely while the channel is full.
    ///
    /// # Errors
    /// `ChannelFault` if the receiver has been dropped.
    pub fn send(&mut self, mut value: T) -> Result<(), PipelineError> {
        loop {
            if self.doorbell.receiver_closed.load(Ordering::Acquire) {
                return Err(PipelineError::channel_fault("receiver dropped"));
            }

            match self.producer.push(value) {
                Ok(()) => {
                    self.doorbell.ring();
                    return Ok(());
                }
                Err(PushError::Full(rejected)) => {
                    value = rejected;
                    let producer = &self.producer;
                    self.doorbell
                        .wait_until(&self.doorbell.receiver_closed, || !producer.is_full())?;
                }
            }
        }
    }

    /// Enqueues `value` without blocking, handing it back if the channel is
    /// full.
    pub fn try_send(&mut self, value: T) -> Result<(), T> {
        match self.producer.push(value) {
            Ok(()) => {
                self.doorbell.ring();
                Ok(())
            }
            Err(PushError::Full(rejected)) => Err(rejected),
        }
    }

    /// Number of values currently enqueued
    pub fn len(&self) -> usize {
        self.capacity() - self.producer.slots()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.producer.buffer().capacity()
    }
}

impl<T> Drop for HandoffSender<T> {
    fn drop(&mut self) {
        self.doorbell.sender_closed.store(true, Ordering::Release);
        self.doorbell.ring();
    }
}

/// Receiving half of a handoff channel
pub struct HandoffReceiver<T> {
    consumer: Consumer<T>,
    doorbell: Arc<Doorbell>,
}

impl<T> HandoffReceiver<T> {
    /// Dequeues the oldest value, blocking indefinitely while the channel is
    /// empty.
    ///
    /// Values sent before the sender was dropped are still delivered.
    ///
    /// # Errors
    /// `ChannelFault` if the channel is empty and the sender has been dropped.
    pub fn receive(&mut self) -> Result<T, PipelineError> {
        loop {
            match self.consumer.pop() {
                Ok(value) => {
                    self.doorbell.ring();
                    return Ok(value);
                }
                Err(PopError::Empty) => {
                    let consumer = &self.consumer;
                    let ready = self
                        .doorbell
                        .wait_until(&self.doorbell.sender_closed, || !consumer.is_empty())?;
                    if !ready {
                        return Err(PipelineError::channel_fault("sender dropped"));
                    }
                }
            }
        }
    }

    /// Dequeues the oldest value if one is available.
    pub fn try_receive(&mut self) -> Option<T> {
        match self.consumer.pop() {
            Ok(value) => {
                self.doorbell.ring();
                Some(value)
            }
            Err(PopError::Empty) => None,
        }
    }

    /// Number of values currently enqueued
    pub fn len(&self) -> usize {
        self.consumer.slots()
    }

    pub fn is_empty(&self) -> bool {
        self.consumer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.consumer.buffer().capacity()
    }
}

impl<T> Drop for HandoffReceiver<T> {
    fn drop(&mut self) {
        self.doorbell.receiver_closed.store(true, Ordering::Release);
        self.doorbell.ring();
    }
}
