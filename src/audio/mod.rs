// Audio module - tone synthesis, buffer handoff and sink drain

pub mod buffer_pool;
pub mod consumer;
pub mod engine;
pub mod handoff;
pub mod producer;
pub mod tone;

// Re-export commonly used types for convenience
pub use buffer_pool::{
    AudioBuffer, BufferDescriptor, BufferPool, RecycleSender, DEFAULT_SAMPLES_PER_SLOT,
    DEFAULT_SLOT_COUNT,
};
pub use consumer::{SinkConsumer, WriteOutcome};
pub use engine::{Pipeline, PipelineFailure, PipelineHandle, PipelineTask};
pub use handoff::{HandoffReceiver, HandoffSender};
pub use producer::ToneProducer;
pub use tone::{generate, Phase, ToneGenerator};
