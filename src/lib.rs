// Tone Pipeline - real-time sine generation and PCM output
// Producer/consumer threads joined by a bounded blocking handoff channel

// Module declarations
pub mod audio;
pub mod backend;
pub mod config;
pub mod error;
pub mod telemetry;
pub mod testing;

// Re-exports for convenience
pub use audio::{Pipeline, PipelineFailure, PipelineHandle, PipelineTask};
pub use backend::{AudioOutput, AudioSink, PcmFormat};
pub use config::PipelineConfig;
pub use error::{ErrorCode, PipelineError};
pub use telemetry::{PipelineStats, StatsSnapshot};
