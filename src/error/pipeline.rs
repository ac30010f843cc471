// Pipeline error types and constants

use crate::error::ErrorCode;
use log::{error, warn};
use std::fmt;

/// Pipeline error code constants
///
/// Single source of truth for the numeric codes reported by the CLI.
///
/// Error code range: 2001-2006
pub struct PipelineErrorCodes {}

impl PipelineErrorCodes {
    /// Startup buffer, channel or thread allocation failed
    pub const RESOURCE_EXHAUSTED: i32 = 2001;

    /// Audio sink missing or not ready
    pub const SINK_UNAVAILABLE: i32 = 2002;

    /// Sink accepted fewer bytes than requested
    pub const SHORT_WRITE: i32 = 2003;

    /// Sink reported a hard write error
    pub const SINK_WRITE_FAILURE: i32 = 2004;

    /// Handoff queue failed outside of ordinary full/empty blocking
    pub const CHANNEL_FAULT: i32 = 2005;

    /// Startup parameters rejected
    pub const INVALID_CONFIG: i32 = 2006;
}

/// Log a pipeline error with structured context
///
/// Fatal errors are logged at error level, the non-fatal short write at
/// warn level. The logging is non-blocking and will not panic on failure.
pub fn log_pipeline_error(err: &PipelineError, context: &str) {
    if err.is_fatal() {
        error!(
            "Pipeline error in {}: code={}, fatal=true, message={}",
            context,
            err.code(),
            err.message()
        );
    } else {
        warn!(
            "Pipeline error in {}: code={}, fatal=false, message={}",
            context,
            err.code(),
            err.message()
        );
    }
}

/// Tone pipeline errors
///
/// Every variant except `ShortWrite` is fatal: it ends the task that hit it
/// and, through the pipeline boundary, the process.
///
/// Error code ranges: 2001-2006
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineError {
    /// Startup buffer, channel or thread allocation failed
    ResourceExhausted { resource: String },

    /// Audio sink missing or not ready
    SinkUnavailable { reason: String },

    /// Sink accepted fewer bytes than requested
    ShortWrite { requested: usize, written: usize },

    /// Sink reported a hard write error
    SinkWriteFailure { reason: String },

    /// Handoff queue failed outside of ordinary full/empty blocking
    ChannelFault { reason: String },

    /// Startup parameters rejected
    InvalidConfig { reason: String },
}

impl PipelineError {
    /// Whether this error must terminate the pipeline
    pub fn is_fatal(&self) -> bool {
        !matches!(self, PipelineError::ShortWrite { .. })
    }

    pub(crate) fn channel_fault(reason: impl Into<String>) -> Self {
        PipelineError::ChannelFault {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_config(reason: impl Into<String>) -> Self {
        PipelineError::InvalidConfig {
            reason: reason.into(),
        }
    }
}

impl ErrorCode for PipelineError {
    fn code(&self) -> i32 {
        match self {
            PipelineError::ResourceExhausted { .. } => PipelineErrorCodes::RESOURCE_EXHAUSTED,
            PipelineError::SinkUnavailable { .. } => PipelineErrorCodes::SINK_UNAVAILABLE,
            PipelineError::ShortWrite { .. } => PipelineErrorCodes::SHORT_WRITE,
            PipelineError::SinkWriteFailure { .. } => PipelineErrorCodes::SINK_WRITE_FAILURE,
            PipelineError::ChannelFault { .. } => PipelineErrorCodes::CHANNEL_FAULT,
            PipelineError::InvalidConfig { .. } => PipelineErrorCodes::INVALID_CONFIG,
        }
    }

    fn message(&self) -> String {
        match self {
            PipelineError::ResourceExhausted { resource } => {
                format!("Failed to allocate {}", resource)
            }
            PipelineError::SinkUnavailable { reason } => {
                format!("Audio sink unavailable: {}", reason)
            }
            PipelineError::ShortWrite { requested, written } => {
                format!(
                    "{} bytes should be written but only {} bytes were written",
                    requested, written
                )
            }
            PipelineError::SinkWriteFailure { reason } => {
                format!("Audio sink write failed: {}", reason)
            }
            PipelineError::ChannelFault { reason } => {
                format!("Handoff channel fault: {}", reason)
            }
            PipelineError::InvalidConfig { reason } => {
                format!("Invalid pipeline configuration: {}", reason)
            }
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code {})", self.message(), self.code())
    }
}

impl std::error::Error for PipelineError {}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::SinkWriteFailure {
            reason: err.to_string(),
        }
    }
}

impl From<hound::Error> for PipelineError {
    fn from(err: hound::Error) -> Self {
        PipelineError::SinkWriteFailure {
            reason: err.to_string(),
        }
    }
}
