//! Audio sink abstractions consumed by the pipeline.
//!
//! The pipeline only needs a blocking byte-stream drain. Opening the device
//! and negotiating its format belong to the [`AudioOutput`] implementation.

use crate::error::PipelineError;

/// PCM stream layout requested when opening a sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub channel_count: u16,
}

impl PcmFormat {
    pub fn bytes_per_frame(&self) -> usize {
        (self.bits_per_sample as usize / 8) * self.channel_count as usize
    }

    /// Bytes consumed per second of playback
    pub fn byte_rate(&self) -> usize {
        self.bytes_per_frame() * self.sample_rate as usize
    }
}

/// Something that can be opened into a writable sink.
pub trait AudioOutput {
    type Sink: AudioSink + 'static;

    /// # Errors
    /// `SinkUnavailable` if the sink cannot be opened with `format`.
    fn open(&self, format: PcmFormat) -> Result<Self::Sink, PipelineError>;
}

/// Blocking raw-PCM byte drain.
pub trait AudioSink: Send {
    /// Writes `bytes`, blocking until the sink has accepted them.
    ///
    /// # Returns
    /// Number of bytes accepted, which may be fewer than requested
    ///
    /// # Errors
    /// `SinkWriteFailure` on a hard device error
    fn write(&mut self, bytes: &[u8]) -> Result<usize, PipelineError>;
}

impl<S: AudioSink + ?Sized> AudioSink for Box<S> {
    fn write(&mut self, bytes: &[u8]) -> Result<usize, PipelineError> {
        (**self).write(bytes)
    }
}

#[cfg(feature = "device")]
mod cpal;
#[cfg(feature = "device")]
pub use self::cpal::{CpalOutput, CpalSink};

mod null;
pub use null::{NullOutput, NullSink};

mod wav;
pub use wav::{WavOutput, WavSink};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_per_frame() {
        let mono = PcmFormat {
            sample_rate: 48000,
            bits_per_sample: 16,
            channel_count: 1,
        };
        assert_eq!(mono.bytes_per_frame(), 2);
        assert_eq!(mono.byte_rate(), 96000);

        let stereo = PcmFormat {
            channel_count: 2,
            ..mono
        };
        assert_eq!(stereo.bytes_per_frame(), 4);
    }
}
