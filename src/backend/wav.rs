//! WAV file sink backed by `hound`.
//!
//! The header is rewritten after every write, so the file on disk is a
//! valid WAV no matter when the process stops.

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use hound::{SampleFormat, WavSpec, WavWriter};

use super::{AudioOutput, AudioSink, PcmFormat};
use crate::error::PipelineError;

/// Opens a [`WavSink`] at a fixed path, truncating any existing file.
#[derive(Debug, Clone)]
pub struct WavOutput {
    path: PathBuf,
}

impl WavOutput {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl AudioOutput for WavOutput {
    type Sink = WavSink;

    fn open(&self, format: PcmFormat) -> Result<WavSink, PipelineError> {
        if format.bits_per_sample != 16 {
            return Err(PipelineError::SinkUnavailable {
                reason: format!(
                    "WAV sink only writes 16-bit PCM (got {} bits)",
                    format.bits_per_sample
                ),
            });
        }

        let spec = WavSpec {
            channels: format.channel_count,
            sample_rate: format.sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let writer =
            WavWriter::create(&self.path, spec).map_err(|e| PipelineError::SinkUnavailable {
                reason: format!("Failed to create {}: {}", self.path.display(), e),
            })?;

        log::info!("[WavSink] Writing {:?} to {}", format, self.path.display());
        Ok(WavSink { writer })
    }
}

pub struct WavSink {
    writer: WavWriter<BufWriter<File>>,
}

impl AudioSink for WavSink {
    /// Writes whole 16-bit samples; a trailing odd byte is not accepted.
    fn write(&mut self, bytes: &[u8]) -> Result<usize, PipelineError> {
        let mut written = 0;
        for pair in bytes.chunks_exact(2) {
            self.writer
                .write_sample(i16::from_le_bytes([pair[0], pair[1]]))?;
            written += 2;
        }
        self.writer.flush()?;
        Ok(written)
    }
}
