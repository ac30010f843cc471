//! Null sink: discards PCM, optionally at the real-time rate of the stream.

use std::time::{Duration, Instant};

use super::{AudioOutput, AudioSink, PcmFormat};
use crate::error::PipelineError;

/// Opens [`NullSink`]s.
#[derive(Debug, Clone, Copy)]
pub struct NullOutput {
    paced: bool,
}

impl NullOutput {
    /// Writes block for as long as the audio would take to play
    pub fn paced() -> Self {
        Self { paced: true }
    }

    /// Writes return immediately
    pub fn unpaced() -> Self {
        Self { paced: false }
    }
}

impl Default for NullOutput {
    fn default() -> Self {
        Self::paced()
    }
}

impl AudioOutput for NullOutput {
    type Sink = NullSink;

    fn open(&self, format: PcmFormat) -> Result<NullSink, PipelineError> {
        if format.byte_rate() == 0 {
            return Err(PipelineError::SinkUnavailable {
                reason: format!("null sink cannot pace format {:?}", format),
            });
        }
        Ok(NullSink {
            byte_rate: format.byte_rate() as u64,
            paced: self.paced,
            started: None,
            total_bytes: 0,
        })
    }
}

pub struct NullSink {
    byte_rate: u64,
    paced: bool,
    started: Option<Instant>,
    total_bytes: u64,
}

impl NullSink {
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    /// Playback time represented by everything written so far
    pub fn played(&self) -> Duration {
        Duration::from_micros(self.total_bytes * 1_000_000 / self.byte_rate)
    }
}

impl AudioSink for NullSink {
    fn write(&mut self, bytes: &[u8]) -> Result<usize, PipelineError> {
        let started = *self.started.get_or_insert_with(Instant::now);
        self.total_bytes += bytes.len() as u64;

        if self.paced {
            let due = started + self.played();
            let now = Instant::now();
            if due > now {
                std::thread::sleep(due - now);
            }
        }

        Ok(bytes.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format() -> PcmFormat {
        PcmFormat {
            sample_rate: 48000,
            bits_per_sample: 16,
            channel_count: 1,
        }
    }

    #[test]
    fn test_unpaced_accepts_everything() {
        let mut sink = NullOutput::unpaced().open(format()).unwrap();
        assert_eq!(sink.write(&[0; 512]).unwrap(), 512);
        assert_eq!(sink.write(&[0; 7]).unwrap(), 7);
        assert_eq!(sink.total_bytes(), 519);
    }

    #[test]
    fn test_paced_write_blocks_for_playback_time() {
        let mut sink = NullOutput::paced().open(format()).unwrap();
        let start = Instant::now();

        // 4800 bytes = 2400 frames = 50ms at 48kHz mono
        sink.write(&[0; 4800]).unwrap();
        assert!(start.elapsed() >= Duration::from_millis(45));
        assert_eq!(sink.played(), Duration::from_millis(50));
    }

    #[test]
    fn test_zero_rate_is_unavailable() {
        let format = PcmFormat {
            sample_rate: 0,
            ..format()
        };
        assert!(matches!(
            NullOutput::paced().open(format),
            Err(PipelineError::SinkUnavailable { .. })
        ));
    }
}
