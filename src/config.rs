//! Configuration management for the tone pipeline
//!
//! Startup parameters load from a JSON file with per-section defaults. The
//! whole configuration is fixed once the pipeline starts.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::audio::buffer_pool::{DEFAULT_SAMPLES_PER_SLOT, DEFAULT_SLOT_COUNT};
use crate::audio::tone::{ToneGenerator, BYTES_PER_SAMPLE};
use crate::backend::PcmFormat;
use crate::error::PipelineError;

/// Complete pipeline configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub format: FormatConfig,
    pub tone: ToneConfig,
    pub buffers: BufferConfig,
}

/// PCM stream layout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Bits per sample (only 16 is supported)
    pub bits_per_sample: u16,
    /// Channels per frame; every channel carries the same tone
    pub channel_count: u16,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            bits_per_sample: 16,
            channel_count: 1,
        }
    }
}

/// Sine tone parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneConfig {
    /// Frequency in Hz
    pub frequency: u32,
    /// Peak amplitude (max 32766)
    pub amplitude: i16,
}

impl Default for ToneConfig {
    fn default() -> Self {
        Self {
            frequency: 1000,
            amplitude: 10000,
        }
    }
}

/// Buffer geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Number of pre-allocated slots
    pub slot_count: usize,
    /// Frames rendered into each slot per cycle
    pub samples_per_slot: usize,
    /// Handoff channel capacity; must be below slot_count
    pub channel_capacity: usize,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            slot_count: DEFAULT_SLOT_COUNT,
            samples_per_slot: DEFAULT_SAMPLES_PER_SLOT,
            channel_capacity: 2,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The loaded configuration, or the defaults if the file doesn't exist or
    /// the JSON is invalid
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Check every startup precondition.
    ///
    /// # Errors
    /// `InvalidConfig` naming the first violated constraint.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let format = &self.format;
        let tone = &self.tone;
        let buffers = &self.buffers;

        if format.sample_rate == 0 {
            return Err(PipelineError::invalid_config(
                "sample_rate must be greater than 0",
            ));
        }
        if format.bits_per_sample != 16 {
            return Err(PipelineError::invalid_config(format!(
                "bits_per_sample must be 16 (got {})",
                format.bits_per_sample
            )));
        }
        if format.channel_count == 0 {
            return Err(PipelineError::invalid_config(
                "channel_count must be greater than 0",
            ));
        }
        if tone.frequency == 0 || tone.frequency as u64 * 2 >= format.sample_rate as u64 {
            return Err(PipelineError::invalid_config(format!(
                "frequency must be between 1 and below Nyquist ({} Hz), got {}",
                format.sample_rate / 2,
                tone.frequency
            )));
        }
        if tone.amplitude <= 0 || tone.amplitude == i16::MAX {
            return Err(PipelineError::invalid_config(format!(
                "amplitude must be between 1 and {} (got {})",
                i16::MAX - 1,
                tone.amplitude
            )));
        }
        if buffers.slot_count == 0 || buffers.samples_per_slot == 0 || buffers.channel_capacity == 0
        {
            return Err(PipelineError::invalid_config(
                "slot_count, samples_per_slot and channel_capacity must be greater than 0",
            ));
        }
        if self.checked_slot_bytes().is_none() {
            return Err(PipelineError::invalid_config(format!(
                "samples_per_slot ({}) x {} channels overflows the slot size",
                buffers.samples_per_slot, format.channel_count
            )));
        }
        if buffers.slot_count <= buffers.channel_capacity {
            return Err(PipelineError::invalid_config(format!(
                "slot_count ({}) must exceed channel_capacity ({})",
                buffers.slot_count, buffers.channel_capacity
            )));
        }

        Ok(())
    }

    pub fn pcm_format(&self) -> PcmFormat {
        PcmFormat {
            sample_rate: self.format.sample_rate,
            bits_per_sample: self.format.bits_per_sample,
            channel_count: self.format.channel_count,
        }
    }

    pub fn tone_generator(&self) -> ToneGenerator {
        ToneGenerator {
            sample_rate: self.format.sample_rate,
            frequency: self.tone.frequency,
            amplitude: self.tone.amplitude,
            channel_count: self.format.channel_count,
        }
    }

    /// Byte capacity of one slot: samples x bytes per sample x channels.
    ///
    /// Saturates on overflow; `validate()` rejects such configurations.
    pub fn slot_bytes(&self) -> usize {
        self.checked_slot_bytes().unwrap_or(usize::MAX)
    }

    fn checked_slot_bytes(&self) -> Option<usize> {
        self.buffers
            .samples_per_slot
            .checked_mul(BYTES_PER_SAMPLE)?
            .checked_mul(self.format.channel_count as usize)
    }
}
