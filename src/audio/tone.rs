//! Tone - sine wave synthesis into 16-bit PCM
//!
//! Key features:
//! - Pure sample function, deterministic for (index, rate, frequency, amplitude)
//! - Phase reduced in integer arithmetic, so the waveform repeats exactly and
//!   never drifts over long runs
//! - Zero allocations when rendering into a pre-allocated slot

/// Bytes occupied by one 16-bit sample
pub const BYTES_PER_SAMPLE: usize = 2;

/// Computes one sine sample for a running sample index.
///
/// `amplitude * sin(2π · frequency · sample_index / sample_rate)`, rounded and
/// clamped to `i16`. The index is taken modulo `sample_rate`, and the phase
/// numerator `frequency · index` is reduced modulo `sample_rate` before the
/// floating point step.
///
/// # Arguments
/// * `sample_index` - Running sample index (any value, wraps at `sample_rate`)
/// * `sample_rate` - Sample rate in Hz (must be > 0)
/// * `frequency` - Tone frequency in Hz
/// * `amplitude` - Peak amplitude, expected to be below `i16::MAX`
///
/// # Examples
/// ```
/// use tone_pipeline::audio::tone::generate;
/// assert_eq!(generate(0, 48000, 1000, 10000), 0);
/// assert_eq!(generate(12, 48000, 1000, 10000), 10000);
/// assert_eq!(generate(36, 48000, 1000, 10000), -10000);
/// ```
#[inline]
pub fn generate(sample_index: u64, sample_rate: u32, frequency: u32, amplitude: i16) -> i16 {
    let rate = sample_rate as u64;
    let index = sample_index % rate;
    let numerator = (frequency as u64 * index) % rate;
    let angle = 2.0 * std::f64::consts::PI * numerator as f64 / rate as f64;
    let value = (amplitude as f64 * angle.sin()).round();
    value.clamp(i16::MIN as f64, i16::MAX as f64) as i16
}

/// Number of samples after which the tone repeats: `r / gcd(f, r)`.
pub fn period_samples(sample_rate: u32, frequency: u32) -> u32 {
    sample_rate / gcd(frequency, sample_rate)
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

/// Running sample index owned by the producer.
///
/// Wraps modulo the sample rate so it stays bounded for the lifetime of the
/// process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phase {
    index: u32,
    sample_rate: u32,
}

impl Phase {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            index: 0,
            sample_rate,
        }
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    /// Returns the current index and steps to the next one.
    #[inline]
    pub fn advance(&mut self) -> u32 {
        let current = self.index;
        self.index = (self.index + 1) % self.sample_rate;
        current
    }
}

/// Fixed tone parameters plus the frame layout they render into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToneGenerator {
    pub sample_rate: u32,
    pub frequency: u32,
    pub amplitude: i16,
    pub channel_count: u16,
}

impl ToneGenerator {
    pub fn bytes_per_frame(&self) -> usize {
        BYTES_PER_SAMPLE * self.channel_count as usize
    }

    /// Renders whole frames into `out` as little-endian PCM, advancing `phase`
    /// once per frame.
    ///
    /// Each frame carries the same sample on every channel. Trailing bytes
    /// that do not form a whole frame are left untouched.
    ///
    /// # Returns
    /// Number of bytes written
    pub fn render(&self, phase: &mut Phase, out: &mut [u8]) -> usize {
        let frame_bytes = self.bytes_per_frame();
        let mut written = 0;

        for frame in out.chunks_exact_mut(frame_bytes) {
            let index = phase.advance();
            let sample = generate(
                index as u64,
                self.sample_rate,
                self.frequency,
                self.amplitude,
            );
            let le = sample.to_le_bytes();
            for channel in frame.chunks_exact_mut(BYTES_PER_SAMPLE) {
                channel.copy_from_slice(&le);
            }
            written += frame_bytes;
        }

        written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const RATE: u32 = 48000;
    const FREQ: u32 = 1000;
    const AMP: i16 = 10000;

    #[test]
    fn test_quarter_period_values() {
        // 48000 / 1000 / 4 = 12 samples per quarter period
        assert_eq!(generate(0, RATE, FREQ, AMP), 0);
        assert_eq!(generate(12, RATE, FREQ, AMP), 10000);
        assert_eq!(generate(24, RATE, FREQ, AMP), 0);
        assert_eq!(generate(36, RATE, FREQ, AMP), -10000);
    }

    #[test]
    fn test_generate_wraps_at_sample_rate() {
        let mut rng = StdRng::seed_from_u64(42);
        let cases = [(48000, 1000, 10000), (44100, 440, 12000), (8000, 3, 30000)];

        for &(rate, freq, amp) in &cases {
            for _ in 0..500 {
                let index: u64 = rng.gen_range(0..u64::MAX / 2);
                assert_eq!(
                    generate(index, rate, freq, amp),
                    generate(index % rate as u64, rate, freq, amp),
                    "index {} should wrap at rate {}",
                    index,
                    rate
                );
            }
        }
    }

    #[test]
    fn test_sequence_is_periodic() {
        let cases = [(48000, 1000, 10000), (44100, 440, 12000), (48000, 7, 500)];

        for &(rate, freq, amp) in &cases {
            let period = period_samples(rate, freq) as u64;
            for index in 0..(period * 2).min(5000) {
                assert_eq!(
                    generate(index, rate, freq, amp),
                    generate(index + period, rate, freq, amp),
                    "rate {} freq {} should repeat every {} samples",
                    rate,
                    freq,
                    period
                );
            }
        }
    }

    #[test]
    fn test_period_formula() {
        assert_eq!(period_samples(48000, 1000), 48);
        assert_eq!(period_samples(44100, 440), 2205);
        assert_eq!(period_samples(48000, 7), 48000);
    }

    #[test]
    fn test_amplitude_bounds() {
        for index in 0..RATE as u64 {
            let sample = generate(index, RATE, 997, 32766);
            assert!(sample.abs() <= 32766, "sample {} exceeds amplitude", sample);
        }
    }

    #[test]
    fn test_phase_wraps() {
        let mut phase = Phase::new(4);
        let indices: Vec<u32> = (0..9).map(|_| phase.advance()).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 0, 1, 2, 3, 0]);
        assert_eq!(phase.index(), 1);
    }

    #[test]
    fn test_render_mono_little_endian() {
        let tone = ToneGenerator {
            sample_rate: RATE,
            frequency: FREQ,
            amplitude: AMP,
            channel_count: 1,
        };
        let mut phase = Phase::new(RATE);
        let mut out = vec![0u8; 256 * BYTES_PER_SAMPLE];

        let written = tone.render(&mut phase, &mut out);
        assert_eq!(written, 512);
        assert_eq!(phase.index(), 256);

        let sample = |i: usize| i16::from_le_bytes([out[2 * i], out[2 * i + 1]]);
        assert_eq!(sample(0), 0);
        assert_eq!(sample(12), 10000);
        assert_eq!(sample(36), -10000);
    }

    #[test]
    fn test_render_duplicates_across_channels() {
        let tone = ToneGenerator {
            sample_rate: RATE,
            frequency: FREQ,
            amplitude: AMP,
            channel_count: 2,
        };
        let mut phase = Phase::new(RATE);
        let mut out = vec![0u8; 16 * tone.bytes_per_frame() + 3];

        let written = tone.render(&mut phase, &mut out);
        assert_eq!(written, 64);
        assert_eq!(phase.index(), 16);
        assert_eq!(&out[64..], &[0, 0, 0], "partial frame must be untouched");

        for frame in out[..written].chunks_exact(4) {
            assert_eq!(frame[0..2], frame[2..4]);
        }
    }

    #[test]
    fn test_render_continues_phase_across_buffers() {
        let tone = ToneGenerator {
            sample_rate: RATE,
            frequency: FREQ,
            amplitude: AMP,
            channel_count: 1,
        };
        let mut phase = Phase::new(RATE);
        let mut first = vec![0u8; 20];
        let mut second = vec![0u8; 20];
        tone.render(&mut phase, &mut first);
        tone.render(&mut phase, &mut second);

        // Sample 12 lands at position 2 of the second buffer
        assert_eq!(i16::from_le_bytes([second[4], second[5]]), 10000);
    }
}
