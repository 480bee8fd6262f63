//! Sample rate conversion to the engine's internal 16kHz timeline.
//!
//! Uses `dasp`'s windowed-sinc interpolator for quality, keeping the filter's
//! ring buffer alive across calls so chunk boundaries don't reset the filter
//! history. Plain linear interpolation is kept as an explicit, logged
//! last-resort fallback for degenerate conversion ratios the sinc filter
//! isn't built for (e.g. upsampling by a very large factor).

use dasp::interpolate::linear::Linear;
use dasp::interpolate::sinc::Sinc;
use dasp::ring_buffer;
use dasp::{signal, Signal};
use tracing::warn;

const SINC_TAPS: usize = 64;

enum Strategy {
    Sinc(Sinc<[[f64; 1]; SINC_TAPS]>),
    Linear,
}

pub struct Resampler {
    source_rate: u32,
    target_rate: u32,
    strategy: Strategy,
}

impl Resampler {
    pub fn new(source_rate: u32, target_rate: u32) -> Self {
        let strategy = if source_rate == 0 || target_rate == 0 {
            warn!(source_rate, target_rate, "degenerate sample rate, falling back to linear interpolation");
            Strategy::Linear
        } else {
            let ring = ring_buffer::Fixed::from([[0.0f64]; SINC_TAPS]);
            Strategy::Sinc(Sinc::new(ring))
        };

        Self { source_rate, target_rate, strategy }
    }

    pub fn target_sample_rate(&self) -> u32 {
        self.target_rate
    }

    /// Resample one pushed block of source-rate samples. Holds no samples
    /// back: every input sample is represented in the output before
    /// returning (subject to the conversion ratio), so chunking upstream can
    /// treat the return value as final for that input.
    pub fn process(&mut self, samples: &[f64]) -> Vec<f64> {
        if self.source_rate == self.target_rate {
            return samples.to_vec();
        }
        if samples.is_empty() {
            return Vec::new();
        }

        match &mut self.strategy {
            Strategy::Sinc(interpolator) => {
                let source_signal = signal::from_iter(samples.iter().map(|&s| [s]));
                let converted = source_signal.from_hz_to_hz(
                    interpolator_ref(interpolator),
                    self.source_rate as f64,
                    self.target_rate as f64,
                );
                converted.until_exhausted().map(|frame| frame[0]).collect()
            }
            Strategy::Linear => linear_resample(samples, self.source_rate, self.target_rate),
        }
    }

    /// Drain the sinc filter's internal delay at end-of-stream. A windowed
    /// sinc filter holds roughly half its tap count worth of samples in
    /// flight; pushing silence through flushes them out instead of losing
    /// the tail of real audio to filter latency.
    pub fn flush(&mut self) -> Vec<f64> {
        match &mut self.strategy {
            Strategy::Sinc(interpolator) => {
                let silence = vec![0.0f64; SINC_TAPS / 2];
                let source_signal = signal::from_iter(silence.into_iter().map(|s| [s]));
                let converted = source_signal.from_hz_to_hz(
                    interpolator_ref(interpolator),
                    self.source_rate as f64,
                    self.target_rate as f64,
                );
                converted.until_exhausted().map(|frame| frame[0]).collect()
            }
            Strategy::Linear => Vec::new(),
        }
    }
}

// `Sinc` is not `Clone`/`Copy`, and `Signal::from_hz_to_hz` takes ownership
// of the interpolator. We can't hand it the owned field without losing the
// ring buffer state between calls, so drive it by value through a
// short-lived swap instead.
fn interpolator_ref(interpolator: &mut Sinc<[[f64; 1]; SINC_TAPS]>) -> Sinc<[[f64; 1]; SINC_TAPS]> {
    std::mem::replace(interpolator, Sinc::new(ring_buffer::Fixed::from([[0.0f64]; SINC_TAPS])))
}

fn linear_resample(samples: &[f64], source_rate: u32, target_rate: u32) -> Vec<f64> {
    let ratio = target_rate as f64 / source_rate as f64;
    let output_len = (samples.len() as f64 * ratio).round() as usize;
    let mut output = Vec::with_capacity(output_len);

    let source_signal = signal::from_iter(samples.iter().map(|&s| [s]));
    let mut converted = source_signal.from_hz_to_hz(
        Linear::new([0.0], [0.0]),
        source_rate as f64,
        target_rate as f64,
    );

    for _ in 0..output_len {
        output.push(converted.next()[0]);
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_when_rates_match() {
        let mut r = Resampler::new(16000, 16000);
        let input = vec![0.1, 0.2, 0.3];
        assert_eq!(r.process(&input), input);
    }

    #[test]
    fn downsamples_to_roughly_expected_length() {
        let mut r = Resampler::new(48000, 16000);
        let input: Vec<f64> = (0..4800).map(|i| (i as f64 * 0.01).sin()).collect();
        let out = r.process(&input);
        let expected = input.len() / 3;
        assert!((out.len() as i64 - expected as i64).abs() < expected as i64 / 5 + 8);
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let mut r = Resampler::new(44100, 16000);
        assert!(r.process(&[]).is_empty());
    }
}
