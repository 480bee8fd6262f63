//! Sliding-window embedding scheduler.
//!
//! Consumes resampled audio as it arrives and emits one [`Embedding`] per
//! `hop_seconds` advance over a `window_seconds`-wide window. The final
//! window at end-of-stream is zero-padded up to the minimum window length
//! instead of being dropped; a failed extraction skips that window without
//! losing the scheduler's place in the stream.

use crate::embedding::extractor::EmbeddingExtractor;
use crate::embedding::types::Embedding;
use std::collections::VecDeque;
use tracing::debug;

const MIN_WINDOW_SECONDS: f64 = 0.5;

pub struct EmbeddingScheduler {
    window_seconds: f64,
    hop_seconds: f64,
    sample_rate: u32,
    buffer: VecDeque<f64>,
    buffer_start_sample: u64,
    next_window_start_sample: u64,
    extractor: Box<dyn EmbeddingExtractor>,
}

impl EmbeddingScheduler {
    pub fn new(
        window_seconds: f64,
        hop_seconds: f64,
        sample_rate: u32,
        extractor: Box<dyn EmbeddingExtractor>,
    ) -> Self {
        Self {
            window_seconds,
            hop_seconds,
            sample_rate,
            buffer: VecDeque::new(),
            buffer_start_sample: 0,
            next_window_start_sample: 0,
            extractor,
        }
    }

    fn window_samples(&self) -> usize {
        (self.window_seconds * self.sample_rate as f64).round() as usize
    }

    fn hop_samples(&self) -> usize {
        (self.hop_seconds * self.sample_rate as f64).round() as usize
    }

    fn min_window_samples(&self) -> usize {
        (MIN_WINDOW_SECONDS * self.sample_rate as f64).round() as usize
    }

    /// Push newly-arrived speech-bearing samples. `first_sample_index` is
    /// the global index of `samples[0]`, used to keep window offsets in
    /// sync even if non-speech chunks were skipped upstream.
    pub fn push(&mut self, samples: &[f64], first_sample_index: u64) -> Vec<Embedding> {
        if self.buffer.is_empty() {
            self.buffer_start_sample = first_sample_index;
            self.next_window_start_sample = self.next_window_start_sample.max(first_sample_index);
        }
        self.buffer.extend(samples.iter().copied());
        self.drain_ready_windows()
    }

    fn drain_ready_windows(&mut self) -> Vec<Embedding> {
        let mut embeddings = Vec::new();
        let window_len = self.window_samples();
        let hop_len = self.hop_samples().max(1);

        loop {
            let buffer_end_sample = self.buffer_start_sample + self.buffer.len() as u64;
            if self.next_window_start_sample + window_len as u64 > buffer_end_sample {
                break;
            }

            let offset = (self.next_window_start_sample - self.buffer_start_sample) as usize;
            let window: Vec<f64> = self.buffer.iter().skip(offset).take(window_len).copied().collect();

            if let Some(embedding) = self.extract_window(&window, self.next_window_start_sample) {
                embeddings.push(embedding);
            } else {
                debug!(start = self.next_window_start_sample, "embedding extraction failed, skipping window");
            }

            self.next_window_start_sample += hop_len as u64;
        }

        self.trim_buffer();
        embeddings
    }

    fn trim_buffer(&mut self) {
        // Keep enough history behind `next_window_start_sample` for the next
        // window to still overlap already-buffered samples, drop the rest.
        if self.next_window_start_sample <= self.buffer_start_sample {
            return;
        }
        let drop = (self.next_window_start_sample - self.buffer_start_sample) as usize;
        let drop = drop.min(self.buffer.len());
        self.buffer.drain(..drop);
        self.buffer_start_sample += drop as u64;
    }

    /// Flush whatever remains at end-of-stream, zero-padding a short tail up
    /// to the minimum window length rather than discarding it.
    pub fn flush(&mut self) -> Vec<Embedding> {
        let mut embeddings = Vec::new();
        let window_len = self.window_samples();
        let hop_len = self.hop_samples().max(1);
        let min_len = self.min_window_samples();

        loop {
            let remaining = self.buffer.len();
            if remaining == 0 {
                break;
            }
            if remaining < min_len {
                debug!(remaining, min_len, "dropping final sub-minimum tail");
                self.buffer.clear();
                break;
            }

            let take = remaining.min(window_len);
            let mut window: Vec<f64> = self.buffer.iter().take(take).copied().collect();
            if window.len() < window_len {
                window.resize(window_len.max(window.len()), 0.0);
            }

            if let Some(embedding) = self.extract_window(&window, self.next_window_start_sample) {
                embeddings.push(embedding);
            }

            let advance = take.min(hop_len).max(1);
            self.buffer.drain(..advance.min(self.buffer.len()));
            self.buffer_start_sample += advance as u64;
            self.next_window_start_sample += advance as u64;

            if take < window_len {
                break;
            }
        }

        embeddings
    }

    fn extract_window(&mut self, window: &[f64], start_sample: u64) -> Option<Embedding> {
        let vector = self.extractor.extract(window, self.sample_rate)?;
        let window_start = start_sample as f64 / self.sample_rate as f64;
        let window_end = window_start + window.len() as f64 / self.sample_rate as f64;
        Some(Embedding { vector, window_start, window_end })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::extractor::SignalFeatureEmbeddingExtractor;

    #[test]
    fn emits_windows_at_hop_cadence() {
        let mut scheduler = EmbeddingScheduler::new(
            2.0,
            0.5,
            16000,
            Box::new(SignalFeatureEmbeddingExtractor::default()),
        );
        let samples: Vec<f64> = (0..16000 * 3).map(|i| (i as f64 * 0.01).sin()).collect();
        let embeddings = scheduler.push(&samples, 0);
        // 3s of audio, 2s windows, 0.5s hop -> windows starting at 0.0s only
        // (next window at 0.5s needs samples through 2.5s, available; at
        // 1.0s needs through 3.0s, available; at 1.5s needs through 3.5s, not yet).
        assert!(embeddings.len() >= 2);
        for w in embeddings.windows(2) {
            assert!((w[1].window_start - w[0].window_start - 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn flush_zero_pads_short_tail_instead_of_dropping() {
        let mut scheduler = EmbeddingScheduler::new(
            2.0,
            0.5,
            16000,
            Box::new(SignalFeatureEmbeddingExtractor::default()),
        );
        let samples: Vec<f64> = vec![0.1; (16000.0 * 0.8) as usize];
        scheduler.push(&samples, 0);
        let flushed = scheduler.flush();
        assert_eq!(flushed.len(), 1);
    }

    #[test]
    fn flush_drops_tail_shorter_than_minimum() {
        let mut scheduler = EmbeddingScheduler::new(
            2.0,
            0.5,
            16000,
            Box::new(SignalFeatureEmbeddingExtractor::default()),
        );
        let samples: Vec<f64> = vec![0.1; (16000.0 * 0.2) as usize];
        scheduler.push(&samples, 0);
        let flushed = scheduler.flush();
        assert!(flushed.is_empty());
    }
}
