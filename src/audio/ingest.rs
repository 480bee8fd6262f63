//! Stream ingestor: turns a raw PCM byte stream into fixed-duration,
//! resampled [`AudioChunk`]s.
//!
//! Bytes arrive in arbitrary-sized pushes (one `read()` worth at a time).
//! `StreamIngestor` buffers them, decodes complete frames as they become
//! available, and hands back chunks of exactly `chunk_duration` seconds once
//! enough source audio has accumulated. Chunks never overlap: each consumed
//! sample is handed to exactly one chunk.

use crate::audio::resampler::Resampler;
use crate::audio::types::{AudioChunk, IngestError, PcmFormat};
use std::collections::VecDeque;
use tracing::{debug, warn};

pub struct StreamIngestor {
    format: PcmFormat,
    chunk_samples: usize,
    byte_buffer: VecDeque<u8>,
    decoded: VecDeque<f64>,
    resampler: Resampler,
    resampler_output: VecDeque<f64>,
    next_sample_index: u64,
    trailing_byte_warned: bool,
}

impl std::fmt::Debug for StreamIngestor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamIngestor")
            .field("format", &self.format)
            .field("chunk_samples", &self.chunk_samples)
            .field("next_sample_index", &self.next_sample_index)
            .field("trailing_byte_warned", &self.trailing_byte_warned)
            .finish_non_exhaustive()
    }
}

impl StreamIngestor {
    pub fn new(format: PcmFormat, chunk_duration_seconds: f64, target_sample_rate: u32) -> Result<Self, IngestError> {
        Self::with_initial_offset(format, chunk_duration_seconds, target_sample_rate, 0.0)
    }

    /// Like [`Self::new`], but starts the internal sample clock at
    /// `initial_offset_seconds` so every timestamp this ingestor (and
    /// anything downstream keyed off its chunk indices) produces lines up
    /// with a wall clock that didn't start at zero.
    pub fn with_initial_offset(
        format: PcmFormat,
        chunk_duration_seconds: f64,
        target_sample_rate: u32,
        initial_offset_seconds: f64,
    ) -> Result<Self, IngestError> {
        if format.bit_depth != 16 && format.bit_depth != 32 {
            return Err(IngestError::UnsupportedBitDepth(format.bit_depth));
        }
        if format.channel_count != 1 && format.channel_count != 2 {
            return Err(IngestError::UnsupportedChannelCount(format.channel_count));
        }

        let chunk_samples = (chunk_duration_seconds * target_sample_rate as f64).round() as usize;
        let next_sample_index = (initial_offset_seconds.max(0.0) * target_sample_rate as f64).round() as u64;

        Ok(Self {
            format,
            chunk_samples: chunk_samples.max(1),
            byte_buffer: VecDeque::new(),
            decoded: VecDeque::new(),
            resampler: Resampler::new(format.sample_rate, target_sample_rate),
            resampler_output: VecDeque::new(),
            next_sample_index,
            trailing_byte_warned: false,
        })
    }

    /// Push newly-read bytes into the ingestor. Does not itself produce
    /// chunks — call [`Self::try_drain`] afterwards.
    pub fn ingest(&mut self, bytes: &[u8]) {
        self.byte_buffer.extend(bytes.iter().copied());
        self.decode_available_frames();
    }

    fn decode_available_frames(&mut self) {
        let frame_size = self.format.bytes_per_frame();
        let available_frames = self.byte_buffer.len() / frame_size;
        if available_frames == 0 {
            return;
        }

        let consume = available_frames * frame_size;
        let frame_bytes: Vec<u8> = self.byte_buffer.drain(..consume).collect();

        let channels = self.format.channel_count as usize;
        let bytes_per_sample = (self.format.bit_depth / 8) as usize;

        for frame in frame_bytes.chunks_exact(frame_size) {
            let mut acc = 0.0f64;
            for ch in 0..channels {
                let sample_bytes = &frame[ch * bytes_per_sample..(ch + 1) * bytes_per_sample];
                acc += decode_sample(sample_bytes, self.format.bit_depth);
            }
            self.decoded.push_back(acc / channels as f64);
        }

        let leftover = self.byte_buffer.len();
        if leftover > 0 && leftover < frame_size && !self.trailing_byte_warned {
            debug!(leftover, frame_size, "trailing partial frame buffered, waiting for more bytes");
            self.trailing_byte_warned = true;
        }
        if leftover >= frame_size {
            // decode_available_frames only drains whole frames, so this
            // shouldn't happen; guard against a future refactor that breaks it.
            warn!(leftover, "byte buffer still holds a whole frame after decode pass");
        }
    }

    /// Resample what has been decoded so far and return every complete,
    /// non-overlapping chunk that's ready. May return an empty vec.
    pub fn try_drain(&mut self) -> Vec<AudioChunk> {
        let source_samples: Vec<f64> = self.decoded.drain(..).collect();
        if source_samples.is_empty() {
            return Vec::new();
        }
        let resampled = self.resampler.process(&source_samples);
        self.chunk_from_resampled(resampled, false)
    }

    /// Flush everything left at end-of-stream, including a final short
    /// chunk, provided the tail is at least one second of audio. Shorter
    /// tails are dropped, matching the source's end-of-stream handling.
    pub fn drain_remaining(&mut self) -> Vec<AudioChunk> {
        let source_samples: Vec<f64> = self.decoded.drain(..).collect();
        let mut resampled = self.resampler.flush();
        if !source_samples.is_empty() {
            let mut mid = self.resampler.process(&source_samples);
            resampled.append(&mut mid);
        }
        self.chunk_from_resampled(resampled, true)
    }

    fn chunk_from_resampled(&mut self, resampled: Vec<f64>, is_final: bool) -> Vec<AudioChunk> {
        let mut chunks = Vec::new();
        let target_rate = self.resampler.target_sample_rate();

        self.pending_resampled_mut().extend(resampled);

        loop {
            let pending_len = self.pending_resampled().len();
            if pending_len >= self.chunk_samples {
                let chunk_samples = self.chunk_samples;
                let samples: Vec<f64> = self.pending_resampled_mut().drain(..chunk_samples).collect();
                chunks.push(self.emit_chunk(samples, target_rate));
            } else {
                break;
            }
        }

        if is_final {
            let tail_len = self.pending_resampled().len();
            let min_tail = target_rate as usize; // 1 second
            if tail_len >= min_tail {
                let samples: Vec<f64> = self.pending_resampled_mut().drain(..).collect();
                chunks.push(self.emit_chunk(samples, target_rate));
            } else if tail_len > 0 {
                debug!(tail_len, min_tail, "dropping sub-one-second tail at end of stream");
                self.pending_resampled_mut().clear();
            }
        }

        chunks
    }

    fn emit_chunk(&mut self, samples: Vec<f64>, sample_rate: u32) -> AudioChunk {
        let chunk = AudioChunk {
            first_sample_index: self.next_sample_index,
            sample_rate,
            samples,
        };
        self.next_sample_index += chunk.samples.len() as u64;
        chunk
    }

    fn pending_resampled(&self) -> &VecDeque<f64> {
        &self.resampler_output
    }

    fn pending_resampled_mut(&mut self) -> &mut VecDeque<f64> {
        &mut self.resampler_output
    }
}

fn decode_sample(bytes: &[u8], bit_depth: u8) -> f64 {
    match bit_depth {
        16 => {
            let raw = i16::from_le_bytes([bytes[0], bytes[1]]);
            raw as f64 / i16::MAX as f64
        }
        32 => {
            let raw = i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            raw as f64 / i32::MAX as f64
        }
        other => unreachable!("unsupported bit depth {other} should have been rejected at construction"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mono_16(rate: u32) -> PcmFormat {
        PcmFormat { sample_rate: rate, channel_count: 1, bit_depth: 16 }
    }

    fn sine_bytes(rate: u32, seconds: f64, freq: f64) -> Vec<u8> {
        let n = (rate as f64 * seconds) as usize;
        let mut out = Vec::with_capacity(n * 2);
        for i in 0..n {
            let t = i as f64 / rate as f64;
            let s = (2.0 * std::f64::consts::PI * freq * t).sin();
            let raw = (s * i16::MAX as f64) as i16;
            out.extend_from_slice(&raw.to_le_bytes());
        }
        out
    }

    #[test]
    fn chunks_do_not_overlap_and_cover_input() {
        let mut ingestor = StreamIngestor::new(mono_16(16000), 1.0, 16000).unwrap();
        ingestor.ingest(&sine_bytes(16000, 3.0, 220.0));
        let chunks = ingestor.try_drain();
        assert_eq!(chunks.len(), 3);
        for w in chunks.windows(2) {
            assert!((w[0].t_end() - w[1].t_start()).abs() < 1e-6);
        }
    }

    #[test]
    fn rejects_unsupported_bit_depth() {
        let format = PcmFormat { sample_rate: 16000, channel_count: 1, bit_depth: 8 };
        let err = StreamIngestor::new(format, 1.0, 16000).unwrap_err();
        assert!(matches!(err, IngestError::UnsupportedBitDepth(8)));
    }

    #[test]
    fn drops_sub_one_second_tail() {
        let mut ingestor = StreamIngestor::new(mono_16(16000), 1.0, 16000).unwrap();
        ingestor.ingest(&sine_bytes(16000, 0.5, 220.0));
        let _ = ingestor.try_drain();
        let tail = ingestor.drain_remaining();
        assert!(tail.is_empty());
    }

    #[test]
    fn flushes_tail_of_at_least_one_second() {
        let mut ingestor = StreamIngestor::new(mono_16(16000), 2.0, 16000).unwrap();
        ingestor.ingest(&sine_bytes(16000, 1.2, 220.0));
        assert!(ingestor.try_drain().is_empty());
        let tail = ingestor.drain_remaining();
        assert_eq!(tail.len(), 1);
        assert!((tail[0].duration_seconds() - 1.2).abs() < 1e-3);
    }
}
