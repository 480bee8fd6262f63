//! Audio-related type definitions shared across ingest, resampling and VAD.

use thiserror::Error;

/// A contiguous block of mono float samples in `[-1, 1]` at `sample_rate` Hz.
///
/// `first_sample_index` carries the chunk's position in the global (resampled)
/// sample timeline so downstream components can recover wall-clock time
/// without threading a separate counter through the pipeline.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    pub samples: Vec<f64>,
    pub sample_rate: u32,
    pub first_sample_index: u64,
}

impl AudioChunk {
    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn t_start(&self) -> f64 {
        self.first_sample_index as f64 / self.sample_rate as f64
    }

    pub fn t_end(&self) -> f64 {
        self.t_start() + self.duration_seconds()
    }
}

/// Declared format of the incoming PCM byte stream.
#[derive(Debug, Clone, Copy)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channel_count: u8,
    pub bit_depth: u8,
}

impl PcmFormat {
    pub fn bytes_per_frame(&self) -> usize {
        (self.bit_depth as usize / 8) * self.channel_count as usize
    }
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("unsupported bit depth: {0} (expected 16 or 32)")]
    UnsupportedBitDepth(u8),

    #[error("unsupported channel count: {0} (expected 1 or 2)")]
    UnsupportedChannelCount(u8),
}

#[derive(Debug, Error)]
pub enum VadError {
    #[error("neural VAD backend failed: {0}")]
    BackendFailed(String),
}
