//! Stream ingestion, resampling and voice activity gating.

pub mod ingest;
pub mod resampler;
pub mod types;
pub mod vad;

pub use ingest::StreamIngestor;
pub use resampler::Resampler;
pub use types::{AudioChunk, IngestError, PcmFormat, VadError};
pub use vad::{EnergyVad, NeuralVad, VadBackend, VoiceActivityGate};
