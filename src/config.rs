//! CLI surface and the typed configuration it produces.

use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DeviceHint {
    Cpu,
    Cuda,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OnOff {
    On,
    Off,
}

impl OnOff {
    pub fn is_on(self) -> bool {
        matches!(self, OnOff::On)
    }
}

/// Streaming speaker diarization and transcript alignment engine.
#[derive(Debug, Parser)]
#[command(name = "speakerline", version, about)]
pub struct Cli {
    /// Path to a PCM byte stream, or "-" for stdin.
    #[arg(long, default_value = "-")]
    pub input: String,

    #[arg(long, default_value_t = 16000)]
    pub sample_rate: u32,

    #[arg(long, default_value_t = 1)]
    pub channels: u8,

    #[arg(long, default_value_t = 16)]
    pub bit_depth: u8,

    #[arg(long, default_value_t = 5.0)]
    pub chunk_duration: f64,

    #[arg(long, default_value_t = 0.35)]
    pub similarity_threshold: f64,

    #[arg(long, default_value_t = 8)]
    pub max_speakers: usize,

    #[arg(long, value_enum, default_value_t = DeviceHint::Cpu)]
    pub device: DeviceHint,

    #[arg(long, value_enum, default_value_t = OnOff::On)]
    pub vad: OnOff,

    #[arg(long, default_value_t = false)]
    pub permissive_vad: bool,

    #[arg(long, value_enum, default_value_t = OnOff::On)]
    pub diarization: OnOff,

    #[arg(long, default_value_t = 0.0)]
    pub initial_offset: f64,

    /// Forwarded to the external ASR; unused by the diarization/alignment core.
    #[arg(long)]
    pub model_size: Option<String>,

    /// Forwarded to the external ASR; unused by the diarization/alignment core.
    #[arg(long)]
    pub language: Option<String>,
}

/// Fully resolved, validated engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub sample_rate: u32,
    pub channels: u8,
    pub bit_depth: u8,
    pub chunk_duration_seconds: f64,
    pub similarity_threshold: f64,
    pub max_speakers: usize,
    pub device: DeviceHint,
    pub vad_enabled: bool,
    pub permissive_vad: bool,
    pub diarization_enabled: bool,
    pub initial_offset_seconds: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("similarity threshold must be in [0.0, 1.0], got {0}")]
    InvalidSimilarityThreshold(f64),

    #[error("max_speakers must be at least 1, got {0}")]
    InvalidMaxSpeakers(usize),

    #[error("chunk_duration must be positive, got {0}")]
    InvalidChunkDuration(f64),
}

impl TryFrom<Cli> for EngineConfig {
    type Error = ConfigError;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        if !(0.0..=1.0).contains(&cli.similarity_threshold) {
            return Err(ConfigError::InvalidSimilarityThreshold(cli.similarity_threshold));
        }
        if cli.max_speakers == 0 {
            return Err(ConfigError::InvalidMaxSpeakers(cli.max_speakers));
        }
        if cli.chunk_duration <= 0.0 {
            return Err(ConfigError::InvalidChunkDuration(cli.chunk_duration));
        }

        Ok(EngineConfig {
            sample_rate: cli.sample_rate,
            channels: cli.channels,
            bit_depth: cli.bit_depth,
            chunk_duration_seconds: cli.chunk_duration,
            similarity_threshold: cli.similarity_threshold,
            max_speakers: cli.max_speakers,
            device: cli.device,
            vad_enabled: cli.vad.is_on(),
            permissive_vad: cli.permissive_vad,
            diarization_enabled: cli.diarization.is_on(),
            initial_offset_seconds: cli.initial_offset,
        })
    }
}

/// Environment variable names.
pub const ENV_HF_TOKEN: &str = "SPEAKERLINE_HF_TOKEN";
pub const ENV_MODEL_DIR: &str = "SPEAKERLINE_MODEL_DIR";
pub const ENV_MODEL_URL: &str = "SPEAKERLINE_MODEL_URL";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_similarity_threshold() {
        let cli = Cli::parse_from(["speakerline", "--similarity-threshold", "1.5"]);
        assert!(matches!(EngineConfig::try_from(cli), Err(ConfigError::InvalidSimilarityThreshold(_))));
    }

    #[test]
    fn rejects_zero_max_speakers() {
        let cli = Cli::parse_from(["speakerline", "--max-speakers", "0"]);
        assert!(matches!(EngineConfig::try_from(cli), Err(ConfigError::InvalidMaxSpeakers(_))));
    }

    #[test]
    fn defaults_are_valid() {
        let cli = Cli::parse_from(["speakerline"]);
        assert!(EngineConfig::try_from(cli).is_ok());
    }
}
