//! Online speaker identity engine.

pub mod calibrator;
pub mod engine;
pub mod types;

pub use calibrator::Calibrator;
pub use engine::DiarizationEngine;
pub use types::{ClusteringState, SpeakerProfile, SpeakerSegment};
