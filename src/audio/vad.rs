//! Voice activity gate: decides whether an [`AudioChunk`] contains speech
//! before it is handed to the embedding scheduler.
//!
//! A neural backend is tried first; an energy-based backend acts as its
//! fallback when the neural backend is disabled, unavailable, or errors.
//! Permissive mode relaxes every threshold at once for noisy or heavily
//! compressed sources where the default thresholds reject real speech.

use crate::audio::types::{AudioChunk, VadError};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy)]
pub struct VadThresholds {
    pub theta_vad: f64,
    pub min_speech_duration_ms: f64,
    pub speech_ratio_min: f64,
    pub energy_threshold: f64,
}

impl VadThresholds {
    pub fn standard() -> Self {
        Self {
            theta_vad: 0.5,
            min_speech_duration_ms: 250.0,
            speech_ratio_min: 0.1,
            energy_threshold: 0.005,
        }
    }

    pub fn permissive() -> Self {
        Self {
            theta_vad: 0.15,
            min_speech_duration_ms: 100.0,
            speech_ratio_min: 0.01,
            energy_threshold: 0.001,
        }
    }
}

/// A backend that scores short audio frames for speech probability.
pub trait VadBackend {
    /// Returns, per fixed-size frame, the probability `[0, 1]` that the
    /// frame contains speech. `None` signals the backend could not run
    /// (model missing, malformed input) without treating it as "silence".
    fn frame_speech_probabilities(&mut self, samples: &[f64], sample_rate: u32) -> Result<Vec<f64>, VadError>;
}

/// Simplified heuristic standing in for a real neural VAD model: estimates
/// a short-time energy envelope and a spectral-flatness-like measure, the
/// same two signals a lightweight speech/non-speech classifier would use,
/// without requiring an ONNX runtime dependency to be wired up.
pub struct NeuralVad {
    frame_ms: f64,
}

impl Default for NeuralVad {
    fn default() -> Self {
        Self { frame_ms: 30.0 }
    }
}

impl VadBackend for NeuralVad {
    fn frame_speech_probabilities(&mut self, samples: &[f64], sample_rate: u32) -> Result<Vec<f64>, VadError> {
        if samples.is_empty() {
            return Ok(Vec::new());
        }
        let frame_len = ((self.frame_ms / 1000.0) * sample_rate as f64).round() as usize;
        let frame_len = frame_len.max(1);

        let mut probs = Vec::with_capacity(samples.len() / frame_len + 1);
        for frame in samples.chunks(frame_len) {
            let rms = rms(frame);
            let zcr = zero_crossing_rate(frame);
            // Voiced speech tends to combine moderate energy with a
            // comparatively low zero-crossing rate; this is a coarse proxy,
            // not a learned decision boundary.
            let energy_term = (rms * 12.0).min(1.0);
            let zcr_term = (1.0 - zcr * 4.0).max(0.0);
            probs.push((energy_term * 0.7 + zcr_term * 0.3).clamp(0.0, 1.0));
        }
        Ok(probs)
    }
}

pub struct EnergyVad;

impl VadBackend for EnergyVad {
    fn frame_speech_probabilities(&mut self, samples: &[f64], _sample_rate: u32) -> Result<Vec<f64>, VadError> {
        Ok(vec![rms(samples)])
    }
}

pub struct VoiceActivityGate {
    neural: Option<Box<dyn VadBackend + Send>>,
    fallback: EnergyVad,
    permissive: bool,
    enabled: bool,
}

impl VoiceActivityGate {
    pub fn new(neural: Option<Box<dyn VadBackend + Send>>, permissive: bool, enabled: bool) -> Self {
        Self { neural, fallback: EnergyVad, permissive, enabled }
    }

    fn thresholds(&self) -> VadThresholds {
        if self.permissive {
            VadThresholds::permissive()
        } else {
            VadThresholds::standard()
        }
    }

    /// Returns `true` if the chunk should be treated as containing speech.
    /// Never propagates an error: any backend failure fails open (treats
    /// the chunk as speech) so a broken VAD backend degrades gracefully
    /// instead of silently discarding audio.
    pub fn is_speech(&mut self, chunk: &AudioChunk) -> bool {
        if !self.enabled {
            return true;
        }

        let rms_level = rms(&chunk.samples);
        if rms_level < 1e-4 {
            if self.permissive {
                debug!(rms = rms_level, "silent chunk in permissive mode, falling through to energy check");
            } else {
                return false;
            }
        }

        let thresholds = self.thresholds();

        let neural_result = match &mut self.neural {
            Some(backend) => match backend.frame_speech_probabilities(&chunk.samples, chunk.sample_rate) {
                Ok(probs) => Some(self.evaluate_neural(&probs, chunk, &thresholds)),
                Err(err) => {
                    warn!(error = %err, "neural VAD backend failed, falling open");
                    return true;
                }
            },
            None => None,
        };

        match neural_result {
            Some(speech) => {
                if self.permissive && !speech {
                    let db = 20.0 * rms_level.max(1e-12).log10();
                    if db > -50.0 {
                        debug!(rms_db = db, "permissive override: neural VAD empty but signal above noise floor");
                        return true;
                    }
                }
                speech
            }
            None => match self.fallback.frame_speech_probabilities(&chunk.samples, chunk.sample_rate) {
                Ok(probs) => probs.first().copied().unwrap_or(0.0) > thresholds.energy_threshold,
                Err(_) => true,
            },
        }
    }

    fn evaluate_neural(&self, probs: &[f64], chunk: &AudioChunk, thresholds: &VadThresholds) -> bool {
        if probs.is_empty() {
            return false;
        }
        let frame_seconds = chunk.duration_seconds() / probs.len() as f64;
        let speech_seconds: f64 = probs
            .iter()
            .filter(|&&p| p >= thresholds.theta_vad)
            .map(|_| frame_seconds)
            .sum();

        if speech_seconds * 1000.0 < thresholds.min_speech_duration_ms {
            return false;
        }

        let ratio = speech_seconds / chunk.duration_seconds().max(1e-9);
        ratio >= thresholds.speech_ratio_min
    }
}

fn rms(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|s| s * s).sum::<f64>() / samples.len() as f64).sqrt()
}

fn zero_crossing_rate(samples: &[f64]) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }
    let crossings = samples
        .windows(2)
        .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
        .count();
    crossings as f64 / (samples.len() - 1) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(samples: Vec<f64>, sample_rate: u32) -> AudioChunk {
        AudioChunk { samples, sample_rate, first_sample_index: 0 }
    }

    #[test]
    fn silence_is_rejected_without_permissive_mode() {
        let mut gate = VoiceActivityGate::new(Some(Box::new(NeuralVad::default())), false, true);
        let c = chunk(vec![0.0; 16000], 16000);
        assert!(!gate.is_speech(&c));
    }

    #[test]
    fn loud_tone_is_accepted() {
        let mut gate = VoiceActivityGate::new(Some(Box::new(NeuralVad::default())), false, true);
        let samples: Vec<f64> = (0..16000).map(|i| (i as f64 * 0.05).sin() * 0.6).collect();
        let c = chunk(samples, 16000);
        assert!(gate.is_speech(&c));
    }

    #[test]
    fn disabled_gate_always_passes() {
        let mut gate = VoiceActivityGate::new(None, false, false);
        let c = chunk(vec![0.0; 16000], 16000);
        assert!(gate.is_speech(&c));
    }

    #[test]
    fn backend_failure_fails_open() {
        struct Broken;
        impl VadBackend for Broken {
            fn frame_speech_probabilities(&mut self, _: &[f64], _: u32) -> Result<Vec<f64>, VadError> {
                Err(VadError::BackendFailed("boom".into()))
            }
        }
        let mut gate = VoiceActivityGate::new(Some(Box::new(Broken)), false, true);
        let c = chunk(vec![0.2; 16000], 16000);
        assert!(gate.is_speech(&c));
    }
}
