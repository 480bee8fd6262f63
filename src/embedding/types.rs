//! Shared embedding types.

use thiserror::Error;

/// A single speaker embedding extracted from a sliding window of audio.
#[derive(Debug, Clone)]
pub struct Embedding {
    pub vector: Vec<f64>,
    pub window_start: f64,
    pub window_end: f64,
}

impl Embedding {
    pub fn cosine_similarity(&self, other: &[f64]) -> f64 {
        cosine_similarity(&self.vector, other)
    }
}

pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

pub fn l2_normalize(vector: &mut [f64]) {
    let norm = vector.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm > 1e-12 {
        for v in vector.iter_mut() {
            *v /= norm;
        }
    }
}

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("model download requires credentials: {0}")]
    AuthenticationRequired(String),
}
