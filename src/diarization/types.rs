//! Core diarization data model: speaker profiles and emitted segments.

use chrono::{DateTime, Utc};

pub const PROFILE_HISTORY_CAP: usize = 50; // H_max
pub const MIN_SEGMENTS_FOR_STABLE: usize = 3; // H_min
const CENTROID_DECAY: f64 = 0.9; // alpha

/// A persistent speaker identity. Never deleted, renumbered, or reused once
/// created; only ever updated in place.
#[derive(Debug, Clone)]
pub struct SpeakerProfile {
    pub id: String,
    pub history: Vec<Vec<f64>>,
    pub centroid: Vec<f64>,
    pub count: u64,
    pub is_stable: bool,
    pub variance: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SpeakerProfile {
    pub fn new(id: String, embedding: Vec<f64>) -> Self {
        let now = Utc::now();
        Self {
            id,
            centroid: embedding.clone(),
            history: vec![embedding],
            count: 1,
            is_stable: false,
            variance: 0.0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Fold a new embedding into this profile's history and centroid.
    pub fn update(&mut self, embedding: Vec<f64>) {
        self.history.push(embedding);
        if self.history.len() > PROFILE_HISTORY_CAP {
            let drop = self.history.len() - PROFILE_HISTORY_CAP;
            self.history.drain(..drop);
        }
        self.count += 1;
        self.updated_at = Utc::now();

        self.recompute_centroid();

        let n = self.history.len();
        if n >= 5 {
            self.recompute_variance();
        }
        if n >= MIN_SEGMENTS_FOR_STABLE && !self.is_stable {
            self.is_stable = true;
        }
    }

    fn recompute_centroid(&mut self) {
        let n = self.history.len();
        let weights: Vec<f64> = (0..n).map(|i| CENTROID_DECAY.powi((n - 1 - i) as i32)).collect();
        let weight_sum: f64 = weights.iter().sum();

        let dims = self.history[0].len();
        let mut centroid = vec![0.0f64; dims];
        for (embedding, &w) in self.history.iter().zip(weights.iter()) {
            let normalized = w / weight_sum;
            for (c, e) in centroid.iter_mut().zip(embedding.iter()) {
                *c += e * normalized;
            }
        }
        self.centroid = centroid;
    }

    fn recompute_variance(&mut self) {
        let recent = &self.history[self.history.len() - 5..];
        let sims: Vec<f64> = recent
            .iter()
            .map(|e| crate::embedding::cosine_similarity(e, &self.centroid))
            .collect();
        let mean = sims.iter().sum::<f64>() / sims.len() as f64;
        self.variance = sims.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / sims.len() as f64;
    }
}

/// A speaker-attributed span of audio, as emitted by the identity engine.
#[derive(Debug, Clone)]
pub struct SpeakerSegment {
    pub speaker_id: String,
    pub t_start: f64,
    pub t_end: f64,
    pub confidence: f64,
    pub is_speaker_change: bool,
}

impl SpeakerSegment {
    pub fn dedup_key(&self) -> String {
        format!("{:.2}-{:.2}", self.t_start, self.t_end)
    }
}

/// All mutable state owned exclusively by the speaker identity engine.
#[derive(Debug, Default)]
pub struct ClusteringState {
    pub profiles: Vec<SpeakerProfile>,
    pub next_profile_id: u64,
    pub first_profile_initial_embedding: Option<Vec<f64>>,
    pub emitted_segment_count: u64,
    pub last_speaker_id: Option<String>,
    pub processed_segment_keys: std::collections::HashSet<String>,
}

impl ClusteringState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate_profile_id(&mut self) -> String {
        let id = format!("SPEAKER_{:02}", self.next_profile_id);
        self.next_profile_id += 1;
        id
    }
}

