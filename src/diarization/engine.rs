//! Speaker identity engine: the online, incremental
//! clustering core. Every incoming embedding is matched against existing
//! speaker profiles or used to mint a new one, profiles are updated with an
//! exponentially-weighted centroid, and a dedup guard keeps the same time
//! window from ever being processed twice.

use crate::diarization::calibrator::Calibrator;
use crate::diarization::types::{ClusteringState, SpeakerProfile, SpeakerSegment};
use crate::embedding::{cosine_similarity, Embedding};
use tracing::{debug, info};

const TAU_REID: f64 = 0.85;
const TAU_DEFNEW: f64 = 0.30;
const TAU_NEW: f64 = 0.40;
const TAU_COLDMIN: f64 = 0.35;
const EARLY_SESSION_SEGMENT_LIMIT: u64 = 10;

pub struct DiarizationEngine {
    state: ClusteringState,
    calibrator: Calibrator,
    max_speakers: usize,
    base_tau_match: f64,
}

impl DiarizationEngine {
    pub fn new(max_speakers: usize, base_tau_match: f64) -> Self {
        Self {
            state: ClusteringState::new(),
            calibrator: Calibrator::default(),
            max_speakers: max_speakers.max(1),
            base_tau_match: base_tau_match.clamp(0.0, 1.0),
        }
    }

    pub fn state(&self) -> &ClusteringState {
        &self.state
    }

    /// Assign a speaker to one embedding, returning `None` if this exact
    /// time window has already been processed.
    pub fn process(&mut self, embedding: &Embedding) -> Option<SpeakerSegment> {
        let key = format!("{:.2}-{:.2}", embedding.window_start, embedding.window_end);
        if self.state.processed_segment_keys.contains(&key) {
            debug!(key, "duplicate time window, skipping");
            return None;
        }

        let segment = self.decide(embedding);
        self.state.processed_segment_keys.insert(key);
        Some(segment)
    }

    fn decide(&mut self, embedding: &Embedding) -> SpeakerSegment {
        let vector = &embedding.vector;

        if self.state.profiles.is_empty() {
            return self.assign_new_profile(embedding, 1.0);
        }

        // Case A: early second-speaker detection. Checked before the normal
        // best-match scan because with only one profile in existence the
        // scan would always pick it, never proposing a new speaker.
        if self.state.profiles.len() == 1
            && self.state.profiles.len() < self.max_speakers
            && self.state.emitted_segment_count < EARLY_SESSION_SEGMENT_LIMIT
        {
            if let Some(first_embedding) = self.state.first_profile_initial_embedding.clone() {
                let similarity_to_first = cosine_similarity(vector, &first_embedding);
                if similarity_to_first < TAU_DEFNEW {
                    info!(similarity_to_first, "early second-speaker signal, minting new profile");
                    return self.assign_new_profile(embedding, 1.0);
                }
            }
        }

        let (best_idx, best_similarity) = self.best_match(vector);
        self.calibrator.observe(best_similarity);
        let boost = self.calibrator.boost();

        let tau_match = (self.base_tau_match + boost).min(1.0);
        let tau_defnew = (TAU_DEFNEW + boost).min(1.0);
        let tau_new = (TAU_NEW + boost).min(1.0);
        let tau_coldmin = (TAU_COLDMIN + boost).min(1.0);

        // Case B: re-id, unconditional bypass. Never boosted.
        if best_similarity >= TAU_REID {
            return self.assign_existing(best_idx, embedding, best_similarity);
        }

        // Case C: normal match.
        if best_similarity >= tau_match {
            return self.assign_existing(best_idx, embedding, best_similarity);
        }

        // Case D: below the match threshold.
        if self.state.profiles.len() < self.max_speakers {
            if best_similarity < tau_defnew {
                return self.assign_new_profile(embedding, 1.0);
            }

            let all_stable = self.state.profiles.iter().all(|p| p.is_stable);
            if best_similarity < tau_new && all_stable {
                return self.assign_new_profile(embedding, 1.0);
            }

            let any_unstable = self.state.profiles.iter().any(|p| !p.is_stable);
            if any_unstable && best_similarity >= tau_coldmin {
                return self.assign_existing(best_idx, embedding, best_similarity);
            }

            self.assign_new_profile(embedding, 1.0)
        } else {
            // At capacity: forced assignment to the closest profile,
            // regardless of how weak the match is.
            let confidence = best_similarity.max(0.5);
            self.assign_existing(best_idx, embedding, confidence)
        }
    }

    fn best_match(&self, vector: &[f64]) -> (usize, f64) {
        self.state
            .profiles
            .iter()
            .enumerate()
            .map(|(idx, profile)| (idx, cosine_similarity(vector, &profile.centroid)))
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .expect("caller guarantees at least one profile exists")
    }

    fn assign_existing(&mut self, idx: usize, embedding: &Embedding, confidence: f64) -> SpeakerSegment {
        let profile = &mut self.state.profiles[idx];
        profile.update(embedding.vector.clone());
        let speaker_id = profile.id.clone();
        self.finalize_segment(speaker_id, embedding, confidence)
    }

    fn assign_new_profile(&mut self, embedding: &Embedding, confidence: f64) -> SpeakerSegment {
        let id = self.state.allocate_profile_id();
        if self.state.profiles.is_empty() {
            self.state.first_profile_initial_embedding = Some(embedding.vector.clone());
        }
        self.state.profiles.push(SpeakerProfile::new(id.clone(), embedding.vector.clone()));
        info!(speaker_id = %id, total_profiles = self.state.profiles.len(), "new speaker profile created");
        self.finalize_segment(id, embedding, confidence)
    }

    fn finalize_segment(&mut self, speaker_id: String, embedding: &Embedding, confidence: f64) -> SpeakerSegment {
        let is_speaker_change = self.state.last_speaker_id.as_deref() != Some(speaker_id.as_str());
        self.state.last_speaker_id = Some(speaker_id.clone());
        self.state.emitted_segment_count += 1;

        SpeakerSegment {
            speaker_id,
            t_start: embedding.window_start,
            t_end: embedding.window_end,
            confidence: confidence.clamp(0.0, 1.0),
            is_speaker_change,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embedding(vector: Vec<f64>, start: f64, end: f64) -> Embedding {
        Embedding { vector, window_start: start, window_end: end }
    }

    fn one_hot(dim: usize, idx: usize) -> Vec<f64> {
        let mut v = vec![0.0; dim];
        v[idx] = 1.0;
        v
    }

    #[test]
    fn first_embedding_creates_first_profile() {
        let mut engine = DiarizationEngine::new(8, 0.35);
        let seg = engine.process(&embedding(one_hot(4, 0), 0.0, 2.0)).unwrap();
        assert_eq!(seg.speaker_id, "SPEAKER_00");
        assert!(seg.is_speaker_change);
        assert_eq!(engine.state().profiles.len(), 1);
    }

    #[test]
    fn repeated_similar_embedding_reuses_profile() {
        let mut engine = DiarizationEngine::new(8, 0.35);
        let e1 = embedding(one_hot(4, 0), 0.0, 2.0);
        let e2 = embedding(one_hot(4, 0), 2.0, 4.0);
        let s1 = engine.process(&e1).unwrap();
        let s2 = engine.process(&e2).unwrap();
        assert_eq!(s1.speaker_id, s2.speaker_id);
        assert!(!s2.is_speaker_change);
    }

    #[test]
    fn dedup_skips_identical_time_window() {
        let mut engine = DiarizationEngine::new(8, 0.35);
        let e = embedding(one_hot(4, 0), 0.0, 2.0);
        assert!(engine.process(&e).is_some());
        assert!(engine.process(&e).is_none());
    }

    #[test]
    fn orthogonal_embedding_creates_second_profile() {
        let mut engine = DiarizationEngine::new(8, 0.35);
        // Push enough matching segments past the early-session window so
        // the later orthogonal embedding goes through the normal
        // below-threshold path rather than the case A early-detection path.
        for i in 0..11 {
            let start = i as f64 * 2.0;
            engine.process(&embedding(one_hot(4, 0), start, start + 2.0)).unwrap();
        }
        let seg = engine.process(&embedding(one_hot(4, 1), 22.0, 24.0)).unwrap();
        assert_eq!(seg.speaker_id, "SPEAKER_01");
        assert!(seg.is_speaker_change);
    }

    #[test]
    fn profiles_are_never_removed() {
        let mut engine = DiarizationEngine::new(8, 0.35);
        for i in 0..11 {
            let start = i as f64 * 2.0;
            engine.process(&embedding(one_hot(4, 0), start, start + 2.0)).unwrap();
        }
        engine.process(&embedding(one_hot(4, 1), 22.0, 24.0)).unwrap();
        assert_eq!(engine.state().profiles.len(), 2);
        engine.process(&embedding(one_hot(4, 0), 24.0, 26.0)).unwrap();
        assert_eq!(engine.state().profiles.len(), 2);
    }

    #[test]
    fn forced_assignment_at_capacity_floors_confidence_at_half() {
        let mut engine = DiarizationEngine::new(1, 0.35);
        let s1 = engine.process(&embedding(one_hot(4, 0), 0.0, 2.0)).unwrap();
        assert_eq!(s1.speaker_id, "SPEAKER_00");
        // Orthogonal embedding, but max_speakers=1 forces reassignment to
        // the only profile that exists.
        let s2 = engine.process(&embedding(one_hot(4, 1), 2.0, 4.0)).unwrap();
        assert_eq!(s2.speaker_id, "SPEAKER_00");
        assert!(s2.confidence >= 0.5);
        assert_eq!(engine.state().profiles.len(), 1);
    }
}
