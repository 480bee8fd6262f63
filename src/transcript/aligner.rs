//! Transcript-to-speaker alignment.
//!
//! Attribution falls through four progressively weaker strategies: weighted
//! temporal overlap against buffered speaker segments, nearest-boundary
//! distance when nothing overlaps, the most recently seen speaker when
//! nothing is even close, and finally a synthetic per-segment placeholder
//! speaker when the buffer is empty outright.

use crate::transcript::health::{HealthEvent, HealthMonitor};
use crate::transcript::types::{AlignmentBuffer, FinalSegment, TranscriptSegment};
use tracing::debug;

const ALIGNMENT_BUFFER_GC_SECONDS: f64 = 300.0; // T_gc
const NEAREST_BOUNDARY_MAX_DISTANCE: f64 = 3.0;
const LAST_KNOWN_CONFIDENCE_FLOOR: f64 = 0.3;

pub struct TranscriptAligner {
    buffer: AlignmentBuffer,
    health: HealthMonitor,
    last_known_confidence: Option<f64>,
}

impl Default for TranscriptAligner {
    fn default() -> Self {
        Self { buffer: AlignmentBuffer::default(), health: HealthMonitor::default(), last_known_confidence: None }
    }
}

impl TranscriptAligner {
    pub fn buffer_mut(&mut self) -> &mut AlignmentBuffer {
        &mut self.buffer
    }

    pub fn align(&mut self, transcript: &TranscriptSegment, now_wall_seconds: f64) -> (FinalSegment, Option<HealthEvent>) {
        let collected = self.buffer.garbage_collect(now_wall_seconds, ALIGNMENT_BUFFER_GC_SECONDS);
        if collected > 0 {
            debug!(collected, "garbage collected stale alignment buffer entries");
        }

        if let Some((speaker_id, confidence)) = self.weighted_overlap_match(transcript) {
            let health_event = self.health.record_success();
            self.last_known_confidence = Some(confidence);
            return (self.finalize(transcript, speaker_id, confidence, false), health_event);
        }

        if let Some((speaker_id, confidence)) = self.nearest_boundary_match(transcript) {
            let health_event = self.health.record_success();
            self.last_known_confidence = Some(confidence);
            return (self.finalize(transcript, speaker_id, confidence, false), health_event);
        }

        if let Some(speaker_id) = self.buffer.last_known_speaker_id.clone() {
            let health_event = self.health.record_success();
            let confidence = (self.last_known_confidence.unwrap_or(0.5) / 2.0).max(LAST_KNOWN_CONFIDENCE_FLOOR);
            return (self.finalize(transcript, speaker_id, confidence, true), health_event);
        }

        let health_event = self.health.record_failure("no speaker segment within tolerance and no last-known speaker".to_string());
        let synthetic_id = format!("speaker_unknown_{}", (transcript.t_start * 1000.0).floor() as i64);
        (self.finalize(transcript, synthetic_id, 0.0, true), health_event)
    }

    fn finalize(&self, transcript: &TranscriptSegment, speaker_id: String, confidence: f64, fallback: bool) -> FinalSegment {
        FinalSegment {
            text: transcript.text.clone(),
            t_start: transcript.t_start,
            t_end: transcript.t_end,
            speaker_id,
            confidence: confidence.clamp(0.0, 1.0),
            speaker_fallback: fallback,
        }
    }

    fn weighted_overlap_match(&self, transcript: &TranscriptSegment) -> Option<(String, f64)> {
        use std::collections::HashMap;

        let (a, b) = (transcript.t_start, transcript.t_end);
        let duration = (b - a).max(1e-9);

        let mut overlap_by_speaker: HashMap<&str, f64> = HashMap::new();
        for entry in &self.buffer.entries {
            let (u, v) = (entry.segment.t_start, entry.segment.t_end);
            let overlap = (b.min(v) - a.max(u)).max(0.0);
            if overlap > 0.0 {
                *overlap_by_speaker.entry(entry.segment.speaker_id.as_str()).or_insert(0.0) += overlap;
            }
        }

        overlap_by_speaker
            .into_iter()
            .max_by(|x, y| x.1.partial_cmp(&y.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(speaker_id, overlap_total)| (speaker_id.to_string(), (overlap_total / duration).min(1.0)))
    }

    fn nearest_boundary_match(&self, transcript: &TranscriptSegment) -> Option<(String, f64)> {
        let (a, b) = (transcript.t_start, transcript.t_end);

        let nearest = self
            .buffer
            .entries
            .iter()
            .map(|entry| {
                let (u, v) = (entry.segment.t_start, entry.segment.t_end);
                let distance = [(u - a).abs(), (v - a).abs(), (u - b).abs(), (v - b).abs()]
                    .into_iter()
                    .fold(f64::INFINITY, f64::min);
                (entry, distance)
            })
            .min_by(|x, y| x.1.partial_cmp(&y.1).unwrap_or(std::cmp::Ordering::Equal))?;

        let (entry, distance) = nearest;
        if distance > NEAREST_BOUNDARY_MAX_DISTANCE {
            return None;
        }

        let confidence = entry.segment.confidence * (1.0 - distance / NEAREST_BOUNDARY_MAX_DISTANCE * 0.5);
        Some((entry.segment.speaker_id.clone(), confidence))
    }
}
