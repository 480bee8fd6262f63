//! Types shared between the transcript aligner and the output marshaller.

use crate::diarization::SpeakerSegment;

/// A transcript segment as produced by the (external, opaque) ASR
/// component. The aligner only ever reads timestamps and text from this;
/// it never mutates or re-recognizes it.
#[derive(Debug, Clone)]
pub struct TranscriptSegment {
    pub text: String,
    pub t_start: f64,
    pub t_end: f64,
}

/// A transcript segment after it has been attributed to a speaker.
#[derive(Debug, Clone)]
pub struct FinalSegment {
    pub text: String,
    pub t_start: f64,
    pub t_end: f64,
    pub speaker_id: String,
    pub confidence: f64,
    pub speaker_fallback: bool,
}

/// Speaker segments awaiting a transcript segment to align with, plus the
/// bookkeeping needed to garbage-collect ones that never get claimed.
#[derive(Debug, Default)]
pub struct AlignmentBuffer {
    pub entries: Vec<BufferedSpeakerSegment>,
    pub last_known_speaker_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BufferedSpeakerSegment {
    pub segment: SpeakerSegment,
    pub buffered_at_wall_seconds: f64,
}

impl AlignmentBuffer {
    pub fn push(&mut self, segment: SpeakerSegment, now_wall_seconds: f64) {
        self.last_known_speaker_id = Some(segment.speaker_id.clone());
        self.entries.push(BufferedSpeakerSegment { segment, buffered_at_wall_seconds: now_wall_seconds });
    }

    /// Drop entries older than `max_age_seconds` of wall-clock time. Purely
    /// time-based: there is no memory-pressure trigger. The last-known
    /// speaker cache tracks whatever entry survives most recently, so it
    /// ages out along with the entries that justified it.
    pub fn garbage_collect(&mut self, now_wall_seconds: f64, max_age_seconds: f64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| now_wall_seconds - e.buffered_at_wall_seconds <= max_age_seconds);
        self.last_known_speaker_id = self.entries.last().map(|e| e.segment.speaker_id.clone());
        before - self.entries.len()
    }
}
