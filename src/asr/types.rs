//! ASR boundary: the engine consumes transcript segments from an opaque
//! external recognizer. No speech recognition model is implemented here
//! (explicit non-goal) — this module only documents and exercises the
//! contract, with a deterministic test double standing in for the real
//! thing end to end.

use crate::transcript::TranscriptSegment;

/// Anything that can hand the engine a transcript segment for one window of
/// audio. The real implementation of this trait lives outside the crate;
/// `speakerline` only ever consumes it.
pub trait AsrSource {
    /// Returns `None` once the source has no more segments to offer.
    fn next_segment(&mut self) -> Option<TranscriptSegment>;
}

/// Deterministic test double that replays a fixed sequence of transcript
/// segments, used by integration tests to exercise the aligner and output
/// marshaller without a real speech recognizer.
pub struct ReplayAsrSource {
    segments: std::collections::VecDeque<TranscriptSegment>,
}

impl ReplayAsrSource {
    pub fn new(segments: Vec<TranscriptSegment>) -> Self {
        Self { segments: segments.into() }
    }
}

impl AsrSource for ReplayAsrSource {
    fn next_segment(&mut self) -> Option<TranscriptSegment> {
        self.segments.pop_front()
    }
}
