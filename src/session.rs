//! Owns every piece of per-run mutable state explicitly rather than through
//! a module-level singleton. A single `Session` is constructed once by
//! `main` and driven by its cooperative loop; nothing here is
//! `Arc`/`Mutex`-wrapped because nothing is shared across threads.

use crate::audio::{AudioChunk, PcmFormat, StreamIngestor, VadBackend, VoiceActivityGate};
use crate::config::EngineConfig;
use crate::diarization::DiarizationEngine;
use crate::embedding::{Embedding, EmbeddingExtractor, EmbeddingScheduler};
use crate::error::EngineError;
use crate::output::OutputRecord;
use crate::transcript::{HealthEvent, TranscriptAligner, TranscriptSegment};
use std::time::Instant;

const WINDOW_SECONDS: f64 = 2.0;
const HOP_SECONDS: f64 = 0.5;
const TARGET_SAMPLE_RATE: u32 = 16000;

pub struct Session {
    ingestor: StreamIngestor,
    vad_gate: VoiceActivityGate,
    scheduler: Option<EmbeddingScheduler>,
    engine: Option<DiarizationEngine>,
    aligner: Option<TranscriptAligner>,
    current_speaker: Option<String>,
    emitted_total: u64,
    bytes_received: u64,
    started_at: Instant,
}

impl Session {
    pub fn new(
        config: &EngineConfig,
        embedding_extractor: Option<Box<dyn EmbeddingExtractor>>,
        neural_vad: Option<Box<dyn VadBackend + Send>>,
    ) -> Result<Self, EngineError> {
        let format = PcmFormat {
            sample_rate: config.sample_rate,
            channel_count: config.channels,
            bit_depth: config.bit_depth,
        };
        let ingestor = StreamIngestor::with_initial_offset(
            format,
            config.chunk_duration_seconds,
            TARGET_SAMPLE_RATE,
            config.initial_offset_seconds,
        )
        .map_err(|err| EngineError::Input(err.to_string()))?;
        let vad_gate = VoiceActivityGate::new(neural_vad, config.permissive_vad, config.vad_enabled);

        let (scheduler, engine, aligner) = match embedding_extractor {
            Some(extractor) => (
                Some(EmbeddingScheduler::new(WINDOW_SECONDS, HOP_SECONDS, TARGET_SAMPLE_RATE, extractor)),
                Some(DiarizationEngine::new(config.max_speakers, config.similarity_threshold)),
                Some(TranscriptAligner::default()),
            ),
            None => (None, None, None),
        };

        Ok(Self {
            ingestor,
            vad_gate,
            scheduler,
            engine,
            aligner,
            current_speaker: None,
            emitted_total: 0,
            bytes_received: 0,
            started_at: Instant::now(),
        })
    }

    fn wall_clock_seconds(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }

    /// Feed raw PCM bytes in. Returns any `speaker_segment`/`speaker_change`
    /// records produced along the way (aligned transcript output happens in
    /// [`Self::submit_transcript`]).
    pub fn ingest_bytes(&mut self, bytes: &[u8]) -> Vec<OutputRecord> {
        self.bytes_received += bytes.len() as u64;
        self.ingestor.ingest(bytes);
        let chunks = self.ingestor.try_drain();
        self.process_chunks(chunks)
    }

    fn process_chunks(&mut self, chunks: Vec<AudioChunk>) -> Vec<OutputRecord> {
        let mut records = Vec::new();
        for chunk in chunks {
            if !self.vad_gate.is_speech(&chunk) {
                continue;
            }
            if let Some(scheduler) = &mut self.scheduler {
                let embeddings = scheduler.push(&chunk.samples, chunk.first_sample_index);
                records.extend(self.handle_embeddings(embeddings));
            }
        }
        records
    }

    fn handle_embeddings(&mut self, embeddings: Vec<Embedding>) -> Vec<OutputRecord> {
        let mut records = Vec::new();
        let Some(engine) = &mut self.engine else { return records };
        let Some(aligner) = &mut self.aligner else { return records };

        for embedding in embeddings {
            if let Some(segment) = engine.process(&embedding) {
                records.push(OutputRecord::SpeakerSegment {
                    speaker: segment.speaker_id.clone(),
                    start: segment.t_start,
                    end: segment.t_end,
                    confidence: segment.confidence,
                });

                if segment.is_speaker_change {
                    if let Some(from_speaker) = self.current_speaker.clone() {
                        records.push(OutputRecord::SpeakerChange {
                            from_speaker,
                            to_speaker: segment.speaker_id.clone(),
                            time: segment.t_start,
                        });
                    }
                }
                self.current_speaker = Some(segment.speaker_id.clone());

                aligner.buffer_mut().push(segment, self.started_at.elapsed().as_secs_f64());
            }
        }
        records
    }

    /// Align one transcript segment from the external ASR against buffered
    /// speaker segments and produce its output record(s).
    pub fn submit_transcript(&mut self, transcript: TranscriptSegment) -> Vec<OutputRecord> {
        let mut records = Vec::new();
        self.emitted_total += 1;

        match &mut self.aligner {
            Some(aligner) => {
                let now = self.started_at.elapsed().as_secs_f64();
                let (final_segment, health_event) = aligner.align(&transcript, now);
                if let Some(event) = health_event {
                    records.push(match event {
                        HealthEvent::Warning {
                            consecutive_failures,
                            total_failures,
                            last_failure_reason,
                            is_recoverable,
                            recommendation,
                        } => OutputRecord::DiarizationHealthWarning {
                            consecutive_failures,
                            total_failures,
                            last_failure_reason,
                            is_recoverable,
                            recommendation,
                        },
                        HealthEvent::Recovery { total_segments_processed, previous_failures } => {
                            OutputRecord::DiarizationHealthRecovery { total_segments_processed, previous_failures }
                        }
                    });
                }
                records.push(OutputRecord::Segment {
                    text: final_segment.text,
                    start: final_segment.t_start,
                    end: final_segment.t_end,
                    confidence: None,
                    words: None,
                    speaker: Some(final_segment.speaker_id),
                    speaker_confidence: Some(final_segment.confidence),
                    speaker_fallback: Some(final_segment.speaker_fallback),
                });
            }
            None => {
                records.push(OutputRecord::Segment {
                    text: transcript.text,
                    start: transcript.t_start,
                    end: transcript.t_end,
                    confidence: None,
                    words: None,
                    speaker: None,
                    speaker_confidence: None,
                    speaker_fallback: None,
                });
            }
        }
        records
    }

    /// Drain everything buffered at end-of-stream and emit the closing
    /// record. Call exactly once.
    pub fn finish(&mut self) -> Vec<OutputRecord> {
        let mut records = Vec::new();

        let tail_chunks = self.ingestor.drain_remaining();
        records.extend(self.process_chunks(tail_chunks));

        if let Some(scheduler) = &mut self.scheduler {
            let tail_embeddings = scheduler.flush();
            records.extend(self.handle_embeddings(tail_embeddings));
        }

        records.push(OutputRecord::Complete {
            total_seconds: self.wall_clock_seconds(),
            total_bytes_received: self.bytes_received,
            segments_produced: self.emitted_total,
        });
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DeviceHint, EngineConfig};
    use crate::embedding::SignalFeatureEmbeddingExtractor;

    fn test_config() -> EngineConfig {
        EngineConfig {
            sample_rate: 16000,
            channels: 1,
            bit_depth: 16,
            chunk_duration_seconds: 1.0,
            similarity_threshold: 0.35,
            max_speakers: 8,
            device: DeviceHint::Cpu,
            vad_enabled: false,
            permissive_vad: false,
            diarization_enabled: true,
            initial_offset_seconds: 0.0,
        }
    }

    fn sine_bytes(seconds: f64) -> Vec<u8> {
        let n = (16000.0 * seconds) as usize;
        let mut out = Vec::with_capacity(n * 2);
        for i in 0..n {
            let t = i as f64 / 16000.0;
            let s = (2.0 * std::f64::consts::PI * 220.0 * t).sin();
            let raw = (s * i16::MAX as f64) as i16;
            out.extend_from_slice(&raw.to_le_bytes());
        }
        out
    }

    #[test]
    fn finish_without_any_input_still_emits_complete() {
        let mut session = Session::new(&test_config(), Some(Box::new(SignalFeatureEmbeddingExtractor::default())), None).unwrap();
        let records = session.finish();
        assert!(matches!(records.last(), Some(OutputRecord::Complete { segments_produced: 0, .. })));
    }

    #[test]
    fn ingesting_audio_emits_raw_speaker_segments() {
        let mut session = Session::new(&test_config(), Some(Box::new(SignalFeatureEmbeddingExtractor::default())), None).unwrap();
        let records = session.ingest_bytes(&sine_bytes(3.0));
        assert!(records.iter().any(|r| matches!(r, OutputRecord::SpeakerSegment { .. })));
    }

    #[test]
    fn submitting_transcript_yields_aligned_segment_with_speaker_attribution() {
        let mut session = Session::new(&test_config(), Some(Box::new(SignalFeatureEmbeddingExtractor::default())), None).unwrap();
        session.ingest_bytes(&sine_bytes(3.0));
        let transcript = TranscriptSegment { text: "hello".to_string(), t_start: 0.0, t_end: 2.0 };
        let records = session.submit_transcript(transcript);
        assert!(records.iter().any(|r| matches!(r, OutputRecord::Segment { speaker: Some(_), .. })));
    }

    #[test]
    fn finish_reports_bytes_received() {
        let mut session = Session::new(&test_config(), Some(Box::new(SignalFeatureEmbeddingExtractor::default())), None).unwrap();
        let audio = sine_bytes(1.0);
        let expected_bytes = audio.len() as u64;
        session.ingest_bytes(&audio);
        let records = session.finish();
        assert!(records.iter().any(
            |r| matches!(r, OutputRecord::Complete { total_bytes_received, .. } if *total_bytes_received == expected_bytes)
        ));
    }

    #[test]
    fn disabled_diarization_emits_plain_segments() {
        let mut config = test_config();
        config.diarization_enabled = false;
        let mut session = Session::new(&config, None, None).unwrap();
        let transcript = TranscriptSegment { text: "hi".to_string(), t_start: 0.0, t_end: 1.0 };
        let records = session.submit_transcript(transcript);
        assert!(matches!(records.last(), Some(OutputRecord::Segment { .. })));
    }
}
