//! Wire record types for the JSONL output stream.
//!
//! Every record carries a `type` discriminant via `serde`'s internally
//! tagged representation. Before a record is serialized its floats are run
//! through [`sanitize_json`] so `NaN`/`Infinity` never reach a JSON parser
//! that would choke on them.

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum OutputRecord {
    #[serde(rename = "ready")]
    Ready {
        session_id: String,
        backend: String,
        sample_rate: u32,
        chunk_duration: f64,
        vad_enabled: bool,
        diarization_enabled: bool,
    },

    #[serde(rename = "status")]
    Status { message: String },

    /// The aligned transcript: ASR text plus the speaker it was attributed
    /// to. `speaker`/`speaker_confidence`/`speaker_fallback` are absent
    /// when diarization is disabled.
    #[serde(rename = "segment")]
    Segment {
        text: String,
        start: f64,
        end: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        confidence: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        words: Option<Vec<String>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        speaker: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        speaker_confidence: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        speaker_fallback: Option<bool>,
    },

    /// Raw speaker-identity-engine output: one per assigned embedding
    /// window, with no transcript attached.
    #[serde(rename = "speaker_segment")]
    SpeakerSegment { speaker: String, start: f64, end: f64, confidence: f64 },

    #[serde(rename = "speaker_change")]
    SpeakerChange { from_speaker: String, to_speaker: String, time: f64 },

    #[serde(rename = "diarization_unavailable")]
    DiarizationUnavailable { reason: String, details: String, capabilities: Vec<String> },

    #[serde(rename = "diarization_health_warning")]
    DiarizationHealthWarning {
        consecutive_failures: u32,
        total_failures: u32,
        last_failure_reason: String,
        is_recoverable: bool,
        recommendation: String,
    },

    #[serde(rename = "diarization_health_recovery")]
    DiarizationHealthRecovery { total_segments_processed: u64, previous_failures: u32 },

    #[serde(rename = "complete")]
    Complete { total_seconds: f64, total_bytes_received: u64, segments_produced: u64 },

    #[serde(rename = "error")]
    Error { message: String, code: String },
}

impl OutputRecord {
    /// Serialize to a single sanitized JSON line, without a trailing
    /// newline.
    pub fn to_json_line(&self) -> String {
        let value = serde_json::to_value(self).expect("OutputRecord fields are all JSON-representable");
        sanitize_json(value).to_string()
    }
}

/// Replace non-finite floats so the output is valid JSON everywhere:
/// `NaN` becomes `null`, `+Infinity`/`-Infinity` become `f64::MAX`/`-f64::MAX`.
pub fn sanitize_json(value: Value) -> Value {
    match value {
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.is_nan() => Value::Null,
            Some(f) if f.is_infinite() && f.is_sign_positive() => serde_json::json!(f64::MAX),
            Some(f) if f.is_infinite() => serde_json::json!(-f64::MAX),
            _ => Value::Number(n),
        },
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize_json).collect()),
        Value::Object(map) => Value::Object(map.into_iter().map(|(k, v)| (k, sanitize_json(v))).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready_record() -> OutputRecord {
        OutputRecord::Ready {
            session_id: "abc".to_string(),
            backend: "cpu".to_string(),
            sample_rate: 16000,
            chunk_duration: 5.0,
            vad_enabled: true,
            diarization_enabled: true,
        }
    }

    #[test]
    fn every_record_carries_a_type_field() {
        let line = ready_record().to_json_line();
        assert!(line.contains("\"type\":\"ready\""));
    }

    #[test]
    fn ready_exposes_all_required_fields() {
        let parsed: Value = serde_json::from_str(&ready_record().to_json_line()).unwrap();
        for field in ["backend", "sample_rate", "chunk_duration", "vad_enabled", "diarization_enabled"] {
            assert!(parsed.get(field).is_some(), "missing field {field}");
        }
    }

    #[test]
    fn sanitizes_nan_to_null() {
        let value = serde_json::json!({ "confidence": f64::NAN });
        let sanitized = sanitize_json(value);
        assert_eq!(sanitized["confidence"], Value::Null);
    }

    #[test]
    fn sanitizes_infinity_to_f64_max() {
        let value = serde_json::json!({ "score": f64::INFINITY, "neg": f64::NEG_INFINITY });
        let sanitized = sanitize_json(value);
        assert_eq!(sanitized["score"].as_f64().unwrap(), f64::MAX);
        assert_eq!(sanitized["neg"].as_f64().unwrap(), -f64::MAX);
    }

    #[test]
    fn speaker_segment_carries_no_text() {
        let record = OutputRecord::SpeakerSegment {
            speaker: "SPEAKER_00".to_string(),
            start: 0.0,
            end: 1.0,
            confidence: 0.9,
        };
        let parsed: Value = serde_json::from_str(&record.to_json_line()).unwrap();
        assert_eq!(parsed["speaker"], "SPEAKER_00");
        assert_eq!(parsed["type"], "speaker_segment");
        assert!(parsed.get("text").is_none());
    }

    #[test]
    fn segment_carries_speaker_attribution_fields() {
        let record = OutputRecord::Segment {
            text: "hi".to_string(),
            start: 0.0,
            end: 1.0,
            confidence: None,
            words: None,
            speaker: Some("SPEAKER_00".to_string()),
            speaker_confidence: Some(0.8),
            speaker_fallback: Some(false),
        };
        let parsed: Value = serde_json::from_str(&record.to_json_line()).unwrap();
        assert_eq!(parsed["speaker"], "SPEAKER_00");
        assert_eq!(parsed["speaker_confidence"], 0.8);
        assert!(parsed.get("confidence").is_none());
    }

    #[test]
    fn speaker_change_carries_both_endpoints() {
        let record = OutputRecord::SpeakerChange {
            from_speaker: "SPEAKER_00".to_string(),
            to_speaker: "SPEAKER_01".to_string(),
            time: 4.2,
        };
        let parsed: Value = serde_json::from_str(&record.to_json_line()).unwrap();
        assert_eq!(parsed["from_speaker"], "SPEAKER_00");
        assert_eq!(parsed["to_speaker"], "SPEAKER_01");
    }
}
