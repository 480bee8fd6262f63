//! Flush-per-line JSONL writer.
//!
//! Every record is written and flushed immediately: downstream consumers of
//! this stream (a UI, a pipe into another process) are expected to read it
//! line-by-line in real time, so buffering writes across records would
//! introduce latency with no compensating benefit.

use crate::output::records::OutputRecord;
use std::io::{self, Write};

pub struct JsonlWriter<W: Write> {
    writer: W,
}

impl<W: Write> JsonlWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn write_record(&mut self, record: &OutputRecord) -> io::Result<()> {
        writeln!(self.writer, "{}", record.to_json_line())?;
        self.writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_one_json_line_per_record() {
        let mut buffer = Vec::new();
        {
            let mut writer = JsonlWriter::new(&mut buffer);
            writer
                .write_record(&OutputRecord::Ready {
                    session_id: "s1".to_string(),
                    backend: "cpu".to_string(),
                    sample_rate: 16000,
                    chunk_duration: 5.0,
                    vad_enabled: true,
                    diarization_enabled: true,
                })
                .unwrap();
            writer
                .write_record(&OutputRecord::Complete { total_seconds: 1.5, total_bytes_received: 32000, segments_produced: 3 })
                .unwrap();
        }
        let text = String::from_utf8(buffer).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("\"ready\""));
        assert!(lines[1].contains("\"complete\""));
    }
}
