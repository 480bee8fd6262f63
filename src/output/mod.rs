//! JSONL wire protocol output.

pub mod records;
pub mod writer;

pub use records::{sanitize_json, OutputRecord};
pub use writer::JsonlWriter;
