//! ASR boundary: a capability trait plus a deterministic test
//! double, never a real recognizer.

pub mod types;

pub use types::{AsrSource, ReplayAsrSource};
