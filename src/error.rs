//! Top-level error types.
//!
//! Each component owns a narrow `thiserror` enum for the failures it can
//! produce; almost none of them ever reach the main loop as an `Err` because
//! every component is built to degrade instead of abort. `EngineError`
//! exists only for the handful of conditions that really are fatal.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("input stream error: {0}")]
    Input(String),
}
