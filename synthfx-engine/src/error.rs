//! Engine error type.
//!
//! These errors never reach `play`/`stop_all`/`set_volume` callers; they are
//! logged and turned into health state or per-effect unavailability.

use synthfx_core::RenderError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Output format or device could not be set up.
    #[error("audio backend could not be prepared: {0}")]
    Prepare(String),

    /// Output was prepared but refused to start.
    #[error("audio output failed to start: {0}")]
    Start(String),

    #[error("voice allocation failed: {0}")]
    Voice(String),

    #[error(transparent)]
    Render(#[from] RenderError),
}
