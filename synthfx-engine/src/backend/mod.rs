//! Audio output abstraction.
//!
//! An [`AudioBackend`] is prepared once (format and graph), started lazily and
//! hands out reusable [`VoiceHandle`]s. Two implementations:
//! - [`OfflineBackend`]: no device; the host pulls audio from its [`Mixer`](crate::Mixer)
//! - `CpalBackend` (feature `realtime`): the default output device

use synthfx_core::render::SampleBuffer;

use crate::error::EngineError;

pub mod offline;
#[cfg(feature = "realtime")]
pub mod device;

pub use offline::OfflineBackend;

/// Platform audio sink.
pub trait AudioBackend: Send + Sync {
    /// Build the output format/graph. Called once by the engine constructor.
    fn prepare(&self) -> Result<(), EngineError>;

    /// Begin output. Safe to call when already running.
    fn start(&self) -> Result<(), EngineError>;

    fn is_running(&self) -> bool;

    /// Rate every buffer handed to this backend must be rendered at.
    fn sample_rate(&self) -> f32;

    fn create_voice(&self) -> Result<Box<dyn VoiceHandle>, EngineError>;
}

/// One reusable playback unit.
pub trait VoiceHandle: Send {
    /// Replace whatever is loaded (interrupting it) and rewind to frame 0.
    fn schedule(&mut self, buffer: &SampleBuffer);

    fn play(&mut self);

    /// Stop and unload.
    fn stop(&mut self);

    fn is_playing(&self) -> bool;

    /// Gain in [0, 1].
    fn set_volume(&mut self, volume: f32);

    fn volume(&self) -> f32;
}
