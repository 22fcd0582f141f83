//! synthfx Engine: voice pools, fades, lane cues and fallback routing.
//!
//! Crate layout:
//! - [`backend`]   : `AudioBackend` / `VoiceHandle` traits, offline and cpal backends
//! - [`mixer`]     : shared slot table that sums playing voices into mono blocks
//! - [`scheduler`] : cancelable deferred tasks (timer thread or manual clock)
//! - [`voice`]     : a backend voice plus its generation token
//! - [`fade`]      : the 10-step fade-out shared by both engines
//! - [`health`]    : engine health and the lazy output restart
//! - [`effects`]   : `EffectEngine`, one voice pool per effect kind
//! - [`lane_cues`] : `LaneCueEngine`, precomputed tick/move cues on two voices
//! - [`fallback`]  : `Fallback`, routes unrenderable effects to a secondary player
//! - [`player`]    : capability traits consumed by the game layer
//!
//! All buffers are rendered once at construction. Public calls never block on
//! audio work and never return errors; failures are logged and folded into the
//! engine's health.

pub mod backend;
pub mod config;
pub mod effects;
pub mod error;
pub mod fade;
pub mod fallback;
pub mod health;
pub mod lane_cues;
pub mod mixer;
pub mod player;
pub mod scheduler;
pub mod voice;

use std::sync::{Mutex, MutexGuard, PoisonError};

// Re-export some commonly used items to make downstream imports ergonomic.
pub use backend::{AudioBackend, OfflineBackend, VoiceHandle};
pub use config::{EngineConfig, LaneCueConfig};
pub use effects::EffectEngine;
pub use error::EngineError;
pub use fallback::Fallback;
pub use health::Health;
pub use lane_cues::LaneCueEngine;
pub use mixer::Mixer;
pub use player::{AvailabilityQuery, Completion, LaneCuePlayer, SoundEffectPlayer};
pub use scheduler::{ManualScheduler, Scheduler, TaskHandle, ThreadScheduler};

#[cfg(feature = "realtime")]
pub use backend::device::CpalBackend;

/// Lock ignoring poisoning; a panicked completion must not silence the engine.
pub(crate) fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
