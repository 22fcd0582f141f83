#![cfg_attr(not(feature = "std"), no_std)]
//! synthfx Core: recipe model and deterministic renderer for procedural sound effects.
//!
//! Features
//! - `std`      : (default) use the Rust standard library
//! - `no-std`   : build with `#![no_std]` (+ `alloc`) and use `libm` for math
//! - `micromath`: use `micromath` instead of `libm` for the math backend
//! - `fast-math`: polynomial sine in the renderer hot loop
//!
//! Modules
//! - [`dsp`]      : math backend, clamps, phase wrapping, frame conversion
//! - [`envelopes`]: the linear attack/sustain/decay envelope shared by every tone
//! - [`recipe`]   : `Segment`, `TailPattern`, `Recipe` value types
//! - [`render`]   : `SampleBuffer` and the pure `Recipe -> buffer` renderer
//! - [`profile`]  : the fixed effect compositions (`start`, `bip`, `fail`)
//! - [`cues`]     : lane model and accessibility cue synthesis
//!
//! Design
//! - Everything here is value data or a pure function; no shared state, no I/O
//! - Buffers are rendered once and shared through `Arc<[f32]>`

extern crate alloc;

pub mod cues;
pub mod dsp;
pub mod envelopes;
pub mod profile;
pub mod recipe;
pub mod render;

pub use render::RenderError;

/// Commonly used types/functions for convenience:
pub mod prelude {
    pub use crate::cues::{CueMode, Lane, LaneCueProfile, MoveCueStyle, SafeLanes};
    pub use crate::dsp::{clamp, lerp, seconds_to_frames, wrap_phase01, TAU};
    pub use crate::envelopes::SegmentEnvelope;
    pub use crate::profile::{EffectKind, SoundProfile};
    pub use crate::recipe::{FrequencyShape, Recipe, Segment, TailPattern, Waveform};
    pub use crate::render::{render, render_chord, render_segments, RenderError, SampleBuffer};
}
