//! Numeric helpers shared by the renderer, plus the compile-time math backend.
//!
//! Backends (picked once, at compile time)
//! - `micromath` feature: micromath's `F32Ext`
//! - `no-std` feature: `libm`
//! - otherwise: the std float intrinsics
//!
//! `fast-math` swaps the sine for a 7th-order polynomial. Every helper here is
//! pure; domains are noted where they matter.

#![allow(clippy::excessive_precision)]

use core::f32::consts::PI;

use cfg_if::cfg_if;

// ----------------------------- Math backend selection -----------------------------

cfg_if! {
    // micromath wins when both are enabled
    if #[cfg(feature = "micromath")] {
        use micromath::F32Ext as _;
        #[inline] fn m_sin(x: f32) -> f32 { x.sin() }
        #[inline] fn m_floor(x: f32) -> f32 { x.floor() }
        #[inline] fn m_round(x: f32) -> f32 { x.round() }
    } else if #[cfg(feature = "no-std")] {
        #[inline] fn m_sin(x: f32) -> f32 { libm::sinf(x) }
        #[inline] fn m_floor(x: f32) -> f32 { libm::floorf(x) }
        #[inline] fn m_round(x: f32) -> f32 { libm::roundf(x) }
    } else {
        #[inline] fn m_sin(x: f32) -> f32 { x.sin() }
        #[inline] fn m_floor(x: f32) -> f32 { x.floor() }
        #[inline] fn m_round(x: f32) -> f32 { x.round() }
    }
}

/// One full turn in radians.
pub const TAU: f32 = 2.0 * PI;

// --------------------------------- Utilities -------------------------------------

#[inline]
pub fn clamp(x: f32, lo: f32, hi: f32) -> f32 {
    if x < lo { lo } else if x > hi { hi } else { x }
}

/// Clamp to `>= 0`, mapping NaN to 0 as well.
#[inline]
pub fn non_negative(x: f32) -> f32 {
    if x > 0.0 { x } else { 0.0 }
}

/// `|x|` without relying on std float intrinsics.
#[inline]
pub fn abs(x: f32) -> f32 {
    if x < 0.0 { -x } else { x }
}

#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Wrap phase into [0, 1).
#[inline]
pub fn wrap_phase01(p: f32) -> f32 {
    let w = p - m_floor(p);
    if w >= 1.0 { 0.0 } else { w }
}

/// `max(1, round(seconds * sr))`. Negative or NaN durations give one frame.
#[inline]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn seconds_to_frames(seconds: f32, sr: f32) -> usize {
    let f = m_round(seconds * sr);
    if f >= 1.0 { f as usize } else { 1 }
}

// --------------------------------- Sine -------------------------------------------

/// Sine of `x` radians; polynomial approximation under `fast-math`.
#[inline]
pub fn fast_sin(x: f32) -> f32 {
    cfg_if! {
        if #[cfg(feature = "fast-math")] {
            // Taylor terms up to x^7 on x folded into [-π, π].
            let r = x - m_round(x / TAU) * TAU;
            let r2 = r * r;
            r * (1.0 + r2 * (-1.0 / 6.0 + r2 * (1.0 / 120.0 - r2 / 5040.0)))
        } else {
            m_sin(x)
        }
    }
}

/// Sine of a normalized phase in [0, 1).
#[inline]
pub fn sin01(phase01: f32) -> f32 {
    fast_sin(TAU * phase01)
}

// --------------------------------- Mixing ----------------------------------------

/// `dst[i] += src[i] * gain` over the common prefix of both slices.
#[inline]
pub fn mix_in_place(dst: &mut [f32], src: &[f32], gain: f32) {
    dst.iter_mut().zip(src).for_each(|(d, s)| *d += s * gain);
}

// ------------------------------------ Tests --------------------------------------
