//! Fixed effect compositions.
//!
//! One [`Recipe`] per [`EffectKind`]. The compositions are constants; the
//! only tunable is how many times the `fail` recipe repeats its tail motif.

use alloc::vec;
use core::fmt;
use core::str::FromStr;

use crate::recipe::{Recipe, Segment, TailPattern, Waveform};

/// Logical sound effects the game layer can trigger.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EffectKind {
    /// Round start jingle.
    Start,
    /// Short confirmation blip (score tick, menu move).
    Bip,
    /// Descending failure motif with a repeating tail.
    Fail,
}

impl EffectKind {
    pub const ALL: [EffectKind; 3] = [EffectKind::Start, EffectKind::Bip, EffectKind::Fail];

    /// Stable lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            EffectKind::Start => "start",
            EffectKind::Bip   => "bip",
            EffectKind::Fail  => "fail",
        }
    }

    /// Stable numeric id (used across the C ABI).
    pub fn id(self) -> u32 {
        match self {
            EffectKind::Start => 0,
            EffectKind::Bip   => 1,
            EffectKind::Fail  => 2,
        }
    }

    pub fn from_id(id: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.id() == id)
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl FromStr for EffectKind {
    type Err = UnknownEffect;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.name().eq_ignore_ascii_case(s))
            .ok_or(UnknownEffect)
    }
}

/// Returned by `EffectKind::from_str` for unknown names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown effect name")]
pub struct UnknownEffect;

/// Default number of tail repeats in the `fail` recipe.
pub const DEFAULT_FAIL_TAIL_REPEATS: usize = 6;

/// The recipe set for every effect kind.
#[derive(Clone, Debug, PartialEq)]
pub struct SoundProfile {
    start: Recipe,
    bip: Recipe,
    fail: Recipe,
    fail_tail_repeats: usize,
}

impl Default for SoundProfile {
    fn default() -> Self {
        Self::new(DEFAULT_FAIL_TAIL_REPEATS)
    }
}

impl SoundProfile {
    pub fn new(fail_tail_repeats: usize) -> Self {
        Self {
            start: start_recipe(),
            bip: bip_recipe(),
            fail: fail_recipe(fail_tail_repeats),
            fail_tail_repeats,
        }
    }

    #[inline]
    pub fn recipe(&self, kind: EffectKind) -> &Recipe {
        match kind {
            EffectKind::Start => &self.start,
            EffectKind::Bip   => &self.bip,
            EffectKind::Fail  => &self.fail,
        }
    }

    #[inline] pub fn fail_tail_repeats(&self) -> usize { self.fail_tail_repeats }
}

// C major arpeggio preceded by a short upward swoop.
fn start_recipe() -> Recipe {
    Recipe::new(
        vec![Segment::sweep(Waveform::Triangle, 220.0, 523.25, 0.08, 0.22, 0.004, 0.01)],
        vec![
            Segment::tone(Waveform::Sine, 523.25, 0.07, 0.28, 0.004, 0.015),
            Segment::tone(Waveform::Sine, 659.25, 0.07, 0.28, 0.004, 0.015),
            Segment::tone(Waveform::Sine, 783.99, 0.07, 0.28, 0.004, 0.015),
            Segment::tone(Waveform::Sine, 1046.5, 0.16, 0.30, 0.004, 0.08),
        ],
        None,
    )
}

// ~50 ms high blip.
fn bip_recipe() -> Recipe {
    Recipe::from_body(vec![Segment::tone(Waveform::Sine, 1318.5, 0.05, 0.25, 0.002, 0.03)])
}

// Falling square sweep, low thud, then a decaying two-note wobble.
fn fail_recipe(tail_repeats: usize) -> Recipe {
    Recipe::new(
        vec![Segment::sweep(Waveform::Square, 440.0, 180.0, 0.18, 0.16, 0.003, 0.02)],
        vec![Segment::tone(Waveform::Triangle, 130.81, 0.14, 0.30, 0.004, 0.04)],
        Some(TailPattern::new(
            vec![
                Segment::tone(Waveform::Triangle, 110.0, 0.06, 0.22, 0.004, 0.02),
                Segment::tone(Waveform::Triangle, 103.83, 0.06, 0.18, 0.004, 0.02),
            ],
            tail_repeats,
        )),
    )
}

// ------------------------------------ Tests --------------------------------------
