//! Declarative sound recipes.
//!
//! A [`Recipe`] is an ordered list of [`Segment`]s: an intro, a body and an
//! optional repeated [`TailPattern`]. Recipes are immutable values; the only
//! behavior is expansion into the flat segment sequence and its duration.

use alloc::vec::Vec;

use crate::dsp::{abs, lerp, non_negative};

/// Oscillator waveform of a segment.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Waveform { Sine, Triangle, Square }

impl Waveform {
    /// Evaluate the waveform at a normalized phase in [0, 1).
    #[inline]
    pub fn sample(self, phase01: f32) -> f32 {
        match self {
            Waveform::Sine     => crate::dsp::sin01(phase01),
            Waveform::Triangle => 4.0 * abs(phase01 - 0.5) - 1.0,
            Waveform::Square   => if phase01 < 0.5 { 1.0 } else { -1.0 },
        }
    }
}

/// Frequency over the lifetime of a segment.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum FrequencyShape {
    Constant(f32),
    /// Linear sweep from `start` to `end` Hz across the segment.
    Sweep { start: f32, end: f32 },
}

impl FrequencyShape {
    /// Instantaneous frequency at `progress` in [0, 1].
    #[inline]
    pub fn at(self, progress: f32) -> f32 {
        match self {
            FrequencyShape::Constant(hz) => hz,
            FrequencyShape::Sweep { start, end } => lerp(start, end, progress),
        }
    }
}

/// One waveform + frequency shape + envelope unit.
///
/// Times are seconds. Duration, amplitude, attack and decay are clamped to
/// `>= 0` at construction.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Segment {
    waveform: Waveform,
    frequency: FrequencyShape,
    duration: f32,
    amplitude: f32,
    attack: f32,
    decay: f32,
}

impl Segment {
    pub fn new(
        waveform: Waveform,
        frequency: FrequencyShape,
        duration: f32,
        amplitude: f32,
        attack: f32,
        decay: f32,
    ) -> Self {
        Self {
            waveform,
            frequency,
            duration: non_negative(duration),
            amplitude: non_negative(amplitude),
            attack: non_negative(attack),
            decay: non_negative(decay),
        }
    }

    /// Constant-pitch segment.
    pub fn tone(waveform: Waveform, hz: f32, duration: f32, amplitude: f32, attack: f32, decay: f32) -> Self {
        Self::new(waveform, FrequencyShape::Constant(hz), duration, amplitude, attack, decay)
    }

    /// Linear pitch sweep from `start_hz` to `end_hz`.
    pub fn sweep(
        waveform: Waveform,
        start_hz: f32,
        end_hz: f32,
        duration: f32,
        amplitude: f32,
        attack: f32,
        decay: f32,
    ) -> Self {
        Self::new(
            waveform,
            FrequencyShape::Sweep { start: start_hz, end: end_hz },
            duration,
            amplitude,
            attack,
            decay,
        )
    }

    #[inline] pub fn waveform(&self) -> Waveform { self.waveform }
    #[inline] pub fn frequency(&self) -> FrequencyShape { self.frequency }
    #[inline] pub fn duration(&self) -> f32 { self.duration }
    #[inline] pub fn amplitude(&self) -> f32 { self.amplitude }
    #[inline] pub fn attack(&self) -> f32 { self.attack }
    #[inline] pub fn decay(&self) -> f32 { self.decay }
}

/// A motif repeated `repeat_count` times at the end of a recipe.
#[derive(Clone, Debug, PartialEq)]
pub struct TailPattern {
    motif: Vec<Segment>,
    repeat_count: usize,
}

impl TailPattern {
    pub fn new(motif: Vec<Segment>, repeat_count: usize) -> Self {
        Self { motif, repeat_count }
    }

    /// Signed constructor for hosts that carry counts as integers; negatives become 0.
    pub fn with_signed_count(motif: Vec<Segment>, repeat_count: i64) -> Self {
        Self::new(motif, usize::try_from(repeat_count).unwrap_or(0))
    }

    #[inline] pub fn motif(&self) -> &[Segment] { &self.motif }
    #[inline] pub fn repeat_count(&self) -> usize { self.repeat_count }

    /// The motif repeated `repeat_count` times; empty if either is empty/zero.
    pub fn expanded(&self) -> Vec<Segment> {
        let mut out = Vec::with_capacity(self.motif.len() * self.repeat_count);
        for _ in 0..self.repeat_count {
            out.extend_from_slice(&self.motif);
        }
        out
    }
}

/// Intro + body + optional tail.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct Recipe {
    intro: Vec<Segment>,
    body: Vec<Segment>,
    tail: Option<TailPattern>,
}

impl Recipe {
    pub fn new(intro: Vec<Segment>, body: Vec<Segment>, tail: Option<TailPattern>) -> Self {
        Self { intro, body, tail }
    }

    /// A recipe that is only a body.
    pub fn from_body(body: Vec<Segment>) -> Self {
        Self::new(Vec::new(), body, None)
    }

    #[inline] pub fn intro(&self) -> &[Segment] { &self.intro }
    #[inline] pub fn body(&self) -> &[Segment] { &self.body }
    #[inline] pub fn tail(&self) -> Option<&TailPattern> { self.tail.as_ref() }

    /// `intro ++ body ++ tail.expanded()`.
    pub fn expanded(&self) -> Vec<Segment> {
        let mut out = Vec::with_capacity(self.intro.len() + self.body.len());
        out.extend_from_slice(&self.intro);
        out.extend_from_slice(&self.body);
        if let Some(tail) = &self.tail {
            out.extend(tail.expanded());
        }
        out
    }

    /// Sum of segment durations over the expanded sequence, in seconds.
    pub fn duration(&self) -> f32 {
        self.expanded().iter().map(Segment::duration).sum()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.intro.is_empty()
            && self.body.is_empty()
            && self.tail.as_ref().map_or(true, |t| t.repeat_count == 0 || t.motif.is_empty())
    }
}

// ------------------------------------ Tests --------------------------------------
