//! Frame-indexed amplitude envelope shared by every rendered tone.
//!
//! Shape (all ramps linear):
//! - attack : `0 → 1` over the first `attack` frames (`env = i / attack`)
//! - sustain: `1.0` for `sustain` frames
//! - decay  : `1 → 0` over `decay` frames, floored at 0
//!
//! `attack` and `decay` are at least one frame each; `sustain` absorbs whatever
//! remains of the segment and is zero when attack + decay overrun it. In that
//! case the decay starts right after the attack and is cut short by the end of
//! the segment.

use crate::dsp::seconds_to_frames;

/// Linear attack/sustain/decay envelope over a fixed number of frames.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SegmentEnvelope {
    attack: usize,
    sustain: usize,
    decay: usize,
}

impl SegmentEnvelope {
    /// Build from frame counts. `attack`/`decay` are raised to one frame.
    #[inline]
    pub fn from_frames(frame_count: usize, attack: usize, decay: usize) -> Self {
        let attack = attack.max(1);
        let decay = decay.max(1);
        let sustain = frame_count.saturating_sub(attack + decay);
        Self { attack, sustain, decay }
    }

    /// Build from times in seconds at sample rate `sr`.
    #[inline]
    pub fn from_seconds(frame_count: usize, attack_s: f32, decay_s: f32, sr: f32) -> Self {
        Self::from_frames(
            frame_count,
            seconds_to_frames(attack_s, sr),
            seconds_to_frames(decay_s, sr),
        )
    }

    #[inline] pub fn attack_frames(&self) -> usize { self.attack }
    #[inline] pub fn sustain_frames(&self) -> usize { self.sustain }
    #[inline] pub fn decay_frames(&self) -> usize { self.decay }

    /// Envelope gain at frame `i` of the segment, in [0, 1].
    #[inline]
    #[allow(clippy::cast_precision_loss)]
    pub fn gain(&self, i: usize) -> f32 {
        if i < self.attack {
            return i as f32 / self.attack as f32;
        }
        let after_attack = i - self.attack;
        if after_attack < self.sustain {
            return 1.0;
        }
        let d = after_attack - self.sustain;
        let g = 1.0 - (d + 1) as f32 / self.decay as f32;
        if g > 0.0 { g } else { 0.0 }
    }
}

// ------------------------------------ Tests --------------------------------------
