//! Engine configuration.
//!
//! Plain values handed in by the host (user preferences live elsewhere).
//! Builder-style setters so hosts and tests can tweak one knob at a time.

use std::collections::HashMap;

use synthfx_core::cues::LaneCueProfile;
use synthfx_core::dsp::non_negative;
use synthfx_core::profile::{EffectKind, SoundProfile, DEFAULT_FAIL_TAIL_REPEATS};

/// Default number of voices in each effect pool.
pub const DEFAULT_VOICES_PER_EFFECT: usize = 4;

/// Map any float onto [0, 1] (NaN → 0).
#[inline]
pub fn clamp_volume(v: f32) -> f32 {
    non_negative(v).min(1.0)
}

#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    pub voices_per_effect: usize,
    /// Per-effect pool sizes that win over `voices_per_effect`.
    pub pool_overrides: HashMap<EffectKind, usize>,
    pub fail_tail_repeats: usize,
    /// Initial volume, clamped at engine construction.
    pub volume: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            voices_per_effect: DEFAULT_VOICES_PER_EFFECT,
            pool_overrides: HashMap::new(),
            fail_tail_repeats: DEFAULT_FAIL_TAIL_REPEATS,
            volume: 1.0,
        }
    }
}

impl EngineConfig {
    pub fn with_voices(mut self, n: usize) -> Self {
        self.voices_per_effect = n;
        self
    }

    pub fn with_pool_size(mut self, kind: EffectKind, n: usize) -> Self {
        self.pool_overrides.insert(kind, n);
        self
    }

    pub fn with_fail_tail_repeats(mut self, n: usize) -> Self {
        self.fail_tail_repeats = n;
        self
    }

    pub fn with_volume(mut self, v: f32) -> Self {
        self.volume = v;
        self
    }

    pub fn voices_for(&self, kind: EffectKind) -> usize {
        self.pool_overrides.get(&kind).copied().unwrap_or(self.voices_per_effect)
    }

    pub fn profile(&self) -> SoundProfile {
        SoundProfile::new(self.fail_tail_repeats)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LaneCueConfig {
    pub profile: LaneCueProfile,
    pub volume: f32,
}

impl Default for LaneCueConfig {
    fn default() -> Self {
        Self { profile: LaneCueProfile::default(), volume: 1.0 }
    }
}

impl LaneCueConfig {
    pub fn with_profile(mut self, profile: LaneCueProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_volume(mut self, v: f32) -> Self {
        self.volume = v;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_win() {
        let c = EngineConfig::default().with_voices(2).with_pool_size(EffectKind::Bip, 6);
        assert_eq!(c.voices_for(EffectKind::Bip), 6);
        assert_eq!(c.voices_for(EffectKind::Fail), 2);
    }

    #[test]
    fn volume_clamping() {
        assert_eq!(clamp_volume(-0.3), 0.0);
        assert_eq!(clamp_volume(1.7), 1.0);
        assert_eq!(clamp_volume(f32::NAN), 0.0);
        assert_eq!(clamp_volume(0.4), 0.4);
    }

    #[test]
    fn profile_follows_tail_setting() {
        let c = EngineConfig::default().with_fail_tail_repeats(2);
        assert_eq!(c.profile().fail_tail_repeats(), 2);
    }
}
