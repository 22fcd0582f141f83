//! Capabilities the game layer talks to.
//!
//! None of these calls report errors: sound is an enhancement, so every
//! failure degrades to silence (or to the secondary player, see
//! [`Fallback`](crate::Fallback)).

use std::time::Duration;

use synthfx_core::cues::{CueMode, Lane, MoveCueStyle, SafeLanes};
use synthfx_core::profile::EffectKind;

/// Called once when a trigger's buffer has finished.
pub type Completion = Box<dyn FnOnce() + Send + 'static>;

pub trait SoundEffectPlayer: Send + Sync {
    fn play(&self, effect: EffectKind, on_complete: Option<Completion>);

    /// Stop everything; `Duration::ZERO` stops immediately, otherwise fades out.
    fn stop_all(&self, fade: Duration);

    /// Clamped to [0, 1].
    fn set_volume(&self, volume: f32);

    /// Per-effect availability, when this player can tell.
    fn availability(&self) -> Option<&dyn AvailabilityQuery> { None }
}

pub trait AvailabilityQuery {
    fn can_play(&self, effect: EffectKind) -> bool;
}

pub trait LaneCuePlayer: Send + Sync {
    fn play_tick_cue(&self, safe: SafeLanes, mode: CueMode);

    fn play_move_cue(&self, lane: Lane, is_safe: bool, mode: CueMode, style: MoveCueStyle);

    fn set_volume(&self, volume: f32);

    fn stop_all(&self, fade: Duration);
}

/// Seconds from a host into a fade duration; negative, zero and NaN mean "now",
/// values too large for a `Duration` saturate to `Duration::MAX`.
pub fn fade_duration(seconds: f64) -> Duration {
    match Duration::try_from_secs_f64(seconds) {
        Ok(d) => d,
        Err(_) if seconds > 0.0 => Duration::MAX,
        Err(_) => Duration::ZERO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_seconds_to_fade() {
        assert_eq!(fade_duration(-1.0), Duration::ZERO);
        assert_eq!(fade_duration(f64::NAN), Duration::ZERO);
        assert_eq!(fade_duration(0.25), Duration::from_millis(250));
        assert_eq!(fade_duration(1e30), Duration::MAX);
        assert_eq!(fade_duration(f64::INFINITY), Duration::MAX);
    }
}
