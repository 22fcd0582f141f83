//! Fallback decorator over two effect players.
//!
//! `play` goes to the secondary only when the primary can answer an
//! availability query and says the effect is not playable. `stop_all` and
//! `set_volume` always reach both, so whichever one is sounding stays
//! controllable.

use std::time::Duration;

use synthfx_core::profile::EffectKind;

use crate::player::{Completion, SoundEffectPlayer};

pub struct Fallback<P, S> {
    primary: P,
    secondary: S,
}

impl<P: SoundEffectPlayer, S: SoundEffectPlayer> Fallback<P, S> {
    pub fn new(primary: P, secondary: S) -> Self {
        Self { primary, secondary }
    }

    pub fn primary(&self) -> &P { &self.primary }
    pub fn secondary(&self) -> &S { &self.secondary }

    pub fn into_parts(self) -> (P, S) { (self.primary, self.secondary) }

    /// Whether `play(effect)` would go to the secondary.
    pub fn routes_to_secondary(&self, effect: EffectKind) -> bool {
        self.primary.availability().is_some_and(|a| !a.can_play(effect))
    }
}

impl<P: SoundEffectPlayer, S: SoundEffectPlayer> SoundEffectPlayer for Fallback<P, S> {
    fn play(&self, effect: EffectKind, on_complete: Option<Completion>) {
        if self.routes_to_secondary(effect) {
            log::debug!("fallback: {effect} routed to secondary");
            self.secondary.play(effect, on_complete);
        } else {
            self.primary.play(effect, on_complete);
        }
    }

    fn stop_all(&self, fade: Duration) {
        self.primary.stop_all(fade);
        self.secondary.stop_all(fade);
    }

    fn set_volume(&self, volume: f32) {
        self.primary.set_volume(volume);
        self.secondary.set_volume(volume);
    }
}

// ------------------------------------ Tests --------------------------------------
