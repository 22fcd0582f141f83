//! Effect engine: one voice pool per effect kind.
//!
//! Design goals
//! - Every effect is rendered once at construction; voices share the buffer
//! - Overlapping triggers of one effect land on different voices; when the
//!   pool is full the round-robin cursor voice is stolen
//! - A completion fires at most once per trigger, and never for a trigger
//!   whose voice was reused or stopped (generation token)
//! - Completions run outside the engine lock, so they may call back in
//!
//! Failure policy
//! - `prepare` fails → `Health::Unavailable`, every call is a no-op
//! - an effect fails to render or to get voices → only that effect is missing
//! - no effect left → `Health::Unavailable`
//! - output refuses to start → `Health::StartFailed`, retried on the next play

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use synthfx_core::profile::EffectKind;
use synthfx_core::recipe::Recipe;
use synthfx_core::render::{render, SampleBuffer};

use crate::backend::AudioBackend;
use crate::config::{clamp_volume, EngineConfig};
use crate::error::EngineError;
use crate::fade::{schedule_fade, FadeState, Fadeable};
use crate::health::{ensure_running, Health};
use crate::lock;
use crate::player::{AvailabilityQuery, Completion, SoundEffectPlayer};
use crate::scheduler::Scheduler;
use crate::voice::Voice;

const WHO: &str = "effects";

struct Pool {
    buffer: SampleBuffer,
    voices: Vec<Voice>,
    cursor: usize,
}

impl Pool {
    /// First idle voice from the cursor on, else the cursor voice itself.
    fn select(&self) -> usize {
        let n = self.voices.len();
        (0..n)
            .map(|k| (self.cursor + k) % n)
            .find(|&i| !self.voices[i].is_playing())
            .unwrap_or(self.cursor)
    }
}

struct EffectState {
    pools: HashMap<EffectKind, Pool>,
    /// Target volume set by the host.
    volume: f32,
    /// Level currently applied to the voices (differs from `volume` only mid-fade).
    level: f32,
    health: Health,
    fade: FadeState,
}

impl EffectState {
    fn voices_mut(&mut self) -> impl Iterator<Item = &mut Voice> {
        self.pools.values_mut().flat_map(|p| p.voices.iter_mut())
    }

    fn halt_all(&mut self) {
        for v in self.voices_mut() {
            v.halt();
        }
    }

    /// Cancel any fade; if one was running put the voices back at `volume`.
    fn cancel_fade(&mut self) {
        if self.fade.cancel() || self.level != self.volume {
            let volume = self.volume;
            self.apply_level(volume);
        }
    }
}

impl Fadeable for EffectState {
    fn fade_state(&mut self) -> &mut FadeState { &mut self.fade }

    fn apply_level(&mut self, level: f32) {
        self.level = level;
        for v in self.voices_mut() {
            v.set_volume(level);
        }
    }

    fn finish_fade(&mut self) {
        self.halt_all();
        let volume = self.volume;
        self.apply_level(volume);
    }
}

pub struct EffectEngine {
    backend: Arc<dyn AudioBackend>,
    scheduler: Arc<dyn Scheduler>,
    state: Arc<Mutex<EffectState>>,
}

impl EffectEngine {
    /// Prepare the backend, render every effect, allocate pools and try to
    /// start output. Never fails; see [`health`](Self::health).
    pub fn new(backend: Arc<dyn AudioBackend>, scheduler: Arc<dyn Scheduler>, config: &EngineConfig) -> Self {
        let volume = clamp_volume(config.volume);
        let mut state = EffectState {
            pools: HashMap::new(),
            volume,
            level: volume,
            health: Health::Ready,
            fade: FadeState::default(),
        };

        if let Err(e) = backend.prepare() {
            log::error!("{WHO}: {e}; all effects disabled");
            state.health = Health::Unavailable;
        } else {
            let profile = config.profile();
            for kind in EffectKind::ALL {
                match build_pool(backend.as_ref(), profile.recipe(kind), config.voices_for(kind), volume) {
                    Ok(pool) => {
                        log::debug!(
                            "{WHO}: {kind} ready ({} voices, {} frames)",
                            pool.voices.len(),
                            pool.buffer.frames()
                        );
                        state.pools.insert(kind, pool);
                    }
                    Err(e) => log::warn!("{WHO}: {kind} unavailable: {e}"),
                }
            }
            if state.pools.is_empty() {
                log::error!("{WHO}: no effect could be prepared");
                state.health = Health::Unavailable;
            } else {
                ensure_running(backend.as_ref(), &mut state.health, WHO);
            }
        }

        Self { backend, scheduler, state: Arc::new(Mutex::new(state)) }
    }

    pub fn health(&self) -> Health { lock(&self.state).health }

    /// Target volume.
    pub fn volume(&self) -> f32 { lock(&self.state).volume }

    /// Effects that rendered and got voices, in `EffectKind` order.
    pub fn available_effects(&self) -> Vec<EffectKind> {
        let st = lock(&self.state);
        EffectKind::ALL.into_iter().filter(|k| st.pools.contains_key(k)).collect()
    }

    pub fn pool_size(&self, kind: EffectKind) -> usize {
        lock(&self.state).pools.get(&kind).map_or(0, |p| p.voices.len())
    }

    /// Voices of `kind` currently sounding.
    pub fn playing_voices(&self, kind: EffectKind) -> usize {
        lock(&self.state)
            .pools
            .get(&kind)
            .map_or(0, |p| p.voices.iter().filter(|v| v.is_playing()).count())
    }

    /// Per-voice gain of `kind`'s pool.
    pub fn voice_volumes(&self, kind: EffectKind) -> Vec<f32> {
        lock(&self.state)
            .pools
            .get(&kind)
            .map_or_else(Vec::new, |p| p.voices.iter().map(Voice::volume).collect())
    }

    /// Rendered buffer of `kind`.
    pub fn buffer(&self, kind: EffectKind) -> Option<SampleBuffer> {
        lock(&self.state).pools.get(&kind).map(|p| p.buffer.clone())
    }

    pub fn is_fading(&self) -> bool { lock(&self.state).fade.is_active() }
}

fn build_pool(
    backend: &dyn AudioBackend,
    recipe: &Recipe,
    voices: usize,
    volume: f32,
) -> Result<Pool, EngineError> {
    if voices == 0 {
        return Err(EngineError::Voice("pool size is zero".into()));
    }
    let buffer = render(recipe, backend.sample_rate())?;
    let voices = (0..voices)
        .map(|_| {
            backend.create_voice().map(|mut h| {
                h.set_volume(volume);
                Voice::new(h)
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Pool { buffer, voices, cursor: 0 })
}

impl SoundEffectPlayer for EffectEngine {
    fn play(&self, effect: EffectKind, on_complete: Option<Completion>) {
        let mut guard = lock(&self.state);
        let st = &mut *guard;
        if st.health == Health::Unavailable || !st.pools.contains_key(&effect) {
            log::debug!("{WHO}: {effect} not playable");
            return;
        }
        st.cancel_fade();
        if !ensure_running(self.backend.as_ref(), &mut st.health, WHO) {
            return;
        }

        let volume = st.volume;
        let Some(pool) = st.pools.get_mut(&effect) else { return };
        let index = pool.select();
        pool.cursor = (index + 1) % pool.voices.len();
        let duration = Duration::from_secs_f32(pool.buffer.duration());
        let voice = &mut pool.voices[index];
        let generation = voice.trigger(&pool.buffer, volume);

        if let Some(done) = on_complete {
            let weak = Arc::downgrade(&self.state);
            let task = self.scheduler.schedule(
                duration,
                Box::new(move || {
                    let Some(shared) = weak.upgrade() else { return };
                    let live = lock(&shared)
                        .pools
                        .get_mut(&effect)
                        .and_then(|p| p.voices.get_mut(index))
                        .is_some_and(|v| v.settle(generation));
                    if live {
                        done();
                    }
                }),
            );
            voice.set_pending(task);
        }
    }

    fn stop_all(&self, fade: Duration) {
        let mut guard = lock(&self.state);
        let st = &mut *guard;
        if fade.is_zero() {
            st.fade.cancel();
            st.finish_fade();
        } else {
            let start = st.level;
            schedule_fade(&self.state, st, self.scheduler.as_ref(), fade, start);
        }
    }

    fn set_volume(&self, volume: f32) {
        let mut st = lock(&self.state);
        st.volume = clamp_volume(volume);
        let v = st.volume;
        st.apply_level(v);
    }

    fn availability(&self) -> Option<&dyn AvailabilityQuery> { Some(self) }
}

impl AvailabilityQuery for EffectEngine {
    fn can_play(&self, effect: EffectKind) -> bool {
        let st = lock(&self.state);
        st.health != Health::Unavailable && st.pools.contains_key(&effect)
    }
}

// ------------------------------------ Tests --------------------------------------
