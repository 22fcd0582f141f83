//! Lane cue engine: accessibility ticks and move confirmations.
//!
//! Every cue buffer is rendered once at construction into a [`CueBank`]:
//! - tick cues for each audible [`CueMode`] × each of the 8 safe-lane masks
//! - one lane tone per lane, one safety tone per boolean
//! - one combined buffer per (lane, safety) pair
//!
//! At runtime a tick plays on a dedicated tick voice and a move cue on a
//! dedicated move voice; each new cue interrupts the previous one on its voice.
//! Volume and fades behave exactly as in the effect engine.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use synthfx_core::cues::{
    combine_move, render_lane_tone, render_safety_tone, render_tick, render_warning, CueMode, Lane,
    LaneCueProfile, MoveCueStyle, SafeLanes,
};
use synthfx_core::render::SampleBuffer;
use synthfx_core::RenderError;

use crate::backend::AudioBackend;
use crate::config::{clamp_volume, LaneCueConfig};
use crate::fade::{schedule_fade, FadeState, Fadeable};
use crate::health::{ensure_running, Health};
use crate::lock;
use crate::player::LaneCuePlayer;
use crate::scheduler::Scheduler;
use crate::voice::Voice;

const WHO: &str = "lane cues";

/// Precomputed cue buffers. Entries that failed to render are simply absent.
#[derive(Debug, Default)]
pub struct CueBank {
    ticks: HashMap<(CueMode, SafeLanes), SampleBuffer>,
    warning: Option<SampleBuffer>,
    lane_tones: HashMap<Lane, SampleBuffer>,
    safety_tones: HashMap<bool, SampleBuffer>,
    combined: HashMap<(Lane, bool), SampleBuffer>,
}

impl CueBank {
    pub fn render(profile: &LaneCueProfile, sr: f32) -> Self {
        let mut bank = CueBank { warning: keep(render_warning(profile, sr), "warning tone"), ..Self::default() };

        for mode in CueMode::AUDIBLE {
            for mask in SafeLanes::all_masks() {
                let buf = match (&bank.warning, mode) {
                    // Same buffer as the dedicated warning tone, shared rather than re-rendered.
                    (Some(w), CueMode::Arpeggio | CueMode::LanePulses) if mask.is_empty() => Some(w.clone()),
                    _ => keep(render_tick(profile, mode, mask, sr), "tick cue"),
                };
                if let Some(buf) = buf {
                    bank.ticks.insert((mode, mask), buf);
                }
            }
        }

        for lane in Lane::ALL {
            if let Some(buf) = keep(render_lane_tone(profile, lane, sr), "lane tone") {
                bank.lane_tones.insert(lane, buf);
            }
        }
        for safe in [false, true] {
            if let Some(buf) = keep(render_safety_tone(profile, safe, sr), "safety tone") {
                bank.safety_tones.insert(safe, buf);
            }
        }
        for lane in Lane::ALL {
            for safe in [false, true] {
                let (Some(l), Some(s)) = (bank.lane_tones.get(&lane), bank.safety_tones.get(&safe)) else {
                    continue;
                };
                if let Some(buf) = keep(combine_move(profile, l, s), "combined move cue") {
                    bank.combined.insert((lane, safe), buf);
                }
            }
        }
        bank
    }

    pub fn tick(&self, mode: CueMode, safe: SafeLanes) -> Option<&SampleBuffer> {
        self.ticks.get(&(mode, safe))
    }

    pub fn warning(&self) -> Option<&SampleBuffer> { self.warning.as_ref() }

    pub fn movement(&self, lane: Lane, is_safe: bool, style: MoveCueStyle) -> Option<&SampleBuffer> {
        match style {
            MoveCueStyle::None => None,
            MoveCueStyle::LaneOnly => self.lane_tones.get(&lane),
            MoveCueStyle::SafetyOnly => self.safety_tones.get(&is_safe),
            MoveCueStyle::Combined => self.combined.get(&(lane, is_safe)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ticks.is_empty() && self.lane_tones.is_empty() && self.safety_tones.is_empty()
    }
}

fn keep(result: Result<SampleBuffer, RenderError>, what: &str) -> Option<SampleBuffer> {
    result.map_err(|e| log::warn!("{WHO}: {what} not rendered: {e}")).ok()
}

struct CueState {
    tick: Option<Voice>,
    movement: Option<Voice>,
    volume: f32,
    level: f32,
    health: Health,
    fade: FadeState,
}

impl CueState {
    fn voices_mut(&mut self) -> impl Iterator<Item = &mut Voice> {
        self.tick.iter_mut().chain(self.movement.iter_mut())
    }

    fn cancel_fade(&mut self) {
        if self.fade.cancel() || self.level != self.volume {
            let volume = self.volume;
            self.apply_level(volume);
        }
    }
}

impl Fadeable for CueState {
    fn fade_state(&mut self) -> &mut FadeState { &mut self.fade }

    fn apply_level(&mut self, level: f32) {
        self.level = level;
        for v in self.voices_mut() {
            v.set_volume(level);
        }
    }

    fn finish_fade(&mut self) {
        for v in self.voices_mut() {
            v.halt();
        }
        let volume = self.volume;
        self.apply_level(volume);
    }
}

#[derive(Clone, Copy)]
enum Slot { Tick, Move }

pub struct LaneCueEngine {
    backend: Arc<dyn AudioBackend>,
    scheduler: Arc<dyn Scheduler>,
    bank: CueBank,
    state: Arc<Mutex<CueState>>,
}

impl LaneCueEngine {
    pub fn new(backend: Arc<dyn AudioBackend>, scheduler: Arc<dyn Scheduler>, config: &LaneCueConfig) -> Self {
        let volume = clamp_volume(config.volume);
        let mut state = CueState {
            tick: None,
            movement: None,
            volume,
            level: volume,
            health: Health::Ready,
            fade: FadeState::default(),
        };
        let mut bank = CueBank::default();

        if let Err(e) = backend.prepare() {
            log::error!("{WHO}: {e}; cues disabled");
            state.health = Health::Unavailable;
        } else {
            bank = CueBank::render(&config.profile, backend.sample_rate());
            let voices = backend.create_voice().and_then(|t| Ok((t, backend.create_voice()?)));
            match voices {
                Ok((mut tick, mut movement)) => {
                    tick.set_volume(volume);
                    movement.set_volume(volume);
                    state.tick = Some(Voice::new(tick));
                    state.movement = Some(Voice::new(movement));
                }
                Err(e) => log::error!("{WHO}: {e}"),
            }
            if bank.is_empty() || state.tick.is_none() {
                log::error!("{WHO}: nothing playable");
                state.health = Health::Unavailable;
            } else {
                log::debug!("{WHO}: {} tick cues ready", bank.ticks.len());
                ensure_running(backend.as_ref(), &mut state.health, WHO);
            }
        }

        Self { backend, scheduler, bank, state: Arc::new(Mutex::new(state)) }
    }

    pub fn bank(&self) -> &CueBank { &self.bank }

    pub fn health(&self) -> Health { lock(&self.state).health }

    pub fn volume(&self) -> f32 { lock(&self.state).volume }

    /// `(tick, move)` voice activity.
    pub fn playing(&self) -> (bool, bool) {
        let st = lock(&self.state);
        (
            st.tick.as_ref().is_some_and(Voice::is_playing),
            st.movement.as_ref().is_some_and(Voice::is_playing),
        )
    }

    /// `(tick, move)` voice gains.
    pub fn voice_volumes(&self) -> (f32, f32) {
        let st = lock(&self.state);
        (
            st.tick.as_ref().map_or(0.0, Voice::volume),
            st.movement.as_ref().map_or(0.0, Voice::volume),
        )
    }

    pub fn is_fading(&self) -> bool { lock(&self.state).fade.is_active() }

    fn play_on(&self, slot: Slot, buffer: &SampleBuffer) {
        let mut guard = lock(&self.state);
        let st = &mut *guard;
        if st.health == Health::Unavailable {
            return;
        }
        st.cancel_fade();
        if !ensure_running(self.backend.as_ref(), &mut st.health, WHO) {
            return;
        }
        let volume = st.volume;
        let voice = match slot {
            Slot::Tick => st.tick.as_mut(),
            Slot::Move => st.movement.as_mut(),
        };
        if let Some(v) = voice {
            v.trigger(buffer, volume);
        }
    }
}

impl LaneCuePlayer for LaneCueEngine {
    fn play_tick_cue(&self, safe: SafeLanes, mode: CueMode) {
        if mode == CueMode::Off {
            return;
        }
        match self.bank.tick(mode, safe) {
            Some(buf) => self.play_on(Slot::Tick, buf),
            None => log::debug!("{WHO}: no {mode} tick for mask {:03b}", safe.bits()),
        }
    }

    fn play_move_cue(&self, lane: Lane, is_safe: bool, mode: CueMode, style: MoveCueStyle) {
        if mode == CueMode::Off {
            return;
        }
        if let Some(buf) = self.bank.movement(lane, is_safe, style) {
            self.play_on(Slot::Move, buf);
        }
    }

    fn set_volume(&self, volume: f32) {
        let mut st = lock(&self.state);
        st.volume = clamp_volume(volume);
        let v = st.volume;
        st.apply_level(v);
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
}

// ------------------------------------ Tests --------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::OfflineBackend;
    use crate::scheduler::ManualScheduler;

    const SR: f32 = 8_000.0;

    fn rig_with(backend: OfflineBackend) -> (Arc<OfflineBackend>, Arc<ManualScheduler>, LaneCueEngine) {
        let backend = Arc::new(backend);
        let clock = Arc::new(ManualScheduler::new());
        let engine = LaneCueEngine::new(backend.clone(), clock.clone(), &LaneCueConfig::default());
        (backend, clock, engine)
    }

    fn rig() -> (Arc<OfflineBackend>, Arc<ManualScheduler>, LaneCueEngine) {
        rig_with(OfflineBackend::new(SR))
    }

    fn pull(backend: &OfflineBackend, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0; frames];
        backend.mixer().render(&mut out);
        out
    }

    #[test]
    fn bank_is_complete() {
        let (_, _, engine) = rig();
        let bank = engine.bank();
        for mode in CueMode::AUDIBLE {
            for mask in SafeLanes::all_masks() {
                assert!(bank.tick(mode, mask).is_some(), "{mode} {mask:?}");
            }
        }
        assert!(bank.tick(CueMode::Off, SafeLanes::ALL_SAFE).is_none());
        for lane in Lane::ALL {
            for safe in [false, true] {
                for style in [MoveCueStyle::LaneOnly, MoveCueStyle::SafetyOnly, MoveCueStyle::Combined] {
                    assert!(bank.movement(lane, safe, style).is_some());
                }
                assert!(bank.movement(lane, safe, MoveCueStyle::None).is_none());
            }
        }
    }

    #[test]
    fn empty_lane_pulses_share_the_warning_buffer() {
        let (_, _, engine) = rig();
        let bank = engine.bank();
        let warning = bank.warning().unwrap();
        let tick = bank.tick(CueMode::LanePulses, SafeLanes::NONE).unwrap();
        assert!(tick.shares_storage(warning));
        assert_eq!(tick, warning);
        assert!(tick.peak() > 0.0);
    }

    #[test]
    fn tick_plays_the_banked_buffer() {
        let (backend, _, engine) = rig();
        let mask = SafeLanes::from_lanes([Lane::LEFT, Lane::RIGHT]);
        engine.play_tick_cue(mask, CueMode::Arpeggio);
        assert_eq!(engine.playing(), (true, false));

        let expected = engine.bank().tick(CueMode::Arpeggio, mask).unwrap().clone();
        let out = pull(&backend, expected.frames());
        assert_eq!(out.as_slice(), expected.samples());
        assert_eq!(engine.playing(), (false, false));
    }

    #[test]
    fn off_mode_is_silent() {
        let (_, _, engine) = rig();
        engine.play_tick_cue(SafeLanes::ALL_SAFE, CueMode::Off);
        engine.play_move_cue(Lane::CENTER, true, CueMode::Off, MoveCueStyle::Combined);
        engine.play_move_cue(Lane::CENTER, true, CueMode::Chord, MoveCueStyle::None);
        assert_eq!(engine.playing(), (false, false));
    }

    #[test]
    fn tick_and_move_use_separate_voices() {
        let (_, _, engine) = rig();
        engine.play_tick_cue(SafeLanes::NONE, CueMode::Chord);
        engine.play_move_cue(Lane::RIGHT, false, CueMode::Chord, MoveCueStyle::SafetyOnly);
        assert_eq!(engine.playing(), (true, true));
    }

    #[test]
    fn new_cue_interrupts_previous_on_same_voice() {
        let (backend, _, engine) = rig();
        engine.play_move_cue(Lane::LEFT, true, CueMode::LanePulses, MoveCueStyle::Combined);
        pull(&backend, 100);
        engine.play_move_cue(Lane::LEFT, true, CueMode::LanePulses, MoveCueStyle::LaneOnly);
        let lane = engine.bank().movement(Lane::LEFT, true, MoveCueStyle::LaneOnly).unwrap().clone();
        let out = pull(&backend, lane.frames());
        assert_eq!(out.as_slice(), lane.samples());
    }

    #[test]
    fn volume_and_fade_follow_effect_rules() {
        let (_, clock, engine) = rig();
        engine.set_volume(3.0);
        assert_eq!(engine.volume(), 1.0);
        engine.set_volume(0.6);
        engine.play_tick_cue(SafeLanes::ALL_SAFE, CueMode::Chord);
        engine.play_move_cue(Lane::LEFT, true, CueMode::Chord, MoveCueStyle::LaneOnly);
        assert_eq!(engine.voice_volumes(), (0.6, 0.6));

        engine.stop_all(Duration::from_millis(50));
        clock.advance(Duration::from_millis(25));
        let (t, m) = engine.voice_volumes();
        assert!((t - 0.3).abs() < 1e-5 && (m - 0.3).abs() < 1e-5);

        engine.play_tick_cue(SafeLanes::NONE, CueMode::Chord);
        assert!(!engine.is_fading());
        assert_eq!(engine.voice_volumes(), (0.6, 0.6));

        engine.stop_all(Duration::from_millis(50));
        clock.advance(Duration::from_millis(50));
        assert_eq!(engine.playing(), (false, false));
        assert_eq!(engine.voice_volumes(), (0.6, 0.6));
    }

    #[test]
    fn immediate_stop_silences_both_voices() {
        let (_, _, engine) = rig();
        engine.play_tick_cue(SafeLanes::ALL_SAFE, CueMode::LanePulses);
        engine.play_move_cue(Lane::CENTER, false, CueMode::LanePulses, MoveCueStyle::Combined);
        engine.stop_all(Duration::ZERO);
        assert_eq!(engine.playing(), (false, false));
    }

    #[test]
    fn huge_fade_never_overflows() {
        let (_, clock, engine) = rig();
        engine.play_tick_cue(SafeLanes::ALL_SAFE, CueMode::Chord);
        clock.advance(Duration::from_millis(1));
        engine.stop_all(Duration::MAX);
        engine.stop_all(Duration::from_secs(u64::MAX / 4));
        engine.play_move_cue(Lane::RIGHT, true, CueMode::Chord, MoveCueStyle::Combined);
        assert!(!engine.is_fading());
        engine.stop_all(Duration::ZERO);
        assert_eq!(engine.playing(), (false, false));
    }

    #[test]
    fn missing_voices_make_engine_unavailable() {
        let (_, _, engine) = rig_with(OfflineBackend::new(SR).with_voice_limit(1));
        assert_eq!(engine.health(), Health::Unavailable);
        engine.play_tick_cue(SafeLanes::ALL_SAFE, CueMode::Chord);
        assert_eq!(engine.playing(), (false, false));
    }

    #[test]
    fn start_failure_recovers_on_next_cue() {
        let (backend, _, engine) = rig_with(OfflineBackend::new(SR).failing_start(1));
        assert_eq!(engine.health(), Health::StartFailed);
        engine.play_tick_cue(SafeLanes::ALL_SAFE, CueMode::Chord);
        assert_eq!(engine.health(), Health::Ready);
        assert!(backend.is_running());
        assert_eq!(engine.playing(), (true, false));
    }
}
