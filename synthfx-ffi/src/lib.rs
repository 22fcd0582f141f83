//! C ABI wrapper for the synthfx engine.
//!
//! Exposes an opaque engine handle that owns an effect engine (behind a
//! fallback decorator), a lane cue engine and the offline mixers they play
//! into. The host pulls mixed audio with `synthfx_render_interleaved_f32`.
//!
//! ABI notes
//! - All functions are `extern "C"` and `#[no_mangle]`.
//! - Opaque handle type: `SynthfxEngine` (heap-allocated; you own/delete it).
//! - Render path produces **mono** internally and duplicates to N channels.
//! - Ids: effects `0 start, 1 bip, 2 fail`; cue modes `0 off, 1 chord,
//!   2 arpeggio, 3 lane-pulses`; move styles `0 none, 1 lane, 2 safety,
//!   3 combined`; lanes `0..3`; safe-lane mask bit `i` = lane `i` safe.
//!
//! Threading
//! - Every function may be called from any thread; render typically runs on
//!   the audio thread and the rest on the game thread.
//! - Completion callbacks run on the engine's timer thread.

use std::ffi::c_void;
use std::sync::{Arc, Mutex};

use synthfx_core::cues::{CueMode, Lane, MoveCueStyle, SafeLanes};
use synthfx_core::dsp::clamp;
use synthfx_core::profile::EffectKind;
use synthfx_engine::player::fade_duration;
use synthfx_engine::{
    AvailabilityQuery, Completion, EffectEngine, EngineConfig, Fallback, Health, LaneCueConfig, LaneCueEngine,
    LaneCuePlayer, OfflineBackend, SoundEffectPlayer, ThreadScheduler,
};

/// Called once when a triggered effect finishes.
pub type SynthfxDoneFn = Option<extern "C" fn(user_data: *mut c_void)>;

/// Host-provided secondary player, used for effects the engine cannot play.
///
/// Any callback may be null. Completions are not reported for effects played
/// through the secondary player.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct SynthfxSecondary {
    pub user_data: *mut c_void,
    pub play: Option<extern "C" fn(user_data: *mut c_void, effect: u32)>,
    pub stop_all: Option<extern "C" fn(user_data: *mut c_void, fade_seconds: f64)>,
    pub set_volume: Option<extern "C" fn(user_data: *mut c_void, volume: f32)>,
}

/// Raw host pointer carried across threads. The host guarantees it stays
/// valid (and thread-safe) for as long as the callback may be invoked.
#[derive(Clone, Copy)]
struct HostPtr(*mut c_void);

// SAFETY: the pointer is only handed back to the host's own callbacks.
unsafe impl Send for HostPtr {}
// SAFETY: see above; the engine never dereferences it.
unsafe impl Sync for HostPtr {}

#[derive(Clone, Copy)]
struct HostSecondary {
    user_data: HostPtr,
    play: Option<extern "C" fn(*mut c_void, u32)>,
    stop_all: Option<extern "C" fn(*mut c_void, f64)>,
    set_volume: Option<extern "C" fn(*mut c_void, f32)>,
}

/// Secondary player backed by whatever the host registered last.
#[derive(Default)]
struct HostPlayer {
    callbacks: Mutex<Option<HostSecondary>>,
}

impl HostPlayer {
    fn current(&self) -> Option<HostSecondary> {
        *self.callbacks.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn replace(&self, next: Option<HostSecondary>) {
        *self.callbacks.lock().unwrap_or_else(std::sync::PoisonError::into_inner) = next;
    }
}

impl SoundEffectPlayer for HostPlayer {
    fn play(&self, effect: EffectKind, _on_complete: Option<Completion>) {
        match self.current().and_then(|h| h.play.map(|f| (f, h.user_data))) {
            Some((f, ud)) => f(ud.0, effect.id()),
            None => log::debug!("ffi: {effect} dropped, no secondary player"),
        }
    }

    fn stop_all(&self, fade: std::time::Duration) {
        if let Some((f, ud)) = self.current().and_then(|h| h.stop_all.map(|f| (f, h.user_data))) {
            f(ud.0, fade.as_secs_f64());
        }
    }

    fn set_volume(&self, volume: f32) {
        if let Some((f, ud)) = self.current().and_then(|h| h.set_volume.map(|f| (f, h.user_data))) {
            f(ud.0, volume);
        }
    }
}

/// Opaque engine handle.
pub struct SynthfxEngine {
    effects_out: Arc<OfflineBackend>,
    cues_out: Arc<OfflineBackend>,
    effects: Fallback<EffectEngine, HostPlayer>,
    cues: LaneCueEngine,
    scratch: Mutex<Vec<f32>>,
}

impl SynthfxEngine {
    fn new(sample_rate: f32, config: &EngineConfig) -> Self {
        let scheduler = Arc::new(ThreadScheduler::new());
        let effects_out = Arc::new(OfflineBackend::new(sample_rate));
        let cues_out = Arc::new(OfflineBackend::new(sample_rate));
        let engine = EffectEngine::new(effects_out.clone(), scheduler.clone(), config);
        let cues = LaneCueEngine::new(cues_out.clone(), scheduler, &LaneCueConfig::default().with_volume(config.volume));
        Self {
            effects_out,
            cues_out,
            effects: Fallback::new(engine, HostPlayer::default()),
            cues,
            scratch: Mutex::new(Vec::new()),
        }
    }

    fn render(&self, out: &mut [f32], channels: usize) {
        let frames = out.len() / channels;
        let mut scratch = self.scratch.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        scratch.resize(frames, 0.0);
        self.effects_out.mixer().render(&mut out[..frames]);
        self.cues_out.mixer().render(&mut scratch);
        // Expand in place from the back so the mono prefix is not overwritten early.
        for i in (0..frames).rev() {
            let s = clamp(out[i] + scratch[i], -1.0, 1.0);
            out[i * channels..(i + 1) * channels].fill(s);
        }
    }
}

fn engine_ref<'a>(engine: *const SynthfxEngine) -> Option<&'a SynthfxEngine> {
    // SAFETY: callers pass a pointer obtained from `synthfx_create*` that has
    // not been destroyed yet, or null.
    unsafe { engine.as_ref() }
}

// --- Creation / destruction -------------------------------------------------------

/// Create an engine with default settings (4 voices per effect, 6 fail tail repeats).
///
/// Never returns null. If the sample rate is unusable the engine is created
/// in the unavailable state and routes every effect to the secondary player.
#[no_mangle]
pub extern "C" fn synthfx_create(sample_rate: f32) -> *mut SynthfxEngine {
    Box::into_raw(Box::new(SynthfxEngine::new(sample_rate, &EngineConfig::default())))
}

/// Create an engine with explicit pool size and fail tail length.
#[no_mangle]
pub extern "C" fn synthfx_create_with(
    sample_rate: f32,
    voices_per_effect: u32,
    fail_tail_repeats: u32,
) -> *mut SynthfxEngine {
    let config = EngineConfig::default()
        .with_voices(voices_per_effect as usize)
        .with_fail_tail_repeats(fail_tail_repeats as usize);
    Box::into_raw(Box::new(SynthfxEngine::new(sample_rate, &config)))
}

/// Destroy an engine previously returned by `synthfx_create*`.
#[no_mangle]
pub extern "C" fn synthfx_destroy(engine: *mut SynthfxEngine) {
    if !engine.is_null() {
        // SAFETY: pointer came from `Box::into_raw` in `synthfx_create*`.
        unsafe { drop(Box::from_raw(engine)); }
    }
}

/// `0` ready, `1` output start failed (retried on next play), `2` unavailable.
#[no_mangle]
pub extern "C" fn synthfx_health(engine: *const SynthfxEngine) -> u32 {
    match engine_ref(engine).map(|e| e.effects.primary().health()) {
        Some(Health::Ready) => 0,
        Some(Health::StartFailed) => 1,
        Some(Health::Unavailable) | None => 2,
    }
}

// --- Rendering -------------------------------------------------------------------

/// Render `frames` of audio into an interleaved f32 buffer with `channels` channels.
/// Effects and cues are summed; the mono mix is duplicated to all channels.
///
/// Returns the number of frames rendered (0 on error).
#[no_mangle]
pub extern "C" fn synthfx_render_interleaved_f32(
    engine: *const SynthfxEngine,
    out_interleaved: *mut f32,
    frames: u32,
    channels: u32,
) -> u32 {
    let Some(e) = engine_ref(engine) else { return 0 };
    if out_interleaved.is_null() || frames == 0 || channels == 0 {
        return 0;
    }
    let len = (frames as usize) * (channels as usize);
    // SAFETY: the host provides room for `frames * channels` samples.
    let out = unsafe { std::slice::from_raw_parts_mut(out_interleaved, len) };
    e.render(out, channels as usize);
    frames
}

// --- Effects ---------------------------------------------------------------------

/// Trigger an effect. `done` (may be null) is called once with `user_data`
/// when this trigger finishes, unless it was stopped or its voice reused.
///
/// Returns false for an unknown effect id.
#[no_mangle]
pub extern "C" fn synthfx_play(
    engine: *const SynthfxEngine,
    effect: u32,
    done: SynthfxDoneFn,
    user_data: *mut c_void,
) -> bool {
    let (Some(e), Some(kind)) = (engine_ref(engine), EffectKind::from_id(effect)) else { return false };
    let completion = done.map(|f| {
        let ud = HostPtr(user_data);
        Box::new(move || {
            let ud = ud;
            f(ud.0);
        }) as Completion
    });
    e.effects.play(kind, completion);
    true
}

/// Stop every effect. `fade_seconds <= 0` stops immediately.
#[no_mangle]
pub extern "C" fn synthfx_stop_all(engine: *const SynthfxEngine, fade_seconds: f64) {
    if let Some(e) = engine_ref(engine) {
        e.effects.stop_all(fade_duration(fade_seconds));
    }
}

/// Effect volume, clamped to [0, 1].
#[no_mangle]
pub extern "C" fn synthfx_set_volume(engine: *const SynthfxEngine, volume: f32) {
    if let Some(e) = engine_ref(engine) {
        e.effects.set_volume(volume);
    }
}

/// Whether the engine itself (not the secondary player) can play `effect`.
#[no_mangle]
pub extern "C" fn synthfx_can_play(engine: *const SynthfxEngine, effect: u32) -> bool {
    match (engine_ref(engine), EffectKind::from_id(effect)) {
        (Some(e), Some(kind)) => e.effects.primary().can_play(kind),
        _ => false,
    }
}

/// Register (or, with a null `secondary`, clear) the secondary player.
#[no_mangle]
pub extern "C" fn synthfx_set_fallback(engine: *const SynthfxEngine, secondary: *const SynthfxSecondary) {
    let Some(e) = engine_ref(engine) else { return };
    // SAFETY: null or a valid pointer for the duration of this call.
    let next = unsafe { secondary.as_ref() }.map(|s| HostSecondary {
        user_data: HostPtr(s.user_data),
        play: s.play,
        stop_all: s.stop_all,
        set_volume: s.set_volume,
    });
    e.effects.secondary().replace(next);
}

// --- Lane cues -------------------------------------------------------------------

/// Play the tick cue for `safe_mask` (bits 0..2) in `mode`. Invalid ids are ignored.
#[no_mangle]
pub extern "C" fn synthfx_play_tick_cue(engine: *const SynthfxEngine, safe_mask: u8, mode: u32) {
    let Some(e) = engine_ref(engine) else { return };
    if let (Some(safe), Some(mode)) = (SafeLanes::from_bits(safe_mask), CueMode::from_id(mode)) {
        e.cues.play_tick_cue(safe, mode);
    }
}

/// Play the move cue for landing in `lane`. Invalid ids are ignored.
#[no_mangle]
pub extern "C" fn synthfx_play_move_cue(
    engine: *const SynthfxEngine,
    lane: u32,
    is_safe: bool,
    mode: u32,
    style: u32,
) {
    let Some(e) = engine_ref(engine) else { return };
    if let (Some(lane), Some(mode), Some(style)) = (
        Lane::new(lane as usize),
        CueMode::from_id(mode),
        MoveCueStyle::from_id(style),
    ) {
        e.cues.play_move_cue(lane, is_safe, mode, style);
    }
}

/// Cue volume, clamped to [0, 1].
#[no_mangle]
pub extern "C" fn synthfx_cue_set_volume(engine: *const SynthfxEngine, volume: f32) {
    if let Some(e) = engine_ref(engine) {
        e.cues.set_volume(volume);
    }
}

/// Stop both cue voices. `fade_seconds <= 0` stops immediately.
#[no_mangle]
pub extern "C" fn synthfx_cue_stop_all(engine: *const SynthfxEngine, fade_seconds: f64) {
    if let Some(e) = engine_ref(engine) {
        e.cues.stop_all(fade_duration(fade_seconds));
    }
}

// ------------------------------------ Tests --------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use std::time::{Duration, Instant};

    fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(3);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        false
    }

    extern "C" fn count_done(user_data: *mut c_void) {
        // SAFETY: tests pass a pointer to a live AtomicUsize.
        let n = unsafe { &*(user_data as *const AtomicUsize) };
        n.fetch_add(1, Ordering::SeqCst);
    }

    extern "C" fn secondary_play(user_data: *mut c_void, effect: u32) {
        // SAFETY: tests pass a pointer to a live AtomicU32.
        let last = unsafe { &*(user_data as *const AtomicU32) };
        last.store(effect + 1, Ordering::SeqCst);
    }

    #[test]
    fn play_renders_and_completes() {
        let e = synthfx_create(8_000.0);
        assert_eq!(synthfx_health(e), 0);
        let done = Box::new(AtomicUsize::new(0));
        let ud = &*done as *const AtomicUsize as *mut c_void;
        assert!(synthfx_play(e, EffectKind::Bip.id(), Some(count_done), ud));

        let mut out = vec![0.0f32; 64 * 2];
        assert_eq!(synthfx_render_interleaved_f32(e, out.as_mut_ptr(), 64, 2), 64);
        assert!(out.iter().any(|s| *s != 0.0));
        assert!(out.chunks(2).all(|f| f[0] == f[1]));

        assert!(wait_for(|| done.load(Ordering::SeqCst) == 1));
        synthfx_destroy(e);
    }

    #[test]
    fn unknown_ids_are_rejected() {
        let e = synthfx_create(8_000.0);
        assert!(!synthfx_play(e, 99, None, std::ptr::null_mut()));
        assert!(!synthfx_can_play(e, 99));
        assert!(synthfx_can_play(e, EffectKind::Fail.id()));
        synthfx_play_tick_cue(e, 0b1000, 1);
        synthfx_play_move_cue(e, 7, true, 1, 1);
        synthfx_destroy(e);
    }

    #[test]
    fn null_handle_is_harmless() {
        let null: *mut SynthfxEngine = std::ptr::null_mut();
        assert!(!synthfx_play(null, 0, None, std::ptr::null_mut()));
        synthfx_stop_all(null, 1.0);
        synthfx_set_volume(null, 0.5);
        assert_eq!(synthfx_render_interleaved_f32(null, std::ptr::null_mut(), 16, 2), 0);
        assert_eq!(synthfx_health(null), 2);
        synthfx_destroy(null);
    }

    #[test]
    fn oversized_fades_return_normally() {
        let e = synthfx_create(8_000.0);
        assert!(synthfx_play(e, EffectKind::Fail.id(), None, std::ptr::null_mut()));
        synthfx_play_tick_cue(e, 0b101, 1);
        synthfx_stop_all(e, 1e19);
        synthfx_stop_all(e, 1e300);
        synthfx_stop_all(e, f64::INFINITY);
        synthfx_cue_stop_all(e, 1e19);
        assert!(synthfx_play(e, EffectKind::Bip.id(), None, std::ptr::null_mut()));
        synthfx_stop_all(e, 0.0);
        synthfx_cue_stop_all(e, 0.0);
        assert_eq!(synthfx_health(e), 0);
        synthfx_destroy(e);
    }

    #[test]
    fn unavailable_engine_routes_to_secondary() {
        let e = synthfx_create(0.0);
        assert_eq!(synthfx_health(e), 2);
        let last = Box::new(AtomicU32::new(0));
        let secondary = SynthfxSecondary {
            user_data: &*last as *const AtomicU32 as *mut c_void,
            play: Some(secondary_play),
            stop_all: None,
            set_volume: None,
        };
        synthfx_set_fallback(e, &secondary);
        assert!(synthfx_play(e, EffectKind::Fail.id(), None, std::ptr::null_mut()));
        assert_eq!(last.load(Ordering::SeqCst), EffectKind::Fail.id() + 1);

        synthfx_set_fallback(e, std::ptr::null());
        last.store(0, Ordering::SeqCst);
        assert!(synthfx_play(e, EffectKind::Bip.id(), None, std::ptr::null_mut()));
        assert_eq!(last.load(Ordering::SeqCst), 0);
        synthfx_destroy(e);
    }

    #[test]
    fn cues_are_mixed_in() {
        let e = synthfx_create(8_000.0);
        synthfx_play_tick_cue(e, 0b010, 3);
        let mut out = vec![0.0f32; 2_000];
        synthfx_render_interleaved_f32(e, out.as_mut_ptr(), 2_000, 1);
        assert!(out.iter().any(|s| *s != 0.0));

        synthfx_cue_stop_all(e, 0.0);
        synthfx_render_interleaved_f32(e, out.as_mut_ptr(), 2_000, 1);
        assert!(out.iter().all(|s| *s == 0.0));
        synthfx_destroy(e);
    }
}
