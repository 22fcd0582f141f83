//! Stepped fade-out shared by the effect engine and the lane cue engine.
//!
//! A fade of duration `d` from level `L` schedules [`FADE_STEPS`] tasks; step
//! `k` runs at `k·(d/10)` and sets every voice to `L·(1 − k/10)`. The last step
//! stops every voice and restores the engine's target volume.
//!
//! Cancelling bumps the fade epoch, so a step that was already dequeued when
//! the cancel happened still sees a stale epoch under the engine lock and does
//! nothing. A canceled fade leaves voices at the last applied level; every
//! caller that cancels sets an explicit level right after.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::lock;
use crate::scheduler::{Scheduler, TaskHandle};

pub const FADE_STEPS: u32 = 10;

/// Level after `step` of [`FADE_STEPS`], starting from `start`.
#[inline]
#[allow(clippy::cast_precision_loss)]
pub fn step_level(start: f32, step: u32) -> f32 {
    start * (1.0 - step as f32 / FADE_STEPS as f32)
}

/// Fade bookkeeping embedded in an engine's locked state.
#[derive(Debug, Default)]
pub struct FadeState {
    epoch: u64,
    steps: Vec<TaskHandle>,
}

impl FadeState {
    /// Cancel the in-flight fade. Returns whether one was running.
    pub fn cancel(&mut self) -> bool {
        self.epoch = self.epoch.wrapping_add(1);
        let active = !self.steps.is_empty();
        for step in self.steps.drain(..) {
            step.cancel();
        }
        active
    }

    #[inline] pub fn is_active(&self) -> bool { !self.steps.is_empty() }

    #[inline]
    fn is_current(&self, epoch: u64) -> bool { self.epoch == epoch }
}

/// State an engine exposes to the fade stepper.
pub trait Fadeable: Send + 'static {
    fn fade_state(&mut self) -> &mut FadeState;

    /// Set every voice to `level`.
    fn apply_level(&mut self, level: f32);

    /// Stop every voice (invalidating pending completions) and restore the target volume.
    fn finish_fade(&mut self);
}

/// Cancel any fade on `state` and schedule a new one from `start_level`.
///
/// `state` is the already-locked contents of `shared`.
pub fn schedule_fade<S: Fadeable>(
    shared: &Arc<Mutex<S>>,
    state: &mut S,
    scheduler: &dyn Scheduler,
    duration: Duration,
    start_level: f32,
) {
    let fade = state.fade_state();
    fade.cancel();
    let epoch = fade.epoch;

    for step in 1..=FADE_STEPS {
        let weak = Arc::downgrade(shared);
        let handle = scheduler.schedule(
            duration / FADE_STEPS * step,
            Box::new(move || {
                let Some(shared) = weak.upgrade() else { return };
                let mut st = lock(&shared);
                if !st.fade_state().is_current(epoch) {
                    return;
                }
                st.apply_level(step_level(start_level, step));
                if step == FADE_STEPS {
                    st.fade_state().steps.clear();
                    st.finish_fade();
                }
            }),
        );
        fade.steps.push(handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ManualScheduler;

    #[derive(Default)]
    struct Probe {
        fade: FadeState,
        levels: Vec<f32>,
        finished: usize,
    }

    impl Fadeable for Probe {
        fn fade_state(&mut self) -> &mut FadeState { &mut self.fade }
        fn apply_level(&mut self, level: f32) { self.levels.push(level); }
        fn finish_fade(&mut self) { self.finished += 1; }
    }

    fn start(shared: &Arc<Mutex<Probe>>, sched: &ManualScheduler, ms: u64, level: f32) {
        let mut st = shared.lock().unwrap();
        schedule_fade(shared, &mut *st, sched, Duration::from_millis(ms), level);
    }

    #[test]
    fn ten_steps_then_finish() {
        let sched = ManualScheduler::new();
        let shared = Arc::new(Mutex::new(Probe::default()));
        start(&shared, &sched, 100, 0.8);

        sched.advance(Duration::from_millis(10));
        assert!((shared.lock().unwrap().levels[0] - 0.72).abs() < 1e-6);

        sched.advance(Duration::from_millis(90));
        let st = shared.lock().unwrap();
        assert_eq!(st.levels.len(), 10);
        assert!(st.levels.windows(2).all(|w| w[1] < w[0]));
        assert_eq!(*st.levels.last().unwrap(), 0.0);
        assert_eq!(st.finished, 1);
        assert!(!st.fade.is_active());
    }

    #[test]
    fn cancel_freezes_partial_level() {
        let sched = ManualScheduler::new();
        let shared = Arc::new(Mutex::new(Probe::default()));
        start(&shared, &sched, 100, 1.0);
        sched.advance(Duration::from_millis(35));
        assert!(shared.lock().unwrap().fade.cancel());
        sched.advance(Duration::from_millis(200));

        let st = shared.lock().unwrap();
        assert_eq!(st.levels.len(), 3);
        assert!((st.levels[2] - 0.7).abs() < 1e-6);
        assert_eq!(st.finished, 0);
    }

    #[test]
    fn restart_supersedes_previous_fade() {
        let sched = ManualScheduler::new();
        let shared = Arc::new(Mutex::new(Probe::default()));
        start(&shared, &sched, 100, 1.0);
        sched.advance(Duration::from_millis(50));
        start(&shared, &sched, 10, 0.5);
        sched.advance(Duration::from_millis(500));

        let st = shared.lock().unwrap();
        // Five steps of the first fade, ten of the second, one finish.
        assert_eq!(st.levels.len(), 15);
        assert!((st.levels[5] - 0.45).abs() < 1e-6);
        assert_eq!(st.finished, 1);
    }

    #[test]
    fn step_levels() {
        assert_eq!(step_level(1.0, 0), 1.0);
        assert!((step_level(1.0, 5) - 0.5).abs() < 1e-6);
        assert_eq!(step_level(0.6, FADE_STEPS), 0.0);
    }
}
