//! A backend voice plus its generation token.
//!
//! The token is bumped on every trigger and every stop. Deferred work captures
//! the token by value when it is scheduled and only acts if it still matches,
//! so a reused voice can never fire the previous trigger's completion.

use synthfx_core::render::SampleBuffer;

use crate::backend::VoiceHandle;
use crate::scheduler::TaskHandle;

pub struct Voice {
    handle: Box<dyn VoiceHandle>,
    generation: u64,
    pending: Option<TaskHandle>,
}

impl Voice {
    pub fn new(handle: Box<dyn VoiceHandle>) -> Self {
        Self { handle, generation: 0, pending: None }
    }

    /// Start `buffer` from the top at `volume`, interrupting whatever was
    /// playing. Returns the new generation.
    pub fn trigger(&mut self, buffer: &SampleBuffer, volume: f32) -> u64 {
        self.invalidate();
        self.handle.schedule(buffer);
        self.handle.set_volume(volume);
        self.handle.play();
        self.generation
    }

    /// Bump the generation and cancel pending work, leaving playback alone.
    pub fn invalidate(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        if let Some(task) = self.pending.take() {
            task.cancel();
        }
    }

    /// Stop playback and invalidate pending work.
    pub fn halt(&mut self) {
        self.invalidate();
        self.handle.stop();
    }

    /// Attach the completion timer for the current generation.
    pub fn set_pending(&mut self, task: TaskHandle) {
        if let Some(old) = self.pending.replace(task) {
            old.cancel();
        }
    }

    /// Consume the pending slot if `generation` is still current.
    pub fn settle(&mut self, generation: u64) -> bool {
        if self.generation != generation {
            return false;
        }
        self.pending = None;
        true
    }

    #[inline] pub fn generation(&self) -> u64 { self.generation }
    #[inline] pub fn has_pending(&self) -> bool { self.pending.is_some() }
    #[inline] pub fn is_playing(&self) -> bool { self.handle.is_playing() }
    #[inline] pub fn volume(&self) -> f32 { self.handle.volume() }
    #[inline] pub fn set_volume(&mut self, volume: f32) { self.handle.set_volume(volume); }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mixer::Mixer;

    #[test]
    fn trigger_bumps_generation_and_cancels_pending() {
        let mixer = Mixer::new();
        let mut v = Voice::new(Box::new(mixer.add_voice()));
        let buf = SampleBuffer::from_samples(vec![0.1; 16], 100.0);

        let g1 = v.trigger(&buf, 0.5);
        let t1 = TaskHandle::new();
        v.set_pending(t1.clone());
        let g2 = v.trigger(&buf, 0.5);

        assert_ne!(g1, g2);
        assert!(t1.is_canceled());
        assert!(!v.settle(g1));
        assert!(v.settle(g2));
        assert!(v.is_playing());
        assert_eq!(v.volume(), 0.5);
    }

    #[test]
    fn halt_stops_and_invalidates() {
        let mixer = Mixer::new();
        let mut v = Voice::new(Box::new(mixer.add_voice()));
        let buf = SampleBuffer::from_samples(vec![0.1; 16], 100.0);
        let g = v.trigger(&buf, 1.0);
        v.set_pending(TaskHandle::new());
        v.halt();
        assert!(!v.is_playing());
        assert!(!v.has_pending());
        assert!(!v.settle(g));
    }
}
