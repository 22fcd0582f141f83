//! Software mixer shared by the backends.
//!
//! Each voice owns one slot: a shared buffer handle, a read position, a gain
//! and a playing flag. `render` sums every playing slot into a mono block and
//! advances it; a slot that reaches the end of its buffer stops by itself.
//! The table only holds weak references, so a dropped voice leaves the mix
//! on the next `render`.
//!
//! Design goals
//! - Buffers are shared (`SampleBuffer` clones), never copied per playback
//! - No allocation in `render`
//! - Output clamped to [-1, 1]

use std::sync::{Arc, Mutex, Weak};

use synthfx_core::dsp::{clamp, mix_in_place};
use synthfx_core::render::SampleBuffer;

use crate::backend::VoiceHandle;
use crate::lock;

#[derive(Debug)]
struct Slot {
    buffer: Option<SampleBuffer>,
    position: usize,
    playing: bool,
    volume: f32,
}

impl Slot {
    fn remaining(&self) -> usize {
        self.buffer.as_ref().map_or(0, |b| b.frames().saturating_sub(self.position))
    }
}

/// Cloneable handle to one slot table.
#[derive(Clone, Debug, Default)]
pub struct Mixer {
    slots: Arc<Mutex<Vec<Weak<Mutex<Slot>>>>>,
}

impl Mixer {
    pub fn new() -> Self { Self::default() }

    /// Allocate a new voice slot.
    pub fn add_voice(&self) -> MixerVoice {
        let slot = Arc::new(Mutex::new(Slot { buffer: None, position: 0, playing: false, volume: 1.0 }));
        let mut slots = lock(&self.slots);
        slots.retain(|w| w.strong_count() > 0);
        slots.push(Arc::downgrade(&slot));
        MixerVoice { slot }
    }

    /// Voices still alive.
    pub fn voice_count(&self) -> usize {
        lock(&self.slots).iter().filter(|w| w.strong_count() > 0).count()
    }

    /// Slots currently producing sound.
    pub fn active_voices(&self) -> usize {
        lock(&self.slots)
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|s| {
                let s = lock(s);
                s.playing && s.remaining() > 0
            })
            .count()
    }

    /// Overwrite `out` with the mono mix of every playing slot.
    pub fn render(&self, out: &mut [f32]) {
        out.fill(0.0);
        let mut slots = lock(&self.slots);
        slots.retain(|w| w.strong_count() > 0);
        for slot in slots.iter().filter_map(Weak::upgrade) {
            let mut s = lock(&slot);
            if !s.playing {
                continue;
            }
            let n = s.remaining().min(out.len());
            if let Some(buf) = &s.buffer {
                let start = s.position;
                mix_in_place(&mut out[..n], &buf.samples()[start..start + n], s.volume);
            }
            s.position += n;
            if s.remaining() == 0 {
                s.playing = false;
            }
        }
        for x in out.iter_mut() {
            *x = clamp(*x, -1.0, 1.0);
        }
    }
}

/// A mixer slot seen through the [`VoiceHandle`] interface.
#[derive(Debug)]
pub struct MixerVoice {
    slot: Arc<Mutex<Slot>>,
}

impl VoiceHandle for MixerVoice {
    fn schedule(&mut self, buffer: &SampleBuffer) {
        let mut s = lock(&self.slot);
        s.buffer = Some(buffer.clone());
        s.position = 0;
        s.playing = false;
    }

    fn play(&mut self) {
        let mut s = lock(&self.slot);
        s.playing = s.remaining() > 0;
    }

    fn stop(&mut self) {
        let mut s = lock(&self.slot);
        s.playing = false;
        s.position = 0;
        s.buffer = None;
    }

    fn is_playing(&self) -> bool {
        let s = lock(&self.slot);
        s.playing && s.remaining() > 0
    }

    fn set_volume(&mut self, volume: f32) {
        lock(&self.slot).volume = clamp(volume, 0.0, 1.0);
    }

    fn volume(&self) -> f32 { lock(&self.slot).volume }
}

// ------------------------------------ Tests --------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn ones(n: usize) -> SampleBuffer {
        SampleBuffer::from_samples(vec![0.5; n], 100.0)
    }

    #[test]
    fn voices_sum_and_finish() {
        let mixer = Mixer::new();
        let mut a = mixer.add_voice();
        let mut b = mixer.add_voice();
        a.schedule(&ones(4));
        b.schedule(&ones(2));
        a.play();
        b.play();
        b.set_volume(0.5);
        assert_eq!(mixer.active_voices(), 2);

        let mut out = [0.0; 3];
        mixer.render(&mut out);
        assert_eq!(out, [0.75, 0.75, 0.5]);
        assert!(!b.is_playing());
        assert!(a.is_playing());

        mixer.render(&mut out);
        assert_eq!(out, [0.5, 0.0, 0.0]);
        assert_eq!(mixer.active_voices(), 0);
    }

    #[test]
    fn scheduled_voice_is_silent_until_played() {
        let mixer = Mixer::new();
        let mut v = mixer.add_voice();
        v.schedule(&ones(8));
        let mut out = [1.0; 4];
        mixer.render(&mut out);
        assert_eq!(out, [0.0; 4]);
        assert!(!v.is_playing());
    }

    #[test]
    fn output_is_clamped() {
        let mixer = Mixer::new();
        for _ in 0..4 {
            let mut v = mixer.add_voice();
            v.schedule(&ones(2));
            v.play();
        }
        let mut out = [0.0; 2];
        mixer.render(&mut out);
        assert_eq!(out, [1.0, 1.0]);
    }

    #[test]
    fn reschedule_restarts_from_the_top() {
        let mixer = Mixer::new();
        let mut v = mixer.add_voice();
        let buf = SampleBuffer::from_samples(vec![0.1, 0.2, 0.3], 100.0);
        v.schedule(&buf);
        v.play();
        let mut out = [0.0; 2];
        mixer.render(&mut out);
        v.schedule(&buf);
        v.play();
        mixer.render(&mut out);
        assert_eq!(out, [0.1, 0.2]);
    }

    #[test]
    fn dropped_voices_leave_the_table() {
        let mixer = Mixer::new();
        let mut kept = mixer.add_voice();
        {
            let mut gone = mixer.add_voice();
            gone.schedule(&ones(4));
            gone.play();
            assert_eq!(mixer.voice_count(), 2);
        }
        assert_eq!(mixer.voice_count(), 1);
        kept.schedule(&ones(4));
        kept.play();
        let mut out = [0.0; 2];
        mixer.render(&mut out);
        assert_eq!(out, [0.5, 0.5]);
        assert_eq!(lock(&mixer.slots).len(), 1);
    }
}
