//! Offline renderer: `Recipe` + sample rate → mono `SampleBuffer`.
//!
//! Rendering is deterministic and pure: no shared state, no I/O. Every
//! segment is written contiguously with its own running phase accumulator
//! (so sweeps stay phase-continuous) and its own attack/sustain/decay envelope.
//! Output samples are clamped to [-1, 1].

use alloc::sync::Arc;
use alloc::vec::Vec;

use thiserror::Error;

use crate::dsp::{clamp, seconds_to_frames, sin01, wrap_phase01};
use crate::envelopes::SegmentEnvelope;
use crate::recipe::{Recipe, Segment};

/// Why a buffer could not be produced.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RenderError {
    #[error("invalid sample rate: {0} Hz")]
    InvalidSampleRate(f32),

    #[error("nothing to render (no segments or zero frames)")]
    Empty,

    #[error("could not allocate a buffer of {frames} frames")]
    Allocation { frames: usize },

    #[error("sample rate mismatch: expected {expected} Hz, found {found} Hz")]
    SampleRateMismatch { expected: f32, found: f32 },
}

/// Immutable mono PCM buffer.
///
/// Cloning shares the sample storage; it is never copied per playback.
#[derive(Clone, Debug)]
pub struct SampleBuffer {
    samples: Arc<[f32]>,
    sample_rate: f32,
}

impl SampleBuffer {
    /// Wrap already rendered samples.
    pub fn from_samples(samples: Vec<f32>, sample_rate: f32) -> Self {
        Self { samples: samples.into(), sample_rate }
    }

    /// `duration` seconds of silence (at least one frame).
    pub fn silence(duration: f32, sample_rate: f32) -> Result<Self, RenderError> {
        check_sample_rate(sample_rate)?;
        let frames = seconds_to_frames(duration, sample_rate);
        let mut out = reserve(frames)?;
        out.resize(frames, 0.0);
        Ok(Self::from_samples(out, sample_rate))
    }

    /// Concatenate buffers that share one sample rate.
    pub fn concat(parts: &[&SampleBuffer]) -> Result<Self, RenderError> {
        let first = parts.first().ok_or(RenderError::Empty)?;
        let sample_rate = first.sample_rate;
        let mut total = 0usize;
        for p in parts {
            if p.sample_rate.to_bits() != sample_rate.to_bits() {
                return Err(RenderError::SampleRateMismatch { expected: sample_rate, found: p.sample_rate });
            }
            total += p.frames();
        }
        let mut out = reserve(total)?;
        for p in parts {
            out.extend_from_slice(&p.samples);
        }
        Ok(Self::from_samples(out, sample_rate))
    }

    #[inline] pub fn samples(&self) -> &[f32] { &self.samples }
    #[inline] pub fn frames(&self) -> usize { self.samples.len() }
    #[inline] pub fn sample_rate(&self) -> f32 { self.sample_rate }
    #[inline] pub fn is_empty(&self) -> bool { self.samples.is_empty() }

    /// Length in seconds.
    #[inline]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration(&self) -> f32 {
        self.samples.len() as f32 / self.sample_rate
    }

    /// Largest absolute sample value.
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0, |m, s| {
            let a = crate::dsp::abs(*s);
            if a > m { a } else { m }
        })
    }

    /// True when both handles point at the same sample storage.
    #[inline]
    pub fn shares_storage(&self, other: &SampleBuffer) -> bool {
        Arc::ptr_eq(&self.samples, &other.samples)
    }
}

impl PartialEq for SampleBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.sample_rate.to_bits() == other.sample_rate.to_bits() && self.samples == other.samples
    }
}

// --------------------------------- Rendering -------------------------------------

/// Render the expanded recipe.
pub fn render(recipe: &Recipe, sample_rate: f32) -> Result<SampleBuffer, RenderError> {
    render_segments(&recipe.expanded(), sample_rate)
}

/// Render a flat segment list back to back.
pub fn render_segments(segments: &[Segment], sample_rate: f32) -> Result<SampleBuffer, RenderError> {
    check_sample_rate(sample_rate)?;
    let total: usize = segments
        .iter()
        .map(|s| seconds_to_frames(s.duration(), sample_rate))
        .sum();
    if total == 0 {
        return Err(RenderError::Empty);
    }

    let mut out = reserve(total)?;
    for seg in segments {
        write_segment(&mut out, seg, sample_rate);
    }
    Ok(SampleBuffer::from_samples(out, sample_rate))
}

/// Sum of equal-weight sines sharing one envelope (normalized by partial count).
pub fn render_chord(
    frequencies: &[f32],
    duration: f32,
    amplitude: f32,
    attack: f32,
    decay: f32,
    sample_rate: f32,
) -> Result<SampleBuffer, RenderError> {
    check_sample_rate(sample_rate)?;
    if frequencies.is_empty() {
        return Err(RenderError::Empty);
    }
    let frames = seconds_to_frames(duration, sample_rate);
    let env = SegmentEnvelope::from_seconds(frames, attack, decay, sample_rate);
    #[allow(clippy::cast_precision_loss)]
    let norm = 1.0 / frequencies.len() as f32;

    let mut phases: Vec<f32> = alloc::vec![0.0; frequencies.len()];
    let mut out = reserve(frames)?;
    for i in 0..frames {
        let mut sum = 0.0;
        for (phase, hz) in phases.iter_mut().zip(frequencies) {
            sum += sin01(*phase);
            *phase = wrap_phase01(*phase + hz / sample_rate);
        }
        out.push(clamp(sum * norm * amplitude * env.gain(i), -1.0, 1.0));
    }
    Ok(SampleBuffer::from_samples(out, sample_rate))
}

#[allow(clippy::cast_precision_loss)]
fn write_segment(out: &mut Vec<f32>, seg: &Segment, sr: f32) {
    let frames = seconds_to_frames(seg.duration(), sr);
    let env = SegmentEnvelope::from_seconds(frames, seg.attack(), seg.decay(), sr);
    let last = (frames - 1) as f32;
    let wave = seg.waveform();
    let shape = seg.frequency();
    let amp = seg.amplitude();

    let mut phase = 0.0f32;
    for i in 0..frames {
        let progress = if frames > 1 { clamp(i as f32 / last, 0.0, 1.0) } else { 1.0 };
        let s = wave.sample(phase) * amp * env.gain(i);
        out.push(clamp(s, -1.0, 1.0));
        phase = wrap_phase01(phase + shape.at(progress) / sr);
    }
}

#[inline]
fn check_sample_rate(sr: f32) -> Result<(), RenderError> {
    if sr.is_finite() && sr > 0.0 { Ok(()) } else { Err(RenderError::InvalidSampleRate(sr)) }
}

#[inline]
fn reserve(frames: usize) -> Result<Vec<f32>, RenderError> {
    let mut v = Vec::new();
    v.try_reserve_exact(frames).map_err(|_| RenderError::Allocation { frames })?;
    Ok(v)
}

// ------------------------------------ Tests --------------------------------------
