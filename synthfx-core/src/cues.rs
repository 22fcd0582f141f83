//! Lane model and accessibility cue synthesis.
//!
//! Two cue families:
//! - **tick** cues describe which lanes are currently safe, in one of three
//!   encodings ([`CueMode::Chord`], [`CueMode::Arpeggio`], [`CueMode::LanePulses`])
//! - **move** cues confirm a lane change: a lane tone, a safety tone, or both
//!   joined by a short silent gap ([`MoveCueStyle`])
//!
//! Everything here is pure; the engine renders every combination once and
//! caches the buffers.

use alloc::vec::Vec;
use core::fmt;
use core::str::FromStr;

use crate::recipe::{Segment, Waveform};
use crate::render::{render_chord, render_segments, RenderError, SampleBuffer};

/// Number of lanes on the board.
pub const LANE_COUNT: usize = 3;

// ----------------------------------- Lanes ---------------------------------------

/// A lane index in `0..LANE_COUNT`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Lane(u8);

impl Lane {
    pub const LEFT: Lane = Lane(0);
    pub const CENTER: Lane = Lane(1);
    pub const RIGHT: Lane = Lane(2);
    pub const ALL: [Lane; LANE_COUNT] = [Lane::LEFT, Lane::CENTER, Lane::RIGHT];

    pub fn new(index: usize) -> Option<Lane> {
        Self::ALL.get(index).copied()
    }

    #[inline] pub fn index(self) -> usize { self.0 as usize }

    #[inline]
    fn bit(self) -> u8 { 1 << self.0 }
}

/// Set of safe lanes as a bitmask: bit `i` set ⇔ lane `i` is safe.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct SafeLanes(u8);

impl SafeLanes {
    pub const NONE: SafeLanes = SafeLanes(0);
    pub const ALL_SAFE: SafeLanes = SafeLanes((1 << LANE_COUNT) - 1);

    /// Every mask `0..2^LANE_COUNT`.
    pub fn all_masks() -> impl Iterator<Item = SafeLanes> {
        (0..=Self::ALL_SAFE.0).map(SafeLanes)
    }

    pub fn from_lanes<I: IntoIterator<Item = Lane>>(lanes: I) -> Self {
        SafeLanes(lanes.into_iter().fold(0, |m, l| m | l.bit()))
    }

    /// `None` if bits outside the lane range are set.
    pub fn from_bits(bits: u8) -> Option<Self> {
        if bits & !Self::ALL_SAFE.0 == 0 { Some(SafeLanes(bits)) } else { None }
    }

    #[inline] pub fn bits(self) -> u8 { self.0 }
    #[inline] pub fn contains(self, lane: Lane) -> bool { self.0 & lane.bit() != 0 }
    #[inline] pub fn is_empty(self) -> bool { self.0 == 0 }
    #[inline] pub fn len(self) -> usize { self.0.count_ones() as usize }

    /// Safe lanes in ascending order.
    pub fn lanes(self) -> impl Iterator<Item = Lane> {
        Lane::ALL.into_iter().filter(move |l| self.contains(*l))
    }
}

// ----------------------------------- Modes ---------------------------------------

/// Tick cue encoding selected by the player.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum CueMode {
    /// No audio cues at all.
    #[default]
    Off,
    Chord,
    Arpeggio,
    LanePulses,
}

impl CueMode {
    /// Modes that own tick buffers.
    pub const AUDIBLE: [CueMode; 3] = [CueMode::Chord, CueMode::Arpeggio, CueMode::LanePulses];

    pub fn name(self) -> &'static str {
        match self {
            CueMode::Off        => "off",
            CueMode::Chord      => "chord",
            CueMode::Arpeggio   => "arpeggio",
            CueMode::LanePulses => "lane-pulses",
        }
    }

    pub fn from_id(id: u32) -> Option<Self> {
        [CueMode::Off, CueMode::Chord, CueMode::Arpeggio, CueMode::LanePulses]
            .get(id as usize)
            .copied()
    }
}

/// Move cue encoding.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum MoveCueStyle {
    #[default]
    None,
    /// Tone of the lane moved into.
    LaneOnly,
    /// High tone if the new lane is safe, low tone otherwise.
    SafetyOnly,
    /// Lane tone, gap, safety tone.
    Combined,
}

impl MoveCueStyle {
    pub fn name(self) -> &'static str {
        match self {
            MoveCueStyle::None       => "none",
            MoveCueStyle::LaneOnly   => "lane",
            MoveCueStyle::SafetyOnly => "safety",
            MoveCueStyle::Combined   => "combined",
        }
    }

    pub fn from_id(id: u32) -> Option<Self> {
        [MoveCueStyle::None, MoveCueStyle::LaneOnly, MoveCueStyle::SafetyOnly, MoveCueStyle::Combined]
            .get(id as usize)
            .copied()
    }
}

/// Returned when a cue mode/style name is not recognised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown cue option")]
pub struct UnknownCueOption;

impl FromStr for CueMode {
    type Err = UnknownCueOption;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [CueMode::Off, CueMode::Chord, CueMode::Arpeggio, CueMode::LanePulses]
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(s))
            .ok_or(UnknownCueOption)
    }
}

impl FromStr for MoveCueStyle {
    type Err = UnknownCueOption;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [MoveCueStyle::None, MoveCueStyle::LaneOnly, MoveCueStyle::SafetyOnly, MoveCueStyle::Combined]
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(s))
            .ok_or(UnknownCueOption)
    }
}

impl fmt::Display for CueMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.pad(self.name()) }
}

impl fmt::Display for MoveCueStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.pad(self.name()) }
}

// ----------------------------------- Tuning --------------------------------------

/// Cue tuning. Frequencies in Hz, times in seconds, amplitudes in [0, 1].
#[derive(Clone, Debug, PartialEq)]
pub struct LaneCueProfile {
    pub lane_frequencies: [f32; LANE_COUNT],
    pub warning_frequency: f32,
    pub safe_frequency: f32,
    pub unsafe_frequency: f32,

    pub tick_amplitude: f32,
    pub warning_amplitude: f32,
    pub move_amplitude: f32,

    pub chord_duration: f32,
    pub arpeggio_note_duration: f32,
    pub pulse_slot_duration: f32,
    pub warning_duration: f32,
    pub move_tone_duration: f32,
    pub move_gap_duration: f32,

    pub attack: f32,
    pub decay: f32,
}

impl Default for LaneCueProfile {
    fn default() -> Self {
        Self {
            // C5 / E5 / G5: distinct but consonant when stacked.
            lane_frequencies: [523.25, 659.25, 783.99],
            warning_frequency: 207.65,
            safe_frequency: 1046.5,
            unsafe_frequency: 233.08,

            tick_amplitude: 0.28,
            warning_amplitude: 0.32,
            move_amplitude: 0.3,

            chord_duration: 0.14,
            arpeggio_note_duration: 0.07,
            pulse_slot_duration: 0.09,
            warning_duration: 0.16,
            move_tone_duration: 0.06,
            move_gap_duration: 0.03,

            attack: 0.005,
            decay: 0.03,
        }
    }
}

impl LaneCueProfile {
    #[inline]
    pub fn lane_frequency(&self, lane: Lane) -> f32 {
        self.lane_frequencies[lane.index()]
    }

    fn tone(&self, hz: f32, duration: f32, amplitude: f32) -> Segment {
        Segment::tone(Waveform::Sine, hz, duration, amplitude, self.attack, self.decay)
    }
}

// --------------------------------- Synthesis -------------------------------------

/// The dedicated "no lane is safe" tone.
pub fn render_warning(p: &LaneCueProfile, sr: f32) -> Result<SampleBuffer, RenderError> {
    render_segments(&[p.tone(p.warning_frequency, p.warning_duration, p.warning_amplitude)], sr)
}

/// Tick cue for `safe` in `mode`. [`CueMode::Off`] has no buffer (`Empty`).
pub fn render_tick(p: &LaneCueProfile, mode: CueMode, safe: SafeLanes, sr: f32) -> Result<SampleBuffer, RenderError> {
    match mode {
        CueMode::Off => Err(RenderError::Empty),
        CueMode::Chord => {
            let freqs: Vec<f32> = if safe.is_empty() {
                alloc::vec![p.warning_frequency]
            } else {
                safe.lanes().map(|l| p.lane_frequency(l)).collect()
            };
            render_chord(&freqs, p.chord_duration, p.tick_amplitude, p.attack, p.decay, sr)
        }
        CueMode::Arpeggio => {
            if safe.is_empty() {
                return render_warning(p, sr);
            }
            let notes: Vec<Segment> = safe
                .lanes()
                .map(|l| p.tone(p.lane_frequency(l), p.arpeggio_note_duration, p.tick_amplitude))
                .collect();
            render_segments(&notes, sr)
        }
        CueMode::LanePulses => {
            if safe.is_empty() {
                return render_warning(p, sr);
            }
            let mut slots = Vec::with_capacity(LANE_COUNT);
            for lane in Lane::ALL {
                let slot = if safe.contains(lane) {
                    render_segments(&[p.tone(p.lane_frequency(lane), p.pulse_slot_duration, p.tick_amplitude)], sr)?
                } else {
                    SampleBuffer::silence(p.pulse_slot_duration, sr)?
                };
                slots.push(slot);
            }
            let parts: Vec<&SampleBuffer> = slots.iter().collect();
            SampleBuffer::concat(&parts)
        }
    }
}

/// Lane-confirmation tone.
pub fn render_lane_tone(p: &LaneCueProfile, lane: Lane, sr: f32) -> Result<SampleBuffer, RenderError> {
    render_segments(&[p.tone(p.lane_frequency(lane), p.move_tone_duration, p.move_amplitude)], sr)
}

/// Safety-only tone: high when safe, low when not.
pub fn render_safety_tone(p: &LaneCueProfile, is_safe: bool, sr: f32) -> Result<SampleBuffer, RenderError> {
    let hz = if is_safe { p.safe_frequency } else { p.unsafe_frequency };
    render_segments(&[p.tone(hz, p.move_tone_duration, p.move_amplitude)], sr)
}

/// `[lane tone, silent gap, safety tone]` from already rendered pieces.
pub fn combine_move(
    p: &LaneCueProfile,
    lane_tone: &SampleBuffer,
    safety_tone: &SampleBuffer,
) -> Result<SampleBuffer, RenderError> {
    let gap = SampleBuffer::silence(p.move_gap_duration, lane_tone.sample_rate())?;
    SampleBuffer::concat(&[lane_tone, &gap, safety_tone])
}

// ------------------------------------ Tests --------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::seconds_to_frames;

    const SR: f32 = 44_100.0;

    #[test]
    fn mask_conversion_is_invertible() {
        for mask in SafeLanes::all_masks() {
            let lanes: Vec<Lane> = mask.lanes().collect();
            assert_eq!(SafeLanes::from_lanes(lanes.iter().copied()), mask);
        }
        assert_eq!(SafeLanes::all_masks().count(), 8);
        assert_eq!(SafeLanes::from_lanes([Lane::LEFT, Lane::RIGHT]).bits(), 0b101);
        assert_eq!(SafeLanes::from_bits(0b1000), None);
        assert_eq!(SafeLanes::from_bits(0b011).map(SafeLanes::len), Some(2));
    }

    #[test]
    fn lane_bounds() {
        assert_eq!(Lane::new(2), Some(Lane::RIGHT));
        assert_eq!(Lane::new(3), None);
    }

    #[test]
    fn empty_lane_pulses_equal_warning() {
        let p = LaneCueProfile::default();
        let tick = render_tick(&p, CueMode::LanePulses, SafeLanes::NONE, SR).unwrap();
        let warning = render_warning(&p, SR).unwrap();
        assert_eq!(tick, warning);
        assert!(tick.peak() > 0.0);
    }

    #[test]
    fn lane_pulses_have_one_slot_per_lane() {
        let p = LaneCueProfile::default();
        let slot = seconds_to_frames(p.pulse_slot_duration, SR);
        let tick = render_tick(&p, CueMode::LanePulses, SafeLanes::from_lanes([Lane::CENTER]), SR).unwrap();
        assert_eq!(tick.frames(), slot * LANE_COUNT);
        assert!(tick.samples()[..slot].iter().all(|s| *s == 0.0));
        assert!(tick.samples()[slot..2 * slot].iter().any(|s| *s != 0.0));
        assert!(tick.samples()[2 * slot..].iter().all(|s| *s == 0.0));
    }

    #[test]
    fn arpeggio_length_tracks_safe_count() {
        let p = LaneCueProfile::default();
        let note = seconds_to_frames(p.arpeggio_note_duration, SR);
        for mask in SafeLanes::all_masks().filter(|m| !m.is_empty()) {
            let tick = render_tick(&p, CueMode::Arpeggio, mask, SR).unwrap();
            assert_eq!(tick.frames(), note * mask.len());
        }
    }

    #[test]
    fn chord_has_fixed_length_and_stays_bounded() {
        let p = LaneCueProfile::default();
        let frames = seconds_to_frames(p.chord_duration, SR);
        for mask in SafeLanes::all_masks() {
            let tick = render_tick(&p, CueMode::Chord, mask, SR).unwrap();
            assert_eq!(tick.frames(), frames);
            assert!(tick.peak() <= p.tick_amplitude + 1e-6);
        }
    }

    #[test]
    fn off_mode_has_no_tick() {
        let p = LaneCueProfile::default();
        assert_eq!(render_tick(&p, CueMode::Off, SafeLanes::ALL_SAFE, SR), Err(RenderError::Empty));
    }

    #[test]
    fn combined_move_is_lane_gap_safety() {
        let p = LaneCueProfile::default();
        let lane = render_lane_tone(&p, Lane::LEFT, SR).unwrap();
        let safety = render_safety_tone(&p, false, SR).unwrap();
        let combined = combine_move(&p, &lane, &safety).unwrap();
        let gap = seconds_to_frames(p.move_gap_duration, SR);
        assert_eq!(combined.frames(), lane.frames() + gap + safety.frames());
        assert_eq!(&combined.samples()[..lane.frames()], lane.samples());
        assert_eq!(&combined.samples()[lane.frames() + gap..], safety.samples());
    }

    #[test]
    fn safety_tones_differ() {
        let p = LaneCueProfile::default();
        assert_ne!(render_safety_tone(&p, true, SR).unwrap(), render_safety_tone(&p, false, SR).unwrap());
    }

    #[test]
    fn option_names_parse() {
        assert_eq!("lane-pulses".parse::<CueMode>(), Ok(CueMode::LanePulses));
        assert_eq!("Combined".parse::<MoveCueStyle>(), Ok(MoveCueStyle::Combined));
        assert!("loud".parse::<CueMode>().is_err());
        assert_eq!(CueMode::from_id(2), Some(CueMode::Arpeggio));
        assert_eq!(MoveCueStyle::from_id(9), None);
    }
}
