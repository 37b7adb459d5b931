//! Audio engine: beeper, SpecDrum DAC and AY mixed into stereo PCM.
//!
//! The engine keeps its own T-state cursor. The bus catches it up before
//! every write that changes a sound source, so each source is integrated
//! over exactly the T-states it was active for. Output samples are the
//! average level across their T-state span; a span boundary that falls
//! inside a step is split proportionally between the two samples.
//!
//! Time is counted in units of 1/`samples_per_frame` T-state, so one
//! sample is exactly `ts_per_frame` units and a frame never drifts.
//!
//! # Published buffer
//!
//! Samples go into one half of a two-half buffer. At the end of every
//! frame the half just filled is published, `last_completed_index`
//! increments, and writing moves to the other half. A consumer on another
//! schedule reads [`AudioEngine::completed_frame`] for the index it saw and
//! never races the half being written.

use gi_ay_3_8910::Ay3_8910;

/// Beeper contribution at full deflection, in output units (-1.0..=1.0).
const BEEPER_VOLUME: f32 = 0.5;

/// AY contribution at full deflection.
const AY_VOLUME: f32 = 0.4;

/// SpecDrum contribution at full deflection.
const DAC_VOLUME: f32 = 0.4;

/// Longest stretch over which the AY output is treated as constant.
const AY_SLICE_TSTATES: u64 = 16;

/// Sound sources as seen by the engine between two catch-ups.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Sources {
    /// EAR output bit or tape input.
    pub beeper: bool,
    /// Last SpecDrum DAC write, if fitted.
    pub dac: Option<u8>,
}

impl Sources {
    fn level(self) -> f32 {
        let beeper = if self.beeper { BEEPER_VOLUME } else { 0.0 };
        let dac = self
            .dac
            .map_or(0.0, |v| (f32::from(v) - 128.0) / 128.0 * DAC_VOLUME);
        beeper + dac
    }
}

pub struct AudioEngine {
    sample_rate: u32,
    samples_per_frame: usize,
    /// Units per sample, equal to the frame length in T-states.
    units_per_sample: u64,
    /// Stereo interleaved, two halves of `samples_per_frame * 2` values.
    buffer: Vec<i16>,
    half: usize,
    /// Stereo samples written into the current half.
    written: usize,
    /// T-state the engine has caught up to.
    cursor: u32,
    /// Units accumulated into the sample being built.
    span: u64,
    left: f64,
    right: f64,
    /// Units owed to the AY that do not yet make a whole T-state.
    ay_carry: u64,
    last_completed_index: u64,
}

impl AudioEngine {
    #[must_use]
    pub fn new(sample_rate: u32, frames_per_second: u32, ts_per_frame: u32) -> Self {
        let samples_per_frame = (sample_rate / frames_per_second.max(1)).max(1) as usize;
        Self {
            sample_rate,
            samples_per_frame,
            units_per_sample: u64::from(ts_per_frame.max(1)),
            buffer: vec![0; samples_per_frame * 4],
            half: 0,
            written: 0,
            cursor: 0,
            span: 0,
            left: 0.0,
            right: 0.0,
            ay_carry: 0,
            last_completed_index: 0,
        }
    }

    #[must_use]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[must_use]
    pub fn samples_per_frame(&self) -> usize {
        self.samples_per_frame
    }

    /// T-state the engine has caught up to.
    #[must_use]
    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    /// Run the engine up to T-state `tstates` of the current frame.
    pub fn catch_up(&mut self, tstates: u32, ay: Option<&mut Ay3_8910>, sources: Sources) {
        let elapsed = tstates.saturating_sub(self.cursor);
        self.update(elapsed, ay, sources);
    }

    /// Integrate `tstates` T-states with the given sources.
    pub fn update(&mut self, tstates: u32, mut ay: Option<&mut Ay3_8910>, sources: Sources) {
        self.cursor += tstates;
        let level = sources.level();
        let per_tstate = self.samples_per_frame as u64;
        let mut remaining = u64::from(tstates) * per_tstate;

        while remaining > 0 {
            let room = self.units_per_sample - self.span;
            let mut step = remaining.min(room);
            if ay.is_some() {
                step = step.min(AY_SLICE_TSTATES * per_tstate);
            }

            let (mut l, mut r) = (level, level);
            if let Some(ay) = ay.as_deref_mut() {
                self.ay_carry += step;
                let whole = self.ay_carry / per_tstate;
                self.ay_carry %= per_tstate;
                ay.update(whole as u32);
                let (al, ar) = ay.mix();
                l += al * AY_VOLUME;
                r += ar * AY_VOLUME;
            }

            self.left += f64::from(l) * step as f64;
            self.right += f64::from(r) * step as f64;
            self.span += step;
            remaining -= step;

            if self.span == self.units_per_sample {
                self.emit();
            }
        }
    }

    fn emit(&mut self) {
        let scale = f64::from(i16::MAX) / self.span.max(1) as f64;
        let l = (self.left * scale).clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16;
        let r = (self.right * scale).clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16;
        self.left = 0.0;
        self.right = 0.0;
        self.span = 0;

        if self.written < self.samples_per_frame {
            let at = (self.half * self.samples_per_frame + self.written) * 2;
            self.buffer[at] = l;
            self.buffer[at + 1] = r;
            self.written += 1;
        }
    }

    /// Publish the half just filled and start the next frame.
    ///
    /// A frame cut short leaves the half incomplete; the gap repeats the
    /// last sample written.
    pub fn end_frame(&mut self) {
        let base = self.half * self.samples_per_frame * 2;
        let last = if self.written > 0 {
            let at = base + (self.written - 1) * 2;
            (self.buffer[at], self.buffer[at + 1])
        } else {
            (0, 0)
        };
        for i in self.written..self.samples_per_frame {
            self.buffer[base + i * 2] = last.0;
            self.buffer[base + i * 2 + 1] = last.1;
        }

        self.last_completed_index += 1;
        self.half ^= 1;
        self.written = 0;
        self.cursor = 0;
    }

    /// Drop partial output and rewind to the start of a frame. The
    /// published index keeps counting.
    pub fn reset(&mut self) {
        self.written = 0;
        self.cursor = 0;
        self.span = 0;
        self.left = 0.0;
        self.right = 0.0;
        self.ay_carry = 0;
    }

    /// Frames published so far.
    #[must_use]
    pub fn last_completed_index(&self) -> u64 {
        self.last_completed_index
    }

    /// Interleaved stereo samples of the last completed frame.
    #[must_use]
    pub fn completed_frame(&self) -> Option<&[i16]> {
        if self.last_completed_index == 0 {
            return None;
        }
        let half = (self.half ^ 1) * self.samples_per_frame * 2;
        Some(&self.buffer[half..half + self.samples_per_frame * 2])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAME: u32 = 69_888;

    fn engine() -> AudioEngine {
        AudioEngine::new(44_100, 50, FRAME)
    }

    fn beeper(on: bool) -> Sources {
        Sources {
            beeper: on,
            dac: None,
        }
    }

    #[test]
    fn frame_holds_882_stereo_samples() {
        let mut audio = engine();
        assert_eq!(audio.samples_per_frame(), 882);
        assert!(audio.completed_frame().is_none());

        audio.catch_up(FRAME, None, beeper(true));
        audio.end_frame();
        let frame = audio.completed_frame().expect("published");
        assert_eq!(frame.len(), 882 * 2);
        let full = (f64::from(BEEPER_VOLUME) * f64::from(i16::MAX)) as i16;
        assert!(frame.iter().all(|&s| (s - full).abs() <= 1));
    }

    #[test]
    fn sample_straddling_an_edge_is_averaged() {
        let mut audio = engine();
        // 69888 / 882 is a shade over 79 T-states per sample.
        audio.update(39, None, beeper(true));
        audio.update(80, None, beeper(false));
        audio.end_frame();

        let frame = audio.completed_frame().expect("published");
        let full = f64::from(BEEPER_VOLUME) * f64::from(i16::MAX);
        let first = f64::from(frame[0]);
        assert!((first / full - 39.0 * 882.0 / 69_888.0).abs() < 0.01, "got {first}");
        assert_eq!(frame[0], frame[1], "beeper is centred");
    }

    #[test]
    fn halves_alternate_and_index_increments() {
        let mut audio = engine();
        audio.catch_up(FRAME, None, beeper(true));
        audio.end_frame();
        audio.catch_up(FRAME, None, beeper(false));
        audio.end_frame();

        assert_eq!(audio.last_completed_index(), 2);
        assert!(audio.completed_frame().expect("published").iter().all(|&s| s == 0));
    }

    #[test]
    fn dac_is_centred_on_128() {
        let mut audio = engine();
        let sources = Sources {
            beeper: false,
            dac: Some(128),
        };
        audio.catch_up(FRAME, None, sources);
        audio.end_frame();
        assert!(audio.completed_frame().expect("published").iter().all(|&s| s == 0));
    }

    #[test]
    fn ay_is_stepped_with_the_engine() {
        let mut audio = engine();
        let mut ay = Ay3_8910::new();
        ay.set_register(16);
        ay.write_data(10);
        audio.catch_up(FRAME * 3, Some(&mut ay), beeper(false));
        assert_eq!(ay.read_data(), 7);
    }

    #[test]
    fn catch_up_never_runs_backwards() {
        let mut audio = engine();
        audio.catch_up(1000, None, beeper(true));
        audio.catch_up(500, None, beeper(true));
        assert_eq!(audio.cursor(), 1000);
    }

    #[test]
    fn reset_keeps_published_index() {
        let mut audio = engine();
        audio.catch_up(FRAME, None, beeper(true));
        audio.end_frame();
        audio.catch_up(100, None, beeper(true));
        audio.reset();
        assert_eq!(audio.cursor(), 0);
        assert_eq!(audio.last_completed_index(), 1);
    }
}
