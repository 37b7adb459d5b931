//! General Instrument AY-3-8910 Programmable Sound Generator.
//!
//! The Spectrum 128 fits the 28-pin AY-3-8912, which is the same die with one
//! I/O port bonded out. Three square-wave tone generators, a shared noise
//! generator, a shared envelope generator, and a per-channel mixer.
//!
//! The chip is stepped in CPU T-states. Its input clock is half the CPU
//! clock, so tone and noise counters step every 16 T-states and the envelope
//! every 32. Sampling is left to the caller, who reads [`Ay3_8910::mix`]
//! whenever it emits an output sample.
//!
//! # Register map (16 registers plus one floating slot)
//!
//! | Reg | Name      | Bits |
//! |-----|-----------|------|
//! | R0  | A fine    | 7-0  |
//! | R1  | A coarse  | 3-0  |
//! | R2  | B fine    | 7-0  |
//! | R3  | B coarse  | 3-0  |
//! | R4  | C fine    | 7-0  |
//! | R5  | C coarse  | 3-0  |
//! | R6  | Noise     | 4-0  |
//! | R7  | Mixer     | 7-0  |
//! | R8  | A volume  | 4-0  |
//! | R9  | B volume  | 4-0  |
//! | R10 | C volume  | 4-0  |
//! | R11 | Env fine  | 7-0  |
//! | R12 | Env coarse| 7-0  |
//! | R13 | Env shape | 3-0  |
//! | R14 | Port A    | 7-0  |
//! | R15 | Port B    | 7-0  |
//! | R16 | Floating  | 7-0  |
//!
//! Selecting any index above 15 selects the floating slot. Whatever is
//! written there reads back, but the value sinks by one every decay quantum
//! until it reaches zero, like charge leaking off the bus.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]

/// Number of real registers.
pub const REGISTER_COUNT: usize = 16;

/// Index of the floating slot.
pub const FLOATING_REGISTER: u8 = 16;

/// T-states between tone/noise counter steps (chip clock / 8).
const TONE_STEP_TSTATES: u32 = 16;

/// Default floating decay quantum: one 48K frame.
pub const DEFAULT_DECAY_TSTATES: u32 = 69_888;

/// Write masks per register.
const REGISTER_MASKS: [u8; REGISTER_COUNT] = [
    0xFF, 0x0F, 0xFF, 0x0F, 0xFF, 0x0F, 0x1F, 0xFF,
    0x1F, 0x1F, 0x1F, 0xFF, 0xFF, 0x0F, 0xFF, 0xFF,
];

/// Logarithmic volume table for the AY-3-8910 DAC.
/// 16 levels, normalised to 0.0–1.0.
const VOLUME_TABLE: [f32; 16] = [
    0.0000, 0.0137, 0.0205, 0.0291,
    0.0423, 0.0618, 0.0847, 0.1369,
    0.1691, 0.2647, 0.3527, 0.4499,
    0.5765, 0.7258, 0.8819, 1.0000,
];

/// Square-wave tone channel with a 12-bit period.
#[derive(Debug, Default, Clone)]
struct Tone {
    period: u16,
    counter: u16,
    high: bool,
}

impl Tone {
    fn step(&mut self) {
        self.counter += 1;
        if self.counter >= self.period.max(1) {
            self.counter = 0;
            self.high = !self.high;
        }
    }
}

/// Seed loaded into the noise shift register on reset.
const NOISE_SEED: u32 = 0x1_FFFF;

/// 17-bit LFSR noise source with a 5-bit period.
#[derive(Debug, Clone)]
struct Noise {
    period: u8,
    counter: u8,
    lfsr: u32,
    /// Noise runs at half the tone rate.
    half: bool,
}

impl Default for Noise {
    fn default() -> Self {
        Self {
            period: 0,
            counter: 0,
            lfsr: NOISE_SEED,
            half: false,
        }
    }
}

impl Noise {
    fn step(&mut self) {
        self.half = !self.half;
        if self.half {
            return;
        }
        self.counter += 1;
        if self.counter >= self.period.max(1) {
            self.counter = 0;
            // Taps at bits 0 and 3, fed back into bit 16.
            let feedback = (self.lfsr ^ (self.lfsr >> 3)) & 1;
            self.lfsr = (self.lfsr >> 1) | (feedback << 16);
        }
    }

    fn high(&self) -> bool {
        self.lfsr & 1 != 0
    }
}

/// Envelope shape flags decoded from R13.
#[derive(Debug, Default, Clone, Copy)]
struct Shape {
    cont: bool,
    attack: bool,
    alternate: bool,
    hold: bool,
}

impl From<u8> for Shape {
    fn from(value: u8) -> Self {
        Self {
            cont: value & 0x08 != 0,
            attack: value & 0x04 != 0,
            alternate: value & 0x02 != 0,
            hold: value & 0x01 != 0,
        }
    }
}

/// Shared envelope generator: 16 steps per cycle, 16-bit period.
#[derive(Debug, Default, Clone)]
struct Envelope {
    period: u16,
    counter: u16,
    shape: Shape,
    /// Step within the current cycle, 0-15.
    step: u8,
    /// Current direction; flips on alternate.
    rising: bool,
    holding: bool,
}

impl Envelope {
    fn restart(&mut self, shape: u8) {
        self.shape = Shape::from(shape);
        self.rising = self.shape.attack;
        self.step = 0;
        self.counter = 0;
        self.holding = false;
    }

    fn step(&mut self) {
        if self.holding {
            return;
        }
        self.counter += 1;
        if self.counter < self.period.max(1) {
            return;
        }
        self.counter = 0;

        if self.step < 15 {
            self.step += 1;
            return;
        }

        // End of a 16-step cycle.
        let shape = self.shape;
        if !shape.cont {
            self.holding = true;
            self.rising = false;
            self.step = 15;
        } else if shape.hold {
            self.holding = true;
            if shape.alternate {
                self.rising = !self.rising;
            }
        } else {
            if shape.alternate {
                self.rising = !self.rising;
            }
            self.step = 0;
        }
    }

    /// 4-bit output level.
    fn level(&self) -> u8 {
        if self.holding && !self.shape.cont {
            return 0;
        }
        if self.rising { self.step } else { 15 - self.step }
    }
}

/// Stereo panning mode.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum StereoMode {
    /// All channels mixed equally to both outputs.
    Mono,
    /// A left, B centre, C right. The Spectrum 128 arrangement.
    #[default]
    Acb,
    /// A left, B right, C centre.
    Abc,
}

impl StereoMode {
    /// Left/right weights for channels A, B, C.
    fn weights(self) -> [(f32, f32); 3] {
        match self {
            Self::Mono => [(0.5, 0.5); 3],
            Self::Acb => [(1.0, 0.0), (0.5, 0.5), (0.0, 1.0)],
            Self::Abc => [(1.0, 0.0), (0.0, 1.0), (0.5, 0.5)],
        }
    }
}

/// AY-3-8910/8912 Programmable Sound Generator.
#[derive(Debug, Clone)]
pub struct Ay3_8910 {
    /// R0-R15 plus the floating slot.
    regs: [u8; REGISTER_COUNT + 1],
    selected: u8,

    tone: [Tone; 3],
    noise: Noise,
    envelope: Envelope,
    /// Envelope steps on every other tone step.
    envelope_half: bool,

    /// T-states not yet consumed by a tone step.
    pending: u32,
    decay_quantum: u32,
    decay_pending: u32,

    stereo_mode: StereoMode,
}

impl Default for Ay3_8910 {
    fn default() -> Self {
        Self::new()
    }
}

impl Ay3_8910 {
    #[must_use]
    pub fn new() -> Self {
        Self::with_decay_quantum(DEFAULT_DECAY_TSTATES)
    }

    /// Create a chip whose floating register loses one unit every
    /// `tstates` T-states.
    #[must_use]
    pub fn with_decay_quantum(tstates: u32) -> Self {
        Self {
            regs: [0; REGISTER_COUNT + 1],
            selected: 0,
            tone: Default::default(),
            noise: Noise::default(),
            envelope: Envelope::default(),
            envelope_half: false,
            pending: 0,
            decay_quantum: tstates.max(1),
            decay_pending: 0,
            stereo_mode: StereoMode::default(),
        }
    }

    /// Power-on state. Stereo mode and decay quantum are kept.
    pub fn reset(&mut self) {
        *self = Self {
            stereo_mode: self.stereo_mode,
            ..Self::with_decay_quantum(self.decay_quantum)
        };
    }

    pub fn set_stereo(&mut self, mode: StereoMode) {
        self.stereo_mode = mode;
    }

    #[must_use]
    pub fn stereo(&self) -> StereoMode {
        self.stereo_mode
    }

    /// Select a register. Indices above 15 select the floating slot.
    pub fn set_register(&mut self, index: u8) {
        self.selected = if (index as usize) < REGISTER_COUNT {
            index
        } else {
            FLOATING_REGISTER
        };
    }

    #[must_use]
    pub fn selected_register(&self) -> u8 {
        self.selected
    }

    /// Write the selected register.
    pub fn write_data(&mut self, value: u8) {
        let reg = self.selected as usize;
        if reg >= REGISTER_COUNT {
            self.regs[reg] = value;
            self.decay_pending = 0;
            return;
        }
        let value = value & REGISTER_MASKS[reg];
        self.regs[reg] = value;

        match reg {
            0..=5 => {
                let ch = reg / 2;
                self.tone[ch].period =
                    u16::from(self.regs[ch * 2]) | (u16::from(self.regs[ch * 2 + 1]) << 8);
            }
            6 => self.noise.period = value,
            11 | 12 => {
                self.envelope.period = u16::from(self.regs[11]) | (u16::from(self.regs[12]) << 8);
            }
            13 => self.envelope.restart(value),
            _ => {}
        }
    }

    /// Read the selected register.
    #[must_use]
    pub fn read_data(&self) -> u8 {
        self.regs[self.selected as usize]
    }

    /// R0-R15 as last written (masked).
    #[must_use]
    pub fn registers(&self) -> [u8; REGISTER_COUNT] {
        let mut out = [0; REGISTER_COUNT];
        out.copy_from_slice(&self.regs[..REGISTER_COUNT]);
        out
    }

    /// Restore R0-R15 and the selected index, e.g. from a snapshot.
    pub fn load_registers(&mut self, regs: &[u8; REGISTER_COUNT], selected: u8) {
        for (index, &value) in regs.iter().enumerate() {
            self.set_register(index as u8);
            self.write_data(value);
        }
        self.set_register(selected);
    }

    /// Advance the chip by `tstates` CPU T-states.
    pub fn update(&mut self, tstates: u32) {
        self.pending += tstates;
        while self.pending >= TONE_STEP_TSTATES {
            self.pending -= TONE_STEP_TSTATES;
            for tone in &mut self.tone {
                tone.step();
            }
            self.noise.step();
            self.envelope_half = !self.envelope_half;
            if !self.envelope_half {
                self.envelope.step();
            }
        }

        self.decay_pending += tstates;
        let decays = self.decay_pending / self.decay_quantum;
        self.decay_pending %= self.decay_quantum;
        let floating = &mut self.regs[FLOATING_REGISTER as usize];
        *floating = floating.saturating_sub(decays.min(255) as u8);
    }

    /// Current output of all three channels as a centred `(left, right)`
    /// pair in roughly -1.0..=1.0.
    #[must_use]
    pub fn mix(&self) -> (f32, f32) {
        let mixer = self.regs[7];
        let weights = self.stereo_mode.weights();
        let mut left = 0.0f32;
        let mut right = 0.0f32;

        for (ch, &(wl, wr)) in weights.iter().enumerate() {
            let tone_off = mixer & (1 << ch) != 0;
            let noise_off = mixer & (1 << (ch + 3)) != 0;
            let on = (self.tone[ch].high || tone_off) && (self.noise.high() || noise_off);

            let volume = self.regs[8 + ch];
            let level = if volume & 0x10 != 0 {
                self.envelope.level()
            } else {
                volume & 0x0F
            };
            let amplitude = VOLUME_TABLE[level as usize];
            let sample = (if on { amplitude } else { 0.0 }) - amplitude * 0.5;

            left += sample * wl;
            right += sample * wr;
        }

        // Hard-panned plus centre peaks at 0.75 in every mode.
        (left / 0.75, right / 0.75)
    }
}
