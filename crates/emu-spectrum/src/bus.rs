//! Spectrum bus: memory and I/O routing.
//!
//! The bus connects the CPU to memory, the display and audio engines, the
//! keyboard and the optional peripherals. I/O routing is model-aware: the
//! 128K adds the paging port and always has an AY.
//!
//! # Ordering
//!
//! Anything that changes what the display or audio engines would produce
//! catches that engine up first. Display-file writes draw up to the write's
//! T-state plus the paper lead, border writes use the border lead, and every
//! beeper, AY or DAC write integrates the audio up to the write.
//!
//! # Port map
//!
//! | Decode                      | Read               | Write                 |
//! |-----------------------------|--------------------|-----------------------|
//! | A0 = 0                      | keyboard, EAR      | border, EAR, MIC      |
//! | low byte $1F                | Kempston           |                       |
//! | `port & $C002 == $C000`     | AY data            | AY register select    |
//! | `port & $C002 == $8000`     |                    | AY data               |
//! | `port & $8002 == 0` (128K)  |                    | paging                |
//! | low byte $DF                |                    | SpecDrum DAC          |
//! | $FAF3, $FAFB                | SmartCard          | SmartCard             |
//! | anything else               | floating bus       |                       |

use emu_core::Z80Bus;
use gi_ay_3_8910::Ay3_8910;
use sinclair_ula::{ContentionTables, Display, FloatingBus, MachineInfo};

use crate::audio::{AudioEngine, Sources};
use crate::config::{SpectrumConfig, SpectrumModel, TapeTraps};
use crate::debug::{BreakpointKind, Debugger};
use crate::keyboard::KeyboardState;
use crate::memory::{Memory48K, Memory128K, SpectrumMemory};
use crate::smart_card::SmartCard;
use crate::tape::{TapeHandler, TrapKind};

/// Why the CPU was told to skip an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stop {
    Trap(TrapKind),
    Breakpoint,
}

/// The Spectrum bus, implementing [`Z80Bus`].
pub struct SpectrumBus {
    pub memory: Box<dyn SpectrumMemory>,
    info: MachineInfo,
    contention: ContentionTables,
    floating: FloatingBus,
    pub display: Display,
    pub audio: AudioEngine,
    /// AY-3-8912, on the 128K or when fitted to a 48K.
    pub ay: Option<Ay3_8910>,
    pub keyboard: KeyboardState,
    /// Kempston joystick state: bits 0-4 = right, left, down, up, fire (active-high).
    pub kempston: u8,
    kempston_fitted: bool,
    ear: bool,
    mic: bool,
    /// Last SpecDrum write, present when the DAC is fitted.
    dac: Option<u8>,
    pub smart_card: Option<SmartCard>,
    /// ROM restored by a reset or the SmartCard exit.
    default_rom: Vec<u8>,
    traps: TapeTraps,
    pub instant_load: bool,
    pub tape: Option<Box<dyn TapeHandler>>,
    pub debug: Debugger,
    pending: Option<(Stop, u16)>,
    /// Fetch address let through once after a stop or a declined trap.
    resume_at: Option<u16>,
}

impl SpectrumBus {
    /// `rom` is the validated image, exactly the model's ROM size.
    #[must_use]
    pub fn new(config: &SpectrumConfig, rom: Vec<u8>) -> Self {
        let info = config.model.info();
        let memory: Box<dyn SpectrumMemory> = match config.model {
            SpectrumModel::Spectrum48K => Box::new(Memory48K::new(&rom)),
            SpectrumModel::Spectrum128K => Box::new(Memory128K::new(&rom)),
        };
        let ay = config.has_ay().then(|| {
            let mut ay = Ay3_8910::with_decay_quantum(info.ts_per_frame);
            ay.set_stereo(config.stereo);
            ay
        });

        Self {
            memory,
            contention: ContentionTables::new(&info),
            floating: FloatingBus::new(&info),
            display: Display::new(info),
            audio: AudioEngine::new(config.sample_rate, config.frames_per_second, info.ts_per_frame),
            ay,
            keyboard: KeyboardState::new(),
            kempston: 0,
            kempston_fitted: config.kempston,
            ear: false,
            mic: false,
            dac: config.specdrum.then_some(0x80),
            smart_card: config.smart_card_rom.as_ref().map(|_| SmartCard::new()),
            default_rom: rom,
            traps: config.traps.clone(),
            instant_load: config.instant_load,
            tape: None,
            debug: Debugger::new(),
            pending: None,
            resume_at: None,
            info,
        }
    }

    #[must_use]
    pub fn info(&self) -> &MachineInfo {
        &self.info
    }

    /// EAR output bit as last written to the ULA port.
    #[must_use]
    pub fn ear(&self) -> bool {
        self.ear
    }

    #[must_use]
    pub fn mic(&self) -> bool {
        self.mic
    }

    #[must_use]
    pub fn default_rom(&self) -> &[u8] {
        &self.default_rom
    }

    pub fn set_ear(&mut self, ear: bool) {
        self.ear = ear;
    }

    fn tape_input(&self) -> bool {
        self.tape.as_ref().is_some_and(|tape| tape.input_bit())
    }

    fn sources(&self) -> Sources {
        Sources {
            beeper: self.ear || self.tape_input(),
            dac: self.dac,
        }
    }

    /// Integrate audio up to `tstates`.
    pub fn sync_audio(&mut self, tstates: u32) {
        let sources = self.sources();
        self.audio.catch_up(tstates, self.ay.as_mut(), sources);
    }

    fn sync_display(&mut self, tstates: u32, lead: u32) {
        self.display.catch_up(tstates, lead, self.memory.screen());
    }

    /// Finish the frame: engines run to the end and rewind together.
    pub fn end_frame(&mut self) {
        self.sync_audio(self.info.ts_per_frame);
        self.display.end_frame(self.memory.screen());
        self.audio.end_frame();
        self.keyboard.end_frame();
    }

    /// Replace the stock ROM and page it in.
    pub fn replace_rom(&mut self, rom: Vec<u8>) {
        self.memory.load_rom(&rom);
        self.default_rom = rom;
    }

    /// Peripheral and engine state back to power-on. A hard reset also
    /// clears RAM, pages the stock ROM back in and switches the SmartCard
    /// out.
    pub fn reset(&mut self, hard: bool) {
        if hard {
            self.memory.load_rom(&self.default_rom);
            let blank = vec![0; self.memory.ram_image().len()];
            self.memory.load_ram_image(&blank);
            if let Some(card) = self.smart_card.as_mut() {
                card.disable();
            }
            self.display.clear();
        }
        self.memory.reset_paging();
        if let Some(ay) = self.ay.as_mut() {
            ay.reset();
        }
        if self.dac.is_some() {
            self.dac = Some(0x80);
        }
        self.ear = false;
        self.mic = false;
        self.pending = None;
        self.resume_at = None;
        self.display.set_border(7);
        self.display.frame_reset();
        self.audio.reset();
    }

    /// Take the reason the CPU last skipped an instruction.
    pub fn take_stop(&mut self) -> Option<(Stop, u16)> {
        self.pending.take()
    }

    /// Let the next fetch at `addr` run without trap or breakpoint checks.
    pub fn resume_at(&mut self, addr: u16) {
        self.resume_at = Some(addr);
    }

    fn trap_at(&self, addr: u16, opcode: u8) -> Option<TrapKind> {
        self.tape.as_ref()?;
        if self.instant_load && self.traps.load.contains(&(addr, opcode)) {
            return Some(TrapKind::Load);
        }
        if self.traps.save.contains(&(addr, opcode)) {
            return Some(TrapKind::Save);
        }
        None
    }
}

impl Z80Bus for SpectrumBus {
    fn read(&mut self, address: u16, _tstates: u32) -> u8 {
        if address < 0x4000
            && let Some(card) = self.smart_card.as_mut()
        {
            if let Some(value) = card.read(address) {
                return value;
            }
            if card.rom_exit(address) {
                let value = self.memory.read(address);
                self.memory.load_rom(&self.default_rom);
                tracing::debug!("SmartCard ROM switched out at {address:#06X}");
                return value;
            }
        }

        self.debug.hit(address, BreakpointKind::Read);
        self.memory.read(address)
    }

    fn write(&mut self, address: u16, value: u8, tstates: u32) {
        if address < 0x4000 {
            if let Some(card) = self.smart_card.as_mut() {
                card.write(address, value);
            }
            return;
        }

        if self.memory.displays(address) {
            self.sync_display(tstates, self.info.paper_drawing_offset);
        }
        self.debug.hit(address, BreakpointKind::Write);
        self.memory.write(address, value);
    }

    fn memory_contention(&mut self, address: u16, tstates: u32) -> u32 {
        if self.memory.contended_page(address) {
            self.contention.memory_delay(tstates)
        } else {
            0
        }
    }

    fn io_contention(&mut self, port: u16, tstates: u32) -> u32 {
        self.contention
            .io_cycle(port, self.memory.contended_page(port), tstates)
    }

    fn io_read(&mut self, port: u16, tstates: u32) -> u8 {
        if port & 0x01 == 0 {
            let ear = self.ear || self.tape_input();
            let keys = self.keyboard.read((port >> 8) as u8);
            return (keys & 0xBF) | (u8::from(ear) << 6);
        }

        // Joystick wins over everything else sharing its decode.
        if self.kempston_fitted && port & 0xFF == 0x1F {
            return self.kempston;
        }

        if port & 0xC002 == 0xC000
            && let Some(ay) = &self.ay
        {
            return ay.read_data();
        }

        if SmartCard::claims(port)
            && let Some(value) = self.smart_card.as_ref().and_then(|card| card.io_read(port))
        {
            return value;
        }

        self.floating.predict(tstates, self.memory.screen())
    }

    fn io_write(&mut self, port: u16, value: u8, tstates: u32) {
        // Port $FE
        //   7   6   5   4   3   2   1   0
        // +---+---+---+---+---+-----------+
        // |   |   |   | E | M |  BORDER   |
        // +---+---+---+---+---+-----------+
        if port & 0x01 == 0 {
            self.sync_display(tstates, self.info.border_drawing_offset);
            self.sync_audio(tstates);
            self.ear = value & 0x10 != 0;
            self.mic = value & 0x08 != 0;
            self.display.set_border(value & 0x07);
        }

        if port & 0x8002 == 0 && self.memory.paging_enabled() {
            self.sync_display(tstates, self.info.paper_drawing_offset);
            self.memory.write_bank_register(value);
            tracing::debug!(
                "7FFD <- {value:#04X}: bank {}, ROM {}, screen {}, locked {}",
                value & 0x07,
                (value >> 4) & 1,
                if value & 0x08 != 0 { 7 } else { 5 },
                value & 0x20 != 0
            );
        }

        if port & 0xC002 == 0xC000
            && let Some(ay) = self.ay.as_mut()
        {
            ay.set_register(value);
        }

        if port & 0xC002 == 0x8000 && self.ay.is_some() {
            self.sync_audio(tstates);
            if let Some(ay) = self.ay.as_mut() {
                ay.write_data(value);
            }
        }

        if port & 0xFF == 0xDF && self.dac.is_some() {
            self.sync_audio(tstates);
            self.dac = Some(value);
        }

        if SmartCard::claims(port)
            && let Some(card) = self.smart_card.as_mut()
        {
            card.io_write(port, value);
        }
    }

    fn opcode_fetched(&mut self, address: u16, opcode: u8) -> bool {
        if self.resume_at.take() == Some(address) {
            return false;
        }

        if self.debug.hit(address, BreakpointKind::Execute) {
            self.pending = Some((Stop::Breakpoint, address));
            return true;
        }

        if let Some(kind) = self.trap_at(address, opcode) {
            tracing::debug!("{kind:?} trap at {address:#06X}");
            self.pending = Some((Stop::Trap(kind), address));
            return true;
        }

        false
    }

    fn debug_read(&self, address: u16) -> u8 {
        self.memory.read(address)
    }

    fn debug_write(&mut self, address: u16, value: u8) {
        self.memory.poke(address, value);
    }
}
