//! Top-level Spectrum system.
//!
//! The CPU is supplied by the host and driven one instruction at a time
//! through [`Z80Cpu`]. Everything else the machine owns through the bus.
//!
//! # Frame loop
//!
//! `generate_frame()` executes instructions until the CPU's T-state counter
//! reaches the frame length, handing trapped tape routines to the tape
//! handler on the way. At the boundary the display and audio engines finish
//! the frame and rewind together, the CPU counter moves back by one frame
//! (keeping any overrun) and the interrupt is raised.
//!
//! An execute breakpoint whose callback asks to stop ends the call early.
//! The next call picks the frame up where it stopped and runs the
//! instruction at the breakpoint.

use emu_core::{Observable, Registers, Value, Z80Cpu};
use sinclair_ula::MachineInfo;

use crate::bus::{SpectrumBus, Stop};
use crate::config::{SpectrumConfig, SpectrumModel};
use crate::debug::{BreakpointKind, DebugCallback};
use crate::error::SpectrumError;
use crate::input::{Modifier, SpectrumKey};
use crate::tape::{TapeHandler, TrapKind};

/// How a call to [`Spectrum::generate_frame`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// The frame ran to the end and the interrupt was raised.
    Complete,
    /// An execute breakpoint stopped the frame before this address ran.
    Breakpoint(u16),
    /// The machine is paused; nothing ran.
    Paused,
}

/// Check a ROM image against the model, padding a short one with $FF.
pub(crate) fn prepare_rom(model: SpectrumModel, rom: &[u8]) -> Result<Vec<u8>, SpectrumError> {
    let expected = model.rom_size();
    if rom.is_empty() {
        return Err(SpectrumError::EmptyRom);
    }
    if rom.len() > expected {
        return Err(SpectrumError::RomTooLarge {
            expected,
            actual: rom.len(),
        });
    }
    let mut image = rom.to_vec();
    if image.len() < expected {
        tracing::warn!(
            "ROM image is {} bytes, padding to {expected} with $FF",
            image.len()
        );
        image.resize(expected, 0xFF);
    }
    Ok(image)
}

/// ZX Spectrum system.
pub struct Spectrum<C: Z80Cpu> {
    cpu: C,
    bus: SpectrumBus,
    model: SpectrumModel,
    smart_card_rom: Option<Vec<u8>>,
    paused: bool,
    /// Completed frame counter.
    frame_count: u64,
}

impl<C: Z80Cpu> Spectrum<C> {
    /// Build a machine around `cpu` and power it on.
    pub fn new(cpu: C, config: &SpectrumConfig) -> Result<Self, SpectrumError> {
        let rom = prepare_rom(config.model, &config.rom)?;
        let smart_card_rom = match &config.smart_card_rom {
            Some(_) if config.model != SpectrumModel::Spectrum48K => {
                return Err(SpectrumError::SmartCardModel);
            }
            Some(card) => Some(prepare_rom(SpectrumModel::Spectrum48K, card)?),
            None => None,
        };

        let mut spectrum = Self {
            cpu,
            bus: SpectrumBus::new(config, rom),
            model: config.model,
            smart_card_rom,
            paused: false,
            frame_count: 0,
        };
        spectrum.reset(true);
        tracing::info!(
            "{:?} created: AY {}, SpecDrum {}, SmartCard {}, instant load {}",
            config.model,
            config.has_ay(),
            config.specdrum,
            config.smart_card_rom.is_some(),
            config.instant_load
        );
        Ok(spectrum)
    }

    /// Reset the machine. A hard reset is a power cycle: RAM cleared and the
    /// stock ROM paged back in.
    pub fn reset(&mut self, hard: bool) {
        self.bus.reset(hard);
        self.bus.keyboard.release_all();
        self.cpu.reset(hard);
        tracing::info!("{:?} {} reset", self.model, if hard { "hard" } else { "soft" });
    }

    /// Run until the end of the frame, or until a breakpoint stops it.
    pub fn generate_frame(&mut self) -> FrameStatus {
        if self.paused {
            return FrameStatus::Paused;
        }

        let info = *self.bus.info();
        while self.cpu.tstates() < info.ts_per_frame {
            self.cpu.execute(&mut self.bus, info.int_length);

            match self.bus.take_stop() {
                None => {}
                Some((Stop::Breakpoint, addr)) => {
                    self.bus.resume_at(addr);
                    return FrameStatus::Breakpoint(addr);
                }
                Some((Stop::Trap(kind), addr)) => self.run_trap(kind, addr),
            }
        }

        self.bus.end_frame();
        self.cpu.reset_tstates(info.ts_per_frame);
        self.cpu.signal_interrupt();
        self.frame_count += 1;
        FrameStatus::Complete
    }

    fn run_trap(&mut self, kind: TrapKind, addr: u16) {
        let Some(tape) = self.bus.tape.as_mut() else {
            self.bus.resume_at(addr);
            return;
        };

        let mut regs = self.cpu.registers();
        let handled = match kind {
            TrapKind::Load => tape.load_block(&mut regs, self.bus.memory.as_mut()),
            TrapKind::Save => tape.save_block(&mut regs, self.bus.memory.as_ref()),
        };
        if handled {
            self.cpu.set_registers(&regs);
        } else {
            self.bus.resume_at(addr);
        }
    }

    /// Stop `generate_frame` from running until [`Spectrum::resume`].
    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Run `f` with the engines held still, restoring the pause state after.
    pub(crate) fn paused<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let was_paused = self.paused;
        self.paused = true;
        let result = f(self);
        self.paused = was_paused;
        result
    }

    /// Replace the stock ROM. Short images are padded with $FF.
    pub fn load_rom(&mut self, rom: &[u8]) -> Result<(), SpectrumError> {
        let image = prepare_rom(self.model, rom)?;
        self.bus.replace_rom(image);
        Ok(())
    }

    /// Page the SmartCard's snapshot loader ROM in and soft reset into it.
    pub fn reset_to_snapshot_rom(&mut self) -> Result<(), SpectrumError> {
        let Some(rom) = &self.smart_card_rom else {
            return Err(SpectrumError::NoSmartCard);
        };
        self.bus.memory.load_rom(rom);
        self.reset(false);
        Ok(())
    }

    pub fn key_down(&mut self, key: SpectrumKey) {
        self.bus.keyboard.key_down(key);
    }

    pub fn key_up(&mut self, key: SpectrumKey) {
        self.bus.keyboard.key_up(key);
    }

    /// Host modifier change: Shift is Caps Shift, Ctrl and Alt are Symbol
    /// Shift.
    pub fn modifier_changed(&mut self, modifier: Modifier, pressed: bool) {
        self.bus.keyboard.modifier_changed(modifier, pressed);
    }

    pub fn release_all_keys(&mut self) {
        self.bus.keyboard.release_all();
    }

    /// Kempston state: bits 0-4 = right, left, down, up, fire.
    pub fn set_joystick(&mut self, state: u8) {
        self.bus.kempston = state & 0x1F;
    }

    pub fn add_breakpoint(&mut self, addr: u16, kind: BreakpointKind) {
        self.bus.debug.add(addr, kind);
    }

    pub fn remove_breakpoint(&mut self, addr: u16, kind: BreakpointKind) {
        self.bus.debug.remove(addr, kind);
    }

    pub fn clear_breakpoints(&mut self) {
        self.bus.debug.clear();
    }

    /// Register the breakpoint callback, or remove it with `None`.
    pub fn set_debug_callback(&mut self, callback: Option<DebugCallback>) {
        self.bus.debug.set_callback(callback);
    }

    /// Attach the tape deck the fast-load traps and the EAR input use.
    pub fn attach_tape(&mut self, tape: Box<dyn TapeHandler>) {
        self.bus.tape = Some(tape);
    }

    pub fn detach_tape(&mut self) -> Option<Box<dyn TapeHandler>> {
        self.bus.tape.take()
    }

    pub fn set_instant_load(&mut self, enabled: bool) {
        self.bus.instant_load = enabled;
    }

    /// Frame buffer, one `0xAABBGGRR` pixel per entry.
    #[must_use]
    pub fn framebuffer(&self) -> &[u32] {
        self.bus.display.framebuffer()
    }

    #[must_use]
    pub fn framebuffer_width(&self) -> u32 {
        self.bus.display.width()
    }

    #[must_use]
    pub fn framebuffer_height(&self) -> u32 {
        self.bus.display.height()
    }

    /// Interleaved stereo samples of the last completed frame.
    #[must_use]
    pub fn audio_frame(&self) -> Option<&[i16]> {
        self.bus.audio.completed_frame()
    }

    /// Increments once per published audio frame.
    #[must_use]
    pub fn last_audio_index(&self) -> u64 {
        self.bus.audio.last_completed_index()
    }

    #[must_use]
    pub fn model(&self) -> SpectrumModel {
        self.model
    }

    #[must_use]
    pub fn info(&self) -> &MachineInfo {
        self.bus.info()
    }

    /// Completed frame count.
    #[must_use]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    #[must_use]
    pub fn cpu(&self) -> &C {
        &self.cpu
    }

    pub fn cpu_mut(&mut self) -> &mut C {
        &mut self.cpu
    }

    #[must_use]
    pub fn bus(&self) -> &SpectrumBus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut SpectrumBus {
        &mut self.bus
    }

    /// Split borrow for snapshot code that moves state between the two.
    pub(crate) fn parts(&mut self) -> (&mut C, &mut SpectrumBus) {
        (&mut self.cpu, &mut self.bus)
    }
}

fn register(regs: &Registers, name: &str) -> Option<Value> {
    let value: Value = match name {
        "a" => regs.a.into(),
        "f" => regs.f.into(),
        "b" => regs.b.into(),
        "c" => regs.c.into(),
        "d" => regs.d.into(),
        "e" => regs.e.into(),
        "h" => regs.h.into(),
        "l" => regs.l.into(),
        "af" => regs.af().into(),
        "bc" => regs.bc().into(),
        "de" => regs.de().into(),
        "hl" => regs.hl().into(),
        "af'" => regs.af_alt().into(),
        "bc'" => regs.bc_alt().into(),
        "de'" => regs.de_alt().into(),
        "hl'" => regs.hl_alt().into(),
        "ix" => regs.ix.into(),
        "iy" => regs.iy.into(),
        "sp" => regs.sp.into(),
        "pc" => regs.pc.into(),
        "i" => regs.i.into(),
        "r" => regs.r.into(),
        "iff1" => regs.iff1.into(),
        "iff2" => regs.iff2.into(),
        "im" => regs.im.into(),
        _ => return None,
    };
    Some(value)
}

fn parse_address(text: &str) -> Option<u16> {
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u16::from_str_radix(hex, 16).ok()
    } else if let Some(hex) = text.strip_prefix('$') {
        u16::from_str_radix(hex, 16).ok()
    } else {
        text.parse().ok()
    }
}

impl<C: Z80Cpu> Observable for Spectrum<C> {
    fn query(&self, path: &str) -> Option<Value> {
        if let Some(rest) = path.strip_prefix("cpu.") {
            match rest {
                "tstates" => Some(self.cpu.tstates().into()),
                _ => register(&self.cpu.registers(), rest),
            }
        } else if let Some(rest) = path.strip_prefix("display.") {
            let display = &self.bus.display;
            match rest {
                "border" => Some(display.border().into()),
                "cursor" => Some(display.cursor().into()),
                "frame" => Some(display.frame_counter().into()),
                _ => None,
            }
        } else if let Some(rest) = path.strip_prefix("memory.") {
            parse_address(rest).map(|addr| Value::U8(self.bus.memory.read(addr)))
        } else if let Some(rest) = path.strip_prefix("ay.") {
            let ay = self.bus.ay.as_ref()?;
            match rest {
                "selected" => Some(ay.selected_register().into()),
                _ => {
                    let index: usize = rest.parse().ok()?;
                    ay.registers().get(index).map(|&v| Value::U8(v))
                }
            }
        } else {
            match path {
                "paging" => Some(self.bus.memory.bank_register().into()),
                "ear" => Some(self.bus.ear().into()),
                "frame_count" => Some(self.frame_count.into()),
                "audio_index" => Some(self.last_audio_index().into()),
                "paused" => Some(self.paused.into()),
                "model" => Some(match self.model {
                    SpectrumModel::Spectrum48K => "48K",
                    SpectrumModel::Spectrum128K => "128K",
                }
                .into()),
                _ => None,
            }
        }
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "cpu.<register>",
            "cpu.tstates",
            "display.border",
            "display.cursor",
            "display.frame",
            "memory.<address>",
            "ay.selected",
            "ay.<0-15>",
            "paging",
            "ear",
            "frame_count",
            "audio_index",
            "paused",
            "model",
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emu_core::testing::ScriptedCpu;

    fn make_spectrum(rom: Vec<u8>) -> Spectrum<ScriptedCpu> {
        let config = SpectrumConfig::new(SpectrumModel::Spectrum48K, rom);
        Spectrum::new(ScriptedCpu::new(), &config).expect("valid ROM")
    }

    fn halting_rom() -> Vec<u8> {
        // DI ; HALT
        let mut rom = vec![0u8; 0x4000];
        rom[0] = 0xF3;
        rom[1] = 0x76;
        rom
    }

    #[test]
    fn rom_size_is_checked() {
        let config = SpectrumConfig::new(SpectrumModel::Spectrum48K, Vec::new());
        assert!(matches!(
            Spectrum::new(ScriptedCpu::new(), &config),
            Err(SpectrumError::EmptyRom)
        ));

        let config = SpectrumConfig::new(SpectrumModel::Spectrum48K, vec![0; 0x4001]);
        assert!(matches!(
            Spectrum::new(ScriptedCpu::new(), &config),
            Err(SpectrumError::RomTooLarge { expected: 0x4000, actual: 0x4001 })
        ));
    }

    #[test]
    fn short_rom_is_padded() {
        let spec = make_spectrum(vec![0xF3]);
        assert_eq!(spec.query("memory.0x0000"), Some(Value::U8(0xF3)));
        assert_eq!(spec.query("memory.$3FFF"), Some(Value::U8(0xFF)));
    }

    #[test]
    fn smart_card_needs_a_48k() {
        let config = SpectrumConfig::new(SpectrumModel::Spectrum128K, vec![0; 0x8000])
            .with_smart_card(vec![0; 0x4000]);
        assert!(matches!(
            Spectrum::new(ScriptedCpu::new(), &config),
            Err(SpectrumError::SmartCardModel)
        ));
    }

    #[test]
    fn reset_to_snapshot_rom_needs_a_card() {
        let mut spec = make_spectrum(halting_rom());
        assert!(matches!(spec.reset_to_snapshot_rom(), Err(SpectrumError::NoSmartCard)));
    }

    #[test]
    fn reset_to_snapshot_rom_pages_the_card_rom() {
        let config = SpectrumConfig::new(SpectrumModel::Spectrum48K, halting_rom())
            .with_smart_card(vec![0xAA; 0x4000]);
        let mut spec = Spectrum::new(ScriptedCpu::new(), &config).expect("valid ROMs");
        spec.reset_to_snapshot_rom().expect("card fitted");
        assert_eq!(spec.query("memory.0"), Some(Value::U8(0xAA)));

        spec.reset(true);
        assert_eq!(spec.query("memory.0"), Some(Value::U8(0xF3)));
    }

    #[test]
    fn frame_runs_to_length_and_raises_interrupt() {
        let mut spec = make_spectrum(halting_rom());
        assert_eq!(spec.generate_frame(), FrameStatus::Complete);
        assert_eq!(spec.frame_count(), 1);
        assert!(spec.cpu().tstates() < 8, "overrun carried into the next frame");
        assert_eq!(spec.last_audio_index(), 1);
        assert_eq!(spec.bus().display.cursor(), 0);
    }

    #[test]
    fn paused_machine_does_not_run() {
        let mut spec = make_spectrum(halting_rom());
        spec.pause();
        assert!(spec.is_paused());
        assert_eq!(spec.generate_frame(), FrameStatus::Paused);
        assert_eq!(spec.frame_count(), 0);
        spec.resume();
        assert_eq!(spec.generate_frame(), FrameStatus::Complete);
    }

    #[test]
    fn paused_section_restores_state() {
        let mut spec = make_spectrum(halting_rom());
        let inside = spec.paused(|s| s.is_paused());
        assert!(inside);
        assert!(!spec.is_paused());
    }

    #[test]
    fn keyboard_reaches_the_port() {
        use emu_core::Z80Bus;
        let mut spec = make_spectrum(halting_rom());
        spec.key_down(SpectrumKey::A);
        assert_eq!(spec.bus_mut().io_read(0xFDFE, 0) & 0x01, 0);
        spec.key_up(SpectrumKey::A);
        assert_eq!(spec.bus_mut().io_read(0xFDFE, 0) & 0x01, 1);
    }

    #[test]
    fn observable_paths() {
        let mut spec = make_spectrum(halting_rom());
        assert_eq!(spec.query("cpu.pc"), Some(Value::U16(0)));
        assert_eq!(spec.query("display.border"), Some(Value::U8(7)));
        assert_eq!(spec.query("memory.0x0000"), Some(Value::U8(0xF3)));
        assert_eq!(spec.query("memory.16384"), Some(Value::U8(0)));
        assert_eq!(spec.query("ay.selected"), None);
        assert_eq!(spec.query("nonsense"), None);
        assert_eq!(spec.query("model"), Some(Value::Text("48K")));

        spec.bus_mut().memory.write(0x8000, 0xAB);
        assert_eq!(spec.query("memory.$8000"), Some(Value::U8(0xAB)));
    }
}
