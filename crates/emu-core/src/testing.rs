//! A scripted Z80 for exercising buses without a real CPU core.
//!
//! Implements just enough of the instruction set to drive memory, I/O and
//! interrupt timing from tests: loads and stores through A, port I/O, jumps,
//! calls, HALT and IM 1 interrupts. Unknown opcodes behave as NOP. Every
//! memory and I/O access goes through the bus contention hooks exactly as a
//! real core would report them.

use crate::{Registers, Z80Bus, Z80Cpu};

/// Minimal instruction-stepped Z80.
#[derive(Debug, Default, Clone)]
pub struct ScriptedCpu {
    pub regs: Registers,
    tstates: u32,
    halted: bool,
    int_pending: bool,
    /// Opcodes executed since the last reset, for assertions.
    pub executed: u64,
}

impl ScriptedCpu {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True while parked on a HALT.
    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.halted
    }

    fn read<B: Z80Bus + ?Sized>(&mut self, bus: &mut B, address: u16) -> u8 {
        self.tstates += bus.memory_contention(address, self.tstates);
        let value = bus.read(address, self.tstates);
        self.tstates += 3;
        value
    }

    fn write<B: Z80Bus + ?Sized>(&mut self, bus: &mut B, address: u16, value: u8) {
        self.tstates += bus.memory_contention(address, self.tstates);
        bus.write(address, value, self.tstates);
        self.tstates += 3;
    }

    fn imm8<B: Z80Bus + ?Sized>(&mut self, bus: &mut B) -> u8 {
        let value = self.read(bus, self.regs.pc);
        self.regs.pc = self.regs.pc.wrapping_add(1);
        value
    }

    fn imm16<B: Z80Bus + ?Sized>(&mut self, bus: &mut B) -> u16 {
        let lo = self.imm8(bus);
        let hi = self.imm8(bus);
        u16::from_le_bytes([lo, hi])
    }

    fn push<B: Z80Bus + ?Sized>(&mut self, bus: &mut B, value: u16) {
        let [hi, lo] = value.to_be_bytes();
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        self.write(bus, self.regs.sp, hi);
        self.regs.sp = self.regs.sp.wrapping_sub(1);
        self.write(bus, self.regs.sp, lo);
    }

    fn pop<B: Z80Bus + ?Sized>(&mut self, bus: &mut B) -> u16 {
        let lo = self.read(bus, self.regs.sp);
        self.regs.sp = self.regs.sp.wrapping_add(1);
        let hi = self.read(bus, self.regs.sp);
        self.regs.sp = self.regs.sp.wrapping_add(1);
        u16::from_le_bytes([lo, hi])
    }

    fn port_in<B: Z80Bus + ?Sized>(&mut self, bus: &mut B, port: u16) -> u8 {
        self.tstates += bus.io_contention(port, self.tstates);
        bus.io_read(port, self.tstates)
    }

    fn port_out<B: Z80Bus + ?Sized>(&mut self, bus: &mut B, port: u16, value: u8) {
        self.tstates += bus.io_contention(port, self.tstates);
        bus.io_write(port, value, self.tstates);
    }

    fn accept_interrupt<B: Z80Bus + ?Sized>(&mut self, bus: &mut B) {
        self.int_pending = false;
        if self.halted {
            self.halted = false;
            self.regs.pc = self.regs.pc.wrapping_add(1);
        }
        self.regs.iff1 = false;
        self.regs.iff2 = false;
        self.tstates += 7;
        self.push(bus, self.regs.pc);
        self.regs.pc = 0x0038;
    }
}

impl Z80Cpu for ScriptedCpu {
    fn execute<B: Z80Bus + ?Sized>(&mut self, bus: &mut B, int_length: u32) -> u32 {
        let start = self.tstates;

        if self.int_pending {
            if self.tstates >= int_length {
                self.int_pending = false;
            } else if self.regs.iff1 {
                self.accept_interrupt(bus);
                return self.tstates - start;
            }
        }

        let pc = self.regs.pc;
        self.tstates += bus.memory_contention(pc, self.tstates);
        let opcode = bus.read(pc, self.tstates);
        self.tstates += 4;
        self.regs.r = (self.regs.r & 0x80) | (self.regs.r.wrapping_add(1) & 0x7F);

        if bus.opcode_fetched(pc, opcode) {
            return self.tstates - start;
        }

        self.executed += 1;
        if self.halted {
            return self.tstates - start;
        }
        self.regs.pc = pc.wrapping_add(1);

        match opcode {
            // LD BC,nn
            0x01 => {
                let value = self.imm16(bus);
                self.regs.set_bc(value);
            }
            // JR e
            0x18 => {
                let offset = self.imm8(bus) as i8;
                self.regs.pc = self.regs.pc.wrapping_add_signed(i16::from(offset));
                self.tstates += 5;
            }
            // LD (nn),A
            0x32 => {
                let address = self.imm16(bus);
                self.write(bus, address, self.regs.a);
            }
            // LD A,(nn)
            0x3A => {
                let address = self.imm16(bus);
                self.regs.a = self.read(bus, address);
            }
            // LD A,n
            0x3E => self.regs.a = self.imm8(bus),
            // HALT
            0x76 => {
                self.halted = true;
                self.regs.pc = pc;
            }
            // JP nn
            0xC3 => self.regs.pc = self.imm16(bus),
            // RET
            0xC9 => self.regs.pc = self.pop(bus),
            // CALL nn
            0xCD => {
                let target = self.imm16(bus);
                self.tstates += 1;
                self.push(bus, self.regs.pc);
                self.regs.pc = target;
            }
            // OUT (n),A
            0xD3 => {
                let n = self.imm8(bus);
                let port = u16::from_be_bytes([self.regs.a, n]);
                self.port_out(bus, port, self.regs.a);
            }
            // IN A,(n)
            0xDB => {
                let n = self.imm8(bus);
                let port = u16::from_be_bytes([self.regs.a, n]);
                self.regs.a = self.port_in(bus, port);
            }
            0xED => {
                let sub = self.imm8(bus);
                self.tstates += 1;
                match sub {
                    // IN A,(C)
                    0x78 => self.regs.a = self.port_in(bus, self.regs.bc()),
                    // OUT (C),A
                    0x79 => self.port_out(bus, self.regs.bc(), self.regs.a),
                    _ => {}
                }
            }
            0xF3 => {
                self.regs.iff1 = false;
                self.regs.iff2 = false;
            }
            0xFB => {
                self.regs.iff1 = true;
                self.regs.iff2 = true;
            }
            _ => {}
        }

        self.tstates - start
    }

    fn registers(&self) -> Registers {
        self.regs
    }

    fn set_registers(&mut self, regs: &Registers) {
        self.regs = *regs;
        self.halted = false;
    }

    fn tstates(&self) -> u32 {
        self.tstates
    }

    fn set_tstates(&mut self, tstates: u32) {
        self.tstates = tstates;
    }

    fn signal_interrupt(&mut self) {
        self.int_pending = true;
    }

    fn reset(&mut self, hard: bool) {
        if hard {
            self.regs = Registers::default();
        }
        self.regs.pc = 0;
        self.regs.iff1 = false;
        self.regs.iff2 = false;
        self.regs.im = 0;
        self.halted = false;
        self.int_pending = false;
        self.tstates = 0;
        self.executed = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Flat 64K RAM with a fixed per-access delay below 0x8000.
    struct FlatBus {
        mem: Vec<u8>,
        delay: u32,
        outs: Vec<(u16, u8, u32)>,
    }

    impl FlatBus {
        fn new(program: &[u8]) -> Self {
            let mut mem = vec![0; 0x1_0000];
            mem[..program.len()].copy_from_slice(program);
            Self { mem, delay: 0, outs: Vec::new() }
        }
    }

    impl Z80Bus for FlatBus {
        fn read(&mut self, address: u16, _tstates: u32) -> u8 {
            self.mem[address as usize]
        }
        fn write(&mut self, address: u16, value: u8, _tstates: u32) {
            self.mem[address as usize] = value;
        }
        fn memory_contention(&mut self, address: u16, _tstates: u32) -> u32 {
            if address >= 0x8000 { 0 } else { self.delay }
        }
        fn io_contention(&mut self, _port: u16, _tstates: u32) -> u32 {
            4
        }
        fn io_read(&mut self, port: u16, _tstates: u32) -> u8 {
            (port >> 8) as u8
        }
        fn io_write(&mut self, port: u16, value: u8, tstates: u32) {
            self.outs.push((port, value, tstates));
        }
        fn debug_read(&self, address: u16) -> u8 {
            self.mem[address as usize]
        }
        fn debug_write(&mut self, address: u16, value: u8) {
            self.mem[address as usize] = value;
        }
    }

    #[test]
    fn load_store_and_out() {
        // LD A,7 ; LD (0x9000),A ; OUT (0xFE),A
        let mut bus = FlatBus::new(&[0x3E, 0x07, 0x32, 0x00, 0x90, 0xD3, 0xFE]);
        let mut cpu = ScriptedCpu::new();

        assert_eq!(cpu.execute(&mut bus, 32), 7);
        assert_eq!(cpu.execute(&mut bus, 32), 13);
        assert_eq!(bus.mem[0x9000], 7);
        assert_eq!(cpu.execute(&mut bus, 32), 11);
        assert_eq!(bus.outs, vec![(0x07FE, 7, 24)]);
    }

    #[test]
    fn contention_is_added_per_access() {
        let mut bus = FlatBus::new(&[0x00]);
        bus.delay = 2;
        let mut cpu = ScriptedCpu::new();
        assert_eq!(cpu.execute(&mut bus, 32), 6);
        assert_eq!(cpu.tstates(), 6);
    }

    #[test]
    fn interrupt_wakes_halt_and_vectors_to_0038() {
        // EI ; HALT
        let mut bus = FlatBus::new(&[0xFB, 0x76]);
        let mut cpu = ScriptedCpu::new();
        cpu.regs.sp = 0xFFF0;
        cpu.execute(&mut bus, 32);
        cpu.execute(&mut bus, 32);
        assert!(cpu.is_halted());

        cpu.set_tstates(0);
        cpu.signal_interrupt();
        cpu.execute(&mut bus, 32);
        assert!(!cpu.is_halted());
        assert_eq!(cpu.regs.pc, 0x0038);
        assert_eq!(bus.mem[0xFFEE], 0x02);
    }

    #[test]
    fn reset_tstates_keeps_overrun() {
        let mut cpu = ScriptedCpu::new();
        cpu.set_tstates(69_891);
        cpu.reset_tstates(69_888);
        assert_eq!(cpu.tstates(), 3);
    }
}
