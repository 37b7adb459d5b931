//! Memory and I/O bus seen by the CPU.

/// Memory and I/O bus interface for a Z80.
///
/// Every call receives the CPU's T-state counter at the moment of the
/// access, relative to the start of the current frame. Contention is
/// reported separately from the access so the CPU can fold the delay into
/// its own counter before the access completes.
pub trait Z80Bus {
    /// Read a byte from memory.
    fn read(&mut self, address: u16, tstates: u32) -> u8;

    /// Write a byte to memory.
    fn write(&mut self, address: u16, value: u8, tstates: u32);

    /// Extra T-states a memory access at `tstates` is held for.
    fn memory_contention(&mut self, address: u16, tstates: u32) -> u32;

    /// Total length of an I/O cycle starting at `tstates`, including the
    /// four base T-states and any contention.
    fn io_contention(&mut self, port: u16, tstates: u32) -> u32;

    /// Read from an I/O port.
    fn io_read(&mut self, port: u16, tstates: u32) -> u8;

    /// Write to an I/O port.
    fn io_write(&mut self, port: u16, value: u8, tstates: u32);

    /// Called after an opcode is fetched and before it executes.
    ///
    /// Returning `true` tells the CPU to skip the instruction's side effects.
    /// This is where fast-load traps and execute breakpoints live.
    fn opcode_fetched(&mut self, address: u16, opcode: u8) -> bool {
        let _ = (address, opcode);
        false
    }

    /// Read memory without contention, breakpoints or side effects.
    fn debug_read(&self, address: u16) -> u8;

    /// Write memory without contention or breakpoints. May write ROM.
    fn debug_write(&mut self, address: u16, value: u8);
}
