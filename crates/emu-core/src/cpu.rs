//! CPU collaborator contract.

use crate::{Registers, Z80Bus};

/// A Z80 core driven one instruction at a time.
///
/// The machine never looks inside the CPU. It runs instructions, reads and
/// replaces the register file for snapshots, and keeps the T-state counter
/// aligned with the frame.
pub trait Z80Cpu {
    /// Execute one instruction (or accept a pending interrupt).
    ///
    /// `int_length` is how many T-states into the frame the interrupt line
    /// stays asserted. Returns the T-states consumed, contention included.
    fn execute<B: Z80Bus + ?Sized>(&mut self, bus: &mut B, int_length: u32) -> u32;

    /// Copy of the register file.
    fn registers(&self) -> Registers;

    /// Replace the register file.
    fn set_registers(&mut self, regs: &Registers);

    /// T-states elapsed since the start of the frame.
    fn tstates(&self) -> u32;

    /// Overwrite the T-state counter.
    fn set_tstates(&mut self, tstates: u32);

    /// Assert the maskable interrupt at the start of a frame.
    fn signal_interrupt(&mut self);

    /// Reset the CPU. A hard reset also clears the register file.
    fn reset(&mut self, hard: bool);

    /// Move the counter back by one frame, keeping any overrun.
    fn reset_tstates(&mut self, frame_length: u32) {
        let t = self.tstates();
        self.set_tstates(t.saturating_sub(frame_length));
    }
}
