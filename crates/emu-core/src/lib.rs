//! Core traits and types for T-state accurate Spectrum emulation.
//!
//! The CPU is an external collaborator. It sees the machine only through
//! [`Z80Bus`], and the machine drives it only through [`Z80Cpu`]. Every
//! timing decision is expressed in CPU T-states.

mod bus;
mod cpu;
mod observable;
mod registers;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use bus::Z80Bus;
pub use cpu::Z80Cpu;
pub use observable::{Observable, Value};
pub use registers::Registers;
