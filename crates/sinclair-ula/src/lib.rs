//! Sinclair ULA timing model.
//!
//! The ULA decides three things the CPU can observe: how long a memory or
//! I/O access is held off (contention), what the TV picture looks like at
//! every T-state (display), and what value an unattached port read returns
//! (floating bus). All three are driven by the same per-model geometry in
//! [`MachineInfo`].
//!
//! # Standalone IC
//!
//! No memory model lives here. Callers hand the engine the 16K display page
//! as a byte slice, so the same code serves the 48K (bank 5 at $4000) and the
//! 128K (bank 5 or 7, shadow screen).
//!
//! # Screen memory layout
//!
//! Bitmap at offset 0 (6144 bytes), attributes at offset 6144 (768 bytes).
//! Bitmap offset: `0 0 0 Y7 Y6 Y2 Y1 Y0 | Y5 Y4 Y3 X4 X3 X2 X1 X0`
//! Attribute offset: `0 0 0 1 1 0 Y7 Y6 | Y5 Y4 Y3 X4 X3 X2 X1 X0`
//!
//! # Contention (48K)
//!
//! From T-state 14,335 the ULA fetches screen data for 128 T-states of every
//! 224-T-state line, 192 times. Inside that window memory access is delayed
//! by `[6, 5, 4, 3, 2, 1, 0, 0]` depending on the low three bits of the
//! offset.

mod contention;
mod display;
mod floating_bus;
mod machine_info;
mod palette;
mod screen;

pub use contention::{CONTENTION_PATTERN, ContentionTables};
pub use display::Display;
pub use floating_bus::{BusFetch, FloatingBus};
pub use machine_info::MachineInfo;
pub use palette::PALETTE;
pub use screen::{ATTR_OFFSET, SCREEN_BYTES, attr_offset, pixel_offset};
