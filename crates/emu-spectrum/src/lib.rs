//! Cycle-accurate ZX Spectrum 48K and 128K machine.
//!
//! The CPU is an external collaborator plugged in through
//! [`emu_core::Z80Cpu`]. This crate supplies the bus it runs against:
//! contended memory and I/O, the display and audio engines kept in step
//! with every write, the keyboard matrix, 128K paging, fast-load tape
//! traps, the SmartCard overlay and debugger breakpoints. Snapshots load
//! and save in SNA and Z80 format.
//!
//! ```no_run
//! # use emu_core::testing::ScriptedCpu as MyZ80;
//! use emu_spectrum::{FrameStatus, Spectrum, SpectrumConfig, SpectrumModel};
//!
//! let rom = std::fs::read("48.rom")?;
//! let config = SpectrumConfig::new(SpectrumModel::Spectrum48K, rom);
//! let mut spectrum = Spectrum::new(MyZ80::new(), &config)?;
//! while spectrum.generate_frame() == FrameStatus::Complete {
//!     let _pixels = spectrum.framebuffer();
//!     let _samples = spectrum.audio_frame();
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod audio;
mod bus;
#[cfg(feature = "capture")]
pub mod capture;
mod config;
mod debug;
mod error;
pub mod input;
mod keyboard;
mod memory;
mod smart_card;
mod snapshot;
mod spectrum;
pub mod tape;

pub use audio::{AudioEngine, Sources};
pub use bus::{SpectrumBus, Stop};
pub use config::{SpectrumConfig, SpectrumModel, TapeTraps};
pub use debug::{BreakpointKind, DebugCallback, Debugger};
pub use error::SpectrumError;
pub use format_z80::{EncodeOptions, Version as Z80Version};
pub use gi_ay_3_8910::StereoMode;
pub use input::{Modifier, SpectrumKey};
pub use keyboard::KeyboardState;
pub use memory::{Memory48K, Memory128K, PAGE_SIZE, SpectrumMemory};
pub use smart_card::SmartCard;
pub use snapshot::{SnapshotFormat, snapshot_model};
pub use spectrum::{FrameStatus, Spectrum};
pub use tape::{BlockTape, TapeHandler, TrapKind};
