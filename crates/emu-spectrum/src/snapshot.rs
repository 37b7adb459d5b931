//! Snapshot glue between the machine and the SNA and Z80 codecs.
//!
//! Every operation runs with the machine paused. Loads decode the whole file
//! before touching the machine, so a bad file leaves it exactly as it was.
//! After a load the display and audio engines restart from the top of a
//! frame with the display's drawn-cell cache cleared.

use std::fs;
use std::path::Path;

use emu_core::{Registers, Z80Cpu};
use format_sna::SnaSnapshot;
use format_z80::{AyState, EncodeOptions, SnapshotModel, Z80Snapshot};

use crate::config::SpectrumModel;
use crate::error::SpectrumError;
use crate::memory::PAGE_SIZE;
use crate::spectrum::Spectrum;

/// 128K paging value that presents a 48K memory map: RAM 5/2/0, 48 BASIC
/// ROM, locked.
const PAGING_48K: u8 = 0x30;

/// Snapshot container, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotFormat {
    Sna,
    Z80,
}

impl SnapshotFormat {
    pub fn from_path(path: &Path) -> Result<Self, SpectrumError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("sna") => Ok(Self::Sna),
            Some("z80") => Ok(Self::Z80),
            _ => Err(SpectrumError::UnknownFormat(path.to_path_buf())),
        }
    }
}

impl From<SnapshotModel> for SpectrumModel {
    fn from(model: SnapshotModel) -> Self {
        match model {
            SnapshotModel::Spectrum48K => Self::Spectrum48K,
            SnapshotModel::Spectrum128K => Self::Spectrum128K,
        }
    }
}

impl From<SpectrumModel> for SnapshotModel {
    fn from(model: SpectrumModel) -> Self {
        match model {
            SpectrumModel::Spectrum48K => Self::Spectrum48K,
            SpectrumModel::Spectrum128K => Self::Spectrum128K,
        }
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, SpectrumError> {
    let data = fs::read(path).map_err(|source| SpectrumError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if data.is_empty() {
        return Err(SpectrumError::EmptyFile(path.to_path_buf()));
    }
    Ok(data)
}

/// The machine a snapshot file needs, without loading it.
pub fn snapshot_model(path: &Path) -> Result<SpectrumModel, SpectrumError> {
    let format = SnapshotFormat::from_path(path)?;
    let data = read_file(path)?;
    match format {
        SnapshotFormat::Sna => {
            format_sna::parse(&data)?;
            Ok(SpectrumModel::Spectrum48K)
        }
        SnapshotFormat::Z80 => Ok(format_z80::detect_model(&data)?.into()),
    }
}

impl<C: Z80Cpu> Spectrum<C> {
    /// Save the machine as a 48K SNA image.
    pub fn create_sna(&mut self) -> Result<Vec<u8>, SpectrumError> {
        if self.model() != SpectrumModel::Spectrum48K {
            return Err(SpectrumError::SnaRequires48K);
        }
        self.paused(|spectrum| -> Result<Vec<u8>, SpectrumError> {
            let snapshot = SnaSnapshot {
                registers: spectrum.cpu().registers(),
                border: spectrum.bus().display.border(),
                ram: spectrum.bus().memory.ram_image(),
            };
            let bytes = format_sna::encode(&snapshot)?;
            tracing::info!("created SNA snapshot");
            Ok(bytes)
        })
    }

    /// Load a 48K SNA image. A 128K machine is paged to its 48K layout.
    pub fn load_sna(&mut self, data: &[u8]) -> Result<(), SpectrumError> {
        let snapshot = format_sna::parse(data)?;
        self.paused(|spectrum| {
            spectrum.restore_48k_ram(&snapshot.ram);
            spectrum.restore(&snapshot.registers, snapshot.border, 0);
        });
        tracing::info!("loaded SNA snapshot on {:?}", self.model());
        Ok(())
    }

    /// Save the machine as a Z80 image.
    pub fn create_z80(&mut self, options: EncodeOptions) -> Result<Vec<u8>, SpectrumError> {
        let model = SnapshotModel::from(self.model());
        self.paused(|spectrum| -> Result<Vec<u8>, SpectrumError> {
            let (cpu, bus) = spectrum.parts();
            let frame_length = bus.info().ts_per_frame;
            let snapshot = Z80Snapshot {
                version: options.version,
                hardware: 0,
                model,
                registers: cpu.registers(),
                border: bus.display.border(),
                port_7ffd: bus.memory.bank_register(),
                ay: bus.ay.as_ref().map(|ay| AyState {
                    selected: ay.selected_register(),
                    registers: ay.registers(),
                }),
                tstate_counter: Some(format_z80::encode_tstates(cpu.tstates(), frame_length)),
                ram: bus.memory.ram_image(),
            };
            let bytes = format_z80::encode(&snapshot, options)?;
            tracing::info!(
                "created Z80 v{} snapshot ({:?}, {} bytes)",
                options.version.number(),
                model,
                bytes.len()
            );
            Ok(bytes)
        })
    }

    /// Load a Z80 image. 48K images also load on a 128K; 128K images need a
    /// 128K.
    pub fn load_z80(&mut self, data: &[u8]) -> Result<(), SpectrumError> {
        let snapshot = format_z80::parse(data)?;
        let needed = SpectrumModel::from(snapshot.model);
        let machine = self.model();
        if needed == SpectrumModel::Spectrum128K && machine != SpectrumModel::Spectrum128K {
            return Err(SpectrumError::ModelMismatch { needed, machine });
        }

        self.paused(|spectrum| {
            let frame_length = spectrum.info().ts_per_frame;
            match snapshot.model {
                SnapshotModel::Spectrum48K => spectrum.restore_48k_ram(&snapshot.ram),
                SnapshotModel::Spectrum128K => {
                    let memory = &mut spectrum.bus_mut().memory;
                    memory.load_ram_image(&snapshot.ram);
                    memory.restore_bank_register(snapshot.port_7ffd);
                }
            }

            let bus = spectrum.bus_mut();
            if let (Some(ay), Some(state)) = (bus.ay.as_mut(), snapshot.ay.as_ref()) {
                ay.load_registers(&state.registers, state.selected);
            }

            let tstates = snapshot
                .tstate_counter
                .map_or(0, |(low, high)| format_z80::decode_tstates(low, high, frame_length));
            spectrum.restore(&snapshot.registers, snapshot.border, tstates);
        });
        tracing::info!(
            "loaded Z80 v{} snapshot ({}) on {:?}",
            snapshot.version.number(),
            format_z80::hardware_name(snapshot.version, snapshot.hardware),
            self.model()
        );
        Ok(())
    }

    /// Load a `.sna` or `.z80` file, chosen by extension.
    pub fn load_snapshot_file(&mut self, path: &Path) -> Result<(), SpectrumError> {
        let format = SnapshotFormat::from_path(path)?;
        let data = read_file(path)?;
        match format {
            SnapshotFormat::Sna => self.load_sna(&data),
            SnapshotFormat::Z80 => self.load_z80(&data),
        }
    }

    /// Write a 48K image from $4000. On a 128K this pages in the 48K layout
    /// first.
    fn restore_48k_ram(&mut self, ram: &[u8]) {
        let paged = self.model() == SpectrumModel::Spectrum128K;
        let memory = &mut self.bus_mut().memory;
        if paged {
            memory.restore_bank_register(PAGING_48K);
        }
        for (offset, &byte) in ram.iter().enumerate().take(3 * PAGE_SIZE) {
            memory.poke(PAGE_SIZE as u16 + offset as u16, byte);
        }
    }

    fn restore(&mut self, regs: &Registers, border: u8, tstates: u32) {
        let (cpu, bus) = self.parts();
        cpu.set_registers(regs);
        cpu.set_tstates(tstates);
        bus.set_ear(false);
        bus.display.set_border(border);
        bus.display.clear();
        bus.display.frame_reset();
        bus.audio.reset();
    }
}
