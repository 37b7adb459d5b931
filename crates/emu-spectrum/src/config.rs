//! Machine configuration.

use gi_ay_3_8910::StereoMode;
use sinclair_ula::MachineInfo;

/// Supported Spectrum models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpectrumModel {
    Spectrum48K,
    /// 128K and +2: two ROMs, eight RAM banks, AY as standard.
    Spectrum128K,
}

impl SpectrumModel {
    /// Timing and geometry for this model.
    #[must_use]
    pub fn info(self) -> MachineInfo {
        match self {
            Self::Spectrum48K => MachineInfo::SPECTRUM_48K,
            Self::Spectrum128K => MachineInfo::SPECTRUM_128K,
        }
    }

    /// Bytes of ROM the model maps.
    #[must_use]
    pub fn rom_size(self) -> usize {
        match self {
            Self::Spectrum48K => 0x4000,
            Self::Spectrum128K => 0x8000,
        }
    }
}

/// ROM addresses intercepted for instant tape loading and saving.
///
/// Each entry is an `(address, opcode)` pair. A trap fires only when the
/// fetched opcode matches, so a pair never triggers on a ROM that has
/// different code at that address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TapeTraps {
    pub load: Vec<(u16, u8)>,
    pub save: Vec<(u16, u8)>,
}

impl TapeTraps {
    /// `RET NZ` inside LD-BYTES and its 128K copy.
    pub const STANDARD_LOAD: [(u16, u8); 2] = [(0x056B, 0xC0), (0x0111, 0xC0)];

    /// `EX AF,AF'` at the start of SA-BYTES.
    pub const STANDARD_SAVE: [(u16, u8); 1] = [(0x04D0, 0x08)];

    /// Traps for the stock Sinclair ROMs.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            load: Self::STANDARD_LOAD.to_vec(),
            save: Self::STANDARD_SAVE.to_vec(),
        }
    }

    /// No traps at all.
    #[must_use]
    pub fn none() -> Self {
        Self {
            load: Vec::new(),
            save: Vec::new(),
        }
    }

    /// Standard traps that match the code actually present in `rom`.
    ///
    /// The ROM is searched in 16K pages, so a 128K image keeps a trap if
    /// either ROM holds the expected opcode at that address.
    #[must_use]
    pub fn for_rom(rom: &[u8]) -> Self {
        let present = |&(address, opcode): &(u16, u8)| {
            rom.chunks(0x4000)
                .any(|page| page.get(usize::from(address)) == Some(&opcode))
        };
        Self {
            load: Self::STANDARD_LOAD.into_iter().filter(present).collect(),
            save: Self::STANDARD_SAVE.into_iter().filter(present).collect(),
        }
    }
}

impl Default for TapeTraps {
    fn default() -> Self {
        Self::standard()
    }
}

/// Configuration for creating a Spectrum instance.
#[derive(Debug, Clone)]
pub struct SpectrumConfig {
    pub model: SpectrumModel,
    /// ROM image: 16K for the 48K, 32K (ROM 0 then ROM 1) for the 128K.
    pub rom: Vec<u8>,
    /// Retroleum SmartCard ROM. Enables the SmartCard on a 48K.
    pub smart_card_rom: Option<Vec<u8>>,
    /// Hand LD-BYTES to the tape handler instead of running it.
    pub instant_load: bool,
    /// Fit an AY to a 48K.
    pub ay_on_48k: bool,
    /// SpecDrum DAC on port $DF.
    pub specdrum: bool,
    /// Kempston joystick on port $1F.
    pub kempston: bool,
    pub sample_rate: u32,
    pub frames_per_second: u32,
    pub stereo: StereoMode,
    pub traps: TapeTraps,
}

impl SpectrumConfig {
    #[must_use]
    pub fn new(model: SpectrumModel, rom: Vec<u8>) -> Self {
        Self {
            model,
            rom,
            smart_card_rom: None,
            instant_load: true,
            ay_on_48k: false,
            specdrum: false,
            kempston: true,
            sample_rate: 44_100,
            frames_per_second: 50,
            stereo: StereoMode::default(),
            traps: TapeTraps::standard(),
        }
    }

    #[must_use]
    pub fn with_smart_card(mut self, rom: Vec<u8>) -> Self {
        self.smart_card_rom = Some(rom);
        self
    }

    #[must_use]
    pub fn with_instant_load(mut self, enabled: bool) -> Self {
        self.instant_load = enabled;
        self
    }

    #[must_use]
    pub fn with_ay(mut self, enabled: bool) -> Self {
        self.ay_on_48k = enabled;
        self
    }

    #[must_use]
    pub fn with_specdrum(mut self, enabled: bool) -> Self {
        self.specdrum = enabled;
        self
    }

    #[must_use]
    pub fn with_kempston(mut self, enabled: bool) -> Self {
        self.kempston = enabled;
        self
    }

    #[must_use]
    pub fn with_audio(mut self, sample_rate: u32, frames_per_second: u32) -> Self {
        self.sample_rate = sample_rate;
        self.frames_per_second = frames_per_second;
        self
    }

    #[must_use]
    pub fn with_stereo(mut self, mode: StereoMode) -> Self {
        self.stereo = mode;
        self
    }

    #[must_use]
    pub fn with_traps(mut self, traps: TapeTraps) -> Self {
        self.traps = traps;
        self
    }

    /// Whether this configuration has an AY.
    #[must_use]
    pub fn has_ay(&self) -> bool {
        self.model.info().has_ay || self.ay_on_48k
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn for_rom_keeps_only_matching_traps() {
        let mut rom = vec![0u8; 0x4000];
        rom[0x056B] = 0xC0;
        rom[0x04D0] = 0x08;
        let traps = TapeTraps::for_rom(&rom);
        assert_eq!(traps.load, vec![(0x056B, 0xC0)]);
        assert_eq!(traps.save, vec![(0x04D0, 0x08)]);

        assert_eq!(TapeTraps::for_rom(&[0; 0x4000]), TapeTraps::none());
    }

    #[test]
    fn for_rom_searches_both_128k_roms() {
        let mut rom = vec![0u8; 0x8000];
        rom[0x4000 + 0x056B] = 0xC0;
        rom[0x0111] = 0xC0;
        let traps = TapeTraps::for_rom(&rom);
        assert_eq!(traps.load, TapeTraps::STANDARD_LOAD.to_vec());
    }

    #[test]
    fn builders_set_fields() {
        let config = SpectrumConfig::new(SpectrumModel::Spectrum48K, vec![0; 0x4000])
            .with_ay(true)
            .with_audio(48_000, 50)
            .with_stereo(StereoMode::Mono)
            .with_instant_load(false);
        assert!(config.has_ay());
        assert_eq!(config.sample_rate, 48_000);
        assert_eq!(config.stereo, StereoMode::Mono);
        assert!(!config.instant_load);
    }
}
