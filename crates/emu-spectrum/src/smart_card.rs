//! Retroleum SmartCard.
//!
//! Two write/read ports and 64K of SRAM in eight 8K banks, overlaid on the
//! top half of the ROM ($2000-$3FFF) when enabled:
//!
//! | Port  | Bit | Meaning                    |
//! |-------|-----|----------------------------|
//! | $FAF3 | 7   | SRAM overlay enable        |
//! | $FAF3 | 0-2 | SRAM bank                  |
//! | $FAFB | 6   | SmartCard ROM switched in  |
//!
//! The card's snapshot loader ROM hands control back by fetching from an
//! address whose low byte is $72. The machine swaps the stock ROM back in at
//! that point.

const SRAM_BANK_SIZE: usize = 0x2000;
const SRAM_BANKS: usize = 8;
const SRAM_BASE: u16 = 0x2000;

pub const PORT_CONTROL: u16 = 0xFAF3;
pub const PORT_ROM: u16 = 0xFAFB;

const SRAM_ENABLE: u8 = 0x80;
const ROM_SWITCH_OUT: u8 = 0x40;

/// Low byte of the fetch address that returns to the stock ROM.
const ROM_EXIT_LOW_BYTE: u8 = 0x72;

pub struct SmartCard {
    control: u8,
    rom_select: u8,
    sram: Box<[u8]>,
}

impl SmartCard {
    #[must_use]
    pub fn new() -> Self {
        Self {
            control: 0,
            rom_select: 0,
            sram: vec![0; SRAM_BANKS * SRAM_BANK_SIZE].into_boxed_slice(),
        }
    }

    /// Is `port` one of the card's two ports?
    #[must_use]
    pub fn claims(port: u16) -> bool {
        port == PORT_CONTROL || port == PORT_ROM
    }

    #[must_use]
    pub fn io_read(&self, port: u16) -> Option<u8> {
        match port {
            PORT_CONTROL => Some(self.control),
            PORT_ROM => Some(self.rom_select & 0x7F),
            _ => None,
        }
    }

    pub fn io_write(&mut self, port: u16, value: u8) {
        match port {
            PORT_CONTROL => {
                tracing::debug!("SmartCard control <- {value:#04X}");
                self.control = value;
            }
            PORT_ROM => {
                tracing::debug!("SmartCard ROM select <- {value:#04X}");
                self.rom_select = value;
            }
            _ => {}
        }
    }

    fn sram_index(&self, addr: u16) -> Option<usize> {
        if self.control & SRAM_ENABLE == 0 || !(SRAM_BASE..0x4000).contains(&addr) {
            return None;
        }
        let bank = (self.control & 0x07) as usize;
        Some(bank * SRAM_BANK_SIZE + usize::from(addr - SRAM_BASE))
    }

    /// Overlay read for a ROM address.
    #[must_use]
    pub fn read(&self, addr: u16) -> Option<u8> {
        self.sram_index(addr).map(|i| self.sram[i])
    }

    /// Overlay write for a ROM address. Returns false when the SRAM is
    /// paged out and the write falls through to ROM (and is ignored).
    pub fn write(&mut self, addr: u16, value: u8) -> bool {
        match self.sram_index(addr) {
            Some(i) => {
                self.sram[i] = value;
                true
            }
            None => false,
        }
    }

    /// A ROM fetch at `addr` is about to happen. Returns true when this
    /// fetch exits the card's ROM; both card flags are cleared.
    pub fn rom_exit(&mut self, addr: u16) -> bool {
        if addr >= 0x4000
            || addr as u8 != ROM_EXIT_LOW_BYTE
            || self.rom_select & ROM_SWITCH_OUT == 0
        {
            return false;
        }
        self.disable();
        true
    }

    /// Page out the SRAM and switch the card ROM out.
    pub fn disable(&mut self) {
        self.rom_select &= !ROM_SWITCH_OUT;
        self.control &= !SRAM_ENABLE;
    }
}

impl Default for SmartCard {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sram_overlay_follows_enable_and_bank() {
        let mut card = SmartCard::new();
        assert!(!card.write(0x2000, 1));
        assert_eq!(card.read(0x2000), None);

        card.io_write(PORT_CONTROL, 0x83);
        assert!(card.write(0x2000, 0xAA));
        assert_eq!(card.read(0x2000), Some(0xAA));
        assert_eq!(card.read(0x1FFF), None);

        card.io_write(PORT_CONTROL, 0x84);
        assert_eq!(card.read(0x2000), Some(0));
        card.io_write(PORT_CONTROL, 0x83);
        assert_eq!(card.read(0x2000), Some(0xAA));
    }

    #[test]
    fn rom_port_reads_back_masked() {
        let mut card = SmartCard::new();
        card.io_write(PORT_ROM, 0xFF);
        assert_eq!(card.io_read(PORT_ROM), Some(0x7F));
        assert_eq!(card.io_read(0x00FE), None);
        assert!(SmartCard::claims(PORT_CONTROL));
        assert!(!SmartCard::claims(0xFAF7));
    }

    #[test]
    fn fetch_at_72_exits_card_rom() {
        let mut card = SmartCard::new();
        card.io_write(PORT_CONTROL, 0x80);
        assert!(!card.rom_exit(0x0072), "ROM not switched in");

        card.io_write(PORT_ROM, ROM_SWITCH_OUT);
        assert!(!card.rom_exit(0x0073));
        assert!(!card.rom_exit(0x4072), "RAM fetches never exit");
        assert!(card.rom_exit(0x1172));
        assert_eq!(card.io_read(PORT_ROM), Some(0));
        assert_eq!(card.io_read(PORT_CONTROL), Some(0));
    }
}
