//! Spectrum memory subsystem.
//!
//! Memory layout varies by model. The trait abstracts banking and contention
//! differences so the bus doesn't need to know which model is active.

use sinclair_ula::SCREEN_BYTES;

/// Bytes per 16K page.
pub const PAGE_SIZE: usize = 0x4000;

/// Memory interface for all Spectrum variants.
///
/// Implementations handle ROM/RAM layout, banking and contended-page
/// identification. The display engine sees only [`SpectrumMemory::screen`],
/// the 16K page currently being displayed.
pub trait SpectrumMemory {
    /// Read a byte from the CPU's view of memory.
    fn read(&self, addr: u16) -> u8;

    /// Write a byte. ROM writes are silently ignored.
    fn write(&mut self, addr: u16, val: u8);

    /// Write a byte, ROM included.
    fn poke(&mut self, addr: u16, val: u8);

    /// Is this address in contended RAM?
    ///
    /// For 48K: $4000-$7FFF is contended.
    /// For 128K: banks 1, 3, 5, 7 are contended ($4000 always maps to bank 5).
    fn contended_page(&self, addr: u16) -> bool;

    /// Write the paging register ($7FFD). Ignored once locked, and on 48K.
    fn write_bank_register(&mut self, _value: u8) {}

    /// Set the paging register regardless of the lock, e.g. from a snapshot.
    /// Bit 5 of `value` re-locks.
    fn restore_bank_register(&mut self, _value: u8) {}

    /// Last value written to the paging register.
    fn bank_register(&self) -> u8 {
        0
    }

    /// Whether the paging register still accepts writes.
    fn paging_enabled(&self) -> bool {
        false
    }

    /// The 16K RAM page the ULA is displaying.
    fn screen(&self) -> &[u8];

    /// Does a write to `addr` land in the displayed bitmap or attributes?
    fn displays(&self, addr: u16) -> bool;

    /// Replace the ROM contents. `rom` is already the exact model size.
    fn load_rom(&mut self, rom: &[u8]);

    /// All RAM in snapshot order: 48K from $4000, or banks 0-7.
    fn ram_image(&self) -> Vec<u8>;

    /// Inverse of [`SpectrumMemory::ram_image`]. Short images leave the
    /// remainder untouched.
    fn load_ram_image(&mut self, image: &[u8]);

    /// Power-on paging state.
    fn reset_paging(&mut self) {}
}

/// 48K Spectrum memory: 16K ROM + 48K RAM.
///
/// Layout:
/// - $0000-$3FFF: ROM (writes ignored)
/// - $4000-$7FFF: Contended RAM (shared with ULA)
/// - $8000-$FFFF: Uncontended RAM
pub struct Memory48K {
    rom: Box<[u8]>,
    ram: Box<[u8]>,
}

impl Memory48K {
    /// Create a new 48K memory with the given ROM data.
    #[must_use]
    pub fn new(rom: &[u8]) -> Self {
        let mut memory = Self {
            rom: vec![0; PAGE_SIZE].into_boxed_slice(),
            ram: vec![0; 3 * PAGE_SIZE].into_boxed_slice(),
        };
        memory.load_rom(rom);
        memory
    }
}

impl SpectrumMemory for Memory48K {
    fn read(&self, addr: u16) -> u8 {
        let addr = addr as usize;
        if addr < PAGE_SIZE {
            self.rom[addr]
        } else {
            self.ram[addr - PAGE_SIZE]
        }
    }

    fn write(&mut self, addr: u16, val: u8) {
        let addr = addr as usize;
        if addr >= PAGE_SIZE {
            self.ram[addr - PAGE_SIZE] = val;
        }
    }

    fn poke(&mut self, addr: u16, val: u8) {
        let addr = addr as usize;
        if addr < PAGE_SIZE {
            self.rom[addr] = val;
        } else {
            self.ram[addr - PAGE_SIZE] = val;
        }
    }

    fn contended_page(&self, addr: u16) -> bool {
        (0x4000..0x8000).contains(&addr)
    }

    fn screen(&self) -> &[u8] {
        &self.ram[..PAGE_SIZE]
    }

    fn displays(&self, addr: u16) -> bool {
        (0x4000..0x4000 + SCREEN_BYTES as u16).contains(&addr)
    }

    fn load_rom(&mut self, rom: &[u8]) {
        let len = rom.len().min(PAGE_SIZE);
        self.rom[..len].copy_from_slice(&rom[..len]);
    }

    fn ram_image(&self) -> Vec<u8> {
        self.ram.to_vec()
    }

    fn load_ram_image(&mut self, image: &[u8]) {
        let len = image.len().min(self.ram.len());
        self.ram[..len].copy_from_slice(&image[..len]);
    }
}

/// 128K Spectrum memory: 2×16K ROM + 8×16K RAM with bank switching.
///
/// Layout:
/// - $0000-$3FFF: ROM bank 0 or 1 (bit 4 of $7FFD)
/// - $4000-$7FFF: Always RAM bank 5 (contended)
/// - $8000-$BFFF: Always RAM bank 2
/// - $C000-$FFFF: Switchable RAM bank 0-7 (bits 0-2 of $7FFD)
///
/// Bit 3 of $7FFD selects the shadow screen (bank 7 instead of bank 5).
/// Bit 5 of $7FFD locks the bank register (cannot be changed until reset).
pub struct Memory128K {
    rom: [Box<[u8]>; 2],
    ram: [Box<[u8]>; 8],
    /// $7FFD register value.
    bank_reg: u8,
    /// Once bit 5 is set, further writes to $7FFD are ignored.
    locked: bool,
}

impl Memory128K {
    /// Create a new 128K memory with the given 32K ROM data.
    ///
    /// ROM 0 (128K editor) comes first, ROM 1 (48K BASIC) at offset $4000.
    #[must_use]
    pub fn new(rom: &[u8]) -> Self {
        let mut memory = Self {
            rom: std::array::from_fn(|_| vec![0; PAGE_SIZE].into_boxed_slice()),
            ram: std::array::from_fn(|_| vec![0; PAGE_SIZE].into_boxed_slice()),
            bank_reg: 0,
            locked: false,
        };
        memory.load_rom(rom);
        memory
    }

    /// Selected ROM bank (0 or 1).
    fn rom_bank(&self) -> usize {
        ((self.bank_reg >> 4) & 1) as usize
    }

    /// Selected RAM bank at $C000 (0-7).
    fn page_bank(&self) -> usize {
        (self.bank_reg & 0x07) as usize
    }

    fn screen_bank(&self) -> usize {
        if self.bank_reg & 0x08 != 0 { 7 } else { 5 }
    }

    /// RAM bank and offset behind a CPU address, or `None` for ROM.
    fn ram_slot(&self, addr: u16) -> Option<(usize, usize)> {
        let a = addr as usize;
        match a {
            0x0000..0x4000 => None,
            0x4000..0x8000 => Some((5, a - 0x4000)),
            0x8000..0xC000 => Some((2, a - 0x8000)),
            _ => Some((self.page_bank(), a - 0xC000)),
        }
    }
}

impl SpectrumMemory for Memory128K {
    fn read(&self, addr: u16) -> u8 {
        match self.ram_slot(addr) {
            Some((bank, offset)) => self.ram[bank][offset],
            None => self.rom[self.rom_bank()][addr as usize],
        }
    }

    fn write(&mut self, addr: u16, val: u8) {
        if let Some((bank, offset)) = self.ram_slot(addr) {
            self.ram[bank][offset] = val;
        }
    }

    fn poke(&mut self, addr: u16, val: u8) {
        match self.ram_slot(addr) {
            Some((bank, offset)) => self.ram[bank][offset] = val,
            None => {
                let bank = self.rom_bank();
                self.rom[bank][addr as usize] = val;
            }
        }
    }

    fn contended_page(&self, addr: u16) -> bool {
        match addr {
            0x4000..0x8000 => true,
            0xC000..=0xFFFF => self.page_bank() & 1 != 0,
            _ => false,
        }
    }

    fn write_bank_register(&mut self, value: u8) {
        if !self.locked {
            self.bank_reg = value;
            self.locked = value & 0x20 != 0;
        }
    }

    fn restore_bank_register(&mut self, value: u8) {
        self.bank_reg = value;
        self.locked = value & 0x20 != 0;
    }

    fn bank_register(&self) -> u8 {
        self.bank_reg
    }

    fn paging_enabled(&self) -> bool {
        !self.locked
    }

    fn screen(&self) -> &[u8] {
        &self.ram[self.screen_bank()]
    }

    fn displays(&self, addr: u16) -> bool {
        self.ram_slot(addr)
            .is_some_and(|(bank, offset)| bank == self.screen_bank() && offset < SCREEN_BYTES)
    }

    fn load_rom(&mut self, rom: &[u8]) {
        for (bank, data) in self.rom.iter_mut().zip(rom.chunks(PAGE_SIZE)) {
            bank[..data.len()].copy_from_slice(data);
        }
    }

    fn ram_image(&self) -> Vec<u8> {
        self.ram.concat()
    }

    fn load_ram_image(&mut self, image: &[u8]) {
        for (bank, data) in self.ram.iter_mut().zip(image.chunks(PAGE_SIZE)) {
            bank[..data.len()].copy_from_slice(data);
        }
    }

    fn reset_paging(&mut self) {
        self.bank_reg = 0;
        self.locked = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_rom() -> Vec<u8> {
        let mut rom = vec![0u8; 0x4000];
        rom[0] = 0xF3; // DI
        rom[1] = 0xAF; // XOR A
        rom[0x3FFF] = 0x42;
        rom
    }

    #[test]
    fn read_rom() {
        let mem = Memory48K::new(&make_rom());
        assert_eq!(mem.read(0x0000), 0xF3);
        assert_eq!(mem.read(0x0001), 0xAF);
        assert_eq!(mem.read(0x3FFF), 0x42);
    }

    #[test]
    fn rom_writes_ignored_but_poke_lands() {
        let mut mem = Memory48K::new(&make_rom());
        mem.write(0x0000, 0x00);
        assert_eq!(mem.read(0x0000), 0xF3);
        mem.poke(0x0000, 0x00);
        assert_eq!(mem.read(0x0000), 0x00);
    }

    #[test]
    fn ram_read_write() {
        let mut mem = Memory48K::new(&make_rom());
        mem.write(0x4000, 0xAB);
        assert_eq!(mem.read(0x4000), 0xAB);
        mem.write(0xFFFF, 0xCD);
        assert_eq!(mem.read(0xFFFF), 0xCD);
        assert_eq!(mem.screen()[0], 0xAB);
    }

    #[test]
    fn contended_page_48k() {
        let mem = Memory48K::new(&make_rom());
        assert!(!mem.contended_page(0x0000));
        assert!(!mem.contended_page(0x3FFF));
        assert!(mem.contended_page(0x4000));
        assert!(mem.contended_page(0x7FFF));
        assert!(!mem.contended_page(0x8000));
        assert!(!mem.contended_page(0xFFFF));
    }

    #[test]
    fn display_file_bounds_48k() {
        let mem = Memory48K::new(&make_rom());
        assert!(!mem.displays(0x3FFF));
        assert!(mem.displays(0x4000));
        assert!(mem.displays(0x5AFF));
        assert!(!mem.displays(0x5B00));
    }

    #[test]
    fn ram_image_round_trip_48k() {
        let mut mem = Memory48K::new(&make_rom());
        let image: Vec<u8> = (0..0xC000).map(|i| (i * 7) as u8).collect();
        mem.load_ram_image(&image);
        assert_eq!(mem.read(0x4001), 7);
        assert_eq!(mem.ram_image(), image);
    }

    // --- 128K Memory tests ---

    fn make_128k_rom() -> Vec<u8> {
        let mut rom = vec![0u8; 0x8000];
        rom[0] = 0xAA; // ROM 0 first byte
        rom[0x4000] = 0xBB; // ROM 1 first byte
        rom
    }

    #[test]
    fn memory_128k_rom_switching() {
        let mut mem = Memory128K::new(&make_128k_rom());
        assert_eq!(mem.read(0x0000), 0xAA);

        mem.write_bank_register(0x10);
        assert_eq!(mem.read(0x0000), 0xBB);

        mem.write_bank_register(0x00);
        assert_eq!(mem.read(0x0000), 0xAA);
    }

    #[test]
    fn memory_128k_bank_switching() {
        let mut mem = Memory128K::new(&make_128k_rom());

        mem.write(0xC000, 0x11);
        assert_eq!(mem.read(0xC000), 0x11);

        mem.write_bank_register(0x03);
        assert_eq!(mem.read(0xC000), 0x00);
        mem.write(0xC000, 0x33);

        mem.write_bank_register(0x00);
        assert_eq!(mem.read(0xC000), 0x11);
    }

    #[test]
    fn memory_128k_fixed_banks() {
        let mut mem = Memory128K::new(&make_128k_rom());
        mem.write(0x4000, 0x55);
        mem.write(0x8000, 0x22);

        mem.write_bank_register(0x07);
        assert_eq!(mem.read(0x4000), 0x55);
        assert_eq!(mem.read(0x8000), 0x22);

        // Bank 5 paged in at $C000 aliases $4000.
        mem.write_bank_register(0x05);
        assert_eq!(mem.read(0xC000), 0x55);
    }

    #[test]
    fn memory_128k_lock_bit() {
        let mut mem = Memory128K::new(&make_128k_rom());
        mem.write_bank_register(0x03);
        mem.write(0xC000, 0x33);

        mem.write_bank_register(0x23);
        assert!(!mem.paging_enabled());

        mem.write_bank_register(0x00);
        assert_eq!(mem.read(0xC000), 0x33, "bank should still be 3 (locked)");

        mem.restore_bank_register(0x00);
        assert!(mem.paging_enabled());
        assert_eq!(mem.read(0xC000), 0x00);

        mem.write_bank_register(0x23);
        mem.reset_paging();
        assert!(mem.paging_enabled());
        assert_eq!(mem.bank_register(), 0);
    }

    #[test]
    fn memory_128k_contended_pages() {
        let mut mem = Memory128K::new(&make_128k_rom());
        assert!(mem.contended_page(0x4000));
        assert!(mem.contended_page(0x7FFF));
        assert!(!mem.contended_page(0x0000));
        assert!(!mem.contended_page(0x8000));

        mem.write_bank_register(0x00);
        assert!(!mem.contended_page(0xC000));
        mem.write_bank_register(0x01);
        assert!(mem.contended_page(0xC000));
        mem.write_bank_register(0x07);
        assert!(mem.contended_page(0xC000));
    }

    #[test]
    fn memory_128k_shadow_screen() {
        let mut mem = Memory128K::new(&make_128k_rom());
        mem.write(0x4000, 0x55);

        mem.write_bank_register(0x07);
        mem.write(0xC000, 0x77);

        // Bank 7 paged at $C000 is not on screen until selected.
        assert!(!mem.displays(0xC000));
        assert_eq!(mem.screen()[0], 0x55);

        mem.write_bank_register(0x0F);
        assert_eq!(mem.screen()[0], 0x77);
        assert!(mem.displays(0xC000));
        assert!(!mem.displays(0x4000));
    }

    #[test]
    fn memory_128k_ram_image_is_bank_ordered() {
        let mut mem = Memory128K::new(&make_128k_rom());
        let mut image = vec![0u8; 8 * PAGE_SIZE];
        for (bank, page) in image.chunks_mut(PAGE_SIZE).enumerate() {
            page[0] = bank as u8 + 1;
        }
        mem.load_ram_image(&image);
        assert_eq!(mem.read(0x4000), 6); // bank 5
        assert_eq!(mem.read(0x8000), 3); // bank 2
        assert_eq!(mem.read(0xC000), 1); // bank 0
        assert_eq!(mem.ram_image(), image);
    }
}
