//! Tape collaborator seen by the ROM fast-load traps.
//!
//! Tape files and signal playback live outside the machine. The machine
//! samples one input bit on keyboard reads and, when a trap fires, hands the
//! handler the register file and memory so it can move a whole block at
//! once.
//!
//! Both standard traps sit inside the ROM routines after `SA/LD-RET` has
//! been pushed, so a handler finishes by setting carry for success and
//! popping that return address with [`pop_return`].

use emu_core::Registers;

use crate::memory::SpectrumMemory;

/// Which ROM routine a trap intercepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrapKind {
    Load,
    Save,
}

/// External tape deck.
pub trait TapeHandler {
    /// Level on the EAR input.
    fn input_bit(&self) -> bool {
        false
    }

    /// Load the next block into memory.
    ///
    /// On entry the expected flag byte is in A', LOAD/VERIFY in the carry of
    /// F', the length in DE and the destination in IX. Return `false` to let
    /// the ROM routine run normally.
    fn load_block(&mut self, regs: &mut Registers, memory: &mut dyn SpectrumMemory) -> bool;

    /// Save a block from memory.
    ///
    /// On entry the flag byte is in A, the length in DE and the source in
    /// IX. Return `false` to let the ROM routine run normally.
    fn save_block(&mut self, regs: &mut Registers, memory: &dyn SpectrumMemory) -> bool;
}

const CARRY: u8 = 0x01;

/// Pop the return address off the emulated stack into PC.
pub fn pop_return(regs: &mut Registers, memory: &dyn SpectrumMemory) {
    let sp = regs.sp;
    let lo = memory.read(sp);
    let hi = memory.read(sp.wrapping_add(1));
    regs.sp = sp.wrapping_add(2);
    regs.pc = u16::from_le_bytes([lo, hi]);
}

/// In-memory tape of raw blocks: flag byte, data, then XOR parity.
///
/// Blocks are consumed in order by loads. Saves append to a separate list.
#[derive(Debug, Clone, Default)]
pub struct BlockTape {
    blocks: Vec<Vec<u8>>,
    next: usize,
    saved: Vec<Vec<u8>>,
}

impl BlockTape {
    #[must_use]
    pub fn new(blocks: Vec<Vec<u8>>) -> Self {
        Self {
            blocks,
            next: 0,
            saved: Vec::new(),
        }
    }

    /// Build a block from a flag and data, appending the parity byte.
    #[must_use]
    pub fn block(flag: u8, data: &[u8]) -> Vec<u8> {
        let mut block = Vec::with_capacity(data.len() + 2);
        block.push(flag);
        block.extend_from_slice(data);
        block.push(block.iter().fold(0, |acc, b| acc ^ b));
        block
    }

    pub fn rewind(&mut self) {
        self.next = 0;
    }

    /// Index of the next block a load will read.
    #[must_use]
    pub fn position(&self) -> usize {
        self.next
    }

    /// Blocks written by save traps.
    #[must_use]
    pub fn saved(&self) -> &[Vec<u8>] {
        &self.saved
    }
}

impl TapeHandler for BlockTape {
    fn load_block(&mut self, regs: &mut Registers, memory: &mut dyn SpectrumMemory) -> bool {
        let Some(block) = self.blocks.get(self.next) else {
            return false;
        };
        self.next += 1;

        let expected = regs.a_alt;
        let loading = regs.f_alt & CARRY != 0;
        let wanted = usize::from(regs.de());
        let data = block.get(1..).unwrap_or_default();

        let mut ok = block.first() == Some(&expected);
        if ok {
            let count = wanted.min(data.len());
            for (i, &byte) in data[..count].iter().enumerate() {
                let addr = regs.ix.wrapping_add(i as u16);
                if loading {
                    memory.write(addr, byte);
                } else if memory.read(addr) != byte {
                    ok = false;
                    break;
                }
            }
            let parity = block.iter().fold(0u8, |acc, b| acc ^ b);
            ok &= data.len() > wanted && parity == 0;
            regs.ix = regs.ix.wrapping_add(count as u16);
            regs.set_de((wanted - count) as u16);
        }

        tracing::debug!("tape load: block {}, {wanted} bytes, ok {ok}", self.next - 1);
        if ok {
            regs.f |= CARRY;
        } else {
            regs.f &= !CARRY;
        }
        pop_return(regs, memory);
        true
    }

    fn save_block(&mut self, regs: &mut Registers, memory: &dyn SpectrumMemory) -> bool {
        let len = regs.de();
        let data: Vec<u8> = (0..len)
            .map(|i| memory.read(regs.ix.wrapping_add(i)))
            .collect();
        self.saved.push(Self::block(regs.a, &data));
        tracing::debug!("tape save: flag {:#04X}, {len} bytes", regs.a);

        regs.ix = regs.ix.wrapping_add(len);
        regs.set_de(0);
        regs.f |= CARRY;
        pop_return(regs, memory);
        true
    }
}
