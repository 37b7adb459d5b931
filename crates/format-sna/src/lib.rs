//! ZX Spectrum 48K SNA snapshots.
//!
//! 27-byte register header followed by the 48K of RAM from $4000. The format
//! has no PC field: the saver pushes PC onto the emulated stack and the
//! loader pops it off again.
//!
//! | Offset | Size | Field                      |
//! |--------|------|----------------------------|
//! | 0      | 1    | I                          |
//! | 1      | 8    | HL', DE', BC', AF'         |
//! | 9      | 6    | HL, DE, BC                 |
//! | 15     | 4    | IY, IX                     |
//! | 19     | 1    | IFF2 in bit 2              |
//! | 20     | 1    | R                          |
//! | 21     | 2    | AF                         |
//! | 23     | 2    | SP (after the PC push)     |
//! | 25     | 1    | Interrupt mode             |
//! | 26     | 1    | Border colour              |
//! | 27     | 49152| RAM $4000-$FFFF            |
//!
//! All 16-bit values are little-endian.

use emu_core::Registers;

/// Header size in bytes.
pub const HEADER_SIZE: usize = 27;

/// First RAM address.
pub const RAM_START: u16 = 0x4000;

/// RAM dump size (48K from $4000-$FFFF).
pub const RAM_SIZE: usize = 49_152;

/// Exact size of a 48K SNA file.
pub const SNA_48K_SIZE: usize = HEADER_SIZE + RAM_SIZE;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SnaError {
    #[error("SNA image must be 49179 bytes, got {0}")]
    WrongSize(usize),
    #[error("RAM image must be 49152 bytes, got {0}")]
    WrongRamSize(usize),
    #[error("stack pointer {0:#06X} leaves no room for PC in RAM")]
    StackInRom(u16),
}

/// Machine state carried by a 48K SNA file.
///
/// `registers` hold the live values, PC and SP included; the stack
/// juggling happens only inside the encoded bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnaSnapshot {
    pub registers: Registers,
    pub border: u8,
    /// RAM from $4000, exactly [`RAM_SIZE`] bytes.
    pub ram: Vec<u8>,
}

/// RAM offset of `address`, or `None` for ROM.
fn ram_offset(address: u16) -> Option<usize> {
    address.checked_sub(RAM_START).map(usize::from)
}

fn word(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

fn put_word(out: &mut [u8], offset: usize, value: u16) {
    out[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

/// Decode an SNA image.
pub fn parse(data: &[u8]) -> Result<SnaSnapshot, SnaError> {
    if data.len() != SNA_48K_SIZE {
        return Err(SnaError::WrongSize(data.len()));
    }

    let mut regs = Registers {
        i: data[0],
        iy: word(data, 15),
        ix: word(data, 17),
        r: data[20],
        im: data[25] & 0x03,
        ..Registers::default()
    };
    regs.set_hl_alt(word(data, 1));
    regs.set_de_alt(word(data, 3));
    regs.set_bc_alt(word(data, 5));
    regs.set_af_alt(word(data, 7));
    regs.set_hl(word(data, 9));
    regs.set_de(word(data, 11));
    regs.set_bc(word(data, 13));
    regs.set_af(word(data, 21));
    regs.iff2 = data[19] & 0x04 != 0;
    regs.iff1 = regs.iff2;

    let ram = data[HEADER_SIZE..].to_vec();

    // RETN: pop PC off the stack.
    let sp = word(data, 23);
    let (Some(lo), Some(hi)) = (ram_offset(sp), ram_offset(sp.wrapping_add(1))) else {
        return Err(SnaError::StackInRom(sp));
    };
    regs.pc = u16::from_le_bytes([ram[lo], ram[hi]]);
    regs.sp = sp.wrapping_add(2);

    Ok(SnaSnapshot {
        registers: regs,
        border: data[26] & 0x07,
        ram,
    })
}

/// Encode a snapshot, pushing PC onto the stack inside the image.
pub fn encode(snapshot: &SnaSnapshot) -> Result<Vec<u8>, SnaError> {
    if snapshot.ram.len() != RAM_SIZE {
        return Err(SnaError::WrongRamSize(snapshot.ram.len()));
    }
    let regs = &snapshot.registers;
    let sp = regs.sp.wrapping_sub(2);
    let (Some(lo), Some(hi)) = (ram_offset(sp), ram_offset(sp.wrapping_add(1))) else {
        return Err(SnaError::StackInRom(regs.sp));
    };

    let mut out = vec![0u8; SNA_48K_SIZE];
    out[0] = regs.i;
    put_word(&mut out, 1, regs.hl_alt());
    put_word(&mut out, 3, regs.de_alt());
    put_word(&mut out, 5, regs.bc_alt());
    put_word(&mut out, 7, regs.af_alt());
    put_word(&mut out, 9, regs.hl());
    put_word(&mut out, 11, regs.de());
    put_word(&mut out, 13, regs.bc());
    put_word(&mut out, 15, regs.iy);
    put_word(&mut out, 17, regs.ix);
    out[19] = if regs.iff2 { 0x04 } else { 0x00 };
    out[20] = regs.r;
    put_word(&mut out, 21, regs.af());
    put_word(&mut out, 23, sp);
    out[25] = regs.im & 0x03;
    out[26] = snapshot.border & 0x07;

    let ram = &mut out[HEADER_SIZE..];
    ram.copy_from_slice(&snapshot.ram);
    let [pc_lo, pc_hi] = regs.pc.to_le_bytes();
    ram[lo] = pc_lo;
    ram[hi] = pc_hi;

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank() -> Vec<u8> {
        vec![0u8; SNA_48K_SIZE]
    }

    #[test]
    fn rejects_wrong_sizes() {
        assert_eq!(parse(&[0; 100]), Err(SnaError::WrongSize(100)));
        assert_eq!(
            parse(&vec![0; SNA_48K_SIZE + 1]),
            Err(SnaError::WrongSize(SNA_48K_SIZE + 1))
        );
    }

    #[test]
    fn header_fields_land_in_registers() {
        let mut data = blank();
        data[0] = 0x3F;
        data[9] = 0x34;
        data[10] = 0x12; // HL = 0x1234
        data[19] = 0x04;
        data[21] = 0x44; // F
        data[22] = 0x99; // A
        data[23] = 0x00;
        data[24] = 0x80; // SP = 0x8000
        data[25] = 1;
        data[26] = 0x05;
        // PC = 0xBEEF on the stack at 0x8000.
        data[HEADER_SIZE + 0x4000] = 0xEF;
        data[HEADER_SIZE + 0x4001] = 0xBE;

        let snap = parse(&data).expect("valid image");
        let r = snap.registers;
        assert_eq!(r.i, 0x3F);
        assert_eq!(r.hl(), 0x1234);
        assert_eq!((r.a, r.f), (0x99, 0x44));
        assert!(r.iff1 && r.iff2);
        assert_eq!(r.im, 1);
        assert_eq!(r.pc, 0xBEEF);
        assert_eq!(r.sp, 0x8002);
        assert_eq!(snap.border, 5);
    }

    #[test]
    fn stack_in_rom_is_rejected() {
        let mut data = blank();
        data[23] = 0x00;
        data[24] = 0x20; // SP = 0x2000
        assert_eq!(parse(&data), Err(SnaError::StackInRom(0x2000)));

        let snap = SnaSnapshot {
            registers: Registers {
                sp: 0x4001,
                ..Registers::default()
            },
            border: 0,
            ram: vec![0; RAM_SIZE],
        };
        assert_eq!(encode(&snap), Err(SnaError::StackInRom(0x4001)));
    }

    #[test]
    fn encode_pushes_pc_below_sp() {
        let snap = SnaSnapshot {
            registers: Registers {
                pc: 0x1234,
                sp: 0xFF00,
                ..Registers::default()
            },
            border: 2,
            ram: vec![0; RAM_SIZE],
        };
        let data = encode(&snap).expect("encodes");
        assert_eq!(word(&data, 23), 0xFEFE);
        assert_eq!(data[HEADER_SIZE + 0xFEFE - 0x4000], 0x34);
        assert_eq!(data[HEADER_SIZE + 0xFEFF - 0x4000], 0x12);
        // The caller's RAM is not touched.
        assert!(snap.ram.iter().all(|&b| b == 0));
    }

    #[test]
    fn sp_at_zero_wraps_to_top_of_ram() {
        let snap = SnaSnapshot {
            registers: Registers {
                pc: 0x8000,
                sp: 0x0000,
                ..Registers::default()
            },
            border: 0,
            ram: vec![0; RAM_SIZE],
        };
        let back = parse(&encode(&snap).expect("encodes")).expect("parses");
        assert_eq!(back.registers.sp, 0x0000);
        assert_eq!(back.registers.pc, 0x8000);
    }
}
