//! Z80 register file as exchanged with snapshots.

/// Complete Z80 programmer-visible state.
///
/// Eight-bit halves are stored individually; the pair accessors combine
/// them high byte first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Registers {
    pub a: u8,
    pub f: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,

    pub a_alt: u8,
    pub f_alt: u8,
    pub b_alt: u8,
    pub c_alt: u8,
    pub d_alt: u8,
    pub e_alt: u8,
    pub h_alt: u8,
    pub l_alt: u8,

    pub ix: u16,
    pub iy: u16,
    pub sp: u16,
    pub pc: u16,

    pub i: u8,
    pub r: u8,
    pub iff1: bool,
    pub iff2: bool,
    /// Interrupt mode, 0-2.
    pub im: u8,
}

macro_rules! pair {
    ($get:ident, $set:ident, $hi:ident, $lo:ident) => {
        #[must_use]
        pub fn $get(&self) -> u16 {
            u16::from_be_bytes([self.$hi, self.$lo])
        }

        pub fn $set(&mut self, value: u16) {
            [self.$hi, self.$lo] = value.to_be_bytes();
        }
    };
}

impl Registers {
    pair!(af, set_af, a, f);
    pair!(bc, set_bc, b, c);
    pair!(de, set_de, d, e);
    pair!(hl, set_hl, h, l);
    pair!(af_alt, set_af_alt, a_alt, f_alt);
    pair!(bc_alt, set_bc_alt, b_alt, c_alt);
    pair!(de_alt, set_de_alt, d_alt, e_alt);
    pair!(hl_alt, set_hl_alt, h_alt, l_alt);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairs_are_high_byte_first() {
        let mut regs = Registers::default();
        regs.set_bc(0x1234);
        assert_eq!(regs.b, 0x12);
        assert_eq!(regs.c, 0x34);
        assert_eq!(regs.bc(), 0x1234);

        regs.set_hl_alt(0xBEEF);
        assert_eq!((regs.h_alt, regs.l_alt), (0xBE, 0xEF));
    }
}
