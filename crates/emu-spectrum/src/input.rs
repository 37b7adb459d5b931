//! Logical keys and their place in the keyboard matrix.
//!
//! Hosts talk in [`SpectrumKey`]s, never scan codes. The forty matrix keys
//! map to one `(row, bit)` contact each. Compound keys stand for the shifted
//! combinations a Spectrum+ or 128K keyboard has dedicated keys for, and
//! close two contacts at once.

/// Logical key on the Spectrum keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpectrumKey {
    // Row 0 (addr bit A8)
    CapsShift,
    Z,
    X,
    C,
    V,
    // Row 1 (addr bit A9)
    A,
    S,
    D,
    F,
    G,
    // Row 2 (addr bit A10)
    Q,
    W,
    E,
    R,
    T,
    // Row 3 (addr bit A11)
    N1,
    N2,
    N3,
    N4,
    N5,
    // Row 4 (addr bit A12)
    N0,
    N9,
    N8,
    N7,
    N6,
    // Row 5 (addr bit A13)
    P,
    O,
    I,
    U,
    Y,
    // Row 6 (addr bit A14)
    Enter,
    L,
    K,
    J,
    H,
    // Row 7 (addr bit A15)
    Space,
    SymShift,
    M,
    N,
    B,

    // Caps Shift combinations
    Edit,
    CapsLock,
    TrueVideo,
    InvVideo,
    ArrowLeft,
    ArrowDown,
    ArrowUp,
    ArrowRight,
    Graphics,
    Backspace,
    Break,
    ExtendMode,

    // Symbol Shift combinations
    Quote,
    Semicolon,
    Comma,
    Minus,
    Plus,
    Period,
}

const CS: (usize, u8) = (0, 0);
const SS: (usize, u8) = (7, 1);

impl SpectrumKey {
    /// Matrix contacts this key closes, as `(row, bit)` pairs.
    #[must_use]
    pub const fn contacts(self) -> &'static [(usize, u8)] {
        match self {
            Self::CapsShift => &[CS],
            Self::Z => &[(0, 1)],
            Self::X => &[(0, 2)],
            Self::C => &[(0, 3)],
            Self::V => &[(0, 4)],

            Self::A => &[(1, 0)],
            Self::S => &[(1, 1)],
            Self::D => &[(1, 2)],
            Self::F => &[(1, 3)],
            Self::G => &[(1, 4)],

            Self::Q => &[(2, 0)],
            Self::W => &[(2, 1)],
            Self::E => &[(2, 2)],
            Self::R => &[(2, 3)],
            Self::T => &[(2, 4)],

            Self::N1 => &[(3, 0)],
            Self::N2 => &[(3, 1)],
            Self::N3 => &[(3, 2)],
            Self::N4 => &[(3, 3)],
            Self::N5 => &[(3, 4)],

            Self::N0 => &[(4, 0)],
            Self::N9 => &[(4, 1)],
            Self::N8 => &[(4, 2)],
            Self::N7 => &[(4, 3)],
            Self::N6 => &[(4, 4)],

            Self::P => &[(5, 0)],
            Self::O => &[(5, 1)],
            Self::I => &[(5, 2)],
            Self::U => &[(5, 3)],
            Self::Y => &[(5, 4)],

            Self::Enter => &[(6, 0)],
            Self::L => &[(6, 1)],
            Self::K => &[(6, 2)],
            Self::J => &[(6, 3)],
            Self::H => &[(6, 4)],

            Self::Space => &[(7, 0)],
            Self::SymShift => &[SS],
            Self::M => &[(7, 2)],
            Self::N => &[(7, 3)],
            Self::B => &[(7, 4)],

            Self::Edit => &[CS, (3, 0)],
            Self::CapsLock => &[CS, (3, 1)],
            Self::TrueVideo => &[CS, (3, 2)],
            Self::InvVideo => &[CS, (3, 3)],
            Self::ArrowLeft => &[CS, (3, 4)],
            Self::ArrowDown => &[CS, (4, 4)],
            Self::ArrowUp => &[CS, (4, 3)],
            Self::ArrowRight => &[CS, (4, 2)],
            Self::Graphics => &[CS, (4, 1)],
            Self::Backspace => &[CS, (4, 0)],
            Self::Break => &[CS, (7, 0)],
            Self::ExtendMode => &[CS, SS],

            Self::Quote => &[SS, (5, 0)],
            Self::Semicolon => &[SS, (5, 1)],
            Self::Comma => &[SS, (7, 3)],
            Self::Minus => &[SS, (6, 3)],
            Self::Plus => &[SS, (6, 2)],
            Self::Period => &[SS, (7, 2)],
        }
    }
}

/// Host modifier keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Modifier {
    /// Maps to Caps Shift.
    Shift,
    /// Maps to Symbol Shift.
    Control,
    /// Maps to Symbol Shift.
    Alt,
}

impl Modifier {
    #[must_use]
    pub const fn key(self) -> SpectrumKey {
        match self {
            Self::Shift => SpectrumKey::CapsShift,
            Self::Control | Self::Alt => SpectrumKey::SymShift,
        }
    }
}
