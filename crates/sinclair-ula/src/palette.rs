//! ZX Spectrum 16-colour palette.
//!
//! Three bits of RGB plus BRIGHT. Normal colours use a lower intensity
//! (0xC8) and bright colours full intensity. Black appears twice.

/// Frame buffer palette: 16 entries (8 normal + 8 bright).
///
/// Packed `0xAABBGGRR`, so a little-endian `u32` lands in memory as
/// R, G, B, A bytes.
///
/// Index layout: `bright_bit << 3 | colour_3bit`
pub const PALETTE: [u32; 16] = [
    // Normal (bright = 0)
    0xFF00_0000, // 0: Black
    0xFFC8_0000, // 1: Blue
    0xFF00_00C8, // 2: Red
    0xFFC8_00C8, // 3: Magenta
    0xFF00_C800, // 4: Green
    0xFFC8_C800, // 5: Cyan
    0xFF00_C8C8, // 6: Yellow
    0xFFC8_C8C8, // 7: White
    // Bright (bright = 1)
    0xFF00_0000, // 8: Black
    0xFFFF_0000, // 9: Bright blue
    0xFF00_00FF, // 10: Bright red
    0xFFFF_00FF, // 11: Bright magenta
    0xFF00_FF00, // 12: Bright green
    0xFFFF_FF00, // 13: Bright cyan
    0xFF00_FFFF, // 14: Bright yellow
    0xFFFF_FFFF, // 15: Bright white
];
