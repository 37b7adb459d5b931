//! Display-file addressing shared by the display engine and the floating bus.

/// Bytes in the bitmap plus attribute area.
pub const SCREEN_BYTES: usize = 6912;

/// Offset of the attribute area within the display page.
pub const ATTR_OFFSET: usize = 6144;

/// Bitmap offset of the first byte of each of the 192 pixel rows.
const LINE_OFFSETS: [u16; 192] = line_offsets();

const fn line_offsets() -> [u16; 192] {
    let mut table = [0u16; 192];
    let mut y = 0;
    while y < 192 {
        let third = (y >> 6) as u16;
        let row = ((y >> 3) & 7) as u16;
        let scan = (y & 7) as u16;
        table[y] = (third << 11) | (scan << 8) | (row << 5);
        y += 1;
    }
    table
}

/// Offset of the bitmap byte for pixel row `y` (0-191), column `x` (0-31).
#[must_use]
pub fn pixel_offset(y: u32, x: u32) -> usize {
    LINE_OFFSETS[y as usize] as usize + x as usize
}

/// Offset of the attribute byte covering pixel row `y`, column `x`.
#[must_use]
pub fn attr_offset(y: u32, x: u32) -> usize {
    ATTR_OFFSET + ((y as usize >> 3) << 5) + x as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thirds_rows_and_scanlines_interleave() {
        assert_eq!(pixel_offset(0, 0), 0x0000);
        assert_eq!(pixel_offset(1, 0), 0x0100);
        assert_eq!(pixel_offset(8, 0), 0x0020);
        assert_eq!(pixel_offset(64, 0), 0x0800);
        assert_eq!(pixel_offset(191, 31), 0x17FF);
    }

    #[test]
    fn attributes_follow_character_rows() {
        assert_eq!(attr_offset(0, 0), 0x1800);
        assert_eq!(attr_offset(7, 1), 0x1801);
        assert_eq!(attr_offset(8, 0), 0x1820);
        assert_eq!(attr_offset(191, 31), 0x1AFF);
    }
}
