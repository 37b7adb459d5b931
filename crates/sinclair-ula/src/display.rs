//! T-state driven display engine.
//!
//! The engine keeps its own cursor in display T-states and draws one
//! 8-pixel character cell per [`MachineInfo::ts_per_char`] T-states. The
//! caller advances it lazily: before any write that could change what is on
//! screen, and once at the end of the frame for whatever is left.
//!
//! # Cell classification
//!
//! Every `(line, T-state)` of the frame is classified once at construction:
//!
//! | Region                       | Cell      |
//! |------------------------------|-----------|
//! | Vertical blank, hidden border | `Retrace` |
//! | Visible top/bottom border    | `Border`  |
//! | Left/right of paper          | `Border`  |
//! | Paper fetch window           | `Paper`   |
//! | Horizontal retrace           | `Retrace` |
//!
//! # Shadow cache
//!
//! Each cell remembers the inputs it was last drawn from. A cell whose pixel
//! byte, attribute byte and flash phase (or border colour) are unchanged is
//! skipped, so a static screen costs one compare per cell.

use crate::MachineInfo;
use crate::palette::PALETTE;
use crate::screen::{attr_offset, pixel_offset};

/// Frames per flash phase (flash toggles every 16 frames).
const FLASH_MASK: u32 = 16;

/// Opaque black, the colour of an undrawn frame buffer.
const BLANK: u32 = 0xFF00_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cell {
    Border,
    Paper,
    Retrace,
}

/// Inputs a cell was last drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Drawn {
    pixels: u8,
    attribute: u8,
    flash: bool,
}

/// Display engine and frame buffer for one machine.
pub struct Display {
    info: MachineInfo,
    cells: Box<[Cell]>,
    /// Palette index per `(attribute & 0x7F, pixel byte, bit)`.
    clut: Box<[u8]>,
    framebuffer: Vec<u32>,
    shadow: Box<[Option<Drawn>]>,
    /// Display T-state of the next cell to draw.
    cursor: u32,
    /// Frame buffer index of the next pixel to draw.
    index: usize,
    border: u8,
    border_latch: u8,
    frame_counter: u32,
}

impl Display {
    #[must_use]
    pub fn new(info: MachineInfo) -> Self {
        let pixels = (info.frame_width() * info.frame_height()) as usize;
        Self {
            cells: build_cells(&info),
            clut: build_clut(),
            framebuffer: vec![BLANK; pixels],
            shadow: vec![None; info.ts_per_frame as usize].into_boxed_slice(),
            cursor: 0,
            index: 0,
            border: 7,
            border_latch: 7,
            frame_counter: 0,
            info,
        }
    }

    /// Draw `tstates` worth of cells from the current cursor.
    ///
    /// `screen` is the 16K display page. Non-positive budgets draw nothing,
    /// and drawing stops at the end of the frame. A pending border change is
    /// committed before the first cell.
    pub fn advance(&mut self, tstates: i64, screen: &[u8]) {
        self.border = self.border_latch;

        let step = self.info.ts_per_char;
        let flash_phase = self.frame_counter & FLASH_MASK != 0;
        let mut remaining = tstates;

        while remaining > 0 && self.cursor < self.info.ts_per_frame {
            let cursor = self.cursor as usize;
            match self.cells[cursor] {
                Cell::Retrace => {}
                Cell::Border => {
                    let drawn = Drawn {
                        pixels: 0,
                        attribute: self.border,
                        flash: false,
                    };
                    if self.shadow[cursor] != Some(drawn) && self.fits() {
                        let colour = PALETTE[self.border as usize];
                        self.framebuffer[self.index..self.index + 8].fill(colour);
                        self.shadow[cursor] = Some(drawn);
                    }
                    self.index += 8;
                }
                Cell::Paper => {
                    if let Some((pixel, attr)) = self.fetch_offsets(self.cursor) {
                        let pixels = screen.get(pixel).copied().unwrap_or(0);
                        let attribute = screen.get(attr).copied().unwrap_or(0);
                        let drawn = Drawn {
                            pixels,
                            attribute,
                            flash: flash_phase && attribute & 0x80 != 0,
                        };
                        if self.shadow[cursor] != Some(drawn) && self.fits() {
                            self.draw_paper(drawn);
                            self.shadow[cursor] = Some(drawn);
                        }
                    }
                    self.index += 8;
                }
            }
            self.cursor += step;
            remaining -= i64::from(step);
        }
    }

    /// Bring the display up to CPU T-state `tstates` plus a drawing lead.
    pub fn catch_up(&mut self, tstates: u32, lead: u32, screen: &[u8]) {
        let target = i64::from(tstates) + i64::from(lead);
        self.advance(target - i64::from(self.cursor), screen);
    }

    /// Finish the frame and rewind for the next one.
    pub fn end_frame(&mut self, screen: &[u8]) {
        self.advance(i64::from(self.info.ts_per_frame - self.cursor), screen);
        self.frame_counter = self.frame_counter.wrapping_add(1);
        self.frame_reset();
    }

    /// Rewind the cursor to the top of the frame.
    pub fn frame_reset(&mut self) {
        self.cursor = 0;
        self.index = 0;
    }

    /// Blank the frame buffer and forget every drawn cell.
    pub fn clear(&mut self) {
        self.framebuffer.fill(BLANK);
        self.shadow.fill(None);
    }

    /// Latch a new border colour (0-7). It takes effect on the next advance.
    pub fn set_border(&mut self, colour: u8) {
        self.border_latch = colour & 0x07;
    }

    /// Border colour as last written, committed or not.
    #[must_use]
    pub fn border(&self) -> u8 {
        self.border_latch
    }

    /// Display T-state of the next cell to draw.
    #[must_use]
    pub fn cursor(&self) -> u32 {
        self.cursor
    }

    #[must_use]
    pub fn frame_counter(&self) -> u32 {
        self.frame_counter
    }

    pub fn set_frame_counter(&mut self, frames: u32) {
        self.frame_counter = frames;
    }

    /// Frame buffer, `0xAABBGGRR` per pixel, row-major.
    #[must_use]
    pub fn framebuffer(&self) -> &[u32] {
        &self.framebuffer
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.info.frame_width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.info.frame_height()
    }

    #[must_use]
    pub fn info(&self) -> &MachineInfo {
        &self.info
    }

    /// Bitmap and attribute offsets fetched for the paper cell at display
    /// T-state `ts`, or `None` outside paper.
    #[must_use]
    pub fn fetch_offsets(&self, ts: u32) -> Option<(usize, usize)> {
        if self.cells.get(ts as usize) != Some(&Cell::Paper) {
            return None;
        }
        let line = ts / self.info.ts_per_line;
        let t = ts % self.info.ts_per_line;
        let y = line - self.info.first_paper_line();
        let x = (t - self.info.border_tstates()) / self.info.ts_per_char;
        Some((pixel_offset(y, x), attr_offset(y, x)))
    }

    fn fits(&self) -> bool {
        self.index + 8 <= self.framebuffer.len()
    }

    fn draw_paper(&mut self, drawn: Drawn) {
        let mut attr = drawn.attribute;
        if drawn.flash {
            attr = (attr & 0xC0) | ((attr & 0x07) << 3) | ((attr >> 3) & 0x07);
        }
        let base = (attr & 0x7F) as usize * 2048 + drawn.pixels as usize * 8;
        let colours = &self.clut[base..base + 8];
        for (out, &colour) in self.framebuffer[self.index..self.index + 8]
            .iter_mut()
            .zip(colours)
        {
            *out = PALETTE[colour as usize];
        }
    }
}

fn build_cells(info: &MachineInfo) -> Box<[Cell]> {
    let first_paper = info.first_paper_line();
    let top = first_paper - info.emu_border;
    let bottom = first_paper + info.paper_lines + info.emu_border;
    let left = info.border_tstates();
    let paper_end = left + info.paper_tstates;
    let right = paper_end + left;

    let mut cells = Vec::with_capacity(info.ts_per_frame as usize);
    for line in 0..info.total_lines {
        let paper_line = line >= first_paper && line < first_paper + info.paper_lines;
        for ts in 0..info.ts_per_line {
            let cell = if line < top || line >= bottom || ts >= right {
                Cell::Retrace
            } else if paper_line && ts >= left && ts < paper_end {
                Cell::Paper
            } else {
                Cell::Border
            };
            cells.push(cell);
        }
    }
    cells.into_boxed_slice()
}

fn build_clut() -> Box<[u8]> {
    let mut clut = vec![0u8; 128 * 256 * 8];
    for attr in 0..128usize {
        let bright = (attr >> 6) as u8 & 1;
        let paper = (attr >> 3) as u8 & 7;
        let ink = attr as u8 & 7;
        for pixels in 0..256usize {
            for bit in 0..8 {
                let set = pixels & (0x80 >> bit) != 0;
                let colour = if set { ink } else { paper };
                clut[attr * 2048 + pixels * 8 + bit] = colour | (bright << 3);
            }
        }
    }
    clut.into_boxed_slice()
}

#[cfg(test)]
mod tests {
    use super::*;

    const INFO: MachineInfo = MachineInfo::SPECTRUM_48K;

    fn page() -> Vec<u8> {
        vec![0u8; 0x4000]
    }

    /// Frame buffer index of the first pixel of paper cell (y, x).
    fn paper_index(y: usize, x: usize) -> usize {
        (32 + y) * 320 + 32 + x * 8
    }

    #[test]
    fn every_visible_pixel_is_drawn_once_per_frame() {
        let mut display = Display::new(INFO);
        display.advance(i64::from(INFO.ts_per_frame), &page());
        assert_eq!(display.index, display.framebuffer.len());
    }

    #[test]
    fn ink_and_paper_come_from_the_attribute() {
        let mut screen = page();
        screen[0] = 0xF0;
        // Bright, paper blue, ink yellow.
        screen[0x1800] = 0x40 | (1 << 3) | 6;
        let mut display = Display::new(INFO);
        display.end_frame(&screen);

        let i = paper_index(0, 0);
        assert_eq!(display.framebuffer[i], PALETTE[14]);
        assert_eq!(display.framebuffer[i + 3], PALETTE[14]);
        assert_eq!(display.framebuffer[i + 4], PALETTE[9]);
    }

    #[test]
    fn border_fills_the_margins() {
        let mut display = Display::new(INFO);
        display.set_border(2);
        display.end_frame(&page());
        assert_eq!(display.framebuffer[0], PALETTE[2]);
        assert_eq!(display.framebuffer[display.framebuffer.len() - 1], PALETTE[2]);
        assert_eq!(display.framebuffer[paper_index(0, 0)], PALETTE[0]);
    }

    #[test]
    fn border_change_waits_for_the_next_advance() {
        let mut display = Display::new(INFO);
        display.set_border(1);
        assert_eq!(display.border, 7);
        display.advance(0, &page());
        assert_eq!(display.border, 1);
    }

    #[test]
    fn flash_swaps_ink_and_paper_every_sixteen_frames() {
        let mut screen = page();
        screen[0] = 0xFF;
        screen[0x1800] = 0x80 | (2 << 3) | 5;
        let mut display = Display::new(INFO);

        display.end_frame(&screen);
        assert_eq!(display.framebuffer[paper_index(0, 0)], PALETTE[5]);

        display.set_frame_counter(16);
        display.end_frame(&screen);
        assert_eq!(display.framebuffer[paper_index(0, 0)], PALETTE[2]);
    }

    #[test]
    fn unchanged_inputs_skip_the_write() {
        let mut screen = page();
        screen[0] = 0x81;
        screen[0x1800] = 0x07;
        let mut display = Display::new(INFO);
        display.end_frame(&screen);

        // Scribble over the cell; an unchanged redraw must leave it alone.
        let i = paper_index(0, 0);
        display.framebuffer[i] = 0x1234_5678;
        display.end_frame(&screen);
        assert_eq!(display.framebuffer[i], 0x1234_5678);

        // Any input change redraws the cell.
        screen[0x1800] = 0x0F;
        display.end_frame(&screen);
        assert_eq!(display.framebuffer[i], PALETTE[7]);
    }

    #[test]
    fn pixel_attribute_and_flash_each_force_a_redraw() {
        let mut screen = page();
        screen[0] = 0x80;
        screen[0x1800] = 0x80 | (1 << 3) | 2;
        let mut display = Display::new(INFO);
        display.end_frame(&screen);
        let i = paper_index(0, 0);
        let baseline = display.framebuffer[i..i + 8].to_vec();

        // Flash phase only.
        display.set_frame_counter(16);
        display.end_frame(&screen);
        assert_ne!(display.framebuffer[i..i + 8], baseline[..]);

        // Pixel byte only.
        display.set_frame_counter(0);
        display.end_frame(&screen);
        assert_eq!(display.framebuffer[i..i + 8], baseline[..]);
        screen[0] = 0x40;
        display.end_frame(&screen);
        assert_ne!(display.framebuffer[i..i + 8], baseline[..]);
    }

    #[test]
    fn catch_up_stops_at_the_requested_tstate() {
        let mut display = Display::new(INFO);
        display.catch_up(1000, 16, &page());
        assert_eq!(display.cursor(), 1016);
        // Behind the cursor: nothing to do.
        display.catch_up(10, 0, &page());
        assert_eq!(display.cursor(), 1016);
    }

    #[test]
    fn clear_forces_a_full_redraw() {
        let mut display = Display::new(INFO);
        display.set_border(4);
        display.end_frame(&page());
        display.clear();
        assert_eq!(display.framebuffer[0], BLANK);
        display.end_frame(&page());
        assert_eq!(display.framebuffer[0], PALETTE[4]);
    }
}
