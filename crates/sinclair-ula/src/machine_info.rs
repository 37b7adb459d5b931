//! Static timing and geometry per model.

/// Timing and geometry profile for one Spectrum model.
///
/// Line numbers count from the start of the frame (the top of vertical
/// blank). T-state positions within a line count from the left edge of the
/// emulated border for the display engine, and from the start of the
/// screen fetch for contention and the floating bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineInfo {
    /// T-states the INT line stays asserted at the start of a frame.
    pub int_length: u32,
    pub ts_per_frame: u32,
    /// First T-state subject to memory contention.
    pub contention_start: u32,
    pub ts_per_line: u32,
    pub vertical_blank_lines: u32,
    /// Lines between the end of vertical blank and the first paper line.
    pub top_border_lines: u32,
    pub paper_lines: u32,
    pub paper_width: u32,
    pub total_lines: u32,
    /// T-states per line spent fetching paper.
    pub paper_tstates: u32,
    /// Border drawn around the paper in the frame buffer, in pixels.
    pub emu_border: u32,
    /// T-states per 8-pixel character cell.
    pub ts_per_char: u32,
    /// Display catch-up lead applied before a border change.
    pub border_drawing_offset: u32,
    /// Display catch-up lead applied before a display-file write.
    pub paper_drawing_offset: u32,
    pub has_ay: bool,
    pub has_paging: bool,
}

impl MachineInfo {
    /// Sinclair ZX Spectrum 16K/48K.
    pub const SPECTRUM_48K: Self = Self {
        int_length: 32,
        ts_per_frame: 69_888,
        contention_start: 14_335,
        ts_per_line: 224,
        vertical_blank_lines: 8,
        top_border_lines: 56,
        paper_lines: 192,
        paper_width: 256,
        total_lines: 312,
        paper_tstates: 128,
        emu_border: 32,
        ts_per_char: 4,
        border_drawing_offset: 10,
        paper_drawing_offset: 16,
        has_ay: false,
        has_paging: false,
    };

    /// Sinclair ZX Spectrum 128K / +2.
    pub const SPECTRUM_128K: Self = Self {
        int_length: 36,
        ts_per_frame: 70_908,
        contention_start: 14_361,
        ts_per_line: 228,
        vertical_blank_lines: 7,
        top_border_lines: 56,
        paper_lines: 192,
        paper_width: 256,
        total_lines: 311,
        paper_tstates: 128,
        emu_border: 32,
        ts_per_char: 4,
        border_drawing_offset: 12,
        paper_drawing_offset: 16,
        has_ay: true,
        has_paging: true,
    };

    /// First line of paper, counted from the start of the frame.
    #[must_use]
    pub const fn first_paper_line(&self) -> u32 {
        self.vertical_blank_lines + self.top_border_lines
    }

    /// Width of the emulated border in T-states (two pixels per T-state).
    #[must_use]
    pub const fn border_tstates(&self) -> u32 {
        self.emu_border / 2
    }

    #[must_use]
    pub const fn frame_width(&self) -> u32 {
        self.emu_border * 2 + self.paper_width
    }

    #[must_use]
    pub const fn frame_height(&self) -> u32 {
        self.emu_border * 2 + self.paper_lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_is_whole_lines() {
        for info in [MachineInfo::SPECTRUM_48K, MachineInfo::SPECTRUM_128K] {
            assert_eq!(info.ts_per_line * info.total_lines, info.ts_per_frame);
        }
    }

    #[test]
    fn paper_starts_right_after_contention_start() {
        let info = MachineInfo::SPECTRUM_48K;
        assert_eq!(info.first_paper_line() * info.ts_per_line, info.contention_start + 1);
        assert_eq!((info.frame_width(), info.frame_height()), (320, 256));
    }
}
