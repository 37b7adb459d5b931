//! Floating bus prediction.
//!
//! Reading a port nothing answers returns whatever the ULA last put on the
//! data bus. During paper fetch that is a bitmap or attribute byte, in a
//! fixed order within each 8-T-state group; the rest of the time the bus
//! floats high.

use crate::MachineInfo;
use crate::screen::{attr_offset, pixel_offset};

/// What the ULA is fetching at a given T-state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusFetch {
    Idle,
    /// Bitmap byte at this display-page offset.
    Pixel(u16),
    /// Attribute byte at this display-page offset.
    Attribute(u16),
}

/// Fetch kind by `t & 7`: 0 idle, 1 pixel, 2 attribute.
const FETCH_PHASE: [u8; 8] = [0, 0, 1, 2, 1, 2, 0, 0];

/// Per-T-state classification of the ULA data bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FloatingBus {
    fetches: Box<[BusFetch]>,
}

impl FloatingBus {
    #[must_use]
    pub fn new(info: &MachineInfo) -> Self {
        let first = info.first_paper_line();
        let fetches = (0..info.ts_per_frame)
            .map(|t| {
                let line = t / info.ts_per_line;
                let ts = t % info.ts_per_line;
                if line < first || line >= first + info.paper_lines || ts >= info.paper_tstates {
                    return BusFetch::Idle;
                }
                let y = line - first;
                let x = ts >> 2;
                match FETCH_PHASE[(ts & 7) as usize] {
                    1 => BusFetch::Pixel(pixel_offset(y, x) as u16),
                    2 => BusFetch::Attribute(attr_offset(y, x) as u16),
                    _ => BusFetch::Idle,
                }
            })
            .collect();
        Self { fetches }
    }

    /// What the ULA was fetching when the CPU sampled the bus.
    ///
    /// The bus latches one T-state before the I/O read completes, hence the
    /// `- 1`.
    #[must_use]
    pub fn fetch_at(&self, tstates: u32) -> BusFetch {
        tstates
            .checked_sub(1)
            .and_then(|t| self.fetches.get(t as usize))
            .copied()
            .unwrap_or(BusFetch::Idle)
    }

    /// Value read from an unattached port at CPU T-state `tstates`.
    ///
    /// `screen` is the 16K page the ULA is displaying.
    #[must_use]
    pub fn predict(&self, tstates: u32, screen: &[u8]) -> u8 {
        let offset = match self.fetch_at(tstates) {
            BusFetch::Idle => return 0xFF,
            BusFetch::Pixel(offset) | BusFetch::Attribute(offset) => offset,
        };
        screen.get(offset as usize).copied().unwrap_or(0xFF)
    }
}
