//! ZX Spectrum keyboard.
//!
//! The Spectrum keyboard is an 8×5 matrix of half-rows, read via port $FE.
//! The high byte of the port address selects which half-rows to scan: each
//! bit (A8-A15) enables one half-row. Multiple rows can be scanned
//! simultaneously by clearing multiple address bits, and the result is the
//! AND of every selected half-row.
//!
//! # Half-row layout
//!
//! | Addr bit | Row | Keys (bit 0-4)                |
//! |----------|-----|-------------------------------|
//! | A8       | 0   | Shift, Z, X, C, V            |
//! | A9       | 1   | A, S, D, F, G                |
//! | A10      | 2   | Q, W, E, R, T                |
//! | A11      | 3   | 1, 2, 3, 4, 5                |
//! | A12      | 4   | 0, 9, 8, 7, 6                |
//! | A13      | 5   | P, O, I, U, Y                |
//! | A14      | 6   | Enter, L, K, J, H            |
//! | A15      | 7   | Space, Sym, M, N, B          |
//!
//! A pressed key reads as 0 (active low). Bits 5-7 always read as 1.

use crate::input::{Modifier, SpectrumKey};

/// Frames a Caps Lock tap keeps CAPS SHIFT + 2 closed.
const CAPS_LOCK_FRAMES: u32 = 2;

/// Keyboard state: 8 half-rows of 5 keys each.
///
/// Each contact counts how many logical keys are holding it closed, so
/// releasing Backspace does not lift a Caps Shift that the host Shift key is
/// still holding.
pub struct KeyboardState {
    held: [[u8; 5]; 8],
    caps_lock_frames: u32,
}

impl KeyboardState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            held: [[0; 5]; 8],
            caps_lock_frames: 0,
        }
    }

    /// Close or open one contact. `row` is 0-7, `bit` is 0-4.
    pub fn set_key(&mut self, row: usize, bit: u8, pressed: bool) {
        let Some(count) = self
            .held
            .get_mut(row)
            .and_then(|r| r.get_mut(bit as usize))
        else {
            return;
        };
        *count = if pressed {
            count.saturating_add(1)
        } else {
            count.saturating_sub(1)
        };
    }

    /// Host key pressed.
    ///
    /// Caps Lock is a momentary tap: it is released by [`Self::end_frame`]
    /// after a couple of frames whatever the host does.
    pub fn key_down(&mut self, key: SpectrumKey) {
        if key == SpectrumKey::CapsLock {
            if self.caps_lock_frames == 0 {
                self.press(key, true);
            }
            self.caps_lock_frames = CAPS_LOCK_FRAMES;
            return;
        }
        self.press(key, true);
    }

    /// Host key released.
    pub fn key_up(&mut self, key: SpectrumKey) {
        if key != SpectrumKey::CapsLock {
            self.press(key, false);
        }
    }

    /// Host modifier changed state.
    pub fn modifier_changed(&mut self, modifier: Modifier, pressed: bool) {
        self.press(modifier.key(), pressed);
    }

    /// Per-frame housekeeping.
    pub fn end_frame(&mut self) {
        if self.caps_lock_frames > 0 {
            self.caps_lock_frames -= 1;
            if self.caps_lock_frames == 0 {
                self.press(SpectrumKey::CapsLock, false);
            }
        }
    }

    fn press(&mut self, key: SpectrumKey, pressed: bool) {
        for &(row, bit) in key.contacts() {
            self.set_key(row, bit, pressed);
        }
    }

    /// Half-row as the port sees it: bits 0-4, 0 = pressed.
    fn row_bits(&self, row: usize) -> u8 {
        self.held[row]
            .iter()
            .enumerate()
            .fold(0x1F, |bits, (bit, &count)| {
                if count > 0 { bits & !(1 << bit) } else { bits }
            })
    }

    /// Read the keyboard for a port $FE access.
    ///
    /// `addr_high` is the high byte of the port address (bits A8-A15).
    /// Returns bits 0-4 (active low: 0 = pressed), bits 5-7 = 1.
    #[must_use]
    pub fn read(&self, addr_high: u8) -> u8 {
        (0..8)
            .filter(|row| addr_high & (1 << row) == 0)
            .fold(0xFF, |result, row| result & (self.row_bits(row) | 0xE0))
    }

    /// Release all keys.
    pub fn release_all(&mut self) {
        self.held = [[0; 5]; 8];
        self.caps_lock_frames = 0;
    }
}

impl Default for KeyboardState {
    fn default() -> Self {
        Self::new()
    }
}
