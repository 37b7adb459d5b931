//! Per-T-state contention tables.
//!
//! Built once per model from [`MachineInfo`] and read-only afterwards. Both
//! tables are indexed by T-state within the frame; lookups past the end of
//! the frame (an instruction overrunning into the next one) wrap.

use crate::MachineInfo;

/// Contention delay pattern (repeats every 8 T-states).
pub const CONTENTION_PATTERN: [u8; 8] = [6, 5, 4, 3, 2, 1, 0, 0];

/// Memory and I/O contention delays for one model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentionTables {
    memory: Box<[u8]>,
    io: Box<[u8]>,
}

impl ContentionTables {
    #[must_use]
    pub fn new(info: &MachineInfo) -> Self {
        let len = info.ts_per_frame as usize;
        let mut memory = vec![0u8; len].into_boxed_slice();
        let mut io = vec![0u8; len].into_boxed_slice();

        for t in info.contention_start..info.ts_per_frame {
            let offset = t - info.contention_start;
            let line = offset / info.ts_per_line;
            let ts = offset % info.ts_per_line;
            if line < info.paper_lines && ts < info.paper_tstates {
                let delay = CONTENTION_PATTERN[(ts & 7) as usize];
                memory[t as usize] = delay;
                io[t as usize] = delay;
            }
        }

        Self { memory, io }
    }

    /// Delay for a contended memory access starting at `tstates`.
    #[must_use]
    pub fn memory_delay(&self, tstates: u32) -> u32 {
        u32::from(self.memory[tstates as usize % self.memory.len()])
    }

    /// Delay for one contended step of an I/O cycle at `tstates`.
    #[must_use]
    pub fn io_delay(&self, tstates: u32) -> u32 {
        u32::from(self.io[tstates as usize % self.io.len()])
    }

    /// Length of a complete I/O cycle starting at `tstates`.
    ///
    /// `high_contended` says whether the port's high byte addresses
    /// contended memory. Bit 0 of the port selects the ULA.
    ///
    /// | High byte contended | Even port | Pattern    |
    /// |---------------------|-----------|------------|
    /// | No                  | No        | N:4        |
    /// | No                  | Yes       | N:1, C:3   |
    /// | Yes                 | Yes       | C:1, C:3   |
    /// | Yes                 | No        | C:1 ×4     |
    #[must_use]
    pub fn io_cycle(&self, port: u16, high_contended: bool, tstates: u32) -> u32 {
        let ula_port = port & 1 == 0;
        let mut t = tstates;
        match (high_contended, ula_port) {
            (false, false) => t += 4,
            (false, true) => {
                t += 1;
                t += self.io_delay(t);
                t += 3;
            }
            (true, true) => {
                t += self.io_delay(t);
                t += 1;
                t += self.io_delay(t);
                t += 3;
            }
            (true, false) => {
                for _ in 0..4 {
                    t += self.io_delay(t);
                    t += 1;
                }
            }
        }
        t - tstates
    }
}
