//! Breakpoints and the debugger callback.
//!
//! One flag byte per address. Nothing is looked up until a callback is
//! registered, and the callback is only consulted when a flag matching the
//! access kind is set.

use std::fmt;

/// Kind of access a breakpoint watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BreakpointKind {
    Read,
    Write,
    Execute,
}

impl BreakpointKind {
    const fn mask(self) -> u8 {
        match self {
            Self::Read => 0x01,
            Self::Write => 0x02,
            Self::Execute => 0x04,
        }
    }
}

/// Debugger hook. Receives the address and the access kind. For execute
/// breakpoints, returning `true` stops the frame before the instruction
/// runs; the return value is ignored for reads and writes.
pub type DebugCallback = Box<dyn FnMut(u16, BreakpointKind) -> bool>;

pub struct Debugger {
    flags: Box<[u8]>,
    callback: Option<DebugCallback>,
}

impl Debugger {
    #[must_use]
    pub fn new() -> Self {
        Self {
            flags: vec![0; 0x1_0000].into_boxed_slice(),
            callback: None,
        }
    }

    pub fn add(&mut self, addr: u16, kind: BreakpointKind) {
        self.flags[addr as usize] |= kind.mask();
    }

    pub fn remove(&mut self, addr: u16, kind: BreakpointKind) {
        self.flags[addr as usize] &= !kind.mask();
    }

    pub fn clear(&mut self) {
        self.flags.fill(0);
    }

    #[must_use]
    pub fn has(&self, addr: u16, kind: BreakpointKind) -> bool {
        self.flags[addr as usize] & kind.mask() != 0
    }

    pub fn set_callback(&mut self, callback: Option<DebugCallback>) {
        self.callback = callback;
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.callback.is_some()
    }

    /// Report an access. Returns `true` when an execute breakpoint asks to
    /// stop.
    pub fn hit(&mut self, addr: u16, kind: BreakpointKind) -> bool {
        let Some(callback) = self.callback.as_mut() else {
            return false;
        };
        if self.flags[addr as usize] & kind.mask() == 0 {
            return false;
        }
        tracing::trace!("{kind:?} breakpoint at {addr:#06X}");
        callback(addr, kind) && kind == BreakpointKind::Execute
    }
}

impl Default for Debugger {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Debugger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Debugger")
            .field("breakpoints", &self.flags.iter().filter(|&&b| b != 0).count())
            .field("callback", &self.callback.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recording(stop: bool) -> (Debugger, Rc<RefCell<Vec<(u16, BreakpointKind)>>>) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&seen);
        let mut debug = Debugger::new();
        debug.set_callback(Some(Box::new(move |addr: u16, kind: BreakpointKind| {
            log.borrow_mut().push((addr, kind));
            stop
        })));
        (debug, seen)
    }

    #[test]
    fn only_matching_kinds_reach_the_callback() {
        let (mut debug, seen) = recording(false);
        debug.add(0x8000, BreakpointKind::Write);

        assert!(!debug.hit(0x8000, BreakpointKind::Read));
        assert!(!debug.hit(0x8000, BreakpointKind::Write));
        assert_eq!(*seen.borrow(), vec![(0x8000, BreakpointKind::Write)]);
    }

    #[test]
    fn read_and_write_never_stop() {
        let (mut debug, _) = recording(true);
        debug.add(0x4000, BreakpointKind::Read);
        debug.add(0x4000, BreakpointKind::Write);
        assert!(!debug.hit(0x4000, BreakpointKind::Read));
        assert!(!debug.hit(0x4000, BreakpointKind::Write));
    }

    #[test]
    fn execute_stops_when_asked() {
        let (mut debug, seen) = recording(true);
        debug.add(0x1234, BreakpointKind::Execute);
        assert!(debug.hit(0x1234, BreakpointKind::Execute));
        assert!(!debug.hit(0x1235, BreakpointKind::Execute));
        assert_eq!(seen.borrow().len(), 1);

        let (mut debug, _) = recording(false);
        debug.add(0x1234, BreakpointKind::Execute);
        assert!(!debug.hit(0x1234, BreakpointKind::Execute));
    }

    #[test]
    fn no_callback_means_no_stop() {
        let mut debug = Debugger::new();
        debug.add(0, BreakpointKind::Execute);
        assert!(!debug.is_active());
        assert!(!debug.hit(0, BreakpointKind::Execute));
    }

    #[test]
    fn remove_and_clear() {
        let mut debug = Debugger::new();
        debug.add(1, BreakpointKind::Read);
        debug.add(1, BreakpointKind::Execute);
        debug.remove(1, BreakpointKind::Read);
        assert!(!debug.has(1, BreakpointKind::Read));
        assert!(debug.has(1, BreakpointKind::Execute));
        debug.clear();
        assert!(!debug.has(1, BreakpointKind::Execute));
    }
}
