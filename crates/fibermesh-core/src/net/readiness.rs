//! Endpoint readiness guard
//!
//! Socket I/O on either side is gated on its flag: egress envelopes are
//! dropped while publish is unready, inbound frames are dropped while
//! subscribe is unready. Flags are unapplied before the owning endpoint
//! closes and applied only after its setup step succeeds.

use std::sync::atomic::{AtomicBool, Ordering};

/// The two independent readiness flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Publish endpoint is bound and accepting subscribers
    Publish,
    /// Subscribe endpoint is connected to the current peer set
    Subscribe,
}

/// Readiness state shared between the fiber and its endpoint tasks
#[derive(Debug, Default)]
pub struct ReadyFlags {
    publish: AtomicBool,
    subscribe: AtomicBool,
}

impl ReadyFlags {
    /// Both flags unapplied
    pub fn new() -> Self {
        Self::default()
    }

    fn flag(&self, which: Readiness) -> &AtomicBool {
        match which {
            Readiness::Publish => &self.publish,
            Readiness::Subscribe => &self.subscribe,
        }
    }

    /// Mark a flag applied
    pub fn apply(&self, which: Readiness) {
        self.flag(which).store(true, Ordering::Release);
    }

    /// Mark a flag unapplied
    pub fn unapply(&self, which: Readiness) {
        self.flag(which).store(false, Ordering::Release);
    }

    /// Whether a flag is currently applied
    pub fn is_applied(&self, which: Readiness) -> bool {
        self.flag(which).load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_unapplied() {
        let flags = ReadyFlags::new();
        assert!(!flags.is_applied(Readiness::Publish));
        assert!(!flags.is_applied(Readiness::Subscribe));
    }

    #[test]
    fn test_flags_independent() {
        let flags = ReadyFlags::new();
        flags.apply(Readiness::Publish);
        assert!(flags.is_applied(Readiness::Publish));
        assert!(!flags.is_applied(Readiness::Subscribe));

        flags.apply(Readiness::Subscribe);
        flags.unapply(Readiness::Publish);
        assert!(!flags.is_applied(Readiness::Publish));
        assert!(flags.is_applied(Readiness::Subscribe));
    }

    #[test]
    fn test_reapply() {
        let flags = ReadyFlags::new();
        flags.apply(Readiness::Publish);
        flags.unapply(Readiness::Publish);
        flags.apply(Readiness::Publish);
        assert!(flags.is_applied(Readiness::Publish));
    }
}
