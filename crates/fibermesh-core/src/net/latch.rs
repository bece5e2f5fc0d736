//! Connection confirmation latch
//!
//! Correlates low-level connect observations against the expected peer
//! set. Each expected address counts exactly once; addresses outside the
//! set and repeat observations for an already-counted address are
//! ignored, so duplicate transport notifications can never over-count or
//! underflow.

use std::collections::HashSet;

use crate::types::PeerAddr;

/// Countdown over the expected peer set for one connect cycle
#[derive(Debug)]
pub struct ConfirmLatch {
    expected: HashSet<PeerAddr>,
    seen: HashSet<PeerAddr>,
}

impl ConfirmLatch {
    /// Build a latch expecting every given address once
    pub fn new(expected: impl IntoIterator<Item = PeerAddr>) -> Self {
        Self {
            expected: expected.into_iter().collect(),
            seen: HashSet::new(),
        }
    }

    /// Record a connect observation for an address
    ///
    /// Returns `true` only when the address is expected and not yet
    /// counted.
    pub fn observe(&mut self, addr: &PeerAddr) -> bool {
        if !self.expected.contains(addr) {
            return false;
        }
        self.seen.insert(addr.clone())
    }

    /// Whether every expected address has been observed
    ///
    /// An empty expected set is complete from the start.
    pub fn is_complete(&self) -> bool {
        self.seen.len() == self.expected.len()
    }

    /// Addresses still awaited
    pub fn remaining(&self) -> usize {
        self.expected.len() - self.seen.len()
    }
}
