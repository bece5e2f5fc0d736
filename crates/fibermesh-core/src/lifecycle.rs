//! Generic fiber base lifecycle
//!
//! Identity, entity registry, and the disposal protocol shared by every
//! fiber flavor. Concrete fibers embed a [`FiberBase`] by value and call
//! its steps explicitly instead of inheriting them.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{FiberError, FiberResult};
use crate::registry::EntityRegistry;
use crate::types::FiberId;

/// Identity, registry, and disposal state for one fiber
pub struct FiberBase {
    id: FiberId,
    registry: EntityRegistry,
    disposed: AtomicBool,
}

impl FiberBase {
    /// Initialize a fresh base with a new identity and empty registry
    pub fn new() -> Self {
        Self {
            id: FiberId::new(),
            registry: EntityRegistry::new(),
            disposed: AtomicBool::new(false),
        }
    }

    /// This fiber's identity
    pub fn id(&self) -> FiberId {
        self.id
    }

    /// The local entity registry
    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    /// Whether the fiber has been disposed
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Fail with [`FiberError::Disposed`] if disposal has happened
    pub fn deny_disposed(&self) -> FiberResult<()> {
        if self.is_disposed() {
            Err(FiberError::Disposed)
        } else {
            Ok(())
        }
    }

    /// Run the base disposal step: mark disposed and clear registrations
    ///
    /// Idempotent; returns `true` only on the transition.
    pub fn dispose(&self) -> bool {
        let first = !self.disposed.swap(true, Ordering::AcqRel);
        if first {
            self.registry.clear();
        }
        first
    }
}

impl Default for FiberBase {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_base_not_disposed() {
        let base = FiberBase::new();
        assert!(!base.is_disposed());
        assert!(base.deny_disposed().is_ok());
    }

    #[test]
    fn test_dispose_denies_and_clears() {
        let base = FiberBase::new();
        let _mailbox = base.registry().register("alice");

        assert!(base.dispose());
        assert!(base.is_disposed());
        assert!(matches!(base.deny_disposed(), Err(FiberError::Disposed)));
        assert!(base.registry().is_empty());
    }

    #[test]
    fn test_dispose_idempotent() {
        let base = FiberBase::new();
        assert!(base.dispose());
        assert!(!base.dispose());
    }

    #[test]
    fn test_unique_ids() {
        assert_ne!(FiberBase::new().id(), FiberBase::new().id());
    }
}
