//! Basic type definitions for the relay
//!
//! Provides newtype wrappers for type safety:
//! - `SlotIndex`: position of a connection in the fixed-capacity slot table
//! - `Generation`: allocation counter distinguishing successive users of one index

/// Slot table index (newtype pattern)
///
/// Stable for the lifetime of one connection; may be reused by a later
/// connection only after the previous worker has been reaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotIndex(pub usize);

impl SlotIndex {
    pub fn get(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for SlotIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Allocation generation of a slot
///
/// Every allocation receives a fresh value, so an exit event can be matched
/// against the allocation it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Generation(pub u64);

impl Generation {
    /// The generation following this one
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "g{}", self.0)
    }
}
