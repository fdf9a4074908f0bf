//! Exclusive, non-reentrant resource tokens.
//!
//! The link slot, the per-node visited counter, and the per-block Phi-list
//! are each a scarce, graph-wide resource: only one pass may hold a given
//! one at a time, and acquisition does not nest. This mirrors
//! `cranelift-codegen`'s own pattern of `debug_assert!`-guarded invalidation
//! (e.g. `debug_assert!(domtree.is_valid())` in `dce.rs`) rather than a
//! type-level borrow-checked guard: the resource really is graph-global
//! mutable state, so the checks are run-time, not compile-time.

use std::fmt;

/// A scarce, exclusively-held per-graph resource.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Resource {
    /// The per-node `link` slot (node -> partner node).
    Link,
    /// The per-node `visited` counter's current generation.
    Visited,
    /// The per-block Phi list.
    PhiList,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Tracks which of the four resources are currently reserved.
#[derive(Default, Clone, Copy)]
pub struct ResourceSet(u8);

impl ResourceSet {
    fn bit(r: Resource) -> u8 {
        match r {
            Resource::Link => 1 << 0,
            Resource::Visited => 1 << 1,
            Resource::PhiList => 1 << 2,
        }
    }

    /// True if `r` is currently held.
    pub fn is_reserved(self, r: Resource) -> bool {
        self.0 & Self::bit(r) != 0
    }

    /// Reserve `r`. Panics if `r` is already held: reservation is
    /// non-reentrant and a double-reserve is a programming error, per the
    /// design's concurrency model, not a recoverable condition.
    pub fn reserve(&mut self, r: Resource) {
        assert!(
            !self.is_reserved(r),
            "resource {r} reserved twice without an intervening free"
        );
        self.0 |= Self::bit(r);
    }

    /// Release `r`. Panics if `r` was not held.
    pub fn free(&mut self, r: Resource) {
        assert!(self.is_reserved(r), "resource {r} freed without being reserved");
        self.0 &= !Self::bit(r);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[should_panic(expected = "reserved twice")]
    fn double_reserve_panics() {
        let mut set = ResourceSet::default();
        set.reserve(Resource::Link);
        set.reserve(Resource::Link);
    }

    #[test]
    #[should_panic(expected = "freed without being reserved")]
    fn free_without_reserve_panics() {
        let mut set = ResourceSet::default();
        set.free(Resource::Link);
    }

    #[test]
    fn reserve_then_free_then_reserve_again_is_fine() {
        let mut set = ResourceSet::default();
        set.reserve(Resource::Visited);
        set.free(Resource::Visited);
        set.reserve(Resource::Visited);
    }
}
