//! C8: the three-phase fallback ladder every pool's `alloc` runs.
//!
//! | Phase | Pre-action       | Sub-steps |
//! |-------|------------------|-----------|
//! | 1     | none             | scan, driver alloc, reclaim+driver alloc |
//! | 2     | gc(incremental)  | scan, driver alloc, compact+scan, reclaim+driver alloc |
//! | 3     | gc(full)         | scan, driver alloc, compact+scan, reclaim+driver alloc |
//!
//! Implemented as one generic function so DummyPool, SimplePool, and
//! SplittingPool all drive the same state machine with different
//! sub-step closures (DummyPool's scan/compact/reclaim sub-steps are
//! effectively no-ops; see spec.md §4.3).

use crate::driver::Handle;
use crate::gc::GcHook;

/// Drive the ladder to completion. Returns `None` (OUT_OF_MEMORY) only
/// after every phase's sub-steps have all failed.
pub fn run_ladder(
    gc: &dyn GcHook,
    mut scan: impl FnMut() -> Option<Handle>,
    mut driver_alloc: impl FnMut() -> Option<Handle>,
    mut compact_and_scan: impl FnMut() -> Option<Handle>,
    mut reclaim_and_alloc: impl FnMut() -> Option<Handle>,
) -> Option<Handle> {
    // Phase 1: no pre-action.
    if let Some(h) = scan() {
        return Some(h);
    }
    if let Some(h) = driver_alloc() {
        return Some(h);
    }
    if let Some(h) = reclaim_and_alloc() {
        return Some(h);
    }

    // Phase 2: incremental GC, then the same sub-steps plus compaction.
    gc.collect(false);
    if let Some(h) = scan() {
        return Some(h);
    }
    if let Some(h) = driver_alloc() {
        return Some(h);
    }
    if let Some(h) = compact_and_scan() {
        return Some(h);
    }
    if let Some(h) = reclaim_and_alloc() {
        return Some(h);
    }

    // Phase 3: full GC, same sub-steps again.
    gc.collect(true);
    if let Some(h) = scan() {
        return Some(h);
    }
    if let Some(h) = driver_alloc() {
        return Some(h);
    }
    if let Some(h) = compact_and_scan() {
        return Some(h);
    }
    if let Some(h) = reclaim_and_alloc() {
        return Some(h);
    }

    None
}
