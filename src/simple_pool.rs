//! C5: SimplePool. A single ordered free-list of raw driver buffers — no
//! splitting or merging, a buffer keeps the exact size the driver gave it.

use std::collections::BTreeMap;

use crate::constants::{SIMPLE_OVERSIZE_FACTOR, SIMPLE_TIERED_CUTOFF};
use crate::driver::{Device, DriverShim, Handle};
use crate::error::PoolError;
use crate::gc::GcHook;
use crate::ladder;
use crate::pool::Pool;
use crate::spinlock::SpinLock;

/// Free-set ordered by `(size, address)`: a `BTreeMap` naturally orders by
/// key, giving size-major, address-minor ordering and unique keys per
/// spec.md §3's "ordered set keyed by (size, identity)".
type FreeSet = BTreeMap<(usize, usize), Handle>;

/// All of SimplePool's shared mutable state behind one lock, matching
/// spec.md §5's single-lock discipline (the same guard SplittingPool uses
/// for its free-lists and block graph).
struct State {
    available: FreeSet,
    allocated: BTreeMap<usize, usize>,
}

pub struct SimplePool<D: Device> {
    shim: DriverShim<D>,
    gc: Box<dyn GcHook>,
    state: SpinLock<State>,
}

fn fits(requested: usize, candidate: usize) -> bool {
    if candidate < requested {
        return false;
    }
    if requested <= SIMPLE_TIERED_CUTOFF {
        true
    } else {
        candidate < requested * SIMPLE_OVERSIZE_FACTOR
    }
}

impl<D: Device> SimplePool<D> {
    pub fn new(device: D, usage_limit: Option<usize>, gc: Box<dyn GcHook>) -> Self {
        Self {
            shim: DriverShim::new(device, usage_limit),
            gc,
            state: SpinLock::new(State {
                available: BTreeMap::new(),
                allocated: BTreeMap::new(),
            }),
        }
    }

    pub fn stats(&self) -> &crate::stats::Stats {
        self.shim.stats()
    }

    /// Return the smallest AVAILABLE buffer whose size fits `sz` under the
    /// tiered oversize policy (spec.md §4.4).
    fn scan(&self, sz: usize) -> Option<Handle> {
        let mut state = self.state.lock();
        let key = state
            .available
            .range((sz, 0)..)
            .find(|&(&(size, _), _)| fits(sz, size))
            .map(|(&k, _)| k);
        key.and_then(|k| state.available.remove(&k))
    }

    /// Pop largest AVAILABLE buffers (reverse size order) and return each
    /// to the driver until cumulative freed >= `sz` or the list is empty.
    fn reclaim(&self, sz: usize) {
        let mut freed = 0usize;
        while freed < sz {
            let handle = {
                let mut state = self.state.lock();
                let key = state.available.keys().next_back().copied();
                key.and_then(|k| state.available.remove(&k))
            };
            let Some(handle) = handle else { break };
            freed += handle.size();
            self.shim.actual_free(handle);
        }
    }
}

impl<D: Device> Pool for SimplePool<D> {
    fn alloc(&self, nbytes: usize) -> Result<Handle, PoolError> {
        let handle = self.stats().time(crate::stats::Span::Alloc, || {
            self.stats().inc_alloc_requests();
            ladder::run_ladder(
                self.gc.as_ref(),
                || self.scan(nbytes),
                || self.shim.actual_alloc(nbytes),
                || None, // SimplePool never splits/compacts
                || {
                    self.reclaim(nbytes);
                    self.shim.actual_alloc(nbytes)
                },
            )
        });
        let handle = handle.ok_or(PoolError::OutOfMemory)?;

        debug_assert!(handle.size() >= nbytes);
        self.state
            .lock()
            .allocated
            .insert(handle.address(), handle.size());
        Ok(handle)
    }

    fn free(&self, handle: Handle) {
        self.stats().time(crate::stats::Span::Free, || {
            self.stats().inc_free_requests();
            let mut state = self.state.lock();
            let removed = state.allocated.remove(&handle.address());
            assert!(
                removed.is_some(),
                "double-free or unknown handle at address {:#x}",
                handle.address()
            );
            let key = (handle.size(), handle.address());
            state.available.insert(key, handle);
        });
    }

    fn used_bytes(&self) -> usize {
        self.state.lock().allocated.values().sum()
    }

    fn cached_bytes(&self) -> usize {
        self.state
            .lock()
            .available
            .keys()
            .map(|(size, _)| size)
            .sum()
    }

    fn deinit(&self) {
        let handles: Vec<Handle> = {
            let mut state = self.state.lock();
            assert!(
                state.allocated.is_empty(),
                "deinit with {} outstanding handle(s)",
                state.allocated.len()
            );
            std::mem::take(&mut state.available).into_values().collect()
        };
        for handle in handles {
            self.shim.actual_free(handle);
        }
    }

    fn name(&self) -> &'static str {
        "simple"
    }

    fn stats(&self) -> &crate::stats::Stats {
        self.shim.stats()
    }
}
