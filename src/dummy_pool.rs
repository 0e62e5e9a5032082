//! C4: DummyPool. No caching — a baseline for debugging the surrounding
//! system. `alloc` runs the ladder with only the driver-alloc sub-step;
//! `free` calls the driver immediately.

use std::collections::HashMap;

use crate::driver::{Device, DriverShim, Handle};
use crate::error::PoolError;
use crate::gc::GcHook;
use crate::ladder;
use crate::pool::Pool;
use crate::spinlock::SpinLock;

pub struct DummyPool<D: Device> {
    shim: DriverShim<D>,
    gc: Box<dyn GcHook>,
    allocated: SpinLock<HashMap<usize, usize>>,
}

impl<D: Device> DummyPool<D> {
    pub fn new(device: D, usage_limit: Option<usize>, gc: Box<dyn GcHook>) -> Self {
        Self {
            shim: DriverShim::new(device, usage_limit),
            gc,
            allocated: SpinLock::new(HashMap::new()),
        }
    }

    pub fn stats(&self) -> &crate::stats::Stats {
        self.shim.stats()
    }
}

impl<D: Device> Pool for DummyPool<D> {
    fn alloc(&self, nbytes: usize) -> Result<Handle, PoolError> {
        let handle = ladder::run_ladder(
            self.gc.as_ref(),
            || None,
            || self.shim.actual_alloc(nbytes),
            || None,
            || self.shim.actual_alloc(nbytes),
        )
        .ok_or(PoolError::OutOfMemory)?;

        debug_assert!(handle.size() >= nbytes);
        self.allocated
            .lock()
            .insert(handle.address(), handle.size());
        Ok(handle)
    }

    fn free(&self, handle: Handle) {
        let removed = self.allocated.lock().remove(&handle.address());
        assert!(
            removed.is_some(),
            "double-free or unknown handle at address {:#x}",
            handle.address()
        );
        self.shim.actual_free(handle);
    }

    fn used_bytes(&self) -> usize {
        self.allocated.lock().values().sum()
    }

    fn cached_bytes(&self) -> usize {
        0
    }

    fn deinit(&self) {
        let allocated = self.allocated.lock();
        assert!(
            allocated.is_empty(),
            "deinit with {} outstanding handle(s)",
            allocated.len()
        );
    }

    fn name(&self) -> &'static str {
        "dummy"
    }

    fn stats(&self) -> &crate::stats::Stats {
        self.shim.stats()
    }
}
