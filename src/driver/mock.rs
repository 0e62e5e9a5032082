//! An in-memory fake of the raw driver primitive, used by unit/integration
//! tests and the default (non-`cuda`) build of the demo binary.
//!
//! Mirrors the teacher's preference for hand-rolled atomics over a mutex
//! where the contended state is small (`buffer_pool::BufferPool`'s
//! `write_cursor`/`read_cursor`).

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use super::{Device, Handle};
use crate::error::DeviceError;

/// Fake driver: allocates opaque addresses out of a monotone counter and
/// never touches real memory. Useful for exercising every pool invariant
/// deterministically without a GPU.
pub struct MockDevice {
    next_address: AtomicUsize,
    capacity: Option<usize>,
    used: AtomicUsize,
    alloc_calls: AtomicU64,
    free_calls: AtomicU64,
    invalidated: Mutex<HashSet<usize>>,
    fault_next: std::sync::atomic::AtomicBool,
}

impl MockDevice {
    pub fn new() -> Self {
        Self::with_capacity(None)
    }

    /// A mock device whose own (simulated) backing store is bounded, so
    /// `device_alloc` itself can return driver OOM independent of any
    /// shim-level `usage_limit`.
    pub fn with_capacity(capacity: Option<usize>) -> Self {
        Self {
            next_address: AtomicUsize::new(0x1000),
            capacity,
            used: AtomicUsize::new(0),
            alloc_calls: AtomicU64::new(0),
            free_calls: AtomicU64::new(0),
            invalidated: Mutex::new(HashSet::new()),
            fault_next: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Make the next `device_alloc` call report a non-OOM driver fault
    /// instead of succeeding or reporting OOM. Used to exercise the
    /// DRIVER_FAULT path (spec.md §7), which a capacity-limited mock alone
    /// can't reach.
    pub fn fail_next_with_fault(&self) {
        self.fault_next.store(true, Ordering::Relaxed);
    }

    pub fn alloc_calls(&self) -> u64 {
        self.alloc_calls.load(Ordering::Relaxed)
    }

    pub fn free_calls(&self) -> u64 {
        self.free_calls.load(Ordering::Relaxed)
    }

    /// Mark a handle's context as gone so later frees of it become no-ops.
    pub fn invalidate(&self, address: usize) {
        self.invalidated.lock().unwrap().insert(address);
    }
}

impl Default for MockDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl Device for MockDevice {
    fn device_alloc(&self, nbytes: usize) -> Result<Handle, DeviceError> {
        if self.fault_next.swap(false, Ordering::Relaxed) {
            return Err(DeviceError::Fault("mock driver fault"));
        }
        if let Some(cap) = self.capacity {
            let used = self.used.load(Ordering::Relaxed);
            if used + nbytes > cap {
                return Err(DeviceError::OutOfMemory);
            }
        }
        self.alloc_calls.fetch_add(1, Ordering::Relaxed);
        self.used.fetch_add(nbytes, Ordering::Relaxed);
        let address = self
            .next_address
            .fetch_add(nbytes.max(1), Ordering::Relaxed);
        Ok(Handle::new(address, nbytes, Box::new(())))
    }

    fn device_free(&self, handle: Handle) {
        self.free_calls.fetch_add(1, Ordering::Relaxed);
        self.used.fetch_sub(handle.size(), Ordering::Relaxed);
    }

    fn is_context_valid(&self, handle: &Handle) -> bool {
        !self.invalidated.lock().unwrap().contains(&handle.address())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_assigns_unique_growing_addresses() {
        let dev = MockDevice::new();
        let a = dev.device_alloc(100).unwrap();
        let b = dev.device_alloc(100).unwrap();
        assert_ne!(a.address(), b.address());
        assert_eq!(a.size(), 100);
    }

    #[test]
    fn capacity_limited_device_oom_s() {
        let dev = MockDevice::with_capacity(Some(100));
        assert!(dev.device_alloc(50).is_ok());
        assert_eq!(dev.device_alloc(100).unwrap_err(), DeviceError::OutOfMemory);
    }

    #[test]
    fn invalidated_handles_report_invalid_context() {
        let dev = MockDevice::new();
        let h = dev.device_alloc(10).unwrap();
        assert!(dev.is_context_valid(&h));
        dev.invalidate(h.address());
        assert!(!dev.is_context_valid(&h));
        dev.device_free(h);
    }
}
