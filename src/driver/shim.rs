//! C1: driver shim. Wraps the raw `Device`, enforces an optional global
//! byte limit, and records stats.

use std::sync::atomic::{AtomicUsize, Ordering};

use super::{Device, Handle};
use crate::stats::Stats;

/// Sits between the pools and the raw driver. Tracks `usage` (bytes
/// currently held from the driver) and enforces `usage_limit` if set.
pub struct DriverShim<D: Device> {
    device: D,
    usage: AtomicUsize,
    usage_limit: Option<usize>,
    stats: Stats,
}

impl<D: Device> DriverShim<D> {
    pub fn new(device: D, usage_limit: Option<usize>) -> Self {
        Self {
            device,
            usage: AtomicUsize::new(0),
            usage_limit,
            stats: Stats::new(),
        }
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn usage(&self) -> usize {
        self.usage.load(Ordering::Relaxed)
    }

    pub fn usage_limit(&self) -> Option<usize> {
        self.usage_limit
    }

    /// `device_alloc(nbytes) -> handle | nil`. Returns `None` on driver OOM
    /// or limit breach so the fallback ladder can retry deterministically.
    /// A non-OOM driver failure (`DeviceError::Fault`) is a DRIVER_FAULT
    /// (spec.md §7): it propagates unchanged rather than being swallowed
    /// into a retryable `None`, so it panics here instead of feeding the
    /// ladder a value indistinguishable from ordinary OOM.
    pub fn actual_alloc(&self, nbytes: usize) -> Option<Handle> {
        if let Some(limit) = self.usage_limit
            && self.usage.load(Ordering::Relaxed) + nbytes > limit
        {
            self.stats.inc_limit_rejections();
            return None;
        }

        self.stats.inc_driver_alloc_attempts();
        match self.device.device_alloc(nbytes) {
            Ok(handle) => {
                self.usage.fetch_add(nbytes, Ordering::Relaxed);
                self.stats.record_driver_alloc(nbytes);
                Some(handle)
            }
            Err(super::DeviceError::OutOfMemory) => {
                self.stats.inc_driver_alloc_failures();
                None
            }
            Err(super::DeviceError::Fault(msg)) => {
                // DRIVER_FAULT propagates unchanged (spec.md §7): this is a
                // non-OOM driver failure, not something the ladder can
                // retry its way out of.
                self.stats.inc_driver_alloc_failures();
                panic!("driver fault: {msg}");
            }
        }
    }

    /// `actual_free(handle)`. Context-invalid handles are dropped silently
    /// (their owning context already released them); `usage` always
    /// decrements and stats always update.
    pub fn actual_free(&self, handle: Handle) {
        let size = handle.size();
        self.usage.fetch_sub(size, Ordering::Relaxed);
        self.stats.record_driver_free(size);
        if self.device.is_context_valid(&handle) {
            self.device.device_free(handle);
        }
        // else: context already gone, drop silently — the owning context
        // released the underlying memory itself.
    }
}
