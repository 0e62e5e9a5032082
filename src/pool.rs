//! C3: the uniform pool contract every strategy (C4-C6) implements.

use crate::driver::Handle;
use crate::error::PoolError;

pub trait Pool: Send + Sync {
    /// Allocate at least `nbytes`. Signals `PoolError::OutOfMemory` only
    /// after the full fallback ladder has run.
    fn alloc(&self, nbytes: usize) -> Result<Handle, PoolError>;

    /// Infallible except for the double-free/invalid-state assertions
    /// spec.md §7 calls fatal.
    fn free(&self, handle: Handle);

    /// Sum of sizes of currently-handed-out handles.
    fn used_bytes(&self) -> usize;

    /// Sum of sizes held in the free-list(s).
    fn cached_bytes(&self) -> usize;

    /// Asserts no live handles remain, then releases the cache.
    /// Fatal (panics) if application-held handles are outstanding.
    fn deinit(&self);

    /// Human-readable name, used by the dispatcher's exit summary.
    fn name(&self) -> &'static str;

    /// Counters and span timers, used by the dispatcher's exit summary.
    fn stats(&self) -> &crate::stats::Stats;
}
