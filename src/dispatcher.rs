//! C7: dispatcher. Owns the driver instance, builds the configured `Pool`
//! strategy in front of it, and is the only thing application code talks
//! to. Routes `alloc`/`free`, enforces the size contract at the seam, and
//! supports swapping strategies at runtime via `switch_pool`.

use std::sync::Arc;

use crate::config::PoolKind;
use crate::driver::{Device, Handle};
use crate::dummy_pool::DummyPool;
use crate::error::PoolError;
use crate::gc::{GcHook, NoopGcHook};
use crate::pool::Pool;
use crate::simple_pool::SimplePool;
use crate::splitting_pool::SplittingPool;

pub struct Dispatcher<D: Device + 'static> {
    device: Arc<D>,
    usage_limit: Option<usize>,
    current: Box<dyn Pool>,
}

impl<D: Device + 'static> Dispatcher<D> {
    pub fn new(device: D, kind: PoolKind, usage_limit: Option<usize>) -> Self {
        let device = Arc::new(device);
        let current = Self::build_pool(kind, device.clone(), usage_limit);
        Self {
            device,
            usage_limit,
            current,
        }
    }

    fn build_pool(kind: PoolKind, device: Arc<D>, usage_limit: Option<usize>) -> Box<dyn Pool> {
        let gc: Box<dyn GcHook> = Box::new(NoopGcHook);
        match kind {
            PoolKind::Dummy => Box::new(DummyPool::new(device, usage_limit, gc)),
            PoolKind::Simple => Box::new(SimplePool::new(device, usage_limit, gc)),
            PoolKind::Split => Box::new(SplittingPool::new(device, usage_limit, gc)),
        }
    }

    pub fn alloc(&self, nbytes: usize) -> Result<Handle, PoolError> {
        let handle = self.current.alloc(nbytes)?;
        assert!(
            handle.size() >= nbytes,
            "pool {} violated the size contract: {} < {nbytes}",
            self.current.name(),
            handle.size()
        );
        Ok(handle)
    }

    pub fn free(&self, handle: Handle) {
        self.current.free(handle)
    }

    pub fn used_bytes(&self) -> usize {
        self.current.used_bytes()
    }

    pub fn cached_bytes(&self) -> usize {
        self.current.cached_bytes()
    }

    /// Asserts no live handles remain, then releases the running pool's
    /// cache. Fatal (panics) if application-held handles are outstanding.
    pub fn deinit(&self) {
        self.current.deinit();
    }

    pub fn name(&self) -> &'static str {
        self.current.name()
    }

    pub fn stats(&self) -> &crate::stats::Stats {
        self.current.stats()
    }

    /// Deinitialize the running pool and replace it with a fresh instance
    /// of `kind`, sharing the same underlying driver. Fatal (via
    /// `Pool::deinit`) if the current pool has outstanding handles.
    pub fn switch_pool(&mut self, kind: PoolKind) {
        self.current.deinit();
        self.current = Self::build_pool(kind, self.device.clone(), self.usage_limit);
    }
}
