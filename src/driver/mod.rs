//! The raw driver primitive (C1's external collaborator) and the shim that
//! sits in front of it.
//!
//! `Device` is the out-of-scope `device_alloc`/`device_free`/`is_context_valid`
//! trio from the spec, made into a trait so the pools are driver-agnostic
//! and unit-testable. `mock` backs tests and the default build; `cuda`
//! (feature-gated, mirroring the teacher's `disrust-gpu`/`ort-verify`
//! `required-features = ["cuda"]` binaries) backs a real device.

mod mock;
mod shim;

#[cfg(feature = "cuda")]
mod cuda;

pub use mock::MockDevice;
pub use shim::DriverShim;

#[cfg(feature = "cuda")]
pub use cuda::CudaDevice;

use crate::error::DeviceError;

/// A handle to a contiguous device-memory region, exclusively owned: at any
/// instant it is held by the application, by a pool's free set, or destroyed.
///
/// `address` is an opaque identity (equality and arithmetic only, never
/// dereferenced) and `payload` carries whatever device-specific resource
/// needs to be kept alive until `Device::device_free` runs.
pub struct Handle {
    address: usize,
    size: usize,
    #[allow(dead_code)] // kept alive for its Drop impl, never read directly
    payload: Box<dyn std::any::Any + Send>,
}

impl Handle {
    pub fn new(address: usize, size: usize, payload: Box<dyn std::any::Any + Send>) -> Self {
        Self {
            address,
            size,
            payload,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn address(&self) -> usize {
        self.address
    }
}

impl std::fmt::Debug for Handle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle")
            .field("address", &self.address)
            .field("size", &self.size)
            .finish()
    }
}

/// The raw driver primitive. Out of scope to implement for real except
/// behind the `cuda` feature; everything else in this crate only depends
/// on this trait.
pub trait Device: Send + Sync {
    /// Allocate `nbytes` from the driver. Returns `DeviceError::OutOfMemory`
    /// on driver OOM; any other failure is a `DeviceError::Fault`.
    fn device_alloc(&self, nbytes: usize) -> Result<Handle, DeviceError>;

    /// Release `handle` back to the driver.
    fn device_free(&self, handle: Handle);

    /// Whether the device context that minted `handle` is still valid.
    /// An invalid context means the owning context has already released
    /// its resources; freeing such a handle is a silent no-op.
    fn is_context_valid(&self, handle: &Handle) -> bool;
}

/// Lets the dispatcher share one driver instance across pools built for the
/// same `Arc<D>` (e.g. across a `switch_pool` call).
impl<T: Device> Device for std::sync::Arc<T> {
    fn device_alloc(&self, nbytes: usize) -> Result<Handle, DeviceError> {
        (**self).device_alloc(nbytes)
    }

    fn device_free(&self, handle: Handle) {
        (**self).device_free(handle)
    }

    fn is_context_valid(&self, handle: &Handle) -> bool {
        (**self).is_context_valid(handle)
    }
}
