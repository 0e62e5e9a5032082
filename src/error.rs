//! Error types for the pool allocator.
//!
//! Kept as plain enums with hand-written `Display`/`Error` impls, matching
//! `buffer_pool::AllocError`'s style: no `anyhow`/`thiserror` in this crate.

use std::fmt;

/// Error raised by the raw driver primitive (external collaborator).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceError {
    /// The driver itself is out of memory. Translated to `None` at the
    /// shim boundary so the fallback ladder can retry deterministically.
    OutOfMemory,
    /// Any other driver failure. Propagates unchanged as `PoolError::DriverFault`.
    Fault(&'static str),
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::OutOfMemory => write!(f, "driver out of memory"),
            DeviceError::Fault(msg) => write!(f, "driver fault: {msg}"),
        }
    }
}

impl std::error::Error for DeviceError {}

/// Error surfaced by `Pool::alloc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    /// Recoverable: the full 3-phase ladder ran and no memory could be found.
    OutOfMemory,
    /// A non-OOM driver failure, propagated unchanged.
    DriverFault(&'static str),
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolError::OutOfMemory => write!(f, "pool allocator: out of memory"),
            PoolError::DriverFault(msg) => write!(f, "pool allocator: driver fault: {msg}"),
        }
    }
}

impl std::error::Error for PoolError {}

impl From<DeviceError> for PoolError {
    fn from(e: DeviceError) -> Self {
        match e {
            DeviceError::OutOfMemory => PoolError::OutOfMemory,
            DeviceError::Fault(msg) => PoolError::DriverFault(msg),
        }
    }
}

/// Error raised while reading the environment configuration at startup.
/// Fatal: the caller is expected to abort rather than recover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidLimit(String),
    UnsupportedPool(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidLimit(v) => write!(f, "invalid POOL_MEM_LIMIT value: {v:?}"),
            ConfigError::UnsupportedPool(v) => {
                write!(f, "unsupported POOL_KIND value: {v:?}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
