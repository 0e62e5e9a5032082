//! C2: stats & timing. Counters for requests, driver calls, bytes, and a
//! named-span timer, gated behind the `metrics` feature (default-on) the
//! way the teacher gates `metrics::imp` behind `#[cfg(feature = "metrics")]`.

#[cfg(feature = "metrics")]
mod imp {
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Instant;

    #[derive(Default)]
    pub struct Stats {
        alloc_requests: AtomicU64,
        free_requests: AtomicU64,
        driver_alloc_attempts: AtomicU64,
        driver_alloc_failures: AtomicU64,
        driver_alloc_bytes: AtomicU64,
        driver_free_calls: AtomicU64,
        driver_free_bytes: AtomicU64,
        limit_rejections: AtomicU64,
        alloc_nanos: AtomicU64,
        free_nanos: AtomicU64,
    }

    /// Which named span a timed call belongs to.
    #[derive(Clone, Copy, Debug)]
    pub enum Span {
        Alloc,
        Free,
    }

    impl Stats {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn inc_alloc_requests(&self) {
            self.alloc_requests.fetch_add(1, Ordering::Relaxed);
        }
        pub fn inc_free_requests(&self) {
            self.free_requests.fetch_add(1, Ordering::Relaxed);
        }
        pub fn inc_driver_alloc_attempts(&self) {
            self.driver_alloc_attempts.fetch_add(1, Ordering::Relaxed);
        }
        pub fn inc_driver_alloc_failures(&self) {
            self.driver_alloc_failures.fetch_add(1, Ordering::Relaxed);
        }
        pub fn inc_limit_rejections(&self) {
            self.limit_rejections.fetch_add(1, Ordering::Relaxed);
        }
        pub fn record_driver_alloc(&self, nbytes: usize) {
            self.driver_alloc_bytes
                .fetch_add(nbytes as u64, Ordering::Relaxed);
        }
        pub fn record_driver_free(&self, nbytes: usize) {
            self.driver_free_calls.fetch_add(1, Ordering::Relaxed);
            self.driver_free_bytes
                .fetch_add(nbytes as u64, Ordering::Relaxed);
        }

        /// Run `f`, attributing its wall-clock time to the named span.
        pub fn time<T>(&self, span: Span, f: impl FnOnce() -> T) -> T {
            let start = Instant::now();
            let result = f();
            let elapsed = start.elapsed().as_nanos() as u64;
            let counter = match span {
                Span::Alloc => &self.alloc_nanos,
                Span::Free => &self.free_nanos,
            };
            counter.fetch_add(elapsed, Ordering::Relaxed);
            result
        }

        pub fn driver_alloc_attempts(&self) -> u64 {
            self.driver_alloc_attempts.load(Ordering::Relaxed)
        }
        pub fn driver_free_bytes(&self) -> u64 {
            self.driver_free_bytes.load(Ordering::Relaxed)
        }

        pub fn snapshot(&self) -> Snapshot {
            Snapshot {
                alloc_requests: self.alloc_requests.load(Ordering::Relaxed),
                free_requests: self.free_requests.load(Ordering::Relaxed),
                driver_alloc_attempts: self.driver_alloc_attempts.load(Ordering::Relaxed),
                driver_alloc_failures: self.driver_alloc_failures.load(Ordering::Relaxed),
                driver_alloc_bytes: self.driver_alloc_bytes.load(Ordering::Relaxed),
                driver_free_calls: self.driver_free_calls.load(Ordering::Relaxed),
                driver_free_bytes: self.driver_free_bytes.load(Ordering::Relaxed),
                limit_rejections: self.limit_rejections.load(Ordering::Relaxed),
                alloc_nanos: self.alloc_nanos.load(Ordering::Relaxed),
                free_nanos: self.free_nanos.load(Ordering::Relaxed),
            }
        }
    }

    #[derive(Clone, Copy, Debug, Default)]
    pub struct Snapshot {
        pub alloc_requests: u64,
        pub free_requests: u64,
        pub driver_alloc_attempts: u64,
        pub driver_alloc_failures: u64,
        pub driver_alloc_bytes: u64,
        pub driver_free_calls: u64,
        pub driver_free_bytes: u64,
        pub limit_rejections: u64,
        pub alloc_nanos: u64,
        pub free_nanos: u64,
    }
}

#[cfg(not(feature = "metrics"))]
mod imp {
    #[derive(Default)]
    pub struct Stats;

    #[derive(Clone, Copy)]
    pub enum Span {
        Alloc,
        Free,
    }

    impl Stats {
        pub fn new() -> Self {
            Self
        }
        pub fn inc_alloc_requests(&self) {}
        pub fn inc_free_requests(&self) {}
        pub fn inc_driver_alloc_attempts(&self) {}
        pub fn inc_driver_alloc_failures(&self) {}
        pub fn inc_limit_rejections(&self) {}
        pub fn record_driver_alloc(&self, _nbytes: usize) {}
        pub fn record_driver_free(&self, _nbytes: usize) {}
        pub fn time<T>(&self, _span: Span, f: impl FnOnce() -> T) -> T {
            f()
        }
        pub fn driver_alloc_attempts(&self) -> u64 {
            0
        }
        pub fn driver_free_bytes(&self) -> u64 {
            0
        }
        pub fn snapshot(&self) -> Snapshot {
            Snapshot::default()
        }
    }

    #[derive(Clone, Copy, Default)]
    pub struct Snapshot {
        pub alloc_requests: u64,
        pub free_requests: u64,
        pub driver_alloc_attempts: u64,
        pub driver_alloc_failures: u64,
        pub driver_alloc_bytes: u64,
        pub driver_free_calls: u64,
        pub driver_free_bytes: u64,
        pub limit_rejections: u64,
        pub alloc_nanos: u64,
        pub free_nanos: u64,
    }
}

pub use imp::*;
