//! Cross-pool integration tests for the universal invariants and
//! end-to-end scenarios in spec.md §8, driven through the `Dispatcher`
//! (C7) exactly the way application code would use it.

use gpupool::config::PoolKind;
use gpupool::dispatcher::Dispatcher;
use gpupool::driver::MockDevice;

struct Rng(u64);

impl Rng {
    fn next(&mut self) -> usize {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1);
        (self.0 >> 33) as usize
    }
}

fn all_kinds() -> [PoolKind; 3] {
    [PoolKind::Dummy, PoolKind::Simple, PoolKind::Split]
}

/// Invariant 2: every handle returned by `alloc(sz)` satisfies
/// `handle.size() >= sz`.
#[test]
fn size_contract_holds_for_every_pool() {
    for kind in all_kinds() {
        let d = Dispatcher::new(MockDevice::new(), kind, None);
        for sz in [1usize, 63, 512, 4096, 1 << 20, 5 << 20, 40 << 20] {
            let h = d.alloc(sz).unwrap();
            assert!(h.size() >= sz, "{kind:?} violated size contract at {sz}");
            d.free(h);
        }
    }
}

/// Invariant 4: after freeing every live handle and calling `deinit`,
/// both `used_bytes` and `cached_bytes` are zero.
#[test]
fn deinit_quiescence_holds_for_every_pool() {
    for kind in all_kinds() {
        let d = Dispatcher::new(MockDevice::new(), kind, None);
        let mut rng = Rng(0xabc123);
        let mut live = Vec::new();
        for _ in 0..300 {
            if live.len() < 4 || rng.next() % 2 == 0 {
                let sz = 64 + rng.next() % (1 << 20);
                live.push(d.alloc(sz).unwrap());
            } else {
                let idx = rng.next() % live.len();
                d.free(live.remove(idx));
            }
        }
        for h in live {
            d.free(h);
        }
        assert_eq!(
            d.used_bytes(),
            0,
            "{kind:?} used_bytes nonzero at quiescence"
        );
        d.deinit();
        assert_eq!(
            d.cached_bytes(),
            0,
            "{kind:?} cached_bytes nonzero after deinit"
        );
    }
}

/// Invariant 1 (conservation): `used_bytes + cached_bytes ==
/// driver_alloc_bytes - driver_free_bytes` at every quiescent point of a
/// randomised alloc/free workload, for every pool strategy.
#[test]
fn conservation_holds_across_randomised_churn_for_every_pool() {
    for kind in all_kinds() {
        let d = Dispatcher::new(MockDevice::new(), kind, None);
        let mut rng = Rng(0x9e3779b9);
        let mut live = Vec::new();
        for _ in 0..2000 {
            if live.len() < 4 || rng.next() % 2 == 0 {
                let sz = 64 + rng.next() % (4 << 20);
                live.push(d.alloc(sz).unwrap());
            } else {
                let idx = rng.next() % live.len();
                d.free(live.remove(idx));
            }
            let snap = d.stats().snapshot();
            let driver_net = snap.driver_alloc_bytes as usize - snap.driver_free_bytes as usize;
            assert_eq!(
                d.used_bytes() + d.cached_bytes(),
                driver_net,
                "{kind:?} conservation invariant broken"
            );
        }
        for h in live {
            d.free(h);
        }
    }
}

/// E1: SimplePool reuses an exact-size match; the driver is called once.
#[test]
fn e1_simple_pool_reuses_exact_size_match() {
    let d = Dispatcher::new(MockDevice::new(), PoolKind::Simple, None);
    let a = d.alloc(1024).unwrap();
    let a_size = a.size();
    d.free(a);
    assert_eq!(d.cached_bytes(), a_size);
    let b = d.alloc(1024).unwrap();
    assert_eq!(b.size(), a_size);
    assert_eq!(d.stats().driver_alloc_attempts(), 1);
    // Reused the only cached buffer, so nothing is left cached before the
    // final free (spec.md §8 E1: "cached_bytes is 0 before final free").
    assert_eq!(d.cached_bytes(), 0);
    d.free(b);
}

/// E2: SimplePool rejects a too-small cached buffer; driver called twice.
#[test]
fn e2_simple_pool_rejects_undersized_buffer() {
    let d = Dispatcher::new(MockDevice::new(), PoolKind::Simple, None);
    let a = d.alloc(1024).unwrap();
    d.free(a);
    let b = d.alloc(4096).unwrap();
    assert_eq!(d.stats().driver_alloc_attempts(), 2);
    d.free(b);
}

/// E3: SimplePool rejects an oversized cached buffer at exactly the 4x
/// boundary. Both sizes sit above the 1 MiB tiered cutoff, where the
/// strict `4x` bound (not `+inf`) applies (spec.md §4.4); `8 MiB == 4 * 2
/// MiB` exactly, which must be rejected (`<`, not `<=`).
#[test]
fn e3_simple_pool_rejects_at_the_4x_boundary() {
    let d = Dispatcher::new(MockDevice::new(), PoolKind::Simple, None);
    let a = d.alloc(8 * 1024 * 1024).unwrap();
    d.free(a);
    let b = d.alloc(2 * 1024 * 1024).unwrap();
    assert_eq!(d.stats().driver_alloc_attempts(), 2);
    d.free(b);
}

/// E4: SplittingPool splits a 1 MiB block to serve a 512 KiB request,
/// leaving the remainder cached; the driver is called once.
#[test]
fn e4_splitting_pool_splits_and_caches_remainder() {
    let d = Dispatcher::new(MockDevice::new(), PoolKind::Split, None);
    let a = d.alloc(1024 * 1024).unwrap();
    d.free(a);
    let b = d.alloc(512 * 1024).unwrap();
    assert_eq!(d.cached_bytes(), 512 * 1024);
    assert_eq!(d.stats().driver_alloc_attempts(), 1);
    d.free(b);
}

/// E6: a usage limit below the request size fails with OUT_OF_MEMORY
/// and never touches the driver for that request.
#[test]
fn e6_limit_exceeded_never_touches_driver() {
    for kind in all_kinds() {
        let d = Dispatcher::new(MockDevice::new(), kind, Some(1024 * 1024));
        assert!(d.alloc(2 * 1024 * 1024).is_err());
        assert_eq!(d.stats().driver_alloc_attempts(), 0);
    }
}

/// E7: DummyPool never caches; driver alloc/free counts track the
/// application's alloc/free counts one-to-one.
#[test]
fn e7_dummy_pool_tracks_driver_calls_one_to_one() {
    let d = Dispatcher::new(MockDevice::new(), PoolKind::Dummy, None);
    for _ in 0..100 {
        let h = d.alloc(4096).unwrap();
        assert_eq!(d.cached_bytes(), 0);
        d.free(h);
    }
    let snap = d.stats().snapshot();
    assert_eq!(snap.driver_alloc_attempts, 100);
    assert_eq!(snap.driver_free_calls, 100);
}

/// Round-trip law (§8 #10): after `alloc(sz); free(h); alloc(sz)`, a
/// caching pool reuses memory — driver_alloc grows by at most 1 across
/// the triple.
#[test]
fn round_trip_reuses_cached_memory_for_caching_pools() {
    for kind in [PoolKind::Simple, PoolKind::Split] {
        let d = Dispatcher::new(MockDevice::new(), kind, None);
        let a = d.alloc(8192).unwrap();
        let before = d.stats().driver_alloc_attempts();
        d.free(a);
        let b = d.alloc(8192).unwrap();
        let after = d.stats().driver_alloc_attempts();
        assert!(
            after - before <= 1,
            "{kind:?} grew driver_alloc by more than 1"
        );
        d.free(b);
    }
}

/// `switch_pool` deinits the outgoing pool and serves subsequent requests
/// from the newly installed strategy, sharing the same underlying driver.
#[test]
fn switch_pool_preserves_driver_usage_accounting() {
    let mut d = Dispatcher::new(MockDevice::new(), PoolKind::Dummy, None);
    let h = d.alloc(4096).unwrap();
    d.free(h);
    d.switch_pool(PoolKind::Split);
    assert_eq!(d.name(), "split");
    let h2 = d.alloc(4096).unwrap();
    assert!(h2.size() >= 4096);
    d.free(h2);
}
