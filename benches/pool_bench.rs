//! Manual-timing benches comparing DummyPool, SimplePool, and SplittingPool
//! under a steady-state alloc/free churn, in the teacher's
//! `harness = false` + hand-rolled `Instant` style (buffer_pool_bench.rs).

use std::env;
use std::hint::black_box;
use std::time::Instant;

use gpupool::config::PoolKind;
use gpupool::dispatcher::Dispatcher;
use gpupool::driver::MockDevice;

const ITERATIONS: usize = 200_000;

struct Rng(u64);

impl Rng {
    fn next(&mut self) -> usize {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1);
        (self.0 >> 33) as usize
    }
}

/// Steady-state churn: keep a ring of live handles, repeatedly free the
/// oldest and allocate a fresh one of the same size class mix, mirroring
/// `buffer_pool_bench.rs`'s wraparound-ring pattern.
fn bench_pool(kind: PoolKind, size: usize, label: &str) {
    let dispatcher = Dispatcher::new(MockDevice::new(), kind, None);

    const RING_SIZE: usize = 256;
    let mut ring: Vec<_> = (0..RING_SIZE)
        .map(|_| dispatcher.alloc(size).unwrap())
        .collect();

    // Warm up: let the pool populate its free-list before timing.
    for i in 0..RING_SIZE * 4 {
        let old = std::mem::replace(&mut ring[i % RING_SIZE], dispatcher.alloc(size).unwrap());
        dispatcher.free(old);
    }

    let start = Instant::now();
    for i in 0..ITERATIONS {
        let fresh = dispatcher.alloc(size).unwrap();
        black_box(&fresh);
        let old = std::mem::replace(&mut ring[i % RING_SIZE], fresh);
        dispatcher.free(old);
    }
    let elapsed = start.elapsed();
    let ns_per_op = elapsed.as_nanos() as f64 / ITERATIONS as f64;
    let ops_per_sec = ITERATIONS as f64 / elapsed.as_secs_f64();

    eprintln!(
        "{:32} {:8.2} ns/op  {:12.0} ops/sec  (driver_alloc={})",
        label,
        ns_per_op,
        ops_per_sec,
        dispatcher.stats().driver_alloc_attempts()
    );

    for h in ring {
        dispatcher.free(h);
    }
}

/// Mixed-size workload exercising splitting/coalescing instead of a single
/// fixed size per ring slot.
fn bench_mixed(kind: PoolKind, label: &str) {
    let dispatcher = Dispatcher::new(MockDevice::new(), kind, None);
    let mut rng = Rng(0x5eed);
    let mut live = Vec::new();

    let start = Instant::now();
    for _ in 0..ITERATIONS {
        if live.len() < 8 || rng.next() % 2 == 0 {
            let size = 64 + rng.next() % (2 << 20);
            live.push(dispatcher.alloc(size).unwrap());
        } else {
            let idx = rng.next() % live.len();
            dispatcher.free(live.remove(idx));
        }
    }
    let elapsed = start.elapsed();
    eprintln!(
        "{:32} {:8.2} ns/op over {} ops  (driver_alloc={}, cached_bytes={})",
        label,
        elapsed.as_nanos() as f64 / ITERATIONS as f64,
        ITERATIONS,
        dispatcher.stats().driver_alloc_attempts(),
        dispatcher.cached_bytes(),
    );
    for h in live {
        dispatcher.free(h);
    }
}

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.iter().any(|a| a == "--mixed") {
        eprintln!("Mixed-size churn (64 B .. 2 MiB), {ITERATIONS} ops\n");
        bench_mixed(PoolKind::Dummy, "dummy/mixed");
        bench_mixed(PoolKind::Simple, "simple/mixed");
        bench_mixed(PoolKind::Split, "split/mixed");
    } else {
        eprintln!("Fixed-size steady-state churn, {ITERATIONS} ops\n");
        for &size in &[4096usize, 64 * 1024, 512 * 1024, 4 * 1024 * 1024] {
            let label_suffix = if size < 1024 * 1024 {
                format!("{} KiB", size / 1024)
            } else {
                format!("{} MiB", size / (1024 * 1024))
            };
            bench_pool(PoolKind::Dummy, size, &format!("dummy/{label_suffix}"));
            bench_pool(PoolKind::Simple, size, &format!("simple/{label_suffix}"));
            bench_pool(PoolKind::Split, size, &format!("split/{label_suffix}"));
        }
        eprintln!("\nRun with --mixed for a variable-size churn workload.");
    }
}
