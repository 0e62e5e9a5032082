use clap::Parser;

use gpupool::config::Config;
use gpupool::dispatcher::Dispatcher;
use gpupool::driver::MockDevice;

#[derive(Parser)]
#[command(about = "GPU device memory pool allocator demo/exerciser")]
struct Args {
    /// Number of alloc/free cycles to run against the configured pool.
    #[arg(short, long, default_value_t = 10_000)]
    iterations: usize,
}

/// A small xorshift-ish PRNG so the demo workload is deterministic without
/// depending on the `rand` crate.
struct Rng(u64);

impl Rng {
    fn next(&mut self) -> usize {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1);
        (self.0 >> 33) as usize
    }
}

fn main() {
    let args = Args::parse();
    let config = Config::from_env().unwrap_or_else(|e| {
        eprintln!("gpupool: invalid configuration: {e}");
        std::process::exit(1);
    });

    eprintln!(
        "gpupool: pool={:?} limit={} iterations={}",
        config.pool_kind,
        config
            .usage_limit
            .map(|l| l.to_string())
            .unwrap_or_else(|| "unbounded".into()),
        args.iterations
    );

    let dispatcher = Dispatcher::new(MockDevice::new(), config.pool_kind, config.usage_limit);

    let mut rng = Rng(0xdeadbeefu64);
    let mut live = Vec::new();
    for _ in 0..args.iterations {
        if live.len() < 4 || rng.next() % 2 == 0 {
            let size = 64 + rng.next() % (4 << 20);
            match dispatcher.alloc(size) {
                Ok(h) => live.push(h),
                Err(e) => {
                    eprintln!("gpupool: allocation failed: {e}");
                    break;
                }
            }
        } else {
            let idx = rng.next() % live.len();
            dispatcher.free(live.remove(idx));
        }
    }
    for h in live {
        dispatcher.free(h);
    }

    if config.trace || config.pool_kind_explicit {
        print_exit_summary(&dispatcher);
    }
}

/// C11: exit-summary printer, built on C2's stats snapshot.
fn print_exit_summary(dispatcher: &Dispatcher<MockDevice>) {
    let snap = dispatcher.stats().snapshot();
    eprintln!("gpupool: exit summary ({})", dispatcher.name());
    eprintln!("  used_bytes:     {}", dispatcher.used_bytes());
    eprintln!("  cached_bytes:   {}", dispatcher.cached_bytes());
    eprintln!("  alloc_requests: {}", snap.alloc_requests);
    eprintln!("  free_requests:  {}", snap.free_requests);
    eprintln!(
        "  driver_alloc:   {} attempts, {} failures, {} bytes",
        snap.driver_alloc_attempts, snap.driver_alloc_failures, snap.driver_alloc_bytes
    );
    eprintln!(
        "  driver_free:    {} calls, {} bytes",
        snap.driver_free_calls, snap.driver_free_bytes
    );
    eprintln!("  limit_rejections: {}", snap.limit_rejections);
    eprintln!(
        "  alloc_nanos: {}, free_nanos: {}",
        snap.alloc_nanos, snap.free_nanos
    );
}
