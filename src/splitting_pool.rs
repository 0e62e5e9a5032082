//! C6: SplittingPool. Three size-segregated free-lists of blocks carved out
//! of driver buffers ("bases"). Blocks split on alloc and coalesce on free,
//! a whole (unsplit) block is the only thing ever handed back to the
//! driver. The free-lists and block graph share one `SpinLock` per
//! spec.md §5 ("a single non-reentrant spinlock guards each SplittingPool's
//! free-lists and block graph").

use std::collections::{BTreeSet, HashMap, HashSet};

use slab::Slab;

use crate::constants::SizeClass;
use crate::driver::{Device, DriverShim, Handle};
use crate::error::PoolError;
use crate::gc::GcHook;
use crate::ladder;
use crate::pool::Pool;
use crate::spinlock::SpinLock;

fn class_idx(class: SizeClass) -> usize {
    match class {
        SizeClass::Small => 0,
        SizeClass::Large => 1,
        SizeClass::Huge => 2,
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum BlockState {
    Available,
    Allocated,
}

struct Block {
    base: usize,
    base_address: usize,
    offset: usize,
    size: usize,
    state: BlockState,
    class: SizeClass,
    prev: Option<usize>,
    next: Option<usize>,
}

impl Block {
    fn address(&self) -> usize {
        self.base_address + self.offset
    }

    fn is_whole(&self) -> bool {
        self.prev.is_none() && self.next.is_none()
    }
}

struct BaseBuffer {
    handle: Option<Handle>,
}

struct State {
    bases: Slab<BaseBuffer>,
    blocks: Slab<Block>,
    /// One ordered set per size class, keyed by `(size, block_idx)` —
    /// size-major, block-identity-minor, matching spec.md §3.
    free: [BTreeSet<(usize, usize)>; 3],
    allocated: HashMap<usize, usize>,
}

impl State {
    fn new() -> Self {
        Self {
            bases: Slab::new(),
            blocks: Slab::new(),
            free: [BTreeSet::new(), BTreeSet::new(), BTreeSet::new()],
            allocated: HashMap::new(),
        }
    }

    /// Find the smallest AVAILABLE block in `class` satisfying `rounded`,
    /// remove it from the free-list, and return its index. HUGE never
    /// splits and is served exactly (zero overhead per spec.md §4.4).
    fn take_fitting(&mut self, class: SizeClass, rounded: usize) -> Option<usize> {
        let idx = class_idx(class);
        let candidate = if class == SizeClass::Huge {
            self.free[idx]
                .range((rounded, 0)..)
                .next()
                .copied()
                .filter(|&(size, _)| size == rounded)
        } else {
            self.free[idx].range((rounded, 0)..).next().copied()
        };
        let key = candidate?;
        self.free[idx].remove(&key);
        Some(key.1)
    }

    /// Mark `block_idx` ALLOCATED, splitting off a same-class remainder if
    /// the split-on-alloc rule applies, and register it as outstanding.
    fn finalize_alloc(&mut self, block_idx: usize, rounded: usize) -> Handle {
        let class = self.blocks[block_idx].class;
        let whole_size = self.blocks[block_idx].size;
        let remainder = whole_size - rounded;

        if class.may_split() && remainder > 0 && SizeClass::of(remainder) == class {
            let base = self.blocks[block_idx].base;
            let base_address = self.blocks[block_idx].base_address;
            let offset = self.blocks[block_idx].offset;
            let old_next = self.blocks[block_idx].next;

            self.blocks[block_idx].size = rounded;

            let sibling_idx = self.blocks.insert(Block {
                base,
                base_address,
                offset: offset + rounded,
                size: remainder,
                state: BlockState::Available,
                class,
                prev: Some(block_idx),
                next: old_next,
            });
            if let Some(n) = old_next {
                self.blocks[n].prev = Some(sibling_idx);
            }
            self.blocks[block_idx].next = Some(sibling_idx);
            self.free[class_idx(class)].insert((remainder, sibling_idx));
        }

        self.blocks[block_idx].state = BlockState::Allocated;
        let address = self.blocks[block_idx].address();
        let size = self.blocks[block_idx].size;
        self.allocated.insert(address, block_idx);
        Handle::new(address, size, Box::new(()))
    }

    fn scan(&mut self, class: SizeClass, rounded: usize) -> Option<Handle> {
        let idx = self.take_fitting(class, rounded)?;
        Some(self.finalize_alloc(idx, rounded))
    }

    /// Carve a brand-new base buffer of exactly `rounded` bytes. Never
    /// needs a split: the driver was asked for exactly what's needed.
    fn install_new_base(
        &mut self,
        class: SizeClass,
        rounded: usize,
        driver_handle: Handle,
    ) -> Handle {
        let base_address = driver_handle.address();
        let base = self.bases.insert(BaseBuffer {
            handle: Some(driver_handle),
        });
        let block_idx = self.blocks.insert(Block {
            base,
            base_address,
            offset: 0,
            size: rounded,
            state: BlockState::Available,
            class,
            prev: None,
            next: None,
        });
        self.finalize_alloc(block_idx, rounded)
    }

    /// Merge every maximal run of contiguous AVAILABLE siblings in `class`.
    /// Full class-wide sweep: reserved for the ladder's phase 2c/3c
    /// "compact + scan" sub-step and `deinit`, never the free-path.
    fn compact(&mut self, class: SizeClass) {
        let idx = class_idx(class);
        let candidates: Vec<usize> = self.free[idx].iter().map(|&(_, b)| b).collect();
        let mut visited = HashSet::new();

        for start in candidates {
            if visited.contains(&start) {
                continue;
            }
            let run = self.run_containing(start);
            for &b in &run {
                visited.insert(b);
            }
            if run.len() > 1 {
                self.merge_run(idx, &run);
            }
        }
    }

    /// Walk back to the head and forward to the tail of the maximal
    /// contiguous-AVAILABLE run containing `block_idx`.
    fn run_containing(&self, block_idx: usize) -> Vec<usize> {
        let mut head = block_idx;
        while let Some(p) = self.blocks[head].prev {
            if self.blocks[p].state == BlockState::Available {
                head = p;
            } else {
                break;
            }
        }
        let mut run = vec![head];
        let mut cur = head;
        while let Some(n) = self.blocks[cur].next {
            if self.blocks[n].state == BlockState::Available {
                run.push(n);
                cur = n;
            } else {
                break;
            }
        }
        run
    }

    fn merge_run(&mut self, class_idx: usize, run: &[usize]) {
        let base = self.blocks[run[0]].base;
        let base_address = self.blocks[run[0]].base_address;
        let offset = self.blocks[run[0]].offset;
        let class = self.blocks[run[0]].class;
        let new_prev = self.blocks[run[0]].prev;
        let new_next = self.blocks[*run.last().unwrap()].next;
        let total: usize = run.iter().map(|&b| self.blocks[b].size).sum();

        for &b in run {
            self.free[class_idx].remove(&(self.blocks[b].size, b));
            self.blocks.remove(b);
        }

        let merged_idx = self.blocks.insert(Block {
            base,
            base_address,
            offset,
            size: total,
            state: BlockState::Available,
            class,
            prev: new_prev,
            next: new_next,
        });
        if let Some(p) = new_prev {
            self.blocks[p].next = Some(merged_idx);
        }
        if let Some(n) = new_next {
            self.blocks[n].prev = Some(merged_idx);
        }
        self.free[class_idx].insert((total, merged_idx));
    }

    /// Return every whole AVAILABLE block's base buffer to the driver.
    /// Class order is SMALL, then LARGE, then HUGE.
    fn reclaim_all(&mut self, shim: &DriverShim<impl Device>) {
        for class in SizeClass::ALL {
            let idx = class_idx(class);
            let whole: Vec<(usize, usize)> = self.free[idx]
                .iter()
                .copied()
                .filter(|&(_, b)| self.blocks[b].is_whole())
                .collect();
            for key in whole {
                self.free[idx].remove(&key);
                let block = self.blocks.remove(key.1);
                let base = self.bases.remove(block.base);
                let handle = base.handle.expect("base buffer missing its driver handle");
                shim.actual_free(handle);
            }
        }
    }

    /// Incremental coalesce-on-free: merge only `block_idx`'s own maximal
    /// AVAILABLE run. O(chain length), never a class-wide scan.
    fn try_coalesce(&mut self, block_idx: usize) {
        if !self.blocks.contains(block_idx) {
            return;
        }
        let class = self.blocks[block_idx].class;
        let run = self.run_containing(block_idx);
        if run.len() > 1 {
            self.merge_run(class_idx(class), &run);
        }
    }

    fn dump(&self) -> String {
        let mut out = String::new();
        for class in SizeClass::ALL {
            let idx = class_idx(class);
            out.push_str(&format!(
                "  class {:?}: {} available block(s)\n",
                class,
                self.free[idx].len()
            ));
        }
        out.push_str(&format!(
            "  {} outstanding allocation(s)\n",
            self.allocated.len()
        ));
        out
    }
}

pub struct SplittingPool<D: Device> {
    shim: DriverShim<D>,
    gc: Box<dyn GcHook>,
    state: SpinLock<State>,
}

impl<D: Device> SplittingPool<D> {
    pub fn new(device: D, usage_limit: Option<usize>, gc: Box<dyn GcHook>) -> Self {
        Self {
            shim: DriverShim::new(device, usage_limit),
            gc,
            state: SpinLock::new(State::new()),
        }
    }

    pub fn stats(&self) -> &crate::stats::Stats {
        self.shim.stats()
    }
}

impl<D: Device> Pool for SplittingPool<D> {
    fn alloc(&self, nbytes: usize) -> Result<Handle, PoolError> {
        let class = SizeClass::of(nbytes);
        let rounded = class.round_up(nbytes);

        let handle = self.stats().time(crate::stats::Span::Alloc, || {
            self.stats().inc_alloc_requests();
            ladder::run_ladder(
                self.gc.as_ref(),
                || self.state.lock().scan(class, rounded),
                || {
                    let driver_handle = self.shim.actual_alloc(rounded)?;
                    Some(
                        self.state
                            .lock()
                            .install_new_base(class, rounded, driver_handle),
                    )
                },
                || {
                    self.state.lock().compact(class);
                    self.state.lock().scan(class, rounded)
                },
                || {
                    self.state.lock().reclaim_all(&self.shim);
                    let driver_handle = self.shim.actual_alloc(rounded)?;
                    Some(
                        self.state
                            .lock()
                            .install_new_base(class, rounded, driver_handle),
                    )
                },
            )
        });

        match handle {
            Some(h) => {
                debug_assert!(h.size() >= nbytes);
                Ok(h)
            }
            None => {
                eprintln!(
                    "splitting pool: out of memory for {nbytes} bytes\n{}",
                    self.state.lock().dump()
                );
                Err(PoolError::OutOfMemory)
            }
        }
    }

    fn free(&self, handle: Handle) {
        self.stats().time(crate::stats::Span::Free, || {
            self.stats().inc_free_requests();
            let address = handle.address();
            let size = handle.size();
            let block_idx = {
                let mut state = self.state.lock();
                let block_idx = state.allocated.remove(&address).unwrap_or_else(|| {
                    panic!("double-free or unknown handle at address {address:#x}")
                });
                debug_assert_eq!(state.blocks[block_idx].size, size);
                state.blocks[block_idx].state = BlockState::Available;
                let class = state.blocks[block_idx].class;
                state.free[class_idx(class)].insert((size, block_idx));
                block_idx
            };
            // Incremental coalesce: best-effort, skipped if contended.
            if let Some(mut state) = self.state.try_lock() {
                state.try_coalesce(block_idx);
            }
        });
    }

    fn used_bytes(&self) -> usize {
        let state = self.state.lock();
        state
            .allocated
            .values()
            .map(|&b| state.blocks[b].size)
            .sum()
    }

    fn cached_bytes(&self) -> usize {
        let state = self.state.lock();
        state
            .free
            .iter()
            .flat_map(|s| s.iter())
            .map(|&(size, _)| size)
            .sum()
    }

    fn deinit(&self) {
        {
            let state = self.state.lock();
            assert!(
                state.allocated.is_empty(),
                "deinit with {} outstanding handle(s)",
                state.allocated.len()
            );
        }
        let mut state = self.state.lock();
        for class in SizeClass::ALL {
            state.compact(class);
        }
        state.reclaim_all(&self.shim);
    }

    fn name(&self) -> &'static str {
        "split"
    }

    fn stats(&self) -> &crate::stats::Stats {
        self.shim.stats()
    }
}
