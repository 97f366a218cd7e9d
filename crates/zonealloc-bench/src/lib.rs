//! Shared workloads for the zonealloc benchmarks.

use zonealloc_core::{Arena, PageSource};

/// Deterministic size stream.
#[derive(Clone, Copy, Debug)]
pub struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self { state: seed.max(1) }
    }

    pub fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545_F491_4F6C_DD1D)
    }

    pub fn gen_range(&mut self, low: usize, high_inclusive: usize) -> usize {
        let span = high_inclusive - low + 1;
        low + (self.next_u64() as usize % span)
    }
}

/// Allocates `count` blocks of `size` bytes, then releases them all in
/// allocation order. Returns how many allocations succeeded.
pub fn burst_then_release<S: PageSource>(arena: &mut Arena<S>, count: usize, size: usize) -> usize {
    let ptrs: Vec<_> = (0..count)
        .filter_map(|_| arena.allocate(size).ok().flatten())
        .collect();
    let n = ptrs.len();
    for p in ptrs {
        // SAFETY: each pointer came from `arena` and is released once.
        unsafe { arena.release(p.as_ptr()) };
    }
    n
}

/// Mixed allocate/release churn with a bounded live set.
pub fn churn<S: PageSource>(arena: &mut Arena<S>, rng: &mut XorShift64, ops: usize, max_size: usize) {
    let mut live = Vec::with_capacity(64);
    for _ in 0..ops {
        if live.len() < 64 && rng.gen_range(0, 2) > 0 {
            if let Ok(Some(p)) = arena.allocate(rng.gen_range(1, max_size)) {
                live.push(p);
            }
        } else if !live.is_empty() {
            let idx = rng.gen_range(0, live.len() - 1);
            let p = live.swap_remove(idx);
            // SAFETY: `p` is live and removed from the set before release.
            unsafe { arena.release(p.as_ptr()) };
        }
    }
    for p in live {
        // SAFETY: remaining pointers are live and released once.
        unsafe { arena.release(p.as_ptr()) };
    }
}
