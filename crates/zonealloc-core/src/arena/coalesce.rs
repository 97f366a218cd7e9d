//! Deferred coalescing.
//!
//! Run only when a first-fit search misses. Each free-list entry, taken in
//! list order as the leader, absorbs its physical successor for as long as
//! that successor is itself on the free list and inside the leader's zone.
//! Only successors are merged, never predecessors, so a run of adjacent
//! free blocks collapses completely once its lowest block has led.
//!
//! Membership is a linear scan per merge step; the pass is quadratic in the
//! worst case.

use super::Arena;
use super::block::HEADER_SIZE;
use super::source::PageSource;
use crate::log::LogLevel;

impl<S: PageSource> Arena<S> {
    /// Merges physically adjacent free blocks. Returns the number of merges.
    pub fn coalesce_all(&mut self) -> usize {
        self.stats.coalesce_count += 1;
        let mut merges = 0;
        let mut leader = self.free.head();

        // SAFETY: every free-list entry is a live header (arena invariant), and
        // successor addresses are only compared, never read, until `find`
        // confirms they are list entries.
        unsafe {
            while let Some(l) = leader {
                loop {
                    let successor = l.end_addr();
                    if !self.zones.same_zone(l.addr(), successor) {
                        break;
                    }
                    let Some(link) = self.free.find(successor) else {
                        break;
                    };
                    let absorbed = link.block.len();
                    l.set_len(l.len() + absorbed + HEADER_SIZE);
                    self.free.unlink(link);
                    merges += 1;

                    if self.log.enabled(LogLevel::Trace) {
                        let len = l.len();
                        self.emit(
                            LogLevel::Trace,
                            "coalesce_all",
                            "merge",
                            Some(l.addr()),
                            Some(len),
                            "merged",
                            format!("absorbed={successor:#x} absorbed_len={absorbed}"),
                        );
                    }
                }
                leader = l.next();
            }
        }

        self.stats.merge_count += merges as u64;
        if self.log.enabled(LogLevel::Debug) {
            self.emit(
                LogLevel::Debug,
                "coalesce_all",
                "coalesce",
                None,
                None,
                "done",
                format!("merges={merges}"),
            );
        }
        merges
    }
}
