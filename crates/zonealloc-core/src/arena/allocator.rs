//! Allocation engine and release path.
//!
//! `allocate` is first-fit over the free list with a fixed recovery
//! sequence when nothing fits:
//!
//! 1. map the first zone lazily,
//! 2. search,
//! 3. on a miss, run one coalescing pass and search again,
//! 4. on a second miss, grow the arena once and search again,
//! 5. otherwise fail with [`ArenaError::OutOfMemory`].
//!
//! `release` is an O(1) push onto the free-list head. Nothing is merged at
//! release time.

use std::ptr::NonNull;

use serde::Serialize;

use super::block::{BlockPtr, HEADER_SIZE};
use super::free_list::{FreeList, Link};
use super::source::{MmapSource, PageSource};
use super::zone::ZoneList;
use crate::config::ArenaConfig;
use crate::error::ArenaError;
use crate::log::{ArenaLogRecord, Event, LifecycleLog, LogLevel, LogSnapshot};

/// Growth granularity for oversized requests.
pub const GROWTH_ALIGN: usize = 1 << 20;

/// Size of the next zone when a request still does not fit after coalescing.
///
/// Requests larger than twice the current zone size get one MiB of headroom
/// on top of `size`, rounded up to the next MiB boundary; anything else
/// doubles the current zone size. Returns `None` on arithmetic overflow.
#[must_use]
pub fn growth_target(size: usize, current_zone_size: usize) -> Option<usize> {
    let doubled = current_zone_size.checked_mul(2)?;
    if size > doubled {
        let padded = size.checked_add(GROWTH_ALIGN)?.checked_add(GROWTH_ALIGN - 1)?;
        Some(padded & !(GROWTH_ALIGN - 1))
    } else {
        Some(doubled)
    }
}

/// One free-list entry as reported by [`Arena::dump_free_list`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FreeBlockInfo {
    /// Header address.
    pub header: usize,
    /// Payload address (`header + HEADER_SIZE`).
    pub data: usize,
    /// Payload length.
    pub len: usize,
    /// Header address of the next entry.
    pub next: Option<usize>,
}

/// Point-in-time arena counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ArenaStats {
    pub zone_count: usize,
    pub mapped_bytes: usize,
    pub current_zone_size: usize,
    pub free_blocks: usize,
    /// Sum of free payload lengths (headers excluded).
    pub free_bytes: usize,
    pub grow_count: u64,
    pub coalesce_count: u64,
    pub merge_count: u64,
    pub alloc_count: u64,
    pub release_count: u64,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub grow_count: u64,
    pub coalesce_count: u64,
    pub merge_count: u64,
    pub alloc_count: u64,
    pub release_count: u64,
}

/// Allocator context: zones, free list and growth state.
///
/// Single-threaded. Independent arenas share nothing. All zones are
/// unmapped when the arena is dropped, which invalidates every pointer it
/// handed out.
pub struct Arena<S: PageSource = MmapSource> {
    pub(crate) source: S,
    pub(crate) zones: ZoneList,
    pub(crate) free: FreeList,
    pub(crate) current_zone_size: usize,
    pub(crate) config: ArenaConfig,
    pub(crate) stats: Counters,
    pub(crate) log: LifecycleLog,
}

// SAFETY: the arena exclusively owns every zone it references; moving it to
// another thread moves that ownership along. It is deliberately not Sync.
unsafe impl<S: PageSource + Send> Send for Arena<S> {}

impl Arena<MmapSource> {
    /// Arena backed by `mmap` with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ArenaConfig::default())
    }

    /// Arena backed by `mmap`, honouring `config.executable`.
    #[must_use]
    pub fn with_config(config: ArenaConfig) -> Self {
        Self::with_source(MmapSource::new(config.executable), config)
    }
}

impl Default for Arena<MmapSource> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: PageSource> Arena<S> {
    /// Arena drawing zones from a custom source.
    pub fn with_source(source: S, config: ArenaConfig) -> Self {
        Self {
            source,
            zones: ZoneList::new(),
            free: FreeList::new(),
            current_zone_size: 0,
            config,
            stats: Counters::default(),
            log: LifecycleLog::new(config.log_level),
        }
    }

    /// Returns a pointer to at least `size` usable bytes.
    ///
    /// `size == 0` yields `Ok(None)` without touching any state. The returned
    /// block may be larger than requested when the leftover would be too
    /// small to split off; see [`Arena::usable_size`].
    pub fn allocate(&mut self, size: usize) -> Result<Option<NonNull<u8>>, ArenaError> {
        if size == 0 {
            return Ok(None);
        }
        if self.zones.is_empty() {
            self.grow_arena(self.config.initial_zone_size)?;
        }

        let mut coalesced = false;
        let mut grown = false;
        loop {
            // SAFETY: every free-list entry is a live header (arena invariant).
            if let Some(link) = unsafe { self.free.first_fit(size) } {
                // SAFETY: `link` was just produced by this list.
                let block = unsafe { self.take(link, size) };
                self.stats.alloc_count += 1;
                return Ok(Some(block.data()));
            }
            if !coalesced {
                self.coalesce_all();
                coalesced = true;
                continue;
            }
            if !grown {
                let Some(target) = growth_target(size, self.current_zone_size) else {
                    self.note_alloc_failure(size, "growth_target_overflow");
                    return Err(ArenaError::MappingFailure {
                        requested: usize::MAX,
                        errno: 0,
                    });
                };
                if let Err(e) = self.grow_arena(target) {
                    self.note_alloc_failure(size, e.label());
                    return Err(e);
                }
                grown = true;
                continue;
            }
            self.note_alloc_failure(size, "no_fit_after_grow");
            return Err(ArenaError::OutOfMemory { requested: size });
        }
    }

    /// Puts the block behind `ptr` back at the head of the free list.
    ///
    /// A null `ptr` is a no-op. The block keeps the length it was given at
    /// allocation time, and it is not merged with its neighbours until the
    /// next coalescing pass.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a pointer returned by [`Arena::allocate`] on this
    /// arena that has not been released since. Nothing is checked.
    pub unsafe fn release(&mut self, ptr: *mut u8) {
        let Some(data) = NonNull::new(ptr) else {
            return;
        };
        // SAFETY: caller guarantees `data` came from `allocate`.
        unsafe {
            let block = BlockPtr::from_data(data);
            self.free.push(block);
            self.stats.release_count += 1;
            if self.log.enabled(LogLevel::Trace) {
                let len = block.len();
                self.emit(
                    LogLevel::Trace,
                    "release",
                    "release",
                    Some(block.addr()),
                    Some(len),
                    "pushed_head",
                    String::new(),
                );
            }
        }
    }

    /// Payload bytes recorded for an allocated block, 0 for null.
    ///
    /// # Safety
    ///
    /// Same contract as [`Arena::release`].
    #[must_use]
    pub unsafe fn usable_size(&self, ptr: *const u8) -> usize {
        match NonNull::new(ptr.cast_mut()) {
            // SAFETY: forwarded to caller.
            Some(data) => unsafe { BlockPtr::from_data(data).len() },
            None => 0,
        }
    }

    /// Whether a descriptor header at `addr` is currently on the free list.
    #[must_use]
    pub fn is_free(&self, addr: usize) -> bool {
        // SAFETY: arena invariant.
        unsafe { self.free.find(addr) }.is_some()
    }

    /// Free-list entries in list order. Read-only.
    #[must_use]
    pub fn dump_free_list(&self) -> Vec<FreeBlockInfo> {
        // SAFETY: arena invariant.
        unsafe { self.free.iter() }
            .map(|link| {
                let b = link.block;
                // SAFETY: arena invariant.
                let (len, next) = unsafe { (b.len(), b.next()) };
                FreeBlockInfo {
                    header: b.addr(),
                    data: b.data().as_ptr() as usize,
                    len,
                    next: next.map(BlockPtr::addr),
                }
            })
            .collect()
    }

    /// Size of the most recently mapped zone; never decreases.
    #[must_use]
    pub fn current_zone_size(&self) -> usize {
        self.current_zone_size
    }

    #[must_use]
    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    #[must_use]
    pub fn stats(&self) -> ArenaStats {
        let (free_blocks, free_bytes) = self.free_totals();
        ArenaStats {
            zone_count: self.zones.len(),
            mapped_bytes: self.zones.mapped_bytes(),
            current_zone_size: self.current_zone_size,
            free_blocks,
            free_bytes,
            grow_count: self.stats.grow_count,
            coalesce_count: self.stats.coalesce_count,
            merge_count: self.stats.merge_count,
            alloc_count: self.stats.alloc_count,
            release_count: self.stats.release_count,
        }
    }

    /// Lifecycle records kept so far.
    #[must_use]
    pub fn lifecycle_logs(&self) -> &[ArenaLogRecord] {
        self.log.records()
    }

    /// Takes all kept lifecycle records.
    pub fn drain_logs(&mut self) -> Vec<ArenaLogRecord> {
        self.log.drain()
    }

    /// Hands out `link.block` for a `size`-byte request, splitting off the
    /// tail when it can hold a header plus more than one byte.
    ///
    /// # Safety
    ///
    /// `link` must come from `self.free` with no mutation since, and the
    /// block's length must be at least `size`.
    unsafe fn take(&mut self, link: Link, size: usize) -> BlockPtr {
        let block = link.block;
        // SAFETY: forwarded to caller.
        unsafe {
            let len = block.len();
            let leftover = len - size;
            if leftover > HEADER_SIZE + 1 {
                let tail = BlockPtr::init(block.payload_offset(size), leftover - HEADER_SIZE, None);
                self.free.replace(link, tail);
                block.set_len(size);
                if self.log.enabled(LogLevel::Trace) {
                    self.emit(
                        LogLevel::Trace,
                        "allocate",
                        "split",
                        Some(block.addr()),
                        Some(size),
                        "success",
                        format!("tail={:#x} tail_len={}", tail.addr(), tail.len()),
                    );
                }
            } else {
                self.free.unlink(link);
                if self.log.enabled(LogLevel::Trace) {
                    self.emit(
                        LogLevel::Trace,
                        "allocate",
                        "consume",
                        Some(block.addr()),
                        Some(size),
                        "success",
                        format!("len={len}"),
                    );
                }
            }
        }
        block
    }

    fn free_totals(&self) -> (usize, usize) {
        // SAFETY: arena invariant.
        unsafe { self.free.iter() }.fold((0, 0), |(n, bytes), link| {
            // SAFETY: arena invariant.
            (n + 1, bytes + unsafe { link.block.len() })
        })
    }

    fn note_alloc_failure(&mut self, size: usize, reason: &'static str) {
        if self.log.enabled(LogLevel::Warn) {
            self.emit(
                LogLevel::Warn,
                "allocate",
                "alloc_failed",
                None,
                Some(size),
                reason,
                format!("current_zone_size={}", self.current_zone_size),
            );
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn emit(
        &mut self,
        level: LogLevel,
        symbol: &'static str,
        event: &'static str,
        ptr: Option<usize>,
        size: Option<usize>,
        outcome: &'static str,
        details: String,
    ) {
        let snapshot = LogSnapshot {
            zone_count: self.zones.len(),
            free_blocks: self.free_totals().0,
            current_zone_size: self.current_zone_size,
        };
        self.log.record(
            Event {
                level,
                symbol,
                event,
                ptr,
                size,
                outcome,
                details,
            },
            snapshot,
        );
    }
}

impl<S: PageSource> Drop for Arena<S> {
    fn drop(&mut self) {
        for (base, len) in self.zones.take_regions() {
            // SAFETY: every region came from `self.source` and the arena is
            // going away together with all pointers it handed out.
            unsafe { self.source.unmap(base, len) };
        }
    }
}
