//! Zone manager.
//!
//! A zone is one mapping obtained from the [`PageSource`]. Its first bytes
//! hold a [`ZoneHeader`]; everything after that is carved into blocks.
//!
//! ```text
//!   base                start                                   end
//!   v                   v                                       v
//!   [ start|end|next ]  [ hdr | data ... ][ hdr | data ... ] ...)
//! ```
//!
//! Zones are prepended to the arena's zone list and never shrink. They are
//! only unmapped when the owning arena is dropped.

use std::mem::size_of;
use std::ptr::NonNull;

use super::Arena;
use super::block::{BlockPtr, HEADER_SIZE};
use super::source::PageSource;
use crate::error::ArenaError;
use crate::log::LogLevel;

#[repr(C)]
struct ZoneHeader {
    start: *mut u8,
    end: *mut u8,
    next: *mut ZoneHeader,
}

/// Bytes reserved at the base of every zone.
pub const ZONE_HEADER_SIZE: usize = size_of::<ZoneHeader>();

/// Smallest mapping that can hold a zone header and one empty block.
pub const MIN_ZONE_SIZE: usize = ZONE_HEADER_SIZE + HEADER_SIZE;

/// Handle to a zone header at the (page-aligned) base of a mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ZonePtr(NonNull<ZoneHeader>);

impl ZonePtr {
    /// Writes the header of a freshly mapped region.
    ///
    /// # Safety
    ///
    /// `base .. base + mapped_len` must be a live mapping of at least
    /// `MIN_ZONE_SIZE` bytes.
    unsafe fn init(base: NonNull<u8>, mapped_len: usize, next: Option<ZonePtr>) -> Self {
        let header = base.cast::<ZoneHeader>();
        // SAFETY: mappings are page aligned and at least ZONE_HEADER_SIZE long.
        unsafe {
            header.as_ptr().write(ZoneHeader {
                start: base.as_ptr().add(ZONE_HEADER_SIZE),
                end: base.as_ptr().add(mapped_len),
                next: next.map_or(std::ptr::null_mut(), |z| z.0.as_ptr()),
            });
        }
        Self(header)
    }

    fn header(&self) -> &ZoneHeader {
        // SAFETY: a ZonePtr only exists for a mapped, initialised zone.
        unsafe { self.0.as_ref() }
    }

    pub(crate) fn base(self) -> NonNull<u8> {
        self.0.cast()
    }

    /// First byte available for blocks.
    pub(crate) fn start(self) -> usize {
        self.header().start as usize
    }

    /// One past the last byte of the mapping.
    pub(crate) fn end(self) -> usize {
        self.header().end as usize
    }

    pub(crate) fn mapped_len(self) -> usize {
        self.end() - self.0.as_ptr() as usize
    }

    pub(crate) fn next(self) -> Option<ZonePtr> {
        NonNull::new(self.header().next).map(Self)
    }

    /// Whether `addr` lies in `[start, end)`.
    pub(crate) fn contains(self, addr: usize) -> bool {
        (self.start()..self.end()).contains(&addr)
    }
}

/// Singly linked list of zones, newest first.
#[derive(Debug, Default)]
pub(crate) struct ZoneList {
    head: Option<ZonePtr>,
    count: usize,
}

impl ZoneList {
    pub(crate) const fn new() -> Self {
        Self {
            head: None,
            count: 0,
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    pub(crate) fn len(&self) -> usize {
        self.count
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = ZonePtr> + '_ {
        std::iter::successors(self.head, |z| z.next())
    }

    /// True iff a single zone's `[start, end)` holds both addresses.
    pub(crate) fn same_zone(&self, a: usize, b: usize) -> bool {
        self.iter().any(|z| z.contains(a) && z.contains(b))
    }

    pub(crate) fn mapped_bytes(&self) -> usize {
        self.iter().map(ZonePtr::mapped_len).sum()
    }

    fn push(&mut self, zone: ZonePtr) {
        self.head = Some(zone);
        self.count += 1;
    }

    /// Empties the list, returning every `(base, mapped_len)` pair.
    pub(crate) fn take_regions(&mut self) -> Vec<(NonNull<u8>, usize)> {
        let regions = self.iter().map(|z| (z.base(), z.mapped_len())).collect();
        self.head = None;
        self.count = 0;
        regions
    }
}

impl<S: PageSource> Arena<S> {
    /// Maps a new zone of `region` bytes and puts one block spanning all of
    /// it on the free list.
    ///
    /// On success the current zone size becomes `region` (it is never
    /// lowered). Mapping failures are returned as-is; the call is never
    /// retried.
    pub fn grow_arena(&mut self, region: usize) -> Result<(), ArenaError> {
        if region < MIN_ZONE_SIZE {
            self.note_grow_failure(region, libc::EINVAL);
            return Err(ArenaError::MappingFailure {
                requested: region,
                errno: libc::EINVAL,
            });
        }
        let base = match self.source.map(region) {
            Ok(base) => base,
            Err(errno) => {
                self.note_grow_failure(region, errno);
                return Err(ArenaError::MappingFailure {
                    requested: region,
                    errno,
                });
            }
        };

        // SAFETY: `base` is a fresh mapping of `region >= MIN_ZONE_SIZE` bytes.
        let block = unsafe {
            let zone = ZonePtr::init(base, region, self.zones.head);
            self.zones.push(zone);
            let first = NonNull::new_unchecked(base.as_ptr().add(ZONE_HEADER_SIZE));
            let block = BlockPtr::init(first, region - ZONE_HEADER_SIZE - HEADER_SIZE, None);
            self.free.push(block);
            block
        };

        self.current_zone_size = self.current_zone_size.max(region);
        self.stats.grow_count += 1;

        if self.log.enabled(LogLevel::Debug) {
            // SAFETY: `block` was just initialised.
            let len = unsafe { block.len() };
            self.emit(
                LogLevel::Debug,
                "grow_arena",
                "grow",
                Some(block.addr()),
                Some(region),
                "success",
                format!("data={:#x} len={len}", block.data().as_ptr() as usize),
            );
        }
        Ok(())
    }

    /// True iff some zone contains both addresses.
    ///
    /// Bounds coalescing so that numerically adjacent mappings are never
    /// treated as one region.
    #[must_use]
    pub fn same_zone(&self, a: usize, b: usize) -> bool {
        self.zones.same_zone(a, b)
    }

    fn note_grow_failure(&mut self, region: usize, errno: i32) {
        if self.log.enabled(LogLevel::Warn) {
            self.emit(
                LogLevel::Warn,
                "grow_arena",
                "grow_failed",
                None,
                Some(region),
                "mapping_failure",
                format!("errno={errno}"),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::source::MmapSource;

    #[test]
    fn zone_bounds_cover_mapping() {
        let mut src = MmapSource::new(false);
        let base = src.map(8192).unwrap();
        // SAFETY: fresh 8 KiB mapping.
        let zone = unsafe { ZonePtr::init(base, 8192, None) };
        let b = base.as_ptr() as usize;
        assert_eq!(zone.start(), b + ZONE_HEADER_SIZE);
        assert_eq!(zone.end(), b + 8192);
        assert_eq!(zone.mapped_len(), 8192);
        assert!(zone.contains(zone.start()));
        assert!(!zone.contains(zone.end()));
        assert!(!zone.contains(b));
        // SAFETY: mapping is no longer referenced.
        unsafe { src.unmap(base, 8192) };
    }

    #[test]
    fn same_zone_rejects_cross_zone_pairs() {
        let mut src = MmapSource::new(false);
        let first = src.map(4096).unwrap();
        let second = src.map(4096).unwrap();
        let mut list = ZoneList::new();
        // SAFETY: both are fresh 4 KiB mappings.
        unsafe {
            let a = ZonePtr::init(first, 4096, None);
            list.push(a);
            let b = ZonePtr::init(second, 4096, Some(a));
            list.push(b);
        }
        let a0 = first.as_ptr() as usize + ZONE_HEADER_SIZE;
        let b0 = second.as_ptr() as usize + ZONE_HEADER_SIZE;
        assert_eq!(list.len(), 2);
        assert!(list.same_zone(a0, a0 + 100));
        assert!(list.same_zone(b0, b0 + 100));
        assert!(!list.same_zone(a0, b0));
        assert!(!list.same_zone(a0, first.as_ptr() as usize + 4096));
        assert_eq!(list.mapped_bytes(), 8192);

        for (base, len) in list.take_regions() {
            // SAFETY: regions came from `src`.
            unsafe { src.unmap(base, len) };
        }
        assert!(list.is_empty());
    }
}
