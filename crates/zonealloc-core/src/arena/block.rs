//! Free block descriptors.
//!
//! Layout of every tracked block, free or handed out:
//!
//! ```text
//!   header                data = header + HEADER_SIZE
//!   v                     v
//!   [ next | len ]        [ len bytes of payload ...            ]
//! ```
//!
//! `len` counts payload bytes only. The data pointer is never stored; it is
//! always `header + HEADER_SIZE`, and `release` recovers the header from a
//! payload pointer by subtracting the same constant. Blocks created by
//! splitting sit at arbitrary byte offsets, so the header is only ever
//! accessed with unaligned reads and writes.

use std::mem::size_of;
use std::ptr::{self, NonNull};

#[repr(C)]
#[derive(Clone, Copy)]
struct RawHeader {
    next: *mut u8,
    len: usize,
}

/// Bytes occupied by a descriptor header in front of its payload.
pub const HEADER_SIZE: usize = size_of::<RawHeader>();

/// Handle to a descriptor header living inside a zone.
///
/// Copying the handle does not copy the block. All accessors that touch
/// memory are `unsafe`: the handle must point at a header written by
/// [`BlockPtr::init`] in a zone that is still mapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockPtr(NonNull<u8>);

impl BlockPtr {
    /// Writes a fresh header at `at` and returns its handle.
    ///
    /// # Safety
    ///
    /// `at .. at + HEADER_SIZE + len` must be writable memory of one zone.
    pub unsafe fn init(at: NonNull<u8>, len: usize, next: Option<BlockPtr>) -> Self {
        let block = Self(at);
        // SAFETY: caller guarantees HEADER_SIZE writable bytes at `at`.
        unsafe { block.write(RawHeader { next: link_raw(next), len }) };
        block
    }

    /// Recovers the header from a payload pointer.
    ///
    /// # Safety
    ///
    /// `data` must be a pointer previously returned by [`BlockPtr::data`].
    pub unsafe fn from_data(data: NonNull<u8>) -> Self {
        // SAFETY: a payload pointer is always HEADER_SIZE bytes past its header,
        // inside the same mapping, so the subtraction stays in bounds and non-null.
        Self(unsafe { NonNull::new_unchecked(data.as_ptr().sub(HEADER_SIZE)) })
    }

    #[inline]
    #[must_use]
    pub fn as_ptr(self) -> *mut u8 {
        self.0.as_ptr()
    }

    /// Numeric header address.
    #[inline]
    #[must_use]
    pub fn addr(self) -> usize {
        self.0.as_ptr() as usize
    }

    /// Payload pointer handed to callers.
    #[inline]
    #[must_use]
    pub fn data(self) -> NonNull<u8> {
        // SAFETY: header + HEADER_SIZE cannot wrap to null inside a mapping.
        unsafe { NonNull::new_unchecked(self.0.as_ptr().wrapping_add(HEADER_SIZE)) }
    }

    /// Recorded payload length.
    ///
    /// # Safety
    ///
    /// See the type-level contract.
    #[inline]
    pub unsafe fn len(self) -> usize {
        // SAFETY: forwarded to caller.
        unsafe { self.read().len }
    }

    /// # Safety
    ///
    /// See the type-level contract. `len` must not run past the zone end.
    #[inline]
    pub unsafe fn set_len(self, len: usize) {
        // SAFETY: forwarded to caller.
        unsafe {
            let mut raw = self.read();
            raw.len = len;
            self.write(raw);
        }
    }

    /// Next free-list link.
    ///
    /// # Safety
    ///
    /// See the type-level contract.
    #[inline]
    pub unsafe fn next(self) -> Option<BlockPtr> {
        // SAFETY: forwarded to caller.
        NonNull::new(unsafe { self.read().next }).map(Self)
    }

    /// # Safety
    ///
    /// See the type-level contract.
    #[inline]
    pub unsafe fn set_next(self, next: Option<BlockPtr>) {
        // SAFETY: forwarded to caller.
        unsafe {
            let mut raw = self.read();
            raw.next = link_raw(next);
            self.write(raw);
        }
    }

    /// Address one past the payload, i.e. where a physical successor's
    /// header would start. The successor may not exist.
    ///
    /// # Safety
    ///
    /// See the type-level contract.
    #[inline]
    pub unsafe fn end_addr(self) -> usize {
        // SAFETY: forwarded to caller.
        self.addr() + HEADER_SIZE + unsafe { self.len() }
    }

    /// Pointer to `offset` bytes into the payload, with this block's provenance.
    #[inline]
    pub(crate) fn payload_offset(self, offset: usize) -> NonNull<u8> {
        // SAFETY: callers only pass offsets within the recorded length.
        unsafe { NonNull::new_unchecked(self.data().as_ptr().wrapping_add(offset)) }
    }

    unsafe fn read(self) -> RawHeader {
        // SAFETY: forwarded; header may be unaligned.
        unsafe { ptr::read_unaligned(self.0.as_ptr().cast::<RawHeader>()) }
    }

    unsafe fn write(self, raw: RawHeader) {
        // SAFETY: forwarded; header may be unaligned.
        unsafe { ptr::write_unaligned(self.0.as_ptr().cast::<RawHeader>(), raw) }
    }
}

fn link_raw(next: Option<BlockPtr>) -> *mut u8 {
    next.map_or(ptr::null_mut(), BlockPtr::as_ptr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_two_words() {
        assert_eq!(HEADER_SIZE, 2 * size_of::<usize>());
    }

    #[test]
    fn data_and_header_round_trip() {
        let mut buf = vec![0_u8; 256];
        let at = NonNull::new(buf.as_mut_ptr()).unwrap();
        // SAFETY: buf holds 256 bytes.
        unsafe {
            let block = BlockPtr::init(at, 256 - HEADER_SIZE, None);
            assert_eq!(block.data().as_ptr() as usize, block.addr() + HEADER_SIZE);
            assert_eq!(BlockPtr::from_data(block.data()), block);
            assert_eq!(block.len(), 256 - HEADER_SIZE);
            assert_eq!(block.end_addr(), buf.as_ptr() as usize + 256);
        }
    }

    #[test]
    fn unaligned_headers_keep_their_fields() {
        let mut buf = vec![0_u8; 128];
        // SAFETY: offset 3 leaves 125 bytes, enough for two headers.
        unsafe {
            let first = BlockPtr::init(NonNull::new(buf.as_mut_ptr()).unwrap(), 8, None);
            let odd = BlockPtr::init(first.payload_offset(3), 40, Some(first));
            assert_eq!(odd.addr() % 2, 1);
            assert_eq!(odd.len(), 40);
            assert_eq!(odd.next(), Some(first));

            odd.set_len(41);
            odd.set_next(None);
            assert_eq!(odd.len(), 41);
            assert_eq!(odd.next(), None);
        }
    }
}
