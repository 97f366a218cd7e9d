//! Where zones come from.
//!
//! The arena never touches the OS directly; it asks a [`PageSource`] for
//! whole regions. [`MmapSource`] is the real thing, anonymous private
//! mappings via `mmap(2)`.

use std::ptr::NonNull;

/// Provider of raw, zero-initialised memory regions.
///
/// # Safety
///
/// `map` must return a region of at least `len` writable bytes that stays
/// valid and is not handed out again until it is passed back to `unmap`.
pub unsafe trait PageSource {
    /// Maps a fresh region of `len` bytes, or returns an errno.
    fn map(&mut self, len: usize) -> Result<NonNull<u8>, i32>;

    /// Returns a region previously produced by `map` with the same `len`.
    ///
    /// # Safety
    ///
    /// `ptr`/`len` must describe exactly one live region from this source,
    /// and no references into it may be used afterwards.
    unsafe fn unmap(&mut self, ptr: NonNull<u8>, len: usize);
}

/// Anonymous private `mmap` regions.
#[derive(Debug, Clone, Copy)]
pub struct MmapSource {
    prot: libc::c_int,
}

impl MmapSource {
    /// Read/write mappings, plus execute when `executable` is set.
    #[must_use]
    pub const fn new(executable: bool) -> Self {
        let prot = if executable {
            libc::PROT_READ | libc::PROT_WRITE | libc::PROT_EXEC
        } else {
            libc::PROT_READ | libc::PROT_WRITE
        };
        Self { prot }
    }

    /// Protection bits passed to `mmap`.
    #[must_use]
    pub const fn prot(&self) -> libc::c_int {
        self.prot
    }
}

impl Default for MmapSource {
    fn default() -> Self {
        Self::new(true)
    }
}

// SAFETY: anonymous mappings are private to this process and stay mapped
// until the matching munmap.
unsafe impl PageSource for MmapSource {
    fn map(&mut self, len: usize) -> Result<NonNull<u8>, i32> {
        if len == 0 {
            return Err(libc::EINVAL);
        }
        // SAFETY: no fixed address and no fd; the kernel picks a fresh range.
        let raw = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                self.prot,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if raw == libc::MAP_FAILED {
            return Err(std::io::Error::last_os_error()
                .raw_os_error()
                .unwrap_or(libc::ENOMEM));
        }
        NonNull::new(raw.cast::<u8>()).ok_or(libc::ENOMEM)
    }

    unsafe fn unmap(&mut self, ptr: NonNull<u8>, len: usize) {
        // SAFETY: caller guarantees ptr/len came from `map`.
        unsafe {
            libc::munmap(ptr.as_ptr().cast::<libc::c_void>(), len);
        }
    }
}
