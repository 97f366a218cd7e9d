//! ABI layer for `sa_alloc`, `sa_free` and the free-list dump.
//!
//! The core arena is single-threaded; this layer serialises callers with
//! one process-wide lock so the exported symbols can be called from
//! anywhere.

use std::ffi::c_void;
use std::sync::OnceLock;

use parking_lot::Mutex;
use zonealloc_core::{Arena, ArenaConfig};

static GLOBAL_ARENA: OnceLock<Mutex<Arena>> = OnceLock::new();

/// Process-wide arena shared by every exported symbol.
#[must_use]
pub fn global_arena() -> &'static Mutex<Arena> {
    GLOBAL_ARENA.get_or_init(|| Mutex::new(Arena::with_config(ArenaConfig::from_env())))
}

/// Runs `f` with exclusive access to the process-wide arena.
pub fn with_global_arena<R>(f: impl FnOnce(&mut Arena) -> R) -> R {
    f(&mut global_arena().lock())
}

/// Allocates `size` bytes. Returns null for `size == 0` and on any failure.
#[unsafe(no_mangle)]
pub extern "C" fn sa_alloc(size: usize) -> *mut c_void {
    match with_global_arena(|arena| arena.allocate(size)) {
        Ok(Some(ptr)) => ptr.as_ptr().cast::<c_void>(),
        Ok(None) | Err(_) => std::ptr::null_mut(),
    }
}

/// Returns a block obtained from [`sa_alloc`]. Null is ignored; anything
/// else that did not come from `sa_alloc` is undefined behaviour.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn sa_free(ptr: *mut c_void) {
    if ptr.is_null() {
        return;
    }
    // SAFETY: caller contract, see above.
    with_global_arena(|arena| unsafe { arena.release(ptr.cast::<u8>()) });
}

/// Recorded payload length of a block from [`sa_alloc`]; 0 for null.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn sa_usable_size(ptr: *const c_void) -> usize {
    // SAFETY: caller contract, same as `sa_free`.
    with_global_arena(|arena| unsafe { arena.usable_size(ptr.cast::<u8>()) })
}

/// One line per free-list entry, head first.
#[must_use]
pub fn free_list_lines() -> Vec<String> {
    with_global_arena(|arena| arena.dump_free_list())
        .into_iter()
        .map(|e| {
            format!(
                "freelist item {:#x} data {:#x} len {} next {:#x}",
                e.header,
                e.data,
                e.len,
                e.next.unwrap_or(0)
            )
        })
        .collect()
}

/// Writes every free-list entry to stderr when built with the `verbose`
/// feature; a no-op otherwise. Never modifies the arena.
#[unsafe(no_mangle)]
pub extern "C" fn sa_print_freelist() {
    if cfg!(feature = "verbose") {
        for line in free_list_lines() {
            eprintln!("{line}");
        }
    }
}
