//! # zonealloc-core
//!
//! A small, single-threaded memory allocator. Memory comes from the OS in
//! large zones; allocations are served first-fit from an intrusive free
//! list whose descriptors sit directly in front of the payload they
//! describe. Adjacent free blocks are merged lazily, only when a search
//! fails, and zones grow geometrically when merging is not enough.
//!
//! ```no_run
//! use zonealloc_core::Arena;
//!
//! let mut arena = Arena::new();
//! let p = arena.allocate(64)?.expect("non-zero size");
//! // SAFETY: `p` came from this arena and is released once.
//! unsafe { arena.release(p.as_ptr()) };
//! # Ok::<(), zonealloc_core::ArenaError>(())
//! ```
//!
//! Not thread-safe, no alignment guarantee, no validation of released
//! pointers.

pub mod arena;
pub mod config;
pub mod error;
pub mod log;

pub use arena::{Arena, ArenaStats, FreeBlockInfo, HEADER_SIZE, MmapSource, PageSource};
pub use config::ArenaConfig;
pub use error::ArenaError;
pub use log::{ArenaLogRecord, LogLevel};
