// Exported symbols take raw pointers from C callers and perform no
// validation by contract, so per-function safety docs would only repeat it.
#![allow(clippy::missing_safety_doc)]
//! # zonealloc-abi
//!
//! `extern "C"` boundary for the zone allocator.
//!
//! ```text
//! C caller -> sa_alloc / sa_free -> process-wide Arena (behind a lock) -> zones
//! ```
//!
//! The arena is created on first use from `ArenaConfig::from_env()` and lives
//! for the rest of the process, so its zones are only returned to the OS at
//! exit.

pub mod malloc_abi;

pub use malloc_abi::{global_arena, with_global_arena};
