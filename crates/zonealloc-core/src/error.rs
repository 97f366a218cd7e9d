//! Allocator failure kinds.

use thiserror::Error;

/// Terminal failure of a single `allocate` call.
///
/// Neither variant is retried by the allocator beyond its fixed
/// coalesce-then-grow recovery sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ArenaError {
    /// The OS refused to map a new zone.
    #[error("failed to map a {requested}-byte zone (errno {errno})")]
    MappingFailure {
        /// Zone size that was requested from the OS.
        requested: usize,
        /// Raw errno reported by the mapping call, 0 if the size itself overflowed.
        errno: i32,
    },
    /// No free block fit even after one coalescing pass and one growth.
    #[error("out of memory: no free block of {requested} bytes after coalesce and grow")]
    OutOfMemory {
        /// Allocation size the caller asked for.
        requested: usize,
    },
}

impl ArenaError {
    /// Short machine-readable label used in lifecycle records.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::MappingFailure { .. } => "mapping_failure",
            Self::OutOfMemory { .. } => "oom",
        }
    }
}
