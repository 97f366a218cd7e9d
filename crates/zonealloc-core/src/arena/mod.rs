//! Zone-backed first-fit arena.
//!
//! - [`source`]: where zones come from (`mmap` by default).
//! - [`zone`]: zone headers, the zone list, arena growth.
//! - [`block`]: in-band descriptor headers.
//! - [`free_list`]: the intrusive LIFO free list.
//! - [`allocator`]: first-fit allocation, splitting, release.
//! - [`coalesce`]: the deferred merge pass.

pub mod allocator;
pub mod block;
pub mod coalesce;
pub(crate) mod free_list;
pub mod source;
pub mod zone;

pub use allocator::{Arena, ArenaStats, FreeBlockInfo, GROWTH_ALIGN, growth_target};
pub use block::{BlockPtr, HEADER_SIZE};
pub use source::{MmapSource, PageSource};
pub use zone::{MIN_ZONE_SIZE, ZONE_HEADER_SIZE};
