//! AkiDB metadata control plane: growing segment allocation and sealing.

pub mod allocator;
pub mod assigner;
pub mod catalog;
pub mod flush;
pub mod segment_manager;
pub mod telemetry;
pub mod watermark;

pub use allocator::{AtomicIdAllocator, LocalTsoAllocator};
pub use assigner::{Cutover, SegmentAssigner};
pub use catalog::MemoryMetaCatalog;
pub use flush::FlushQueue;
pub use segment_manager::{ManagerDeps, SegmentManager, SegmentStat};
pub use watermark::ChannelWatermarks;
