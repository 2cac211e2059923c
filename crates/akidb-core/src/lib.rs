//! Core domain types and traits for the AkiDB metadata control plane.

pub mod assignment;
pub mod capacity;
pub mod collection;
pub mod config;
pub mod error;
pub mod ids;
pub mod metrics;
pub mod segment;
pub mod timestamp;
pub mod traits;

pub use assignment::{AssignStatus, ErrorCode, SegIdAssignment, SegIdRequest};
pub use capacity::{estimate_size_per_record, row_capacity};
pub use collection::{CollectionMeta, CollectionSchema, DataType, FieldSchema, DIM_PARAM};
pub use config::{McpConfig, SegmentConfig, SoftFullPolicy};
pub use error::{CoreError, CoreResult};
pub use ids::{ChannelId, CollectionId, SegmentId, UniqueId};
pub use segment::{SegmentMeta, SegmentState};
pub use timestamp::{compose_ts, parse_ts, TimeTick, Timestamp};
pub use traits::{
    ChannelStatistics, ChannelStats, FlushScheduler, IdAllocator, MetaCatalog, TsoAllocator,
};
