use async_trait::async_trait;

use crate::collection::CollectionMeta;
use crate::error::CoreResult;
use crate::ids::{ChannelId, CollectionId, SegmentId, UniqueId};
use crate::segment::SegmentMeta;
use crate::timestamp::Timestamp;

/// Durable store of collection, partition, and segment records.
#[async_trait]
pub trait MetaCatalog: Send + Sync {
    /// Registers a new collection.
    async fn add_collection(&self, meta: CollectionMeta) -> CoreResult<()>;

    /// Adds a partition tag to an existing collection.
    async fn add_partition(&self, collection_id: CollectionId, tag: &str) -> CoreResult<()>;

    /// Resolves a collection by name.
    async fn get_collection_by_name(&self, name: &str) -> CoreResult<CollectionMeta>;

    /// Creates or replaces a segment record.
    async fn update_segment(&self, meta: SegmentMeta) -> CoreResult<()>;

    /// Fetches a segment record.
    async fn get_segment_by_id(&self, segment_id: SegmentId) -> CoreResult<SegmentMeta>;
}

/// Source of globally unique identifiers.
#[async_trait]
pub trait IdAllocator: Send + Sync {
    /// Returns an identifier never returned before.
    async fn next(&self) -> CoreResult<UniqueId>;
}

/// Source of cluster-wide monotonically increasing hybrid timestamps.
#[async_trait]
pub trait TsoAllocator: Send + Sync {
    async fn next(&self) -> CoreResult<Timestamp>;
}

/// Receives sealed segments for durable flush. Fire-and-forget.
pub trait FlushScheduler: Send + Sync {
    fn on_sealed(&self, meta: SegmentMeta);
}

/// In-flight timestamp bounds of a write channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelStats {
    /// No write below this timestamp is still in flight on the channel.
    pub min_ts: Timestamp,
    /// Highest timestamp the channel has handed out.
    pub max_ts: Timestamp,
}

/// Per-channel watermark tracker.
#[async_trait]
pub trait ChannelStatistics: Send + Sync {
    async fn stats(&self, channel: ChannelId) -> CoreResult<ChannelStats>;
}
