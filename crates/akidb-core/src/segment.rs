use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

use crate::ids::{ChannelId, CollectionId, SegmentId};
use crate::timestamp::Timestamp;

/// Catalog record for a segment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SegmentMeta {
    pub segment_id: SegmentId,
    pub collection_id: CollectionId,
    pub partition_tag: String,
    /// Lowest write channel that contributed rows.
    pub channel_start: ChannelId,
    /// Highest write channel that contributed rows (inclusive).
    pub channel_end: ChannelId,
    /// Zero while the segment is open; the sealing timestamp afterwards.
    pub close_time: Timestamp,
    pub num_rows: u64,
    pub mem_size: u64,
}

impl SegmentMeta {
    /// Creates an open segment record covering `channels`.
    #[must_use]
    pub fn new(
        segment_id: SegmentId,
        collection_id: CollectionId,
        partition_tag: impl Into<String>,
        channels: RangeInclusive<ChannelId>,
    ) -> Self {
        Self {
            segment_id,
            collection_id,
            partition_tag: partition_tag.into(),
            channel_start: *channels.start(),
            channel_end: *channels.end(),
            close_time: 0,
            num_rows: 0,
            mem_size: 0,
        }
    }

    /// Lifecycle state derived from the close time.
    #[must_use]
    pub const fn state(&self) -> SegmentState {
        if self.close_time == 0 {
            SegmentState::Growing
        } else {
            SegmentState::Sealed
        }
    }

    #[must_use]
    pub fn channel_range(&self) -> RangeInclusive<ChannelId> {
        self.channel_start..=self.channel_end
    }
}

/// Lifecycle state for a segment.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SegmentState {
    /// Accepting grants.
    Growing,
    /// Closed at a time-tick boundary; waiting for or past flush.
    Sealed,
}
