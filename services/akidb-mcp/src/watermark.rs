//! Per-channel watermark store.

use std::collections::HashMap;

use akidb_core::{
    ChannelId, ChannelStatistics, ChannelStats, CoreError, CoreResult, Timestamp,
};
use async_trait::async_trait;
use parking_lot::RwLock;

/// Latest in-flight timestamp bounds reported for each write channel.
///
/// Bounds only move forward; stale reports are ignored.
#[derive(Default)]
pub struct ChannelWatermarks {
    channels: RwLock<HashMap<ChannelId, ChannelStats>>,
}

impl ChannelWatermarks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking `channel` with zero bounds.
    pub fn add_channel(&self, channel: ChannelId) -> CoreResult<()> {
        let mut channels = self.channels.write();
        if channels.contains_key(&channel) {
            return Err(CoreError::already_exists("channel", channel.to_string()));
        }
        channels.insert(channel, ChannelStats::default());
        Ok(())
    }

    /// Records that nothing below `min_ts` is in flight on `channel` and that
    /// it has handed out timestamps up to `max_ts`.
    pub fn report(&self, channel: ChannelId, min_ts: Timestamp, max_ts: Timestamp) {
        let mut channels = self.channels.write();
        let stats = channels.entry(channel).or_default();
        stats.min_ts = stats.min_ts.max(min_ts);
        stats.max_ts = stats.max_ts.max(max_ts).max(stats.min_ts);
    }

    /// Shorthand for a channel that is fully caught up at `ts`.
    pub fn advance(&self, channel: ChannelId, ts: Timestamp) {
        self.report(channel, ts, ts);
    }

    /// Low watermark of `channel`.
    pub fn last_tick(&self, channel: ChannelId) -> CoreResult<Timestamp> {
        self.channels
            .read()
            .get(&channel)
            .map(|s| s.min_ts)
            .ok_or_else(|| CoreError::not_found("channel", channel.to_string()))
    }
}

#[async_trait]
impl ChannelStatistics for ChannelWatermarks {
    async fn stats(&self, channel: ChannelId) -> CoreResult<ChannelStats> {
        self.channels
            .read()
            .get(&channel)
            .copied()
            .ok_or_else(|| CoreError::not_found("channel", channel.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_watermarks_only_move_forward() {
        let marks = ChannelWatermarks::new();
        marks.add_channel(1).unwrap();
        assert!(marks.add_channel(1).is_err());
        assert_eq!(marks.last_tick(1).unwrap(), 0);

        marks.report(1, 100, 150);
        marks.report(1, 90, 120);
        let stats = marks.stats(1).await.unwrap();
        assert_eq!(stats, ChannelStats { min_ts: 100, max_ts: 150 });

        marks.advance(2, 300);
        assert_eq!(marks.last_tick(2).unwrap(), 300);
        assert!(marks.stats(3).await.is_err());
    }
}
