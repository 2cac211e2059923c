//! Segment assigner: watches fill ratios of open segments and announces the
//! cutover boundary of segments that should be sealed.
//!
//! The assigner never touches segment state. It reads the snapshots published
//! by the segment manager's control loop, emits proxy-sync time-ticks to the
//! write path, and hands the cutover back to the control loop as a message.

use std::collections::HashSet;
use std::sync::Arc;

use akidb_core::metrics::SYNC_SIGNALS_DROPPED;
use akidb_core::{SegmentConfig, SegmentId, TimeTick, Timestamp, TsoAllocator};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::segment_manager::SegmentStat;

/// Boundary after which no rows may target `segment_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cutover {
    pub segment_id: SegmentId,
    pub timestamp: Timestamp,
}

pub struct SegmentAssigner {
    soft_fill_threshold: f64,
    tso: Arc<dyn TsoAllocator>,
    proxy_sync: mpsc::Sender<TimeTick>,
}

impl SegmentAssigner {
    /// `proxy_sync` should be bounded; signals are dropped rather than queued when it is full.
    pub fn new(
        config: &SegmentConfig,
        tso: Arc<dyn TsoAllocator>,
        proxy_sync: mpsc::Sender<TimeTick>,
    ) -> Self {
        Self {
            soft_fill_threshold: config.soft_fill_threshold,
            tso,
            proxy_sync,
        }
    }

    pub(crate) fn spawn(
        self,
        snapshots: watch::Receiver<Vec<SegmentStat>>,
        cutovers: mpsc::Sender<Cutover>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(self.run(snapshots, cutovers, cancel))
    }

    fn crossed(&self, stat: &SegmentStat) -> bool {
        stat.exhausted || stat.fill_ratio() >= self.soft_fill_threshold
    }

    async fn run(
        self,
        mut snapshots: watch::Receiver<Vec<SegmentStat>>,
        cutovers: mpsc::Sender<Cutover>,
        cancel: CancellationToken,
    ) {
        let mut signalled: HashSet<SegmentId> = HashSet::new();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                changed = snapshots.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }

            // Watch coalesces intermediate snapshots; only the latest matters.
            let snapshot = snapshots.borrow_and_update().clone();
            signalled.retain(|id| snapshot.iter().any(|s| s.segment_id == *id));

            for stat in &snapshot {
                if stat.cutover.is_some()
                    || signalled.contains(&stat.segment_id)
                    || !self.crossed(stat)
                {
                    continue;
                }

                let timestamp = match self.tso.next().await {
                    Ok(ts) => ts,
                    Err(e) => {
                        tracing::warn!(
                            segment_id = %stat.segment_id,
                            error = %e,
                            "Failed to allocate cutover timestamp, retrying on next snapshot"
                        );
                        continue;
                    }
                };

                for channel in &stat.channels {
                    self.emit(TimeTick::new(timestamp, *channel));
                }

                let cutover = Cutover {
                    segment_id: stat.segment_id,
                    timestamp,
                };
                if cutovers.send(cutover).await.is_err() {
                    tracing::debug!("Segment manager stopped, assigner exiting");
                    return;
                }
                signalled.insert(stat.segment_id);

                tracing::info!(
                    segment_id = %stat.segment_id,
                    fill_ratio = stat.fill_ratio(),
                    exhausted = stat.exhausted,
                    cutover = timestamp,
                    "Segment crossed soft-fill threshold"
                );
            }
        }

        tracing::debug!("Segment assigner stopped");
    }

    fn emit(&self, tick: TimeTick) {
        match self.proxy_sync.try_send(tick) {
            Ok(()) => {}
            Err(TrySendError::Full(tick)) => {
                SYNC_SIGNALS_DROPPED.inc();
                tracing::warn!(
                    channel = tick.origin_channel,
                    timestamp = tick.timestamp,
                    "Proxy sync channel full, dropping signal"
                );
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!("Proxy sync channel closed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocator::LocalTsoAllocator;
    use akidb_core::CollectionId;
    use std::time::Duration;

    fn stat(id: i64, allocated: u64, exhausted: bool) -> SegmentStat {
        SegmentStat {
            segment_id: SegmentId::new(id),
            collection_id: CollectionId::new(1),
            partition_tag: "p".into(),
            allocated_rows: allocated,
            max_rows: 100,
            channels: vec![0, 2],
            last_allocation_ts: 1,
            exhausted,
            cutover: None,
        }
    }

    #[tokio::test]
    async fn test_signals_once_per_crossing_segment() {
        let (sync_tx, mut sync_rx) = mpsc::channel(16);
        let (snap_tx, snap_rx) = watch::channel(Vec::new());
        let (cut_tx, mut cut_rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();

        let assigner = SegmentAssigner::new(
            &SegmentConfig::default(),
            Arc::new(LocalTsoAllocator::new()),
            sync_tx,
        );
        let handle = assigner.spawn(snap_rx, cut_tx, cancel.clone());

        snap_tx.send_replace(vec![stat(1, 80, false), stat(2, 10, false), stat(3, 5, true)]);

        let first = cut_rx.recv().await.unwrap();
        let second = cut_rx.recv().await.unwrap();
        assert_eq!(first.segment_id, SegmentId::new(1));
        assert_eq!(second.segment_id, SegmentId::new(3));

        for expected in [first, first, second, second] {
            let tick = sync_rx.recv().await.unwrap();
            assert_eq!(tick.timestamp, expected.timestamp);
        }

        // Same snapshot again: nothing new is announced.
        snap_tx.send_replace(vec![stat(1, 90, false), stat(2, 10, false), stat(3, 5, true)]);
        let again = tokio::time::timeout(Duration::from_millis(100), cut_rx.recv()).await;
        assert!(again.is_err());

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_full_sync_channel_drops_signals() {
        let (sync_tx, mut sync_rx) = mpsc::channel(1);
        let (snap_tx, snap_rx) = watch::channel(Vec::new());
        let (cut_tx, mut cut_rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();

        let assigner = SegmentAssigner::new(
            &SegmentConfig::default(),
            Arc::new(LocalTsoAllocator::new()),
            sync_tx,
        );
        let handle = assigner.spawn(snap_rx, cut_tx, cancel.clone());

        // Two channels per segment, room for one signal: the second is dropped
        // and the cutover still reaches the manager.
        snap_tx.send_replace(vec![stat(7, 100, false)]);
        let cutover = cut_rx.recv().await.unwrap();
        assert_eq!(cutover.segment_id, SegmentId::new(7));
        assert_eq!(sync_rx.recv().await.unwrap().origin_channel, 0);
        assert!(sync_rx.try_recv().is_err());

        cancel.cancel();
        handle.await.unwrap();
    }
}
