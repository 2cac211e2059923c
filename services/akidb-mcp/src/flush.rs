//! Channel-backed flush scheduler.

use akidb_core::{FlushScheduler, SegmentMeta};
use tokio::sync::mpsc;

/// Forwards sealed segments to a flush pipeline over an unbounded channel.
///
/// Sealing is rare and the control loop must never block on the flush side,
/// so the queue is unbounded.
pub struct FlushQueue {
    tx: mpsc::UnboundedSender<SegmentMeta>,
}

impl FlushQueue {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SegmentMeta>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl FlushScheduler for FlushQueue {
    fn on_sealed(&self, meta: SegmentMeta) {
        let segment_id = meta.segment_id;
        if self.tx.send(meta).is_err() {
            tracing::warn!(segment_id = %segment_id, "Flush pipeline gone, sealed segment not enqueued");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use akidb_core::{CollectionId, SegmentId};

    #[test]
    fn test_enqueue() {
        let (queue, mut rx) = FlushQueue::channel();
        queue.on_sealed(SegmentMeta::new(SegmentId::new(1), CollectionId::new(2), "p", 0..=0));
        assert_eq!(rx.try_recv().unwrap().segment_id, SegmentId::new(1));

        drop(rx);
        queue.on_sealed(SegmentMeta::new(SegmentId::new(2), CollectionId::new(2), "p", 0..=0));
    }
}
