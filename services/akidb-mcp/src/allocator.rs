//! Process-local identifier and timestamp allocators.

use std::sync::atomic::{AtomicI64, Ordering};

use akidb_core::{compose_ts, CoreResult, IdAllocator, Timestamp, TsoAllocator, UniqueId};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

/// Hands out consecutive identifiers starting at `start`.
pub struct AtomicIdAllocator {
    next: AtomicI64,
}

impl AtomicIdAllocator {
    pub fn new(start: UniqueId) -> Self {
        Self {
            next: AtomicI64::new(start),
        }
    }
}

impl Default for AtomicIdAllocator {
    fn default() -> Self {
        Self::new(1)
    }
}

#[async_trait]
impl IdAllocator for AtomicIdAllocator {
    async fn next(&self) -> CoreResult<UniqueId> {
        Ok(self.next.fetch_add(1, Ordering::SeqCst))
    }
}

/// Hybrid timestamps from the wall clock plus a logical counter.
///
/// Strictly increasing even if the wall clock stalls or steps backwards.
pub struct LocalTsoAllocator {
    last: Mutex<Timestamp>,
}

impl LocalTsoAllocator {
    pub fn new() -> Self {
        Self {
            last: Mutex::new(0),
        }
    }

    fn allocate(&self) -> Timestamp {
        let physical = u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0);
        let candidate = compose_ts(physical, 0);

        let mut last = self.last.lock();
        *last = if candidate > *last { candidate } else { *last + 1 };
        *last
    }
}

impl Default for LocalTsoAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TsoAllocator for LocalTsoAllocator {
    async fn next(&self) -> CoreResult<Timestamp> {
        Ok(self.allocate())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use akidb_core::parse_ts;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_ids_never_repeat() {
        let ids = Arc::new(AtomicIdAllocator::new(100));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let ids = Arc::clone(&ids);
            handles.push(tokio::spawn(async move {
                let mut out = Vec::new();
                for _ in 0..100 {
                    out.push(ids.next().await.unwrap());
                }
                out
            }));
        }

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.await.unwrap() {
                assert!(id >= 100);
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(seen.len(), 800);
    }

    #[tokio::test]
    async fn test_timestamps_strictly_increase() {
        let tso = LocalTsoAllocator::new();
        let mut prev = tso.next().await.unwrap();
        for _ in 0..10_000 {
            let ts = tso.next().await.unwrap();
            assert!(ts > prev);
            prev = ts;
        }

        let (physical, _) = parse_ts(prev);
        let now = Utc::now().timestamp_millis() as u64;
        assert!(physical <= now + 1_000);
    }
}
