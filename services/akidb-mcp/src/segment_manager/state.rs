use std::collections::BTreeSet;
use std::ops::RangeInclusive;

use akidb_core::{ChannelId, CollectionId, SegmentId, SoftFullPolicy, Timestamp};

/// Row capacity of a collection's segments, derived once from its schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SegmentCapacity {
    pub max_rows: u64,
    pub bytes_per_record: u64,
}

/// In-memory state of a growing segment. Owned by the control loop.
///
/// Sealing removes the segment from the [`SegmentTable`]; a segment present
/// in the table is never sealed.
#[derive(Debug, Clone)]
pub(crate) struct OpenSegment {
    pub segment_id: SegmentId,
    pub collection_id: CollectionId,
    pub partition_tag: String,
    pub capacity: SegmentCapacity,
    pub allocated_rows: u64,
    pub last_allocation_ts: Timestamp,
    pub channels: BTreeSet<ChannelId>,
    /// Remaining room fell below the minimum usable increment.
    pub exhausted: bool,
    /// Boundary announced by the assigner; no grants target the segment past it.
    pub cutover: Option<Timestamp>,
}

impl OpenSegment {
    pub fn new(
        segment_id: SegmentId,
        collection_id: CollectionId,
        partition_tag: impl Into<String>,
        capacity: SegmentCapacity,
    ) -> Self {
        Self {
            segment_id,
            collection_id,
            partition_tag: partition_tag.into(),
            capacity,
            allocated_rows: 0,
            last_allocation_ts: 0,
            channels: BTreeSet::new(),
            exhausted: false,
            cutover: None,
        }
    }

    pub fn remaining(&self) -> u64 {
        self.capacity.max_rows - self.allocated_rows
    }

    pub fn soft_full(&self) -> bool {
        self.exhausted || self.cutover.is_some()
    }

    pub fn can_hold(&self, count: u64) -> bool {
        count <= self.remaining()
    }

    /// Caller must have checked [`Self::can_hold`].
    pub fn grant(&mut self, count: u64, channel: ChannelId, now: Timestamp) {
        debug_assert!(self.can_hold(count));
        self.allocated_rows += count;
        self.last_allocation_ts = self.last_allocation_ts.max(now);
        self.channels.insert(channel);
    }

    pub fn fill_ratio(&self) -> f64 {
        if self.capacity.max_rows == 0 {
            return 1.0;
        }
        self.allocated_rows as f64 / self.capacity.max_rows as f64
    }

    /// Earliest time-tick that may seal the segment.
    ///
    /// Grants that raced the assigner's signal carry later timestamps than the
    /// cutover, so the boundary covers them too.
    pub fn seal_boundary(&self) -> Option<Timestamp> {
        self.cutover.map(|c| c.max(self.last_allocation_ts))
    }

    pub fn channel_span(&self) -> Option<RangeInclusive<ChannelId>> {
        let first = *self.channels.first()?;
        let last = *self.channels.last()?;
        Some(first..=last)
    }

    fn stat(&self) -> SegmentStat {
        SegmentStat {
            segment_id: self.segment_id,
            collection_id: self.collection_id,
            partition_tag: self.partition_tag.clone(),
            allocated_rows: self.allocated_rows,
            max_rows: self.capacity.max_rows,
            channels: self.channels.iter().copied().collect(),
            last_allocation_ts: self.last_allocation_ts,
            exhausted: self.exhausted,
            cutover: self.cutover,
        }
    }
}

/// Read-only view of one open segment, published after every control loop step.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentStat {
    pub segment_id: SegmentId,
    pub collection_id: CollectionId,
    pub partition_tag: String,
    pub allocated_rows: u64,
    pub max_rows: u64,
    pub channels: Vec<ChannelId>,
    pub last_allocation_ts: Timestamp,
    pub exhausted: bool,
    pub cutover: Option<Timestamp>,
}

impl SegmentStat {
    pub fn fill_ratio(&self) -> f64 {
        if self.max_rows == 0 {
            return 1.0;
        }
        self.allocated_rows as f64 / self.max_rows as f64
    }

    pub fn remaining(&self) -> u64 {
        self.max_rows - self.allocated_rows
    }
}

/// Open segments of every collection partition, in creation order.
#[derive(Debug, Default)]
pub(crate) struct SegmentTable {
    segments: Vec<OpenSegment>,
}

impl SegmentTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn push(&mut self, segment: OpenSegment) {
        self.segments.push(segment);
    }

    pub fn get(&self, segment_id: SegmentId) -> Option<&OpenSegment> {
        self.segments.iter().find(|s| s.segment_id == segment_id)
    }

    pub fn get_mut(&mut self, segment_id: SegmentId) -> Option<&mut OpenSegment> {
        self.segments.iter_mut().find(|s| s.segment_id == segment_id)
    }

    pub fn remove(&mut self, segment_id: SegmentId) -> Option<OpenSegment> {
        let idx = self
            .segments
            .iter()
            .position(|s| s.segment_id == segment_id)?;
        Some(self.segments.remove(idx))
    }

    /// First-fit search. Never splits a request across segments.
    pub fn find_fit(
        &mut self,
        collection_id: CollectionId,
        partition_tag: &str,
        count: u64,
        policy: SoftFullPolicy,
    ) -> Option<&mut OpenSegment> {
        let candidates = |soft_full: bool| {
            move |s: &&OpenSegment| {
                s.collection_id == collection_id
                    && s.partition_tag == partition_tag
                    && s.soft_full() == soft_full
                    && s.can_hold(count)
            }
        };

        let mut found = self.segments.iter().find(candidates(false));
        if found.is_none() && policy == SoftFullPolicy::Deprioritize {
            found = self.segments.iter().find(candidates(true));
        }
        let segment_id = found?.segment_id;
        self.get_mut(segment_id)
    }

    /// Marks segments with less than `min_increment` rows of room as exhausted.
    /// Returns the newly marked segments.
    pub fn mark_exhausted(&mut self, min_increment: u64) -> Vec<SegmentId> {
        self.segments
            .iter_mut()
            .filter(|s| !s.exhausted && s.remaining() < min_increment)
            .map(|s| {
                s.exhausted = true;
                s.segment_id
            })
            .collect()
    }

    /// Segments whose seal boundary is at or below `timestamp`.
    pub fn sealable_at(&self, timestamp: Timestamp) -> Vec<SegmentId> {
        self.segments
            .iter()
            .filter(|s| s.seal_boundary().is_some_and(|b| b <= timestamp))
            .map(|s| s.segment_id)
            .collect()
    }

    pub fn snapshot(&self) -> Vec<SegmentStat> {
        self.segments.iter().map(OpenSegment::stat).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAPACITY: SegmentCapacity = SegmentCapacity {
        max_rows: 10_000,
        bytes_per_record: 516,
    };

    fn open(table: &mut SegmentTable, id: i64, rows: u64) {
        let mut segment = OpenSegment::new(SegmentId::new(id), CollectionId::new(1), "p", CAPACITY);
        segment.grant(rows, 0, id as u64);
        table.push(segment);
    }

    #[test]
    fn test_first_fit_in_creation_order() {
        let mut table = SegmentTable::new();
        open(&mut table, 1, 9_000);
        open(&mut table, 2, 5_000);
        open(&mut table, 3, 1_000);

        let found = table
            .find_fit(CollectionId::new(1), "p", 1_000, SoftFullPolicy::Exclude)
            .unwrap();
        assert_eq!(found.segment_id, SegmentId::new(1));

        let found = table
            .find_fit(CollectionId::new(1), "p", 4_000, SoftFullPolicy::Exclude)
            .unwrap();
        assert_eq!(found.segment_id, SegmentId::new(2));

        assert!(table
            .find_fit(CollectionId::new(1), "p", 9_001, SoftFullPolicy::Exclude)
            .is_none());
        assert!(table
            .find_fit(CollectionId::new(1), "other", 1, SoftFullPolicy::Exclude)
            .is_none());
    }

    #[test]
    fn test_soft_full_policy() {
        let mut table = SegmentTable::new();
        open(&mut table, 1, 8_000);
        table.get_mut(SegmentId::new(1)).unwrap().cutover = Some(50);

        assert!(table
            .find_fit(CollectionId::new(1), "p", 100, SoftFullPolicy::Exclude)
            .is_none());
        let found = table
            .find_fit(CollectionId::new(1), "p", 100, SoftFullPolicy::Deprioritize)
            .unwrap();
        assert_eq!(found.segment_id, SegmentId::new(1));

        open(&mut table, 2, 0);
        let found = table
            .find_fit(CollectionId::new(1), "p", 100, SoftFullPolicy::Deprioritize)
            .unwrap();
        assert_eq!(found.segment_id, SegmentId::new(2));
    }

    #[test]
    fn test_mark_exhausted() {
        let mut table = SegmentTable::new();
        open(&mut table, 1, 9_500);
        open(&mut table, 2, 100);

        assert_eq!(table.mark_exhausted(1_000), vec![SegmentId::new(1)]);
        assert!(table.mark_exhausted(1_000).is_empty());
        assert!(table.get(SegmentId::new(1)).unwrap().soft_full());
    }

    #[test]
    fn test_seal_boundary_covers_late_grants() {
        let mut segment = OpenSegment::new(SegmentId::new(1), CollectionId::new(1), "p", CAPACITY);
        segment.grant(10, 3, 100);
        assert_eq!(segment.seal_boundary(), None);

        segment.cutover = Some(90);
        assert_eq!(segment.seal_boundary(), Some(100));
        segment.grant(10, 1, 120);
        assert_eq!(segment.seal_boundary(), Some(120));
        assert_eq!(segment.channel_span(), Some(1..=3));

        let mut table = SegmentTable::new();
        table.push(segment);
        assert!(table.sealable_at(119).is_empty());
        assert_eq!(table.sealable_at(120), vec![SegmentId::new(1)]);
    }
}
