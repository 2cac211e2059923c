//! In-memory metadata catalog.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use akidb_core::{
    estimate_size_per_record, CollectionId, CollectionMeta, CoreError, CoreResult, MetaCatalog,
    SegmentId, SegmentMeta,
};
use async_trait::async_trait;
use parking_lot::RwLock;

#[derive(Default)]
struct CatalogState {
    collections: HashMap<CollectionId, CollectionMeta>,
    names: HashMap<String, CollectionId>,
    segments: HashMap<SegmentId, SegmentMeta>,
}

/// Catalog kept in process memory.
///
/// Rejects schemas the capacity estimator cannot size, so a malformed schema
/// fails at collection registration rather than mid-allocation.
#[derive(Default)]
pub struct MemoryMetaCatalog {
    state: RwLock<CatalogState>,
    segment_updates: AtomicU64,
}

impl MemoryMetaCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `update_segment` calls.
    pub fn segment_updates(&self) -> u64 {
        self.segment_updates.load(Ordering::SeqCst)
    }

    pub fn get_collection(&self, collection_id: CollectionId) -> CoreResult<CollectionMeta> {
        self.state
            .read()
            .collections
            .get(&collection_id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("collection", collection_id.to_string()))
    }
}

#[async_trait]
impl MetaCatalog for MemoryMetaCatalog {
    async fn add_collection(&self, meta: CollectionMeta) -> CoreResult<()> {
        estimate_size_per_record(&meta.schema)?;

        let mut state = self.state.write();
        if state.collections.contains_key(&meta.id) {
            return Err(CoreError::already_exists("collection", meta.id.to_string()));
        }
        if state.names.contains_key(meta.name()) {
            return Err(CoreError::already_exists("collection", meta.name()));
        }

        tracing::info!(collection_id = %meta.id, name = %meta.name(), "Added collection");
        state.names.insert(meta.name().to_string(), meta.id);
        state.collections.insert(meta.id, meta);
        Ok(())
    }

    async fn add_partition(&self, collection_id: CollectionId, tag: &str) -> CoreResult<()> {
        let mut state = self.state.write();
        let collection = state
            .collections
            .get_mut(&collection_id)
            .ok_or_else(|| CoreError::not_found("collection", collection_id.to_string()))?;
        if collection.has_partition(tag) {
            return Err(CoreError::already_exists(
                "partition",
                format!("{}/{tag}", collection.name()),
            ));
        }
        collection.partition_tags.push(tag.to_string());
        Ok(())
    }

    async fn get_collection_by_name(&self, name: &str) -> CoreResult<CollectionMeta> {
        let state = self.state.read();
        state
            .names
            .get(name)
            .and_then(|id| state.collections.get(id))
            .cloned()
            .ok_or_else(|| CoreError::not_found("collection", name))
    }

    async fn update_segment(&self, meta: SegmentMeta) -> CoreResult<()> {
        let mut state = self.state.write();
        let collection = state
            .collections
            .get_mut(&meta.collection_id)
            .ok_or_else(|| CoreError::not_found("collection", meta.collection_id.to_string()))?;
        if !collection.has_partition(&meta.partition_tag) {
            return Err(CoreError::not_found(
                "partition",
                format!("{}/{}", collection.name(), meta.partition_tag),
            ));
        }
        if !collection.segment_ids.contains(&meta.segment_id) {
            collection.segment_ids.push(meta.segment_id);
        }

        state.segments.insert(meta.segment_id, meta);
        self.segment_updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get_segment_by_id(&self, segment_id: SegmentId) -> CoreResult<SegmentMeta> {
        self.state
            .read()
            .segments
            .get(&segment_id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("segment", segment_id.to_string()))
    }
}
