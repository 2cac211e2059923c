use std::collections::HashMap;
use std::sync::Arc;

use akidb_core::metrics::{
    init_metrics, OPEN_SEGMENTS, SEAL_RETRIES, SEGMENTS_SEALED, SEGMENT_ASSIGNMENTS,
    SEGMENT_ROWS_GRANTED,
};
use akidb_core::timestamp::physical_time;
use akidb_core::{
    estimate_size_per_record, row_capacity, ChannelStatistics, CollectionId, CollectionMeta,
    CoreError, CoreResult, FlushScheduler, IdAllocator, MetaCatalog, SegIdAssignment,
    SegIdRequest, SegmentConfig, SegmentId, SegmentMeta, SegmentState, TimeTick, Timestamp,
    TsoAllocator,
};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::state::{OpenSegment, SegmentCapacity, SegmentStat, SegmentTable};
use crate::assigner::{Cutover, SegmentAssigner};

/// External collaborators consumed by the segment manager.
#[derive(Clone)]
pub struct ManagerDeps {
    pub catalog: Arc<dyn MetaCatalog>,
    pub id_allocator: Arc<dyn IdAllocator>,
    pub tso: Arc<dyn TsoAllocator>,
    pub flush_scheduler: Arc<dyn FlushScheduler>,
    pub watermarks: Arc<dyn ChannelStatistics>,
}

enum Command {
    Assign {
        requests: Vec<SegIdRequest>,
        reply: oneshot::Sender<Vec<SegIdAssignment>>,
    },
}

struct Pending {
    control: ControlLoop,
    commands: mpsc::Receiver<Command>,
    time_ticks: mpsc::Receiver<TimeTick>,
    assigner: SegmentAssigner,
}

/// Owns the growing segments of every collection partition.
///
/// All allocation and sealing decisions run on a single control loop task;
/// callers talk to it through a bounded mailbox, so concurrent
/// [`assign_segment`](Self::assign_segment) calls are serialized and can never
/// push a segment past its capacity.
///
/// # Example
///
/// ```no_run
/// use akidb_core::{SegIdRequest, SegmentConfig};
/// use akidb_mcp::segment_manager::{ManagerDeps, SegmentManager};
/// use akidb_mcp::SegmentAssigner;
/// use tokio::sync::mpsc;
///
/// # async fn example(deps: ManagerDeps) -> akidb_core::CoreResult<()> {
/// let config = SegmentConfig::default();
/// let (_tick_tx, tick_rx) = mpsc::channel(64);
/// let (sync_tx, _sync_rx) = mpsc::channel(config.sync_channel_capacity);
///
/// let assigner = SegmentAssigner::new(&config, deps.tso.clone(), sync_tx);
/// let mut manager = SegmentManager::new(config, deps, tick_rx, assigner)?;
/// manager.start();
///
/// let _assignments = manager
///     .assign_segment(vec![SegIdRequest::new(1000, 0, "docs", "_default")])
///     .await?;
/// manager.close().await;
/// # Ok(())
/// # }
/// ```
pub struct SegmentManager {
    mailbox: mpsc::Sender<Command>,
    snapshots: watch::Receiver<Vec<SegmentStat>>,
    cancel: CancellationToken,
    mailbox_capacity: usize,
    pending: Option<Pending>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl SegmentManager {
    /// Create a segment manager. Nothing runs until [`start`](Self::start).
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if the configuration does not validate.
    pub fn new(
        config: SegmentConfig,
        deps: ManagerDeps,
        time_ticks: mpsc::Receiver<TimeTick>,
        assigner: SegmentAssigner,
    ) -> CoreResult<Self> {
        config
            .validate()
            .map_err(|e| CoreError::invalid_state(e.to_string()))?;
        init_metrics();

        let (mailbox, commands) = mpsc::channel(config.mailbox_capacity);
        let (snapshot_tx, snapshots) = watch::channel(Vec::new());
        let mailbox_capacity = config.mailbox_capacity;

        let control = ControlLoop {
            config,
            deps,
            table: SegmentTable::new(),
            capacities: HashMap::new(),
            snapshots: snapshot_tx,
        };

        Ok(Self {
            mailbox,
            snapshots,
            cancel: CancellationToken::new(),
            mailbox_capacity,
            pending: Some(Pending {
                control,
                commands,
                time_ticks,
                assigner,
            }),
            workers: Mutex::new(Vec::new()),
        })
    }

    /// Spawn the control loop and the segment assigner.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self) {
        let Some(pending) = self.pending.take() else {
            tracing::warn!("Segment manager already started");
            return;
        };

        let (cutover_tx, cutover_rx) = mpsc::channel(self.mailbox_capacity);
        let assigner = pending.assigner.spawn(
            self.snapshots.clone(),
            cutover_tx,
            self.cancel.child_token(),
        );
        let control = tokio::spawn(pending.control.run(
            pending.commands,
            pending.time_ticks,
            cutover_rx,
            self.cancel.clone(),
        ));

        *self.workers.get_mut() = vec![control, assigner];
        tracing::info!("Segment manager started");
    }

    /// Assign segment ids to a batch of requests.
    ///
    /// Requests are processed independently in input order: a failed item
    /// carries its own status and never aborts its siblings. Callers that must
    /// bound latency wrap this in `tokio::time::timeout`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidState` if the manager was never started or is closed.
    pub async fn assign_segment(
        &self,
        requests: Vec<SegIdRequest>,
    ) -> CoreResult<Vec<SegIdAssignment>> {
        if self.pending.is_some() {
            return Err(CoreError::invalid_state("segment manager not started"));
        }
        if self.cancel.is_cancelled() {
            return Err(CoreError::invalid_state("segment manager is closed"));
        }

        let (reply, response) = oneshot::channel();
        self.mailbox
            .send(Command::Assign { requests, reply })
            .await
            .map_err(|_| CoreError::invalid_state("segment manager is closed"))?;

        response
            .await
            .map_err(|_| CoreError::invalid_state("segment manager stopped before replying"))
    }

    /// True once [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Latest consistent view of the open segments.
    pub fn snapshot(&self) -> Vec<SegmentStat> {
        self.snapshots.borrow().clone()
    }

    /// Stop the control loop and the assigner.
    ///
    /// Queued requests are answered with a shutdown status. Open segments are
    /// abandoned without being sealed.
    pub async fn close(&self) {
        self.cancel.cancel();
        let workers = std::mem::take(&mut *self.workers.lock());
        for handle in workers {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Segment manager worker ended abnormally");
            }
        }
        tracing::info!("Segment manager shut down");
    }
}

impl Drop for SegmentManager {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct ControlLoop {
    config: SegmentConfig,
    deps: ManagerDeps,
    table: SegmentTable,
    capacities: HashMap<CollectionId, SegmentCapacity>,
    snapshots: watch::Sender<Vec<SegmentStat>>,
}

impl ControlLoop {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut time_ticks: mpsc::Receiver<TimeTick>,
        mut cutovers: mpsc::Receiver<Cutover>,
        cancel: CancellationToken,
    ) {
        let mut sweep = tokio::time::interval(self.config.assign_expiration());
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                Some(command) = commands.recv() => {
                    // Published before the reply.
                    self.handle(command).await;
                    continue;
                }
                Some(tick) = time_ticks.recv() => self.on_time_tick(tick).await,
                Some(cutover) = cutovers.recv() => self.on_cutover(cutover),
                _ = sweep.tick() => {
                    if !self.sweep() {
                        continue;
                    }
                }
            }
            self.publish();
        }

        commands.close();
        let shutdown = CoreError::invalid_state("segment manager is shutting down");
        while let Ok(Command::Assign { requests, reply }) = commands.try_recv() {
            let failed = requests
                .iter()
                .map(|r| SegIdAssignment::failed(r, &shutdown))
                .collect();
            let _ = reply.send(failed);
        }

        OPEN_SEGMENTS.sub(self.table.len() as i64);
        tracing::info!(
            abandoned = self.table.len(),
            "Segment manager control loop stopped"
        );
    }

    async fn handle(&mut self, command: Command) {
        match command {
            Command::Assign { requests, reply } => {
                let assignments = self.assign(&requests).await;
                // Callers observe their own grants in the next snapshot read.
                self.publish();
                if reply.send(assignments).is_err() {
                    tracing::debug!("Assignment caller went away before the reply");
                }
            }
        }
    }

    async fn assign(&mut self, requests: &[SegIdRequest]) -> Vec<SegIdAssignment> {
        let mut assignments = Vec::with_capacity(requests.len());
        for request in requests {
            let assignment = match self.assign_one(request).await {
                Ok(segment_id) => SegIdAssignment::granted(request, segment_id),
                Err(e) => {
                    tracing::warn!(
                        collection = %request.coll_name,
                        partition = %request.partition_tag,
                        channel = request.channel_id,
                        count = request.count,
                        error = %e,
                        "Segment assignment failed"
                    );
                    SegIdAssignment::failed(request, &e)
                }
            };
            SEGMENT_ASSIGNMENTS
                .with_label_values(&[assignment.status.code.as_str()])
                .inc();
            assignments.push(assignment);
        }
        assignments
    }

    async fn assign_one(&mut self, request: &SegIdRequest) -> CoreResult<SegmentId> {
        let collection = self
            .deps
            .catalog
            .get_collection_by_name(&request.coll_name)
            .await?;
        if !collection.has_partition(&request.partition_tag) {
            return Err(CoreError::not_found(
                "partition",
                format!("{}/{}", request.coll_name, request.partition_tag),
            ));
        }

        let capacity = self.capacity_of(&collection)?;
        let count = u64::from(request.count);
        if count > capacity.max_rows {
            return Err(CoreError::capacity_exceeded(count, capacity.max_rows));
        }

        let now = self.deps.tso.next().await?;
        let policy = self.config.soft_full_policy;

        if let Some(segment) =
            self.table
                .find_fit(collection.id, &request.partition_tag, count, policy)
        {
            segment.grant(count, request.channel_id, now);
            SEGMENT_ROWS_GRANTED.inc_by(count);
            tracing::debug!(
                segment_id = %segment.segment_id,
                channel = request.channel_id,
                count,
                allocated = segment.allocated_rows,
                "Granted rows in open segment"
            );
            return Ok(segment.segment_id);
        }

        let segment_id = SegmentId::new(self.deps.id_allocator.next().await?);
        let mut segment = OpenSegment::new(
            segment_id,
            collection.id,
            request.partition_tag.clone(),
            capacity,
        );
        segment.grant(count, request.channel_id, now);
        self.table.push(segment);
        OPEN_SEGMENTS.inc();
        SEGMENT_ROWS_GRANTED.inc_by(count);

        tracing::info!(
            segment_id = %segment_id,
            collection = %request.coll_name,
            partition = %request.partition_tag,
            channel = request.channel_id,
            count,
            max_rows = capacity.max_rows,
            "Opened segment"
        );
        Ok(segment_id)
    }

    fn capacity_of(&mut self, collection: &CollectionMeta) -> CoreResult<SegmentCapacity> {
        if let Some(capacity) = self.capacities.get(&collection.id) {
            return Ok(*capacity);
        }
        let capacity = SegmentCapacity {
            max_rows: row_capacity(&collection.schema, self.config.max_segment_bytes)?,
            bytes_per_record: estimate_size_per_record(&collection.schema)?,
        };
        self.capacities.insert(collection.id, capacity);
        Ok(capacity)
    }

    fn on_cutover(&mut self, cutover: Cutover) {
        let Some(segment) = self.table.get_mut(cutover.segment_id) else {
            return;
        };
        if segment.cutover.is_none() {
            segment.cutover = Some(cutover.timestamp);
            tracing::debug!(
                segment_id = %cutover.segment_id,
                cutover = cutover.timestamp,
                "Segment closed to new grants"
            );
        }
    }

    /// Returns whether any segment was newly marked.
    fn sweep(&mut self) -> bool {
        let exhausted = self.table.mark_exhausted(self.config.min_assign_increment);
        for segment_id in &exhausted {
            tracing::debug!(segment_id = %segment_id, "Segment exhausted");
        }
        !exhausted.is_empty()
    }

    async fn on_time_tick(&mut self, tick: TimeTick) {
        for segment_id in self.table.sealable_at(tick.timestamp) {
            match self.try_seal(segment_id, tick.timestamp).await {
                Ok(_) => {}
                Err(e) => {
                    SEAL_RETRIES.inc();
                    tracing::error!(
                        segment_id = %segment_id,
                        timestamp = tick.timestamp,
                        error = %e,
                        "Failed to seal segment, retrying on next time tick"
                    );
                }
            }
        }
    }

    /// Returns `Ok(false)` while some contributing channel is still behind `timestamp`.
    async fn try_seal(&mut self, segment_id: SegmentId, timestamp: Timestamp) -> CoreResult<bool> {
        let Some(segment) = self.table.get(segment_id).cloned() else {
            return Ok(false);
        };

        for channel in &segment.channels {
            match self.deps.watermarks.stats(*channel).await {
                Ok(stats) if stats.min_ts >= timestamp => {}
                Ok(stats) => {
                    tracing::debug!(
                        segment_id = %segment_id,
                        channel,
                        min_ts = stats.min_ts,
                        timestamp,
                        "Channel behind seal boundary"
                    );
                    return Ok(false);
                }
                Err(e) => {
                    tracing::debug!(
                        segment_id = %segment_id,
                        channel,
                        error = %e,
                        "No watermark for channel"
                    );
                    return Ok(false);
                }
            }
        }

        let meta = match self.deps.catalog.get_segment_by_id(segment_id).await {
            Ok(existing) if existing.state() == SegmentState::Sealed => {
                tracing::info!(
                    segment_id = %segment_id,
                    close_time = existing.close_time,
                    "Segment already closed in catalog"
                );
                existing
            }
            Ok(existing) => {
                let meta = Self::closed_meta(existing, &segment, timestamp);
                self.deps.catalog.update_segment(meta.clone()).await?;
                meta
            }
            Err(CoreError::NotFound { .. }) => {
                let mut fresh = SegmentMeta::new(
                    segment_id,
                    segment.collection_id,
                    segment.partition_tag.clone(),
                    0..=0,
                );
                fresh.num_rows = segment.allocated_rows;
                fresh.mem_size = segment.allocated_rows * segment.capacity.bytes_per_record;
                let meta = Self::closed_meta(fresh, &segment, timestamp);
                self.deps.catalog.update_segment(meta.clone()).await?;
                meta
            }
            Err(e) => return Err(e),
        };

        self.table.remove(segment_id);
        OPEN_SEGMENTS.dec();
        SEGMENTS_SEALED.inc();

        tracing::info!(
            segment_id = %segment_id,
            close_time = meta.close_time,
            sealed_at = ?physical_time(meta.close_time),
            num_rows = meta.num_rows,
            channels = ?meta.channel_range(),
            "Sealed segment"
        );
        self.deps.flush_scheduler.on_sealed(meta);
        Ok(true)
    }

    fn closed_meta(
        mut meta: SegmentMeta,
        segment: &OpenSegment,
        timestamp: Timestamp,
    ) -> SegmentMeta {
        if let Some(span) = segment.channel_span() {
            meta.channel_start = *span.start();
            meta.channel_end = *span.end();
        }
        meta.close_time = timestamp;
        meta
    }

    fn publish(&self) {
        let next = self.table.snapshot();
        self.snapshots.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }
}
