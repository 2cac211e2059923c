//! Central metrics registry and metric definitions
//!
//! Prometheus metrics for the segment allocation path. Metrics are registered
//! lazily on first access using once_cell::Lazy.

use once_cell::sync::Lazy;
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, IntCounter,
    IntCounterVec, IntGauge,
};

/// Segment id assignments by outcome
pub static SEGMENT_ASSIGNMENTS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "akidb_mcp_segment_assignments_total",
        "Total number of segment id assignment requests",
        &["status"]
    )
    .expect("Failed to register segment assignment counter")
});

/// Rows granted across all segments
pub static SEGMENT_ROWS_GRANTED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "akidb_mcp_segment_rows_granted_total",
        "Total number of rows granted to callers"
    )
    .expect("Failed to register rows granted counter")
});

/// Currently open (growing) segments
pub static OPEN_SEGMENTS: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "akidb_mcp_open_segments",
        "Number of growing segments owned by the segment manager"
    )
    .expect("Failed to register open segments gauge")
});

/// Segments sealed
pub static SEGMENTS_SEALED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "akidb_mcp_segments_sealed_total",
        "Total number of sealed segments"
    )
    .expect("Failed to register sealed segments counter")
});

/// Seals postponed because the catalog update failed
pub static SEAL_RETRIES: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "akidb_mcp_seal_retries_total",
        "Seal attempts postponed to the next time tick after a catalog failure"
    )
    .expect("Failed to register seal retry counter")
});

/// Proxy sync signals dropped because the consumer was behind
pub static SYNC_SIGNALS_DROPPED: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "akidb_mcp_sync_signals_dropped_total",
        "Proxy sync signals dropped because the outbound channel was full"
    )
    .expect("Failed to register dropped sync signal counter")
});

/// Force-initialise all metrics so they show up in scrapes before first use
pub fn init_metrics() {
    Lazy::force(&SEGMENT_ASSIGNMENTS);
    Lazy::force(&SEGMENT_ROWS_GRANTED);
    Lazy::force(&OPEN_SEGMENTS);
    Lazy::force(&SEGMENTS_SEALED);
    Lazy::force(&SEAL_RETRIES);
    Lazy::force(&SYNC_SIGNALS_DROPPED);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registered() {
        init_metrics();
        SEGMENT_ASSIGNMENTS.with_label_values(&["success"]).inc();
        assert!(SEGMENT_ASSIGNMENTS.with_label_values(&["success"]).get() >= 1);

        let families = prometheus::gather();
        assert!(families
            .iter()
            .any(|f| f.get_name() == "akidb_mcp_segments_sealed_total"));
    }
}
