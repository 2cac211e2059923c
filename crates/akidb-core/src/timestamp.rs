//! Hybrid timestamps and time-tick messages.
//!
//! A timestamp packs a physical wall-clock reading in milliseconds into the
//! high bits and a logical counter into the low [`LOGICAL_BITS`] bits, giving
//! a total order across the cluster even when many timestamps are handed out
//! within the same millisecond.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::ChannelId;

/// Hybrid physical+logical timestamp.
pub type Timestamp = u64;

/// Number of low bits reserved for the logical counter.
pub const LOGICAL_BITS: u32 = 18;

const LOGICAL_MASK: u64 = (1 << LOGICAL_BITS) - 1;

/// Maximum logical value that fits in a single physical millisecond.
pub const MAX_LOGICAL: u64 = LOGICAL_MASK;

/// Composes a hybrid timestamp. Logical values wider than [`LOGICAL_BITS`] are truncated.
#[must_use]
pub const fn compose_ts(physical_ms: u64, logical: u64) -> Timestamp {
    (physical_ms << LOGICAL_BITS) | (logical & LOGICAL_MASK)
}

/// Splits a hybrid timestamp into `(physical_ms, logical)`.
#[must_use]
pub const fn parse_ts(ts: Timestamp) -> (u64, u64) {
    (ts >> LOGICAL_BITS, ts & LOGICAL_MASK)
}

/// Returns the wall-clock instant of the physical component.
#[must_use]
pub fn physical_time(ts: Timestamp) -> Option<DateTime<Utc>> {
    let (physical, _) = parse_ts(ts);
    Utc.timestamp_millis_opt(i64::try_from(physical).ok()?).single()
}

/// Time-tick message: everything below `timestamp` on `origin_channel` has been emitted.
///
/// Used both for the inbound global time-tick stream that drives sealing and
/// for the outbound proxy-sync signals produced by the segment assigner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeTick {
    pub timestamp: Timestamp,
    pub origin_channel: ChannelId,
}

impl TimeTick {
    #[must_use]
    pub const fn new(timestamp: Timestamp, origin_channel: ChannelId) -> Self {
        Self {
            timestamp,
            origin_channel,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compose_and_parse() {
        let ts = compose_ts(1_700_000_000_000, 17);
        assert_eq!(parse_ts(ts), (1_700_000_000_000, 17));
        assert!(compose_ts(1_700_000_000_000, 18) > ts);
        assert!(compose_ts(1_700_000_000_001, 0) > compose_ts(1_700_000_000_000, MAX_LOGICAL));
    }

    #[test]
    fn test_physical_time() {
        let ts = compose_ts(1_000, 3);
        let time = physical_time(ts).unwrap();
        assert_eq!(time.timestamp_millis(), 1_000);
    }
}
