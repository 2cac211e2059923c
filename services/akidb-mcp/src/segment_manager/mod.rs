//! Growing segment allocation and sealing
//!
//! ```text
//!  assign_segment() ──► mailbox ─┐
//!  global time-ticks ────────────┤
//!  cutovers (assigner) ──────────┼──► control loop ──► MetaCatalog::update_segment
//!  sweep interval ───────────────┘        │                   │
//!                                         │                   ▼
//!                                 watch snapshot      FlushScheduler::on_sealed
//!                                         │
//!                                         ▼
//!                                 SegmentAssigner ──► proxy-sync time-ticks
//! ```
//!
//! A segment is created on the first request for a collection partition that
//! no open segment can hold, receives first-fit grants until it crosses the
//! soft-fill threshold or runs out of usable room, and is sealed by the first
//! global time-tick at or past its cutover once every contributing channel's
//! watermark has caught up.

mod manager;
mod state;

pub use manager::{ManagerDeps, SegmentManager};
pub use state::SegmentStat;
