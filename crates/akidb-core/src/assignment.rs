//! Request and response records for segment id assignment.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::ids::{ChannelId, SegmentId};

/// A caller asks for room for `count` rows of a collection partition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegIdRequest {
    pub count: u32,
    pub channel_id: ChannelId,
    pub coll_name: String,
    pub partition_tag: String,
}

impl SegIdRequest {
    #[must_use]
    pub fn new(
        count: u32,
        channel_id: ChannelId,
        coll_name: impl Into<String>,
        partition_tag: impl Into<String>,
    ) -> Self {
        Self {
            count,
            channel_id,
            coll_name: coll_name.into(),
            partition_tag: partition_tag.into(),
        }
    }
}

/// Outcome kind of a single assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Success,
    /// Unknown collection or partition.
    NotFound,
    /// The request can never fit in a single segment.
    CapacityExceeded,
    /// Allocator failure or manager shutdown.
    UnexpectedError,
}

impl ErrorCode {
    /// Label used for metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::NotFound => "not_found",
            Self::CapacityExceeded => "capacity_exceeded",
            Self::UnexpectedError => "unexpected_error",
        }
    }
}

/// Status attached to every assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignStatus {
    pub code: ErrorCode,
    pub reason: String,
}

impl AssignStatus {
    #[must_use]
    pub fn success() -> Self {
        Self {
            code: ErrorCode::Success,
            reason: String::new(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.code == ErrorCode::Success
    }
}

impl From<&CoreError> for AssignStatus {
    fn from(err: &CoreError) -> Self {
        let code = match err {
            CoreError::NotFound { .. } => ErrorCode::NotFound,
            CoreError::CapacityExceeded { .. } => ErrorCode::CapacityExceeded,
            _ => ErrorCode::UnexpectedError,
        };
        Self {
            code,
            reason: err.to_string(),
        }
    }
}

/// Result of one [`SegIdRequest`]. `count` always equals the requested count on success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegIdAssignment {
    pub seg_id: Option<SegmentId>,
    pub channel_id: ChannelId,
    pub count: u32,
    pub coll_name: String,
    pub partition_tag: String,
    pub status: AssignStatus,
}

impl SegIdAssignment {
    /// Successful grant of the full request to `seg_id`.
    #[must_use]
    pub fn granted(request: &SegIdRequest, seg_id: SegmentId) -> Self {
        Self {
            seg_id: Some(seg_id),
            channel_id: request.channel_id,
            count: request.count,
            coll_name: request.coll_name.clone(),
            partition_tag: request.partition_tag.clone(),
            status: AssignStatus::success(),
        }
    }

    /// Failed assignment; no segment was touched.
    #[must_use]
    pub fn failed(request: &SegIdRequest, err: &CoreError) -> Self {
        Self {
            seg_id: None,
            channel_id: request.channel_id,
            count: 0,
            coll_name: request.coll_name.clone(),
            partition_tag: request.partition_tag.clone(),
            status: AssignStatus::from(err),
        }
    }
}
