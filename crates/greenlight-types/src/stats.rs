//! Read-side reporting models.
//!
//! Computed on demand from live rows; snapshot-consistent only.

use serde::{Deserialize, Serialize};

use crate::id::UserId;

/// Instance counts and timing rollup for one tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceStatsSummary {
    pub total: i64,
    pub pending: i64,
    pub running: i64,
    pub approved: i64,
    pub rejected: i64,
    pub withdrawn: i64,
    pub cancelled: i64,
    /// Open approval tasks across all running instances.
    pub open_tasks: i64,
    /// Mean seconds from start to terminal status, over finished instances.
    /// `None` when nothing has finished yet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_resolution_secs: Option<f64>,
}

/// Pending-task load for one approver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssigneeWorkload {
    pub assignee_id: UserId,
    pub pending_tasks: i64,
}
