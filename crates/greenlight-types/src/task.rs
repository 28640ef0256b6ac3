//! Approval task domain types.
//!
//! A task is one approver's unit of work at one node of a running instance.
//! Tasks close exactly once: `decision`, `comment` and `resolved_at` are set
//! atomically with the status change and never rewritten.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

use crate::id::{InstanceId, TaskId, TenantId, UserId};

/// An approval task routed to a single assignee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalTask {
    /// UUIDv7 task ID.
    pub id: TaskId,
    pub tenant_id: TenantId,
    /// Instance this task belongs to.
    pub instance_id: InstanceId,
    /// Node ID matching `NodeDefinition.id`.
    pub node_id: String,
    /// User the task is currently routed to.
    pub assignee_id: UserId,
    /// Current lifecycle status.
    pub status: TaskStatus,
    /// Verdict recorded at close. Only set for approved/rejected tasks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,
    /// Free-form note recorded at close.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Original approver when this task was produced by a delegation. The
    /// delegator stays the approver of record for reporting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegated_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    /// When the task left `pending`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl ApprovalTask {
    /// Whether the task still awaits a verdict.
    pub fn is_open(&self) -> bool {
        self.status == TaskStatus::Pending
    }
}

/// Lifecycle states of an approval task. Every state except `Pending` is
/// final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Approved,
    Rejected,
    /// Closed by handing the work item to another user.
    Transferred,
    /// Closed by asking another user to decide on the assignee's behalf.
    Delegated,
    /// Closed by the engine because the node or instance was decided
    /// elsewhere.
    Cancelled,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Approved => write!(f, "approved"),
            TaskStatus::Rejected => write!(f, "rejected"),
            TaskStatus::Transferred => write!(f, "transferred"),
            TaskStatus::Delegated => write!(f, "delegated"),
            TaskStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(TaskStatus::Pending),
            "approved" => Ok(TaskStatus::Approved),
            "rejected" => Ok(TaskStatus::Rejected),
            "transferred" => Ok(TaskStatus::Transferred),
            "delegated" => Ok(TaskStatus::Delegated),
            "cancelled" => Ok(TaskStatus::Cancelled),
            other => Err(format!("invalid task status: '{other}'")),
        }
    }
}

/// An approver's verdict. Deliberately a closed set; anything beyond
/// approve/reject (transfer, delegation, withdrawal) is its own operation,
/// not a decision value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject,
}

impl From<Decision> for TaskStatus {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Approve => TaskStatus::Approved,
            Decision::Reject => TaskStatus::Rejected,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Approve => write!(f, "approve"),
            Decision::Reject => write!(f, "reject"),
        }
    }
}

impl FromStr for Decision {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "approve" => Ok(Decision::Approve),
            "reject" => Ok(Decision::Reject),
            other => Err(format!("invalid decision: '{other}'")),
        }
    }
}

/// Outcome of one item in a batch approval call.
///
/// Batches have no spanning transaction: each item succeeds or fails on its
/// own, and the result slice preserves the input order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItemResult {
    pub task_id: TaskId,
    pub success: bool,
    /// Rendered engine error for failed items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchItemResult {
    pub fn ok(task_id: TaskId) -> Self {
        Self {
            task_id,
            success: true,
            error: None,
        }
    }

    pub fn failed(task_id: TaskId, error: impl fmt::Display) -> Self {
        Self {
            task_id,
            success: false,
            error: Some(error.to_string()),
        }
    }
}
