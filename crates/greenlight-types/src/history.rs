//! Approval history domain types.
//!
//! The history log is append-only: one entry per business transition, never
//! rewritten. It answers "who did what, when" for a whole instance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

use crate::id::{InstanceId, TaskId, UserId};

/// One recorded transition of an instance or task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// UUIDv7 entry ID (time-sortable, doubles as insertion order).
    pub id: uuid::Uuid,
    pub instance_id: InstanceId,
    /// Task the action was taken on. `None` for instance-level actions
    /// (start, withdraw, cancel).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    /// User who performed the action.
    pub actor_id: UserId,
    pub action: HistoryAction,
    /// Free-form note supplied by the actor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Structured context about the action (e.g. reassignment target).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
    pub occurred_at: DateTime<Utc>,
}

/// Actions tracked in the approval history log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryAction {
    Started,
    Approved,
    Rejected,
    Transferred,
    Delegated,
    Withdrawn,
    Cancelled,
}

impl fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HistoryAction::Started => write!(f, "started"),
            HistoryAction::Approved => write!(f, "approved"),
            HistoryAction::Rejected => write!(f, "rejected"),
            HistoryAction::Transferred => write!(f, "transferred"),
            HistoryAction::Delegated => write!(f, "delegated"),
            HistoryAction::Withdrawn => write!(f, "withdrawn"),
            HistoryAction::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for HistoryAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "started" => Ok(HistoryAction::Started),
            "approved" => Ok(HistoryAction::Approved),
            "rejected" => Ok(HistoryAction::Rejected),
            "transferred" => Ok(HistoryAction::Transferred),
            "delegated" => Ok(HistoryAction::Delegated),
            "withdrawn" => Ok(HistoryAction::Withdrawn),
            "cancelled" => Ok(HistoryAction::Cancelled),
            other => Err(format!("invalid history action: '{other}'")),
        }
    }
}
