//! Process instance domain types.
//!
//! A `ProcessInstance` is one live run of a `ProcessDefinition`: it tracks
//! which node the run currently sits at and how it eventually ended. The
//! engine is the only writer of instance rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

use crate::id::{DefinitionId, FormDataId, InstanceId, TenantId, UserId};

/// A single run of an approval process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessInstance {
    /// UUIDv7 instance ID.
    pub id: InstanceId,
    pub tenant_id: TenantId,
    /// Definition this instance was spawned from.
    pub definition_id: DefinitionId,
    /// User who started the process.
    pub applicant_id: UserId,
    /// Submitted form payload reference, owned by the external form service.
    pub form_data_id: FormDataId,
    /// Current lifecycle status.
    pub status: InstanceStatus,
    /// Node the instance currently waits at. Always `None` once terminal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_node_id: Option<String>,
    pub started_at: DateTime<Utc>,
    /// When the instance reached a terminal status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl ProcessInstance {
    /// Whether the instance has reached a final status.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Lifecycle states of a process instance.
///
/// `Approved`, `Rejected`, `Withdrawn` and `Cancelled` are terminal: the
/// instance never transitions again and holds no open tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    Pending,
    Running,
    Approved,
    Rejected,
    Withdrawn,
    Cancelled,
}

impl InstanceStatus {
    /// Whether this status is final.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            InstanceStatus::Approved
                | InstanceStatus::Rejected
                | InstanceStatus::Withdrawn
                | InstanceStatus::Cancelled
        )
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceStatus::Pending => write!(f, "pending"),
            InstanceStatus::Running => write!(f, "running"),
            InstanceStatus::Approved => write!(f, "approved"),
            InstanceStatus::Rejected => write!(f, "rejected"),
            InstanceStatus::Withdrawn => write!(f, "withdrawn"),
            InstanceStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl FromStr for InstanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(InstanceStatus::Pending),
            "running" => Ok(InstanceStatus::Running),
            "approved" => Ok(InstanceStatus::Approved),
            "rejected" => Ok(InstanceStatus::Rejected),
            "withdrawn" => Ok(InstanceStatus::Withdrawn),
            "cancelled" => Ok(InstanceStatus::Cancelled),
            other => Err(format!("invalid instance status: '{other}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_status_roundtrip() {
        for status in [
            InstanceStatus::Pending,
            InstanceStatus::Running,
            InstanceStatus::Approved,
            InstanceStatus::Rejected,
            InstanceStatus::Withdrawn,
            InstanceStatus::Cancelled,
        ] {
            let s = status.to_string();
            let parsed: InstanceStatus = s.parse().unwrap();
            assert_eq!(status, parsed);
        }
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!InstanceStatus::Pending.is_terminal());
        assert!(!InstanceStatus::Running.is_terminal());
        assert!(InstanceStatus::Approved.is_terminal());
        assert!(InstanceStatus::Rejected.is_terminal());
        assert!(InstanceStatus::Withdrawn.is_terminal());
        assert!(InstanceStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_instance_status_serde_lowercase() {
        let json = serde_json::to_string(&InstanceStatus::Withdrawn).unwrap();
        assert_eq!(json, "\"withdrawn\"");
    }
}
