//! Event types for the Greenlight notification bus.
//!
//! `ApprovalEvent` is the unified event type broadcast on every business
//! transition. Delivery is fire-and-forget: consumers (notification
//! adapters, UIs, loggers) subscribe to a broadcast channel and the engine
//! never waits for them. All variants are Clone + Send + Sync.

use serde::{Deserialize, Serialize};

use crate::id::{DefinitionId, InstanceId, TaskId, UserId};
use crate::instance::InstanceStatus;
use crate::task::Decision;

/// Events emitted by the approval engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ApprovalEvent {
    /// A new process instance has been started.
    InstanceStarted {
        instance_id: InstanceId,
        definition_id: DefinitionId,
        applicant_id: UserId,
    },

    /// A pending task has been routed to an assignee.
    TaskAssigned {
        task_id: TaskId,
        instance_id: InstanceId,
        node_id: String,
        assignee_id: UserId,
    },

    /// An assignee recorded a verdict on their task.
    TaskResolved {
        task_id: TaskId,
        instance_id: InstanceId,
        node_id: String,
        actor_id: UserId,
        decision: Decision,
    },

    /// A task changed hands via transfer or delegation.
    TaskReassigned {
        old_task_id: TaskId,
        new_task_id: TaskId,
        instance_id: InstanceId,
        node_id: String,
        from_user: UserId,
        to_user: UserId,
        /// True for delegation (the delegator stays approver of record).
        delegation: bool,
    },

    /// A process instance reached a terminal status.
    InstanceCompleted {
        instance_id: InstanceId,
        outcome: InstanceStatus,
    },
}

impl ApprovalEvent {
    /// The instance this event concerns.
    pub fn instance_id(&self) -> InstanceId {
        match self {
            ApprovalEvent::InstanceStarted { instance_id, .. }
            | ApprovalEvent::TaskAssigned { instance_id, .. }
            | ApprovalEvent::TaskResolved { instance_id, .. }
            | ApprovalEvent::TaskReassigned { instance_id, .. }
            | ApprovalEvent::InstanceCompleted { instance_id, .. } => *instance_id,
        }
    }
}
