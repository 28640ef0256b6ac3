//! Task dispatch: assignee resolution and reassignment.
//!
//! The dispatcher owns the two ways tasks come into existence: opening a
//! node's tasks from its assignee rule, and replacing a task through
//! transfer or delegation. It never touches instance rows; the engine
//! decides when a node opens.

use chrono::Utc;
use greenlight_types::definition::NodeDefinition;
use greenlight_types::error::{EngineError, RepositoryError};
use greenlight_types::id::{TaskId, UserId};
use greenlight_types::instance::ProcessInstance;
use greenlight_types::task::{ApprovalTask, TaskStatus};

use crate::directory::OrganizationDirectory;
use crate::repository::task::TaskRepository;

/// How a pending task changes hands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReassignKind {
    /// The work item moves entirely; the new assignee acts in their own
    /// name.
    Transfer,
    /// The new assignee decides on the delegator's behalf; the delegator
    /// stays the approver of record.
    Delegate,
}

impl ReassignKind {
    fn closing_status(self) -> TaskStatus {
        match self {
            ReassignKind::Transfer => TaskStatus::Transferred,
            ReassignKind::Delegate => TaskStatus::Delegated,
        }
    }
}

/// Routes approval tasks to concrete users.
#[derive(Debug, Clone)]
pub struct TaskDispatcher<T, O> {
    tasks: T,
    directory: O,
}

impl<T, O> TaskDispatcher<T, O>
where
    T: TaskRepository,
    O: OrganizationDirectory,
{
    pub fn new(tasks: T, directory: O) -> Self {
        Self { tasks, directory }
    }

    /// Resolve a node's assignee rule for an instance without creating
    /// anything. Duplicates collapse; an empty resolution is an error so a
    /// node can never open silently unstaffed.
    pub async fn resolve_assignees(
        &self,
        instance: &ProcessInstance,
        node: &NodeDefinition,
    ) -> Result<Vec<UserId>, EngineError> {
        let resolved = self
            .directory
            .resolve(&instance.tenant_id, &node.assignee, &instance.applicant_id)
            .await?;

        let mut assignees: Vec<UserId> = Vec::with_capacity(resolved.len());
        for user in resolved {
            if !assignees.contains(&user) {
                assignees.push(user);
            }
        }

        if assignees.is_empty() {
            return Err(EngineError::NoAssigneeResolved {
                node_id: node.id.clone(),
            });
        }
        Ok(assignees)
    }

    /// Open one pending task per assignee at a node. The caller resolves
    /// the assignees first (before any instance mutation) and passes them
    /// in.
    pub async fn open_tasks(
        &self,
        instance: &ProcessInstance,
        node: &NodeDefinition,
        assignees: &[UserId],
    ) -> Result<Vec<ApprovalTask>, EngineError> {
        let tasks: Vec<ApprovalTask> = assignees
            .iter()
            .map(|user| new_task(instance, &node.id, *user, None))
            .collect();

        self.tasks.create_many(&tasks).await?;
        tracing::debug!(
            instance_id = %instance.id,
            node_id = %node.id,
            count = tasks.len(),
            "opened approval tasks"
        );
        Ok(tasks)
    }

    /// Replace a pending task: close it as transferred or delegated and
    /// open a new pending task for `to` at the same node.
    ///
    /// Returns the closed task and its replacement. A second reassignment
    /// racing this one loses at the conditional close and reports
    /// `TaskAlreadyResolved`.
    pub async fn reassign(
        &self,
        task_id: &TaskId,
        from: &UserId,
        to: &UserId,
        comment: Option<&str>,
        kind: ReassignKind,
    ) -> Result<(ApprovalTask, ApprovalTask), EngineError> {
        let task = self
            .tasks
            .get(task_id)
            .await?
            .ok_or(EngineError::TaskNotFound)?;

        if task.assignee_id != *from {
            return Err(EngineError::TaskNotAssignedToUser);
        }
        if !task.is_open() {
            return Err(EngineError::TaskAlreadyResolved);
        }

        // The target must not already hold a pending task here; that also
        // rules out reassigning to oneself.
        let siblings = self
            .tasks
            .list_for_node(&task.instance_id, &task.node_id)
            .await?;
        if siblings.iter().any(|t| t.is_open() && t.assignee_id == *to) {
            return Err(EngineError::DuplicatePendingTask {
                node_id: task.node_id.clone(),
            });
        }

        let delegated_by = match kind {
            ReassignKind::Transfer => None,
            ReassignKind::Delegate => Some(*from),
        };

        // Insert the replacement before closing the original: a still-pending
        // replacement can be taken back after a lost close race, whereas a
        // closed original with no replacement would drop an approver seat.
        // The pending-task unique constraint backstops the sibling check
        // when two reassignments race toward the same target.
        let replacement = new_task_from(&task, *to, delegated_by);
        self.tasks
            .create_many(std::slice::from_ref(&replacement))
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(_) => EngineError::DuplicatePendingTask {
                    node_id: task.node_id.clone(),
                },
                other => EngineError::Storage(other),
            })?;

        let closed = self
            .tasks
            .close_if_pending(task_id, from, kind.closing_status(), None, comment)
            .await?;
        if !closed {
            // Someone resolved or reassigned the original in the meantime;
            // take the provisional replacement back.
            self.tasks
                .close_if_pending(&replacement.id, to, TaskStatus::Cancelled, None, None)
                .await?;
            return Err(EngineError::TaskAlreadyResolved);
        }

        tracing::info!(
            task_id = %task_id,
            new_task_id = %replacement.id,
            from = %from,
            to = %to,
            kind = ?kind,
            "task reassigned"
        );

        let closed_task = self
            .tasks
            .get(task_id)
            .await?
            .ok_or(EngineError::TaskNotFound)?;
        Ok((closed_task, replacement))
    }
}

fn new_task(
    instance: &ProcessInstance,
    node_id: &str,
    assignee: UserId,
    delegated_by: Option<UserId>,
) -> ApprovalTask {
    ApprovalTask {
        id: TaskId::new(),
        tenant_id: instance.tenant_id,
        instance_id: instance.id,
        node_id: node_id.to_string(),
        assignee_id: assignee,
        status: TaskStatus::Pending,
        decision: None,
        comment: None,
        delegated_by,
        created_at: Utc::now(),
        resolved_at: None,
    }
}

fn new_task_from(task: &ApprovalTask, assignee: UserId, delegated_by: Option<UserId>) -> ApprovalTask {
    ApprovalTask {
        id: TaskId::new(),
        tenant_id: task.tenant_id,
        instance_id: task.instance_id,
        node_id: task.node_id.clone(),
        assignee_id: assignee,
        status: TaskStatus::Pending,
        decision: None,
        comment: None,
        delegated_by,
        created_at: Utc::now(),
        resolved_at: None,
    }
}
