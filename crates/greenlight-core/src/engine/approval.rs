//! The approval engine: the single chokepoint for task and instance
//! mutation.
//!
//! Every verdict, reassignment, withdrawal and cancellation flows through
//! `ApprovalEngine`. Mutual exclusion is storage-level: each transition is
//! one conditional UPDATE whose row count says whether this call won, so
//! two operators racing on the same task (or two sibling verdicts racing to
//! advance the same instance) resolve without locks and without retries.
//!
//! # Verdict flow
//!
//! 1. Load the task, verify assignee and pending status.
//! 2. Close it through the conditional update; a lost race re-reads the row
//!    and reports the precise conflict.
//! 3. Append history (best-effort) and publish `TaskResolved`.
//! 4. Evaluate the node; route the instance. Only the winner of the
//!    node-pointer or status update opens next tasks / cancels leftovers,
//!    so downstream tasks are created exactly once.

use chrono::Utc;
use greenlight_types::error::EngineError;
use greenlight_types::event::ApprovalEvent;
use greenlight_types::history::{HistoryAction, HistoryEntry};
use greenlight_types::id::{DefinitionId, FormDataId, InstanceId, TaskId, TenantId, UserId};
use greenlight_types::instance::{InstanceStatus, ProcessInstance};
use greenlight_types::task::{ApprovalTask, BatchItemResult, Decision, TaskStatus};

use crate::directory::{FormRegistry, OrganizationDirectory};
use crate::engine::dispatch::{ReassignKind, TaskDispatcher};
use crate::engine::graph::{self, RouteStep};
use crate::engine::history::{self, HistoryRecorder};
use crate::event::bus::EventBus;
use crate::repository::definition::DefinitionRepository;
use crate::repository::history::HistoryRepository;
use crate::repository::instance::InstanceRepository;
use crate::repository::task::TaskRepository;

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// A freshly started instance together with its entry-node tasks.
#[derive(Debug, Clone)]
pub struct StartedProcess {
    pub instance: ProcessInstance,
    pub tasks: Vec<ApprovalTask>,
}

/// A resolved task and the instance as it stands after routing.
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    pub task: ApprovalTask,
    pub instance: ProcessInstance,
}

// ---------------------------------------------------------------------------
// ApprovalEngine
// ---------------------------------------------------------------------------

/// Coordinates definitions, instances, tasks, history and events.
///
/// Generic over the repository and port traits so greenlight-core never
/// depends on a concrete storage backend.
pub struct ApprovalEngine<D, I, T, H, O, F> {
    definitions: D,
    instances: I,
    tasks: T,
    dispatcher: TaskDispatcher<T, O>,
    forms: F,
    history: HistoryRecorder<H>,
    bus: EventBus,
}

impl<D, I, T, H, O, F> ApprovalEngine<D, I, T, H, O, F>
where
    D: DefinitionRepository,
    I: InstanceRepository,
    T: TaskRepository + Clone,
    H: HistoryRepository,
    O: OrganizationDirectory,
    F: FormRegistry,
{
    pub fn new(
        definitions: D,
        instances: I,
        tasks: T,
        history: H,
        directory: O,
        forms: F,
        bus: EventBus,
    ) -> Self {
        Self {
            definitions,
            instances,
            dispatcher: TaskDispatcher::new(tasks.clone(), directory),
            tasks,
            forms,
            history: HistoryRecorder::new(history),
            bus,
        }
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Start an instance of a definition for an applicant.
    ///
    /// The definition must be enabled and the submitted form data must be
    /// known to the form registry. The entry node's assignees are resolved
    /// before anything is written, so an unstaffed entry node fails the
    /// start instead of stranding a running instance.
    pub async fn start_process(
        &self,
        definition_id: &DefinitionId,
        applicant_id: &UserId,
        form_data_id: &FormDataId,
    ) -> Result<StartedProcess, EngineError> {
        let def = self
            .definitions
            .get(definition_id)
            .await?
            .ok_or(EngineError::DefinitionNotFound)?;
        if !def.enabled {
            return Err(EngineError::DefinitionDisabled);
        }

        let known = self
            .forms
            .form_data_exists(&def.tenant_id, &def.form_id, form_data_id)
            .await?;
        if !known {
            return Err(EngineError::FormDataNotFound);
        }

        let entry = graph::entry_node(&def.nodes).ok_or_else(|| {
            EngineError::InvalidDefinition("definition has no nodes".to_string())
        })?;

        let instance = ProcessInstance {
            id: InstanceId::new(),
            tenant_id: def.tenant_id,
            definition_id: def.id,
            applicant_id: *applicant_id,
            form_data_id: *form_data_id,
            status: InstanceStatus::Running,
            current_node_id: Some(entry.id.clone()),
            started_at: Utc::now(),
            completed_at: None,
        };

        let assignees = self.dispatcher.resolve_assignees(&instance, entry).await?;

        self.instances.create(&instance).await?;
        let tasks = self
            .dispatcher
            .open_tasks(&instance, entry, &assignees)
            .await?;

        self.history
            .record(history::entry(
                instance.id,
                None,
                *applicant_id,
                HistoryAction::Started,
                None,
                None,
            ))
            .await;

        self.bus.publish(ApprovalEvent::InstanceStarted {
            instance_id: instance.id,
            definition_id: def.id,
            applicant_id: *applicant_id,
        });
        self.publish_assigned(&tasks);

        tracing::info!(
            instance_id = %instance.id,
            definition = def.code.as_str(),
            node_id = entry.id.as_str(),
            tasks = tasks.len(),
            "process instance started"
        );

        Ok(StartedProcess { instance, tasks })
    }

    /// Withdraw a running instance. Only the applicant may withdraw.
    pub async fn withdraw_process(
        &self,
        instance_id: &InstanceId,
        operator: &UserId,
        comment: Option<String>,
    ) -> Result<ProcessInstance, EngineError> {
        let instance = self
            .instances
            .get(instance_id)
            .await?
            .ok_or(EngineError::InstanceNotFound)?;
        if instance.status.is_terminal() {
            return Err(EngineError::AlreadyTerminated);
        }
        if instance.applicant_id != *operator {
            return Err(EngineError::NotApplicant);
        }
        if instance.status != InstanceStatus::Running {
            return Err(EngineError::InvalidInstanceState(instance.status));
        }

        self.terminate(
            &instance,
            InstanceStatus::Withdrawn,
            *operator,
            HistoryAction::Withdrawn,
            comment,
        )
        .await
    }

    /// Cancel a running instance on behalf of an administrator. The reason
    /// lands in the history comment.
    pub async fn cancel_process(
        &self,
        instance_id: &InstanceId,
        operator: &UserId,
        reason: Option<String>,
    ) -> Result<ProcessInstance, EngineError> {
        let instance = self
            .instances
            .get(instance_id)
            .await?
            .ok_or(EngineError::InstanceNotFound)?;
        if instance.status.is_terminal() {
            return Err(EngineError::AlreadyTerminated);
        }
        if instance.status != InstanceStatus::Running {
            return Err(EngineError::InvalidInstanceState(instance.status));
        }

        self.terminate(
            &instance,
            InstanceStatus::Cancelled,
            *operator,
            HistoryAction::Cancelled,
            reason,
        )
        .await
    }

    // -----------------------------------------------------------------------
    // Verdicts
    // -----------------------------------------------------------------------

    /// Record an assignee's verdict on their pending task, then evaluate
    /// the node and route the instance.
    pub async fn process_task(
        &self,
        task_id: &TaskId,
        operator: &UserId,
        decision: Decision,
        comment: Option<String>,
    ) -> Result<TaskOutcome, EngineError> {
        let task = self
            .tasks
            .get(task_id)
            .await?
            .ok_or(EngineError::TaskNotFound)?;
        if task.assignee_id != *operator {
            return Err(EngineError::TaskNotAssignedToUser);
        }
        if !task.is_open() {
            return Err(EngineError::TaskAlreadyResolved);
        }

        let closed = self
            .tasks
            .close_if_pending(
                task_id,
                operator,
                TaskStatus::from(decision),
                Some(decision),
                comment.as_deref(),
            )
            .await?;
        if !closed {
            // Lost the race between the read and the update. Re-read for
            // the precise conflict.
            let now = self
                .tasks
                .get(task_id)
                .await?
                .ok_or(EngineError::TaskNotFound)?;
            if now.assignee_id != *operator {
                return Err(EngineError::TaskNotAssignedToUser);
            }
            return Err(EngineError::TaskAlreadyResolved);
        }

        let task = self
            .tasks
            .get(task_id)
            .await?
            .ok_or(EngineError::TaskNotFound)?;

        let action = match decision {
            Decision::Approve => HistoryAction::Approved,
            Decision::Reject => HistoryAction::Rejected,
        };
        self.history
            .record(history::entry(
                task.instance_id,
                Some(task.id),
                *operator,
                action,
                comment,
                None,
            ))
            .await;

        self.bus.publish(ApprovalEvent::TaskResolved {
            task_id: task.id,
            instance_id: task.instance_id,
            node_id: task.node_id.clone(),
            actor_id: *operator,
            decision,
        });

        tracing::info!(
            task_id = %task.id,
            instance_id = %task.instance_id,
            node_id = task.node_id.as_str(),
            decision = %decision,
            "task resolved"
        );

        let instance = self.advance_after_close(&task).await?;
        Ok(TaskOutcome { task, instance })
    }

    /// Apply one verdict to many tasks, isolating failures per item.
    ///
    /// No spanning transaction: each task is its own critical section, a
    /// failed item never rolls back or aborts the others, and the result
    /// order matches the input order. An empty input yields an empty
    /// result.
    pub async fn batch_process_tasks(
        &self,
        task_ids: &[TaskId],
        operator: &UserId,
        decision: Decision,
        comment: Option<String>,
    ) -> Vec<BatchItemResult> {
        let mut results = Vec::with_capacity(task_ids.len());
        for task_id in task_ids {
            match self
                .process_task(task_id, operator, decision, comment.clone())
                .await
            {
                Ok(_) => results.push(BatchItemResult::ok(*task_id)),
                Err(err) => {
                    tracing::debug!(task_id = %task_id, error = %err, "batch item failed");
                    results.push(BatchItemResult::failed(*task_id, err));
                }
            }
        }
        results
    }

    // -----------------------------------------------------------------------
    // Reassignment
    // -----------------------------------------------------------------------

    /// Hand a pending task to another user. The new assignee acts in their
    /// own name.
    pub async fn transfer_task(
        &self,
        task_id: &TaskId,
        from: &UserId,
        to: &UserId,
        comment: Option<String>,
    ) -> Result<(ApprovalTask, ApprovalTask), EngineError> {
        self.reassign_task(task_id, from, to, comment, ReassignKind::Transfer)
            .await
    }

    /// Let another user decide on the assignee's behalf. The delegator
    /// stays the approver of record on the replacement task.
    pub async fn delegate_task(
        &self,
        task_id: &TaskId,
        from: &UserId,
        to: &UserId,
        comment: Option<String>,
    ) -> Result<(ApprovalTask, ApprovalTask), EngineError> {
        self.reassign_task(task_id, from, to, comment, ReassignKind::Delegate)
            .await
    }

    async fn reassign_task(
        &self,
        task_id: &TaskId,
        from: &UserId,
        to: &UserId,
        comment: Option<String>,
        kind: ReassignKind,
    ) -> Result<(ApprovalTask, ApprovalTask), EngineError> {
        let (closed, replacement) = self
            .dispatcher
            .reassign(task_id, from, to, comment.as_deref(), kind)
            .await?;

        let action = match kind {
            ReassignKind::Transfer => HistoryAction::Transferred,
            ReassignKind::Delegate => HistoryAction::Delegated,
        };
        let details = serde_json::json!({
            "to": to.to_string(),
            "new_task_id": replacement.id.to_string(),
        });
        self.history
            .record(history::entry(
                closed.instance_id,
                Some(closed.id),
                *from,
                action,
                comment,
                Some(details),
            ))
            .await;

        self.bus.publish(ApprovalEvent::TaskReassigned {
            old_task_id: closed.id,
            new_task_id: replacement.id,
            instance_id: closed.instance_id,
            node_id: closed.node_id.clone(),
            from_user: *from,
            to_user: *to,
            delegation: kind == ReassignKind::Delegate,
        });
        self.publish_assigned(std::slice::from_ref(&replacement));

        Ok((closed, replacement))
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub async fn get_process_instance(
        &self,
        instance_id: &InstanceId,
    ) -> Result<ProcessInstance, EngineError> {
        self.instances
            .get(instance_id)
            .await?
            .ok_or(EngineError::InstanceNotFound)
    }

    /// The caller's pending tasks within a tenant.
    pub async fn list_my_tasks(
        &self,
        tenant_id: &TenantId,
        user_id: &UserId,
    ) -> Result<Vec<ApprovalTask>, EngineError> {
        Ok(self
            .tasks
            .list_pending_for_assignee(tenant_id, user_id)
            .await?)
    }

    /// Every pending task in a tenant (admin view).
    pub async fn list_pending_tasks(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Vec<ApprovalTask>, EngineError> {
        Ok(self.tasks.list_pending_for_tenant(tenant_id).await?)
    }

    /// Every task an instance ever produced, across all nodes and states.
    pub async fn list_instance_tasks(
        &self,
        instance_id: &InstanceId,
    ) -> Result<Vec<ApprovalTask>, EngineError> {
        Ok(self.tasks.list_for_instance(instance_id).await?)
    }

    /// An instance's audit trail in occurrence order.
    pub async fn get_process_history(
        &self,
        instance_id: &InstanceId,
    ) -> Result<Vec<HistoryEntry>, EngineError> {
        self.instances
            .get(instance_id)
            .await?
            .ok_or(EngineError::InstanceNotFound)?;
        Ok(self.history.repo().list_for_instance(instance_id).await?)
    }

    /// A tenant's instances, newest first, optionally filtered by status.
    pub async fn list_instances(
        &self,
        tenant_id: &TenantId,
        status: Option<InstanceStatus>,
    ) -> Result<Vec<ProcessInstance>, EngineError> {
        Ok(self.instances.list_for_tenant(tenant_id, status).await?)
    }

    /// The instances one applicant has started, newest first.
    pub async fn list_my_instances(
        &self,
        tenant_id: &TenantId,
        applicant_id: &UserId,
    ) -> Result<Vec<ProcessInstance>, EngineError> {
        Ok(self
            .instances
            .list_for_applicant(tenant_id, applicant_id)
            .await?)
    }

    // -----------------------------------------------------------------------
    // Routing internals
    // -----------------------------------------------------------------------

    /// Evaluate a closed task's node and move the instance if the node
    /// reached a verdict.
    ///
    /// Safe under concurrent sibling closes: the node-pointer and status
    /// conditional updates elect one winner, and only the winner opens the
    /// next node's tasks or cancels leftovers. Losers observe the no-op and
    /// return the refreshed instance.
    async fn advance_after_close(
        &self,
        task: &ApprovalTask,
    ) -> Result<ProcessInstance, EngineError> {
        let instance = self
            .instances
            .get(&task.instance_id)
            .await?
            .ok_or(EngineError::InstanceNotFound)?;

        // A sibling may already have terminated the instance or moved it
        // past this node; nothing left to do then.
        if instance.status != InstanceStatus::Running
            || instance.current_node_id.as_deref() != Some(task.node_id.as_str())
        {
            return Ok(instance);
        }

        let def = self
            .definitions
            .get(&instance.definition_id)
            .await?
            .ok_or(EngineError::DefinitionNotFound)?;
        let node = graph::find_node(&def.nodes, &task.node_id).ok_or_else(|| {
            EngineError::InvalidDefinition(format!(
                "instance points at unknown node '{}'",
                task.node_id
            ))
        })?;

        let node_tasks = self.tasks.list_for_node(&instance.id, &task.node_id).await?;
        let decision = graph::evaluate_node(node.approval_mode, &node_tasks);

        let step = graph::route_after(&def.nodes, &task.node_id, decision)
            .map_err(|e| EngineError::InvalidDefinition(e.to_string()))?;

        match step {
            None => Ok(instance),
            Some(RouteStep::Next(next_node)) => {
                // Resolve before moving the pointer: a failed resolution
                // must leave the instance at the current node.
                let assignees = self
                    .dispatcher
                    .resolve_assignees(&instance, next_node)
                    .await?;

                let moved = self
                    .instances
                    .advance_node(&instance.id, &task.node_id, &next_node.id)
                    .await?;
                if moved {
                    self.tasks
                        .cancel_pending_for_node(&instance.id, &task.node_id)
                        .await?;
                    let tasks = self
                        .dispatcher
                        .open_tasks(&instance, next_node, &assignees)
                        .await?;
                    self.publish_assigned(&tasks);

                    tracing::info!(
                        instance_id = %instance.id,
                        from = task.node_id.as_str(),
                        to = next_node.id.as_str(),
                        "instance advanced"
                    );
                }

                self.instances
                    .get(&instance.id)
                    .await?
                    .ok_or(EngineError::InstanceNotFound)
            }
            Some(RouteStep::Finish(outcome)) => {
                let sealed = self.instances.finish(&instance.id, outcome).await?;
                if sealed {
                    self.tasks.cancel_pending_for_instance(&instance.id).await?;
                    self.bus.publish(ApprovalEvent::InstanceCompleted {
                        instance_id: instance.id,
                        outcome,
                    });

                    tracing::info!(
                        instance_id = %instance.id,
                        outcome = %outcome,
                        "instance completed"
                    );
                }

                self.instances
                    .get(&instance.id)
                    .await?
                    .ok_or(EngineError::InstanceNotFound)
            }
        }
    }

    /// Seal a running instance with a terminal outcome and clean up its
    /// open tasks. The conditional update decides the winner when two
    /// terminations race.
    async fn terminate(
        &self,
        instance: &ProcessInstance,
        outcome: InstanceStatus,
        actor: UserId,
        action: HistoryAction,
        comment: Option<String>,
    ) -> Result<ProcessInstance, EngineError> {
        let sealed = self.instances.finish(&instance.id, outcome).await?;
        if !sealed {
            return Err(EngineError::AlreadyTerminated);
        }

        let cancelled = self
            .tasks
            .cancel_pending_for_instance(&instance.id)
            .await?;

        self.history
            .record(history::entry(
                instance.id, None, actor, action, comment, None,
            ))
            .await;

        self.bus.publish(ApprovalEvent::InstanceCompleted {
            instance_id: instance.id,
            outcome,
        });

        tracing::info!(
            instance_id = %instance.id,
            outcome = %outcome,
            cancelled_tasks = cancelled,
            "instance terminated"
        );

        self.instances
            .get(&instance.id)
            .await?
            .ok_or(EngineError::InstanceNotFound)
    }

    fn publish_assigned(&self, tasks: &[ApprovalTask]) {
        for task in tasks {
            self.bus.publish(ApprovalEvent::TaskAssigned {
                task_id: task.id,
                instance_id: task.instance_id,
                node_id: task.node_id.clone(),
                assignee_id: task.assignee_id,
            });
        }
    }
}
