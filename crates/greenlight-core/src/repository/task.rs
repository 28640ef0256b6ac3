//! Approval task repository trait definition.

use greenlight_types::error::RepositoryError;
use greenlight_types::id::{InstanceId, TaskId, TenantId, UserId};
use greenlight_types::task::{ApprovalTask, Decision, TaskStatus};

/// Repository trait for approval task persistence.
///
/// `close_if_pending` is the single write path out of `pending`: it closes
/// the row, records the verdict and stamps `resolved_at` in one conditional
/// update. Racing callers are serialized by the row's status check, not by
/// any in-process lock.
pub trait TaskRepository: Send + Sync {
    /// Insert a batch of freshly opened tasks.
    fn create_many(
        &self,
        tasks: &[ApprovalTask],
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Get a task by its UUID.
    fn get(
        &self,
        id: &TaskId,
    ) -> impl std::future::Future<Output = Result<Option<ApprovalTask>, RepositoryError>> + Send;

    /// Close the task if it is still `pending` and assigned to `assignee`.
    /// `status` is the closing status (approved, rejected, transferred or
    /// delegated); `resolved_at` is stamped by the store. Returns `true`
    /// when this call closed the task, `false` when someone else already
    /// did or the assignee no longer matches.
    fn close_if_pending(
        &self,
        id: &TaskId,
        assignee: &UserId,
        status: TaskStatus,
        decision: Option<Decision>,
        comment: Option<&str>,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Cancel every pending task of an instance. Returns how many closed.
    fn cancel_pending_for_instance(
        &self,
        instance_id: &InstanceId,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// Cancel the pending sibling tasks at one node of an instance.
    /// Returns how many closed.
    fn cancel_pending_for_node(
        &self,
        instance_id: &InstanceId,
        node_id: &str,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;

    /// List every task opened at one node of an instance, oldest first.
    fn list_for_node(
        &self,
        instance_id: &InstanceId,
        node_id: &str,
    ) -> impl std::future::Future<Output = Result<Vec<ApprovalTask>, RepositoryError>> + Send;

    /// List every task of an instance, oldest first.
    fn list_for_instance(
        &self,
        instance_id: &InstanceId,
    ) -> impl std::future::Future<Output = Result<Vec<ApprovalTask>, RepositoryError>> + Send;

    /// List one user's pending tasks within a tenant, oldest first.
    fn list_pending_for_assignee(
        &self,
        tenant_id: &TenantId,
        assignee_id: &UserId,
    ) -> impl std::future::Future<Output = Result<Vec<ApprovalTask>, RepositoryError>> + Send;

    /// List every pending task in a tenant, oldest first (admin view).
    fn list_pending_for_tenant(
        &self,
        tenant_id: &TenantId,
    ) -> impl std::future::Future<Output = Result<Vec<ApprovalTask>, RepositoryError>> + Send;
}
