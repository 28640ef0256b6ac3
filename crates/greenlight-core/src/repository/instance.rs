//! Process instance repository trait definition.
//!
//! Instance rows move through two conditional updates only: `advance_node`
//! walks the node pointer and `finish` seals a terminal status. Both report
//! via their boolean result whether this call won the transition, which is
//! how concurrent duplicate evaluations of the same node stay idempotent.

use greenlight_types::error::RepositoryError;
use greenlight_types::id::{DefinitionId, InstanceId, TenantId, UserId};
use greenlight_types::instance::{InstanceStatus, ProcessInstance};

/// Repository trait for process instance persistence.
pub trait InstanceRepository: Send + Sync {
    /// Insert a freshly started instance.
    fn create(
        &self,
        instance: &ProcessInstance,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Get an instance by its UUID.
    fn get(
        &self,
        id: &InstanceId,
    ) -> impl std::future::Future<Output = Result<Option<ProcessInstance>, RepositoryError>> + Send;

    /// Conditionally move the node pointer from `from_node` to `to_node`.
    /// The update only applies while the instance is `running` and still
    /// sits at `from_node`; returns `true` when this call moved it.
    fn advance_node(
        &self,
        id: &InstanceId,
        from_node: &str,
        to_node: &str,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Conditionally seal a `running` instance with a terminal `outcome`,
    /// clearing the node pointer and stamping `completed_at`. Returns
    /// `true` when this call performed the transition.
    fn finish(
        &self,
        id: &InstanceId,
        outcome: InstanceStatus,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Count an instance's definition siblings that are not yet terminal.
    /// Guards definition graph edits.
    fn count_active_for_definition(
        &self,
        definition_id: &DefinitionId,
    ) -> impl std::future::Future<Output = Result<i64, RepositoryError>> + Send;

    /// List a tenant's instances, newest first, optionally filtered by
    /// status.
    fn list_for_tenant(
        &self,
        tenant_id: &TenantId,
        status: Option<InstanceStatus>,
    ) -> impl std::future::Future<Output = Result<Vec<ProcessInstance>, RepositoryError>> + Send;

    /// List the instances one applicant has started, newest first.
    fn list_for_applicant(
        &self,
        tenant_id: &TenantId,
        applicant_id: &UserId,
    ) -> impl std::future::Future<Output = Result<Vec<ProcessInstance>, RepositoryError>> + Send;
}
