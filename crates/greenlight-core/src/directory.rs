//! Collaborator ports for assignee resolution and form references.
//!
//! Defined in greenlight-core so the engine can resolve approvers and check
//! form payloads without depending on any specific backing service. The
//! in-process `MemoryDirectory` and `MemoryFormRegistry` adapters live in
//! greenlight-infra; deployments back these with their HR directory and
//! form service.

use greenlight_types::definition::AssigneeRule;
use greenlight_types::error::DirectoryError;
use greenlight_types::id::{FormDataId, FormId, TenantId, UserId};

/// Abstraction over the organization directory.
///
/// The engine only ever asks one question: given a node's assignee rule and
/// the instance's applicant, which concrete users should receive a task?
pub trait OrganizationDirectory: Send + Sync {
    /// Resolve an assignee rule into concrete user IDs.
    ///
    /// An empty result is a legal answer (e.g. a role with no members) and
    /// the engine turns it into a validation error; only lookup failures
    /// should surface as `DirectoryError`.
    fn resolve(
        &self,
        tenant_id: &TenantId,
        rule: &AssigneeRule,
        applicant_id: &UserId,
    ) -> impl std::future::Future<Output = Result<Vec<UserId>, DirectoryError>> + Send;
}

/// Abstraction over the external form service.
///
/// The engine stores form data IDs as opaque references and never reads
/// payloads; this trait only validates that a reference exists before a
/// process starts.
pub trait FormRegistry: Send + Sync {
    /// Whether the given form data reference exists for this form.
    fn form_data_exists(
        &self,
        tenant_id: &TenantId,
        form_id: &FormId,
        form_data_id: &FormDataId,
    ) -> impl std::future::Future<Output = Result<bool, DirectoryError>> + Send;
}
