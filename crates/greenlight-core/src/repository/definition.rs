//! Process definition repository trait definition.

use greenlight_types::definition::ProcessDefinition;
use greenlight_types::error::RepositoryError;
use greenlight_types::id::{DefinitionId, TenantId};

/// Repository trait for process definition persistence.
///
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait DefinitionRepository: Send + Sync {
    /// Insert a new definition. Fails with `Conflict` when the tenant
    /// already has a definition with the same code.
    fn create(
        &self,
        def: &ProcessDefinition,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Persist an updated definition (name, nodes, form, revision).
    /// Fails with `NotFound` when the definition does not exist.
    fn update(
        &self,
        def: &ProcessDefinition,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Get a definition by its UUID.
    fn get(
        &self,
        id: &DefinitionId,
    ) -> impl std::future::Future<Output = Result<Option<ProcessDefinition>, RepositoryError>> + Send;

    /// Get a definition by its tenant-unique code.
    fn get_by_code(
        &self,
        tenant_id: &TenantId,
        code: &str,
    ) -> impl std::future::Future<Output = Result<Option<ProcessDefinition>, RepositoryError>> + Send;

    /// List a tenant's definitions, ordered by code.
    fn list(
        &self,
        tenant_id: &TenantId,
    ) -> impl std::future::Future<Output = Result<Vec<ProcessDefinition>, RepositoryError>> + Send;

    /// Flip the enabled flag. Fails with `NotFound` when the definition
    /// does not exist.
    fn set_enabled(
        &self,
        id: &DefinitionId,
        enabled: bool,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
