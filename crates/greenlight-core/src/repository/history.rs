//! Approval history repository trait definition.
//!
//! The history log is append-only; there is deliberately no update or
//! delete surface.

use greenlight_types::error::RepositoryError;
use greenlight_types::history::HistoryEntry;
use greenlight_types::id::InstanceId;

/// Repository trait for the append-only approval history log.
pub trait HistoryRepository: Send + Sync {
    /// Append one entry.
    fn append(
        &self,
        entry: &HistoryEntry,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// List an instance's entries in the order they occurred.
    fn list_for_instance(
        &self,
        instance_id: &InstanceId,
    ) -> impl std::future::Future<Output = Result<Vec<HistoryEntry>, RepositoryError>> + Send;
}
