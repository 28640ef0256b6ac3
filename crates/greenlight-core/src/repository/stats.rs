//! Reporting repository trait definition.

use greenlight_types::error::RepositoryError;
use greenlight_types::id::TenantId;
use greenlight_types::stats::{AssigneeWorkload, InstanceStatsSummary};

/// Read-only repository trait for reporting rollups.
///
/// Implementations aggregate live rows on demand; results are
/// snapshot-consistent, nothing more.
pub trait StatsRepository: Send + Sync {
    /// Instance counts by status, open task count and mean resolution time
    /// for one tenant.
    fn instance_summary(
        &self,
        tenant_id: &TenantId,
    ) -> impl std::future::Future<Output = Result<InstanceStatsSummary, RepositoryError>> + Send;

    /// Pending-task counts per assignee for one tenant, heaviest first.
    fn assignee_workload(
        &self,
        tenant_id: &TenantId,
    ) -> impl std::future::Future<Output = Result<Vec<AssigneeWorkload>, RepositoryError>> + Send;
}
