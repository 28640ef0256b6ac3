//! Read-only statistics over instances and tasks.

use greenlight_types::error::EngineError;
use greenlight_types::id::TenantId;
use greenlight_types::stats::{AssigneeWorkload, InstanceStatsSummary};

use crate::repository::stats::StatsRepository;

/// Read-side rollups. Numbers reflect committed rows at query time and may
/// trail in-flight transitions; nothing here ever writes.
pub struct StatsService<S> {
    stats: S,
}

impl<S: StatsRepository> StatsService<S> {
    pub fn new(stats: S) -> Self {
        Self { stats }
    }

    /// Instance counts per status plus the open-task count and the average
    /// task resolution time.
    pub async fn summary(
        &self,
        tenant_id: &TenantId,
    ) -> Result<InstanceStatsSummary, EngineError> {
        Ok(self.stats.instance_summary(tenant_id).await?)
    }

    /// Pending tasks per assignee, heaviest first.
    pub async fn workload(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Vec<AssigneeWorkload>, EngineError> {
        Ok(self.stats.assignee_workload(tenant_id).await?)
    }
}
