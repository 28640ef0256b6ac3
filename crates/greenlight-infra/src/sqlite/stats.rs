//! SQLite reporting repository implementation.
//!
//! Read-only rollups over live instance/task rows: conditional counts per
//! status, pending-task workload per assignee, and mean resolution time via
//! julianday deltas. Queries run on the reader pool and never write.

use greenlight_core::repository::stats::StatsRepository;
use greenlight_types::error::RepositoryError;
use greenlight_types::id::{TenantId, UserId};
use greenlight_types::stats::{AssigneeWorkload, InstanceStatsSummary};
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `StatsRepository`.
#[derive(Clone)]
pub struct SqliteStatsRepository {
    pool: DatabasePool,
}

impl SqliteStatsRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

impl StatsRepository for SqliteStatsRepository {
    async fn instance_summary(
        &self,
        tenant_id: &TenantId,
    ) -> Result<InstanceStatsSummary, RepositoryError> {
        let row = sqlx::query(
            r#"SELECT
                 COUNT(*) AS total,
                 COALESCE(SUM(CASE WHEN status = 'pending' THEN 1 ELSE 0 END), 0) AS pending,
                 COALESCE(SUM(CASE WHEN status = 'running' THEN 1 ELSE 0 END), 0) AS running,
                 COALESCE(SUM(CASE WHEN status = 'approved' THEN 1 ELSE 0 END), 0) AS approved,
                 COALESCE(SUM(CASE WHEN status = 'rejected' THEN 1 ELSE 0 END), 0) AS rejected,
                 COALESCE(SUM(CASE WHEN status = 'withdrawn' THEN 1 ELSE 0 END), 0) AS withdrawn,
                 COALESCE(SUM(CASE WHEN status = 'cancelled' THEN 1 ELSE 0 END), 0) AS cancelled,
                 AVG(CASE WHEN completed_at IS NOT NULL
                     THEN (julianday(completed_at) - julianday(started_at)) * 86400.0
                     END) AS avg_resolution_secs
               FROM process_instances
               WHERE tenant_id = ?"#,
        )
        .bind(tenant_id.to_string())
        .fetch_one(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let open_tasks: i64 = sqlx::query(
            "SELECT COUNT(*) AS n FROM approval_tasks WHERE tenant_id = ? AND status = 'pending'",
        )
        .bind(tenant_id.to_string())
        .fetch_one(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?
        .try_get("n")
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let get_i64 = |name: &str| -> Result<i64, RepositoryError> {
            row.try_get(name)
                .map_err(|e| RepositoryError::Query(e.to_string()))
        };

        Ok(InstanceStatsSummary {
            total: get_i64("total")?,
            pending: get_i64("pending")?,
            running: get_i64("running")?,
            approved: get_i64("approved")?,
            rejected: get_i64("rejected")?,
            withdrawn: get_i64("withdrawn")?,
            cancelled: get_i64("cancelled")?,
            open_tasks,
            avg_resolution_secs: row
                .try_get("avg_resolution_secs")
                .map_err(|e| RepositoryError::Query(e.to_string()))?,
        })
    }

    async fn assignee_workload(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Vec<AssigneeWorkload>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT assignee_id, COUNT(*) AS pending_tasks
               FROM approval_tasks
               WHERE tenant_id = ? AND status = 'pending'
               GROUP BY assignee_id
               ORDER BY pending_tasks DESC, assignee_id ASC"#,
        )
        .bind(tenant_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut workloads = Vec::with_capacity(rows.len());
        for row in &rows {
            let assignee: String = row
                .try_get("assignee_id")
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            let assignee_id = assignee
                .parse::<Uuid>()
                .map_err(|e| RepositoryError::Query(format!("invalid UUID: {e}")))?;
            let pending_tasks: i64 = row
                .try_get("pending_tasks")
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            workloads.push(AssigneeWorkload {
                assignee_id: UserId::from_uuid(assignee_id),
                pending_tasks,
            });
        }
        Ok(workloads)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::definition::SqliteDefinitionRepository;
    use crate::sqlite::instance::SqliteInstanceRepository;
    use crate::sqlite::task::SqliteTaskRepository;
    use greenlight_core::repository::definition::DefinitionRepository;
    use greenlight_core::repository::instance::InstanceRepository;
    use greenlight_core::repository::task::TaskRepository;
    use chrono::Utc;
    use greenlight_types::definition::{
        ApprovalMode, AssigneeRule, NodeDefinition, ProcessDefinition,
    };
    use greenlight_types::id::{DefinitionId, FormDataId, FormId, InstanceId, TaskId};
    use greenlight_types::instance::{InstanceStatus, ProcessInstance};
    use greenlight_types::task::{ApprovalTask, TaskStatus};

    async fn test_pool() -> DatabasePool {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        std::mem::forget(dir);
        DatabasePool::new(&url).await.unwrap()
    }

    async fn setup_definition(pool: &DatabasePool, tenant: TenantId) -> DefinitionId {
        let now = Utc::now();
        let def = ProcessDefinition {
            id: DefinitionId::new(),
            tenant_id: tenant,
            code: format!("proc-{}", Uuid::now_v7()),
            name: "Test Process".to_string(),
            form_id: FormId::new(),
            nodes: vec![NodeDefinition {
                id: "review".to_string(),
                name: "Review".to_string(),
                assignee: AssigneeRule::ApplicantManager,
                approval_mode: ApprovalMode::All,
                next: None,
            }],
            enabled: true,
            revision: 1,
            created_at: now,
            updated_at: now,
        };
        SqliteDefinitionRepository::new(pool.clone())
            .create(&def)
            .await
            .unwrap();
        def.id
    }

    async fn add_instance(
        pool: &DatabasePool,
        tenant: TenantId,
        def_id: DefinitionId,
        finish_as: Option<InstanceStatus>,
    ) -> InstanceId {
        let repo = SqliteInstanceRepository::new(pool.clone());
        let instance = ProcessInstance {
            id: InstanceId::new(),
            tenant_id: tenant,
            definition_id: def_id,
            applicant_id: UserId::new(),
            form_data_id: FormDataId::new(),
            status: InstanceStatus::Running,
            current_node_id: Some("review".to_string()),
            started_at: Utc::now(),
            completed_at: None,
        };
        repo.create(&instance).await.unwrap();
        if let Some(outcome) = finish_as {
            repo.finish(&instance.id, outcome).await.unwrap();
        }
        instance.id
    }

    fn pending_task(tenant: TenantId, instance_id: InstanceId, assignee: UserId) -> ApprovalTask {
        ApprovalTask {
            id: TaskId::new(),
            tenant_id: tenant,
            instance_id,
            node_id: "review".to_string(),
            assignee_id: assignee,
            status: TaskStatus::Pending,
            decision: None,
            comment: None,
            delegated_by: None,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }

    #[tokio::test]
    async fn test_summary_counts_by_status() {
        let pool = test_pool().await;
        let stats = SqliteStatsRepository::new(pool.clone());
        let tenant = TenantId::new();
        let def_id = setup_definition(&pool, tenant).await;

        add_instance(&pool, tenant, def_id, None).await;
        add_instance(&pool, tenant, def_id, Some(InstanceStatus::Approved)).await;
        add_instance(&pool, tenant, def_id, Some(InstanceStatus::Rejected)).await;

        let summary = stats.instance_summary(&tenant).await.unwrap();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.running, 1);
        assert_eq!(summary.approved, 1);
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.withdrawn, 0);
        // Two finished instances give a resolution average.
        assert!(summary.avg_resolution_secs.is_some());
    }

    #[tokio::test]
    async fn test_summary_empty_tenant() {
        let pool = test_pool().await;
        let stats = SqliteStatsRepository::new(pool);

        let summary = stats.instance_summary(&TenantId::new()).await.unwrap();
        assert_eq!(summary.total, 0);
        assert_eq!(summary.open_tasks, 0);
        assert!(summary.avg_resolution_secs.is_none());
    }

    #[tokio::test]
    async fn test_summary_counts_open_tasks() {
        let pool = test_pool().await;
        let stats = SqliteStatsRepository::new(pool.clone());
        let tasks = SqliteTaskRepository::new(pool.clone());
        let tenant = TenantId::new();
        let def_id = setup_definition(&pool, tenant).await;
        let instance_id = add_instance(&pool, tenant, def_id, None).await;

        tasks
            .create_many(&[
                pending_task(tenant, instance_id, UserId::new()),
                pending_task(tenant, instance_id, UserId::new()),
            ])
            .await
            .unwrap();

        let summary = stats.instance_summary(&tenant).await.unwrap();
        assert_eq!(summary.open_tasks, 2);
    }

    #[tokio::test]
    async fn test_workload_heaviest_first() {
        let pool = test_pool().await;
        let stats = SqliteStatsRepository::new(pool.clone());
        let tasks = SqliteTaskRepository::new(pool.clone());
        let tenant = TenantId::new();
        let def_id = setup_definition(&pool, tenant).await;

        let busy = UserId::new();
        let light = UserId::new();
        let a = add_instance(&pool, tenant, def_id, None).await;
        let b = add_instance(&pool, tenant, def_id, None).await;

        tasks
            .create_many(&[
                pending_task(tenant, a, busy),
                pending_task(tenant, b, busy),
                pending_task(tenant, a, light),
            ])
            .await
            .unwrap();

        let workload = stats.assignee_workload(&tenant).await.unwrap();
        assert_eq!(workload.len(), 2);
        assert_eq!(workload[0].assignee_id, busy);
        assert_eq!(workload[0].pending_tasks, 2);
        assert_eq!(workload[1].pending_tasks, 1);
    }
}
