//! SQLite process instance repository implementation.
//!
//! Implements `InstanceRepository` from `greenlight-core`. The two mutation
//! paths (`advance_node`, `finish`) are conditional UPDATEs whose
//! `rows_affected` result elects the winner when concurrent evaluations of
//! the same node race.

use greenlight_core::repository::instance::InstanceRepository;
use greenlight_types::error::RepositoryError;
use greenlight_types::id::{DefinitionId, FormDataId, InstanceId, TenantId, UserId};
use greenlight_types::instance::{InstanceStatus, ProcessInstance};
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `InstanceRepository`.
#[derive(Clone)]
pub struct SqliteInstanceRepository {
    pool: DatabasePool,
}

impl SqliteInstanceRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Internal row type
// ---------------------------------------------------------------------------

struct InstanceRow {
    id: String,
    tenant_id: String,
    definition_id: String,
    applicant_id: String,
    form_data_id: String,
    status: String,
    current_node_id: Option<String>,
    started_at: String,
    completed_at: Option<String>,
}

impl InstanceRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            tenant_id: row.try_get("tenant_id")?,
            definition_id: row.try_get("definition_id")?,
            applicant_id: row.try_get("applicant_id")?,
            form_data_id: row.try_get("form_data_id")?,
            status: row.try_get("status")?,
            current_node_id: row.try_get("current_node_id")?,
            started_at: row.try_get("started_at")?,
            completed_at: row.try_get("completed_at")?,
        })
    }

    fn into_instance(self) -> Result<ProcessInstance, RepositoryError> {
        let status: InstanceStatus = self
            .status
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;

        let completed_at = self
            .completed_at
            .as_deref()
            .map(parse_datetime)
            .transpose()?;

        Ok(ProcessInstance {
            id: InstanceId::from_uuid(parse_uuid(&self.id)?),
            tenant_id: TenantId::from_uuid(parse_uuid(&self.tenant_id)?),
            definition_id: DefinitionId::from_uuid(parse_uuid(&self.definition_id)?),
            applicant_id: UserId::from_uuid(parse_uuid(&self.applicant_id)?),
            form_data_id: FormDataId::from_uuid(parse_uuid(&self.form_data_id)?),
            status,
            current_node_id: self.current_node_id,
            started_at: parse_datetime(&self.started_at)?,
            completed_at,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_uuid(s: &str) -> Result<Uuid, RepositoryError> {
    s.parse::<Uuid>()
        .map_err(|e| RepositoryError::Query(format!("invalid UUID: {e}")))
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn rows_to_instances(
    rows: &[sqlx::sqlite::SqliteRow],
) -> Result<Vec<ProcessInstance>, RepositoryError> {
    let mut instances = Vec::with_capacity(rows.len());
    for row in rows {
        let r = InstanceRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
        instances.push(r.into_instance()?);
    }
    Ok(instances)
}

// ---------------------------------------------------------------------------
// InstanceRepository impl
// ---------------------------------------------------------------------------

impl InstanceRepository for SqliteInstanceRepository {
    async fn create(&self, instance: &ProcessInstance) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO process_instances
               (id, tenant_id, definition_id, applicant_id, form_data_id, status,
                current_node_id, started_at, completed_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(instance.id.to_string())
        .bind(instance.tenant_id.to_string())
        .bind(instance.definition_id.to_string())
        .bind(instance.applicant_id.to_string())
        .bind(instance.form_data_id.to_string())
        .bind(instance.status.to_string())
        .bind(&instance.current_node_id)
        .bind(format_datetime(&instance.started_at))
        .bind(instance.completed_at.as_ref().map(format_datetime))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn get(&self, id: &InstanceId) -> Result<Option<ProcessInstance>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM process_instances WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let r = InstanceRow::from_row(&row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(r.into_instance()?))
            }
            None => Ok(None),
        }
    }

    async fn advance_node(
        &self,
        id: &InstanceId,
        from_node: &str,
        to_node: &str,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"UPDATE process_instances SET current_node_id = ?
               WHERE id = ? AND status = 'running' AND current_node_id = ?"#,
        )
        .bind(to_node)
        .bind(id.to_string())
        .bind(from_node)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn finish(
        &self,
        id: &InstanceId,
        outcome: InstanceStatus,
    ) -> Result<bool, RepositoryError> {
        if !outcome.is_terminal() {
            return Err(RepositoryError::Query(format!(
                "'{outcome}' is not a terminal status"
            )));
        }

        let result = sqlx::query(
            r#"UPDATE process_instances
               SET status = ?, current_node_id = NULL, completed_at = ?
               WHERE id = ? AND status = 'running'"#,
        )
        .bind(outcome.to_string())
        .bind(format_datetime(&Utc::now()))
        .bind(id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn count_active_for_definition(
        &self,
        definition_id: &DefinitionId,
    ) -> Result<i64, RepositoryError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM process_instances WHERE definition_id = ? AND status IN ('pending', 'running')",
        )
        .bind(definition_id.to_string())
        .fetch_one(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        row.try_get("n")
            .map_err(|e| RepositoryError::Query(e.to_string()))
    }

    async fn list_for_tenant(
        &self,
        tenant_id: &TenantId,
        status: Option<InstanceStatus>,
    ) -> Result<Vec<ProcessInstance>, RepositoryError> {
        let rows = match status {
            Some(status) => {
                sqlx::query(
                    "SELECT * FROM process_instances WHERE tenant_id = ? AND status = ? ORDER BY started_at DESC",
                )
                .bind(tenant_id.to_string())
                .bind(status.to_string())
                .fetch_all(&self.pool.reader)
                .await
            }
            None => {
                sqlx::query(
                    "SELECT * FROM process_instances WHERE tenant_id = ? ORDER BY started_at DESC",
                )
                .bind(tenant_id.to_string())
                .fetch_all(&self.pool.reader)
                .await
            }
        }
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows_to_instances(&rows)
    }

    async fn list_for_applicant(
        &self,
        tenant_id: &TenantId,
        applicant_id: &UserId,
    ) -> Result<Vec<ProcessInstance>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM process_instances WHERE tenant_id = ? AND applicant_id = ? ORDER BY started_at DESC",
        )
        .bind(tenant_id.to_string())
        .bind(applicant_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows_to_instances(&rows)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::definition::SqliteDefinitionRepository;
    use greenlight_core::repository::definition::DefinitionRepository;
    use greenlight_types::definition::{
        ApprovalMode, AssigneeRule, NodeDefinition, ProcessDefinition,
    };
    use greenlight_types::id::FormId;

    async fn test_pool() -> DatabasePool {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        std::mem::forget(dir);
        DatabasePool::new(&url).await.unwrap()
    }

    async fn setup_definition(pool: &DatabasePool, tenant_id: TenantId) -> DefinitionId {
        let now = Utc::now();
        let def = ProcessDefinition {
            id: DefinitionId::new(),
            tenant_id,
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

    fn sample_instance(tenant_id: TenantId, definition_id: DefinitionId) -> ProcessInstance {
        ProcessInstance {
            id: InstanceId::new(),
            tenant_id,
            definition_id,
            applicant_id: UserId::new(),
            form_data_id: FormDataId::new(),
            status: InstanceStatus::Running,
            current_node_id: Some("review".to_string()),
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let pool = test_pool().await;
        let repo = SqliteInstanceRepository::new(pool.clone());
        let tenant = TenantId::new();
        let def_id = setup_definition(&pool, tenant).await;
        let instance = sample_instance(tenant, def_id);

        repo.create(&instance).await.unwrap();

        let loaded = repo.get(&instance.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, InstanceStatus::Running);
        assert_eq!(loaded.current_node_id.as_deref(), Some("review"));
        assert!(loaded.completed_at.is_none());
    }

    #[tokio::test]
    async fn test_advance_node_cas_single_winner() {
        let pool = test_pool().await;
        let repo = SqliteInstanceRepository::new(pool.clone());
        let tenant = TenantId::new();
        let def_id = setup_definition(&pool, tenant).await;
        let instance = sample_instance(tenant, def_id);
        repo.create(&instance).await.unwrap();

        let first = repo.advance_node(&instance.id, "review", "signoff").await.unwrap();
        assert!(first);

        // A sibling evaluating the same node loses: the pointer already moved.
        let second = repo.advance_node(&instance.id, "review", "signoff").await.unwrap();
        assert!(!second);

        let loaded = repo.get(&instance.id).await.unwrap().unwrap();
        assert_eq!(loaded.current_node_id.as_deref(), Some("signoff"));
    }

    #[tokio::test]
    async fn test_finish_cas_single_winner() {
        let pool = test_pool().await;
        let repo = SqliteInstanceRepository::new(pool.clone());
        let tenant = TenantId::new();
        let def_id = setup_definition(&pool, tenant).await;
        let instance = sample_instance(tenant, def_id);
        repo.create(&instance).await.unwrap();

        let first = repo.finish(&instance.id, InstanceStatus::Approved).await.unwrap();
        assert!(first);
        let second = repo.finish(&instance.id, InstanceStatus::Rejected).await.unwrap();
        assert!(!second);

        let loaded = repo.get(&instance.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, InstanceStatus::Approved);
        assert!(loaded.current_node_id.is_none());
        assert!(loaded.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_finish_rejects_non_terminal_outcome() {
        let pool = test_pool().await;
        let repo = SqliteInstanceRepository::new(pool.clone());
        let tenant = TenantId::new();
        let def_id = setup_definition(&pool, tenant).await;
        let instance = sample_instance(tenant, def_id);
        repo.create(&instance).await.unwrap();

        let err = repo.finish(&instance.id, InstanceStatus::Running).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Query(_)));
    }

    #[tokio::test]
    async fn test_count_active_for_definition() {
        let pool = test_pool().await;
        let repo = SqliteInstanceRepository::new(pool.clone());
        let tenant = TenantId::new();
        let def_id = setup_definition(&pool, tenant).await;

        let running = sample_instance(tenant, def_id);
        repo.create(&running).await.unwrap();

        let finished = sample_instance(tenant, def_id);
        repo.create(&finished).await.unwrap();
        repo.finish(&finished.id, InstanceStatus::Approved).await.unwrap();

        let active = repo.count_active_for_definition(&def_id).await.unwrap();
        assert_eq!(active, 1);
    }

    #[tokio::test]
    async fn test_list_for_tenant_with_status_filter() {
        let pool = test_pool().await;
        let repo = SqliteInstanceRepository::new(pool.clone());
        let tenant = TenantId::new();
        let def_id = setup_definition(&pool, tenant).await;

        let a = sample_instance(tenant, def_id);
        repo.create(&a).await.unwrap();
        let b = sample_instance(tenant, def_id);
        repo.create(&b).await.unwrap();
        repo.finish(&b.id, InstanceStatus::Withdrawn).await.unwrap();

        let all = repo.list_for_tenant(&tenant, None).await.unwrap();
        assert_eq!(all.len(), 2);

        let withdrawn = repo
            .list_for_tenant(&tenant, Some(InstanceStatus::Withdrawn))
            .await
            .unwrap();
        assert_eq!(withdrawn.len(), 1);
        assert_eq!(withdrawn[0].id, b.id);
    }

    #[tokio::test]
    async fn test_list_for_applicant() {
        let pool = test_pool().await;
        let repo = SqliteInstanceRepository::new(pool.clone());
        let tenant = TenantId::new();
        let def_id = setup_definition(&pool, tenant).await;

        let mine = sample_instance(tenant, def_id);
        repo.create(&mine).await.unwrap();
        let theirs = sample_instance(tenant, def_id);
        repo.create(&theirs).await.unwrap();

        let listed = repo
            .list_for_applicant(&tenant, &mine.applicant_id)
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, mine.id);
    }
}
