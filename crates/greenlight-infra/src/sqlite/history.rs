//! SQLite approval history repository implementation.
//!
//! Append-only: the table has no UPDATE or DELETE path. Entries are listed
//! in occurrence order; UUIDv7 entry IDs break ties within the same
//! millisecond.

use greenlight_core::repository::history::HistoryRepository;
use greenlight_types::error::RepositoryError;
use greenlight_types::history::{HistoryAction, HistoryEntry};
use greenlight_types::id::{InstanceId, TaskId, UserId};
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `HistoryRepository`.
#[derive(Clone)]
pub struct SqliteHistoryRepository {
    pool: DatabasePool,
}

impl SqliteHistoryRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Internal row type
// ---------------------------------------------------------------------------

struct HistoryRow {
    id: String,
    instance_id: String,
    task_id: Option<String>,
    actor_id: String,
    action: String,
    comment: Option<String>,
    details: Option<String>,
    occurred_at: String,
}

impl HistoryRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            instance_id: row.try_get("instance_id")?,
            task_id: row.try_get("task_id")?,
            actor_id: row.try_get("actor_id")?,
            action: row.try_get("action")?,
            comment: row.try_get("comment")?,
            details: row.try_get("details")?,
            occurred_at: row.try_get("occurred_at")?,
        })
    }

    fn into_entry(self) -> Result<HistoryEntry, RepositoryError> {
        let action: HistoryAction = self
            .action
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;

        let task_id = self
            .task_id
            .as_deref()
            .map(parse_uuid)
            .transpose()?
            .map(TaskId::from_uuid);

        let details = self
            .details
            .as_deref()
            .map(|s| {
                serde_json::from_str(s)
                    .map_err(|e| RepositoryError::Query(format!("invalid details JSON: {e}")))
            })
            .transpose()?;

        Ok(HistoryEntry {
            id: parse_uuid(&self.id)?,
            instance_id: InstanceId::from_uuid(parse_uuid(&self.instance_id)?),
            task_id,
            actor_id: UserId::from_uuid(parse_uuid(&self.actor_id)?),
            action,
            comment: self.comment,
            details,
            occurred_at: parse_datetime(&self.occurred_at)?,
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

// ---------------------------------------------------------------------------
// HistoryRepository impl
// ---------------------------------------------------------------------------

impl HistoryRepository for SqliteHistoryRepository {
    async fn append(&self, entry: &HistoryEntry) -> Result<(), RepositoryError> {
        let details = entry
            .details
            .as_ref()
            .map(|v| serde_json::to_string(v))
            .transpose()
            .map_err(|e| RepositoryError::Query(format!("serialize details: {e}")))?;

        sqlx::query(
            r#"INSERT INTO approval_history
               (id, instance_id, task_id, actor_id, action, comment, details, occurred_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(entry.id.to_string())
        .bind(entry.instance_id.to_string())
        .bind(entry.task_id.map(|t| t.to_string()))
        .bind(entry.actor_id.to_string())
        .bind(entry.action.to_string())
        .bind(&entry.comment)
        .bind(&details)
        .bind(format_datetime(&entry.occurred_at))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn list_for_instance(
        &self,
        instance_id: &InstanceId,
    ) -> Result<Vec<HistoryEntry>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM approval_history WHERE instance_id = ? ORDER BY occurred_at ASC, id ASC",
        )
        .bind(instance_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            let r = HistoryRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            entries.push(r.into_entry()?);
        }
        Ok(entries)
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
    use greenlight_core::repository::definition::DefinitionRepository;
    use greenlight_core::repository::instance::InstanceRepository;
    use greenlight_types::definition::{
        ApprovalMode, AssigneeRule, NodeDefinition, ProcessDefinition,
    };
    use greenlight_types::id::{DefinitionId, FormDataId, FormId, TenantId};
    use greenlight_types::instance::{InstanceStatus, ProcessInstance};
    use serde_json::json;

    async fn test_pool() -> DatabasePool {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        std::mem::forget(dir);
        DatabasePool::new(&url).await.unwrap()
    }

    async fn setup_instance(pool: &DatabasePool) -> InstanceId {
        let now = Utc::now();
        let tenant = TenantId::new();
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

        let instance = ProcessInstance {
            id: InstanceId::new(),
            tenant_id: tenant,
            definition_id: def.id,
            applicant_id: UserId::new(),
            form_data_id: FormDataId::new(),
            status: InstanceStatus::Running,
            current_node_id: Some("review".to_string()),
            started_at: now,
            completed_at: None,
        };
        SqliteInstanceRepository::new(pool.clone())
            .create(&instance)
            .await
            .unwrap();
        instance.id
    }

    fn make_entry(instance_id: InstanceId, action: HistoryAction) -> HistoryEntry {
        HistoryEntry {
            id: Uuid::now_v7(),
            instance_id,
            task_id: None,
            actor_id: UserId::new(),
            action,
            comment: None,
            details: None,
            occurred_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_append_and_list_in_order() {
        let pool = test_pool().await;
        let repo = SqliteHistoryRepository::new(pool.clone());
        let instance_id = setup_instance(&pool).await;

        repo.append(&make_entry(instance_id, HistoryAction::Started))
            .await
            .unwrap();
        repo.append(&make_entry(instance_id, HistoryAction::Approved))
            .await
            .unwrap();
        repo.append(&make_entry(instance_id, HistoryAction::Withdrawn))
            .await
            .unwrap();

        let entries = repo.list_for_instance(&instance_id).await.unwrap();
        let actions: Vec<HistoryAction> = entries.iter().map(|e| e.action).collect();
        assert_eq!(
            actions,
            vec![
                HistoryAction::Started,
                HistoryAction::Approved,
                HistoryAction::Withdrawn
            ]
        );
    }

    #[tokio::test]
    async fn test_entry_with_task_and_details() {
        let pool = test_pool().await;
        let repo = SqliteHistoryRepository::new(pool.clone());
        let instance_id = setup_instance(&pool).await;

        let mut entry = make_entry(instance_id, HistoryAction::Delegated);
        entry.task_id = Some(TaskId::new());
        entry.comment = Some("out of office".to_string());
        entry.details = Some(json!({"to": UserId::new().to_string()}));
        repo.append(&entry).await.unwrap();

        let entries = repo.list_for_instance(&instance_id).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].task_id, entry.task_id);
        assert_eq!(entries[0].comment.as_deref(), Some("out of office"));
        assert!(entries[0].details.as_ref().unwrap().get("to").is_some());
    }

    #[tokio::test]
    async fn test_list_scoped_to_instance() {
        let pool = test_pool().await;
        let repo = SqliteHistoryRepository::new(pool.clone());
        let a = setup_instance(&pool).await;
        let b = setup_instance(&pool).await;

        repo.append(&make_entry(a, HistoryAction::Started)).await.unwrap();
        repo.append(&make_entry(b, HistoryAction::Started)).await.unwrap();

        let entries = repo.list_for_instance(&a).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].instance_id, a);
    }
}
