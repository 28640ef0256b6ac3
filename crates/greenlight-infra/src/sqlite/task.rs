//! SQLite approval task repository implementation.
//!
//! Implements `TaskRepository` from `greenlight-core`. `close_if_pending`
//! carries the expected status and assignee in its WHERE clause, so two
//! racing closes of the same task are serialized by the row itself; the
//! caller reads `rows_affected` through the boolean result.

use greenlight_core::repository::task::TaskRepository;
use greenlight_types::error::RepositoryError;
use greenlight_types::id::{InstanceId, TaskId, TenantId, UserId};
use greenlight_types::task::{ApprovalTask, Decision, TaskStatus};
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `TaskRepository`.
#[derive(Clone)]
pub struct SqliteTaskRepository {
    pool: DatabasePool,
}

impl SqliteTaskRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Internal row type
// ---------------------------------------------------------------------------

struct TaskRow {
    id: String,
    tenant_id: String,
    instance_id: String,
    node_id: String,
    assignee_id: String,
    status: String,
    decision: Option<String>,
    comment: Option<String>,
    delegated_by: Option<String>,
    created_at: String,
    resolved_at: Option<String>,
}

impl TaskRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            tenant_id: row.try_get("tenant_id")?,
            instance_id: row.try_get("instance_id")?,
            node_id: row.try_get("node_id")?,
            assignee_id: row.try_get("assignee_id")?,
            status: row.try_get("status")?,
            decision: row.try_get("decision")?,
            comment: row.try_get("comment")?,
            delegated_by: row.try_get("delegated_by")?,
            created_at: row.try_get("created_at")?,
            resolved_at: row.try_get("resolved_at")?,
        })
    }

    fn into_task(self) -> Result<ApprovalTask, RepositoryError> {
        let status: TaskStatus = self
            .status
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;

        let decision = self
            .decision
            .as_deref()
            .map(|s| s.parse::<Decision>())
            .transpose()
            .map_err(|e: String| RepositoryError::Query(e))?;

        let delegated_by = self
            .delegated_by
            .as_deref()
            .map(parse_uuid)
            .transpose()?
            .map(UserId::from_uuid);

        let resolved_at = self
            .resolved_at
            .as_deref()
            .map(parse_datetime)
            .transpose()?;

        Ok(ApprovalTask {
            id: TaskId::from_uuid(parse_uuid(&self.id)?),
            tenant_id: TenantId::from_uuid(parse_uuid(&self.tenant_id)?),
            instance_id: InstanceId::from_uuid(parse_uuid(&self.instance_id)?),
            node_id: self.node_id,
            assignee_id: UserId::from_uuid(parse_uuid(&self.assignee_id)?),
            status,
            decision,
            comment: self.comment,
            delegated_by,
            created_at: parse_datetime(&self.created_at)?,
            resolved_at,
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

fn rows_to_tasks(rows: &[sqlx::sqlite::SqliteRow]) -> Result<Vec<ApprovalTask>, RepositoryError> {
    let mut tasks = Vec::with_capacity(rows.len());
    for row in rows {
        let r = TaskRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
        tasks.push(r.into_task()?);
    }
    Ok(tasks)
}

// ---------------------------------------------------------------------------
// TaskRepository impl
// ---------------------------------------------------------------------------

impl TaskRepository for SqliteTaskRepository {
    async fn create_many(&self, tasks: &[ApprovalTask]) -> Result<(), RepositoryError> {
        for task in tasks {
            let result = sqlx::query(
                r#"INSERT INTO approval_tasks
                   (id, tenant_id, instance_id, node_id, assignee_id, status,
                    decision, comment, delegated_by, created_at, resolved_at)
                   VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            )
            .bind(task.id.to_string())
            .bind(task.tenant_id.to_string())
            .bind(task.instance_id.to_string())
            .bind(&task.node_id)
            .bind(task.assignee_id.to_string())
            .bind(task.status.to_string())
            .bind(task.decision.map(|d| d.to_string()))
            .bind(&task.comment)
            .bind(task.delegated_by.map(|u| u.to_string()))
            .bind(format_datetime(&task.created_at))
            .bind(task.resolved_at.as_ref().map(format_datetime))
            .execute(&self.pool.writer)
            .await;

            match result {
                Ok(_) => {}
                Err(sqlx::Error::Database(db_err)) if db_err.message().contains("UNIQUE") => {
                    return Err(RepositoryError::Conflict(format!(
                        "assignee '{}' already holds a pending task at node '{}'",
                        task.assignee_id, task.node_id
                    )));
                }
                Err(e) => return Err(RepositoryError::Query(e.to_string())),
            }
        }
        Ok(())
    }

    async fn get(&self, id: &TaskId) -> Result<Option<ApprovalTask>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM approval_tasks WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let r = TaskRow::from_row(&row).map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(r.into_task()?))
            }
            None => Ok(None),
        }
    }

    async fn close_if_pending(
        &self,
        id: &TaskId,
        assignee: &UserId,
        status: TaskStatus,
        decision: Option<Decision>,
        comment: Option<&str>,
    ) -> Result<bool, RepositoryError> {
        if status == TaskStatus::Pending {
            return Err(RepositoryError::Query(
                "cannot close a task to 'pending'".to_string(),
            ));
        }

        let result = sqlx::query(
            r#"UPDATE approval_tasks
               SET status = ?, decision = ?, comment = ?, resolved_at = ?
               WHERE id = ? AND status = 'pending' AND assignee_id = ?"#,
        )
        .bind(status.to_string())
        .bind(decision.map(|d| d.to_string()))
        .bind(comment)
        .bind(format_datetime(&Utc::now()))
        .bind(id.to_string())
        .bind(assignee.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn cancel_pending_for_instance(
        &self,
        instance_id: &InstanceId,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r#"UPDATE approval_tasks SET status = 'cancelled', resolved_at = ?
               WHERE instance_id = ? AND status = 'pending'"#,
        )
        .bind(format_datetime(&Utc::now()))
        .bind(instance_id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected())
    }

    async fn cancel_pending_for_node(
        &self,
        instance_id: &InstanceId,
        node_id: &str,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r#"UPDATE approval_tasks SET status = 'cancelled', resolved_at = ?
               WHERE instance_id = ? AND node_id = ? AND status = 'pending'"#,
        )
        .bind(format_datetime(&Utc::now()))
        .bind(instance_id.to_string())
        .bind(node_id)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected())
    }

    async fn list_for_node(
        &self,
        instance_id: &InstanceId,
        node_id: &str,
    ) -> Result<Vec<ApprovalTask>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM approval_tasks WHERE instance_id = ? AND node_id = ? ORDER BY created_at ASC",
        )
        .bind(instance_id.to_string())
        .bind(node_id)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows_to_tasks(&rows)
    }

    async fn list_for_instance(
        &self,
        instance_id: &InstanceId,
    ) -> Result<Vec<ApprovalTask>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM approval_tasks WHERE instance_id = ? ORDER BY created_at ASC",
        )
        .bind(instance_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows_to_tasks(&rows)
    }

    async fn list_pending_for_assignee(
        &self,
        tenant_id: &TenantId,
        assignee_id: &UserId,
    ) -> Result<Vec<ApprovalTask>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT * FROM approval_tasks
               WHERE tenant_id = ? AND assignee_id = ? AND status = 'pending'
               ORDER BY created_at ASC"#,
        )
        .bind(tenant_id.to_string())
        .bind(assignee_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows_to_tasks(&rows)
    }

    async fn list_pending_for_tenant(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Vec<ApprovalTask>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM approval_tasks WHERE tenant_id = ? AND status = 'pending' ORDER BY created_at ASC",
        )
        .bind(tenant_id.to_string())
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows_to_tasks(&rows)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
