//! SQLite process definition repository implementation.
//!
//! Implements `DefinitionRepository` from `greenlight-core` using sqlx with
//! split read/write pools. The node chain is stored as a JSON blob; the
//! tenant-unique code is enforced by a UNIQUE index and surfaced as
//! `RepositoryError::Conflict`.

use greenlight_core::repository::definition::DefinitionRepository;
use greenlight_types::definition::{NodeDefinition, ProcessDefinition};
use greenlight_types::error::RepositoryError;
use greenlight_types::id::{DefinitionId, FormId, TenantId};
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `DefinitionRepository`.
#[derive(Clone)]
pub struct SqliteDefinitionRepository {
    pool: DatabasePool,
}

impl SqliteDefinitionRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Internal row type
// ---------------------------------------------------------------------------

struct DefinitionRow {
    id: String,
    tenant_id: String,
    code: String,
    name: String,
    form_id: String,
    nodes: String,
    enabled: i64,
    revision: i64,
    created_at: String,
    updated_at: String,
}

impl DefinitionRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            tenant_id: row.try_get("tenant_id")?,
            code: row.try_get("code")?,
            name: row.try_get("name")?,
            form_id: row.try_get("form_id")?,
            nodes: row.try_get("nodes")?,
            enabled: row.try_get("enabled")?,
            revision: row.try_get("revision")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_definition(self) -> Result<ProcessDefinition, RepositoryError> {
        let nodes: Vec<NodeDefinition> = serde_json::from_str(&self.nodes)
            .map_err(|e| RepositoryError::Query(format!("invalid nodes JSON: {e}")))?;

        Ok(ProcessDefinition {
            id: DefinitionId::from_uuid(parse_uuid(&self.id)?),
            tenant_id: TenantId::from_uuid(parse_uuid(&self.tenant_id)?),
            code: self.code,
            name: self.name,
            form_id: FormId::from_uuid(parse_uuid(&self.form_id)?),
            nodes,
            enabled: self.enabled != 0,
            revision: self.revision as i32,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
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

fn rows_to_definitions(
    rows: &[sqlx::sqlite::SqliteRow],
) -> Result<Vec<ProcessDefinition>, RepositoryError> {
    let mut defs = Vec::with_capacity(rows.len());
    for row in rows {
        let r = DefinitionRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
        defs.push(r.into_definition()?);
    }
    Ok(defs)
}

// ---------------------------------------------------------------------------
// DefinitionRepository impl
// ---------------------------------------------------------------------------

impl DefinitionRepository for SqliteDefinitionRepository {
    async fn create(&self, def: &ProcessDefinition) -> Result<(), RepositoryError> {
        let nodes_json = serde_json::to_string(&def.nodes)
            .map_err(|e| RepositoryError::Query(format!("serialize nodes: {e}")))?;

        let result = sqlx::query(
            r#"INSERT INTO process_definitions
               (id, tenant_id, code, name, form_id, nodes, enabled, revision, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(def.id.to_string())
        .bind(def.tenant_id.to_string())
        .bind(&def.code)
        .bind(&def.name)
        .bind(def.form_id.to_string())
        .bind(&nodes_json)
        .bind(def.enabled as i64)
        .bind(def.revision as i64)
        .bind(format_datetime(&def.created_at))
        .bind(format_datetime(&def.updated_at))
        .execute(&self.pool.writer)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.message().contains("UNIQUE") => {
                Err(RepositoryError::Conflict(format!(
                    "code '{}' already exists",
                    def.code
                )))
            }
            Err(e) => Err(RepositoryError::Query(e.to_string())),
        }
    }

    async fn update(&self, def: &ProcessDefinition) -> Result<(), RepositoryError> {
        let nodes_json = serde_json::to_string(&def.nodes)
            .map_err(|e| RepositoryError::Query(format!("serialize nodes: {e}")))?;

        let result = sqlx::query(
            r#"UPDATE process_definitions
               SET name = ?, form_id = ?, nodes = ?, revision = ?, updated_at = ?
               WHERE id = ?"#,
        )
        .bind(&def.name)
        .bind(def.form_id.to_string())
        .bind(&nodes_json)
        .bind(def.revision as i64)
        .bind(format_datetime(&def.updated_at))
        .bind(def.id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn get(&self, id: &DefinitionId) -> Result<Option<ProcessDefinition>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM process_definitions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let r = DefinitionRow::from_row(&row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(r.into_definition()?))
            }
            None => Ok(None),
        }
    }

    async fn get_by_code(
        &self,
        tenant_id: &TenantId,
        code: &str,
    ) -> Result<Option<ProcessDefinition>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM process_definitions WHERE tenant_id = ? AND code = ?")
            .bind(tenant_id.to_string())
            .bind(code)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let r = DefinitionRow::from_row(&row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(r.into_definition()?))
            }
            None => Ok(None),
        }
    }

    async fn list(&self, tenant_id: &TenantId) -> Result<Vec<ProcessDefinition>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM process_definitions WHERE tenant_id = ? ORDER BY code ASC")
            .bind(tenant_id.to_string())
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows_to_definitions(&rows)
    }

    async fn set_enabled(&self, id: &DefinitionId, enabled: bool) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE process_definitions SET enabled = ?, updated_at = ? WHERE id = ?",
        )
        .bind(enabled as i64)
        .bind(format_datetime(&Utc::now()))
        .bind(id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
