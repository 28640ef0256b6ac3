//! Process definition management.
//!
//! Publishing validates the node graph up front; updates that would change
//! the graph or the bound form are refused while the definition still has
//! non-terminal instances, so a running instance never sees its route
//! change under it.

use chrono::Utc;
use greenlight_types::definition::{
    DefinitionUpdate, NewProcessDefinition, ProcessDefinition,
};
use greenlight_types::error::{EngineError, RepositoryError};
use greenlight_types::id::{DefinitionId, TenantId};

use crate::engine::graph;
use crate::repository::definition::DefinitionRepository;
use crate::repository::instance::InstanceRepository;

/// Service managing the definition store.
///
/// Generic over repository traits to maintain clean architecture --
/// greenlight-core never depends on greenlight-infra.
pub struct DefinitionService<D: DefinitionRepository, I: InstanceRepository> {
    definitions: D,
    instances: I,
}

impl<D: DefinitionRepository, I: InstanceRepository> DefinitionService<D, I> {
    pub fn new(definitions: D, instances: I) -> Self {
        Self {
            definitions,
            instances,
        }
    }

    /// Validate and store a new definition. The code must be unique within
    /// the tenant; the node chain must be well-formed.
    pub async fn publish(
        &self,
        request: NewProcessDefinition,
    ) -> Result<ProcessDefinition, EngineError> {
        let code = request.code.trim().to_string();
        if code.is_empty() {
            return Err(EngineError::InvalidDefinition(
                "code cannot be empty".to_string(),
            ));
        }
        graph::validate_nodes(&request.nodes)
            .map_err(|e| EngineError::InvalidDefinition(e.to_string()))?;

        let now = Utc::now();
        let def = ProcessDefinition {
            id: DefinitionId::new(),
            tenant_id: request.tenant_id,
            code: code.clone(),
            name: request.name,
            form_id: request.form_id,
            nodes: request.nodes,
            enabled: true,
            revision: 1,
            created_at: now,
            updated_at: now,
        };

        self.definitions.create(&def).await.map_err(|e| match e {
            RepositoryError::Conflict(_) => EngineError::DefinitionCodeConflict(code.clone()),
            other => EngineError::Storage(other),
        })?;

        tracing::info!(
            definition_id = %def.id,
            tenant_id = %def.tenant_id,
            code = %def.code,
            nodes = def.nodes.len(),
            "process definition published"
        );
        Ok(def)
    }

    /// Apply a partial update. Graph and form changes require the
    /// definition to have no non-terminal instances.
    pub async fn update(
        &self,
        id: &DefinitionId,
        update: DefinitionUpdate,
    ) -> Result<ProcessDefinition, EngineError> {
        let mut def = self
            .definitions
            .get(id)
            .await?
            .ok_or(EngineError::DefinitionNotFound)?;

        let reshapes = update.nodes.is_some() || update.form_id.is_some();
        if reshapes {
            let active = self.instances.count_active_for_definition(id).await?;
            if active > 0 {
                return Err(EngineError::DefinitionInUse);
            }
        }

        if let Some(nodes) = update.nodes {
            graph::validate_nodes(&nodes)
                .map_err(|e| EngineError::InvalidDefinition(e.to_string()))?;
            def.nodes = nodes;
        }
        if let Some(form_id) = update.form_id {
            def.form_id = form_id;
        }
        if let Some(name) = update.name {
            def.name = name;
        }
        def.revision += 1;
        def.updated_at = Utc::now();

        self.definitions.update(&def).await.map_err(|e| match e {
            RepositoryError::NotFound => EngineError::DefinitionNotFound,
            other => EngineError::Storage(other),
        })?;

        tracing::info!(
            definition_id = %def.id,
            revision = def.revision,
            "process definition updated"
        );
        Ok(def)
    }

    /// Enable or disable new instance starts. Running instances are
    /// unaffected.
    pub async fn set_enabled(&self, id: &DefinitionId, enabled: bool) -> Result<(), EngineError> {
        self.definitions
            .set_enabled(id, enabled)
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound => EngineError::DefinitionNotFound,
                other => EngineError::Storage(other),
            })?;
        tracing::info!(definition_id = %id, enabled, "process definition toggled");
        Ok(())
    }

    pub async fn get(&self, id: &DefinitionId) -> Result<ProcessDefinition, EngineError> {
        self.definitions
            .get(id)
            .await?
            .ok_or(EngineError::DefinitionNotFound)
    }

    pub async fn get_by_code(
        &self,
        tenant_id: &TenantId,
        code: &str,
    ) -> Result<ProcessDefinition, EngineError> {
        self.definitions
            .get_by_code(tenant_id, code)
            .await?
            .ok_or(EngineError::DefinitionNotFound)
    }

    pub async fn list(&self, tenant_id: &TenantId) -> Result<Vec<ProcessDefinition>, EngineError> {
        Ok(self.definitions.list(tenant_id).await?)
    }
}
