//! In-process form registry adapter.
//!
//! Implements the `FormRegistry` port over a DashMap of known form data
//! references. The engine treats the references as opaque; this adapter
//! only answers the existence check performed at process start.

use std::sync::Arc;

use dashmap::DashMap;
use greenlight_core::directory::FormRegistry;
use greenlight_types::error::DirectoryError;
use greenlight_types::id::{FormDataId, FormId, TenantId};

/// DashMap-backed registry of submitted form data references.
///
/// Cloning shares the underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryFormRegistry {
    entries: Arc<DashMap<(TenantId, FormId, FormDataId), ()>>,
}

impl MemoryFormRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a submitted form payload reference.
    pub fn register(&self, tenant_id: TenantId, form_id: FormId, form_data_id: FormDataId) {
        self.entries.insert((tenant_id, form_id, form_data_id), ());
    }
}

impl FormRegistry for MemoryFormRegistry {
    async fn form_data_exists(
        &self,
        tenant_id: &TenantId,
        form_id: &FormId,
        form_data_id: &FormDataId,
    ) -> Result<bool, DirectoryError> {
        Ok(self
            .entries
            .contains_key(&(*tenant_id, *form_id, *form_data_id)))
    }
}
