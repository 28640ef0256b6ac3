//! In-process organization directory adapter.
//!
//! Implements the `OrganizationDirectory` port over DashMap role membership
//! and manager edges. Deployments backed by a real HR directory replace
//! this adapter; tests and embedded setups populate it directly.

use std::sync::Arc;

use dashmap::DashMap;
use greenlight_core::directory::OrganizationDirectory;
use greenlight_types::definition::AssigneeRule;
use greenlight_types::error::DirectoryError;
use greenlight_types::id::{TenantId, UserId};

/// DashMap-backed directory of roles and manager relationships.
///
/// Cloning shares the underlying maps, so a clone handed to the engine sees
/// later membership changes.
#[derive(Debug, Clone, Default)]
pub struct MemoryDirectory {
    roles: Arc<DashMap<(TenantId, String), Vec<UserId>>>,
    managers: Arc<DashMap<UserId, UserId>>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user to a role within a tenant.
    pub fn add_role_member(&self, tenant_id: TenantId, role: &str, user_id: UserId) {
        self.roles
            .entry((tenant_id, role.to_string()))
            .or_default()
            .push(user_id);
    }

    /// Record a user's direct manager.
    pub fn set_manager(&self, user_id: UserId, manager_id: UserId) {
        self.managers.insert(user_id, manager_id);
    }
}

impl OrganizationDirectory for MemoryDirectory {
    async fn resolve(
        &self,
        tenant_id: &TenantId,
        rule: &AssigneeRule,
        applicant_id: &UserId,
    ) -> Result<Vec<UserId>, DirectoryError> {
        let resolved = match rule {
            AssigneeRule::User { user_id } => vec![*user_id],
            AssigneeRule::Role { role } => self
                .roles
                .get(&(*tenant_id, role.clone()))
                .map(|members| members.clone())
                .unwrap_or_default(),
            AssigneeRule::ApplicantManager => self
                .managers
                .get(applicant_id)
                .map(|m| vec![*m])
                .unwrap_or_default(),
        };
        Ok(resolved)
    }
}
