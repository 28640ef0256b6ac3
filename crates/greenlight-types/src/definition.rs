//! Process definition domain types for Greenlight.
//!
//! Defines the canonical representation of an approval process: an ordered
//! chain of approval nodes, each naming who approves and how many approvals
//! the node needs. YAML documents and JSON API payloads both convert to and
//! from `ProcessDefinition`; it is the single source of truth for a
//! process's shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::{DefinitionId, FormId, TenantId, UserId};

// ---------------------------------------------------------------------------
// Process Definition (canonical IR)
// ---------------------------------------------------------------------------

/// The canonical approval process definition.
///
/// A definition is the template from which running instances are spawned.
/// Once at least one non-terminal instance exists, `nodes` and `form_id`
/// are frozen; only `name` and `enabled` may still change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessDefinition {
    /// UUIDv7 assigned on first save.
    pub id: DefinitionId,
    pub tenant_id: TenantId,
    /// Human-readable key (e.g. "expense-approval"). Unique within a tenant.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Form template bound to this process. Opaque to the engine.
    pub form_id: FormId,
    /// Approval node chain. The first node is the entry node.
    pub nodes: Vec<NodeDefinition>,
    /// Disabled definitions keep their running instances but cannot start
    /// new ones.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Bumped on every stored update.
    #[serde(default = "default_revision")]
    pub revision: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_enabled() -> bool {
    true
}

fn default_revision() -> i32 {
    1
}

// ---------------------------------------------------------------------------
// Node Definition
// ---------------------------------------------------------------------------

/// A single approval node in the process graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDefinition {
    /// User-defined node ID (e.g. "manager-review"). Unique within a
    /// definition.
    pub id: String,
    /// Human-readable node name.
    pub name: String,
    /// Who gets a task when the instance reaches this node.
    pub assignee: AssigneeRule,
    /// How many of the node's tasks must approve before the instance moves
    /// on. Defaults to `All`.
    #[serde(default)]
    pub approval_mode: ApprovalMode,
    /// ID of the node the instance advances to once this node approves.
    /// `None` marks the final node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}

/// How a node's assignees are resolved into concrete users.
///
/// Internally tagged by `type` to match YAML structure:
/// ```yaml
/// assignee:
///   type: role
///   role: finance
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssigneeRule {
    /// A fixed user.
    User { user_id: UserId },
    /// Every member of an organizational role.
    Role { role: String },
    /// The applicant's direct manager, looked up at dispatch time.
    ApplicantManager,
}

/// How many approvals a node needs before the instance advances.
///
/// A single rejection always rejects the node regardless of mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ApprovalMode {
    /// Every assignee must approve.
    All,
    /// One approval is enough.
    Any,
    /// At least `count` approvals are required.
    Quorum { count: u32 },
}

impl Default for ApprovalMode {
    fn default() -> Self {
        ApprovalMode::All
    }
}

// ---------------------------------------------------------------------------
// Service request payloads
// ---------------------------------------------------------------------------

/// Request to publish a new process definition. `enabled` defaults to true.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProcessDefinition {
    pub tenant_id: TenantId,
    pub code: String,
    pub name: String,
    pub form_id: FormId,
    pub nodes: Vec<NodeDefinition>,
}

/// Partial update to an existing definition. `None` fields are untouched.
///
/// `nodes` and `form_id` changes are rejected while non-terminal instances
/// of the definition exist.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefinitionUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_id: Option<FormId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes: Option<Vec<NodeDefinition>>,
}
