use thiserror::Error;

use crate::instance::InstanceStatus;

/// Errors from repository operations (used by trait definitions in
/// greenlight-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors from the organization directory port.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("directory unavailable")]
    Unavailable,

    #[error("directory lookup failed: {0}")]
    Lookup(String),
}

/// Errors surfaced by engine operations.
///
/// Three families: validation errors mean nothing was mutated;
/// state-conflict errors mean the entity moved on before the caller's
/// action landed (losing a race reports the same way); infrastructure
/// errors pass through untouched, never retried.
#[derive(Debug, Error)]
pub enum EngineError {
    // -- Validation --
    #[error("process definition not found")]
    DefinitionNotFound,

    #[error("process definition is disabled")]
    DefinitionDisabled,

    #[error("process code '{0}' already exists for this tenant")]
    DefinitionCodeConflict(String),

    #[error("definition has non-terminal instances; nodes and form are frozen")]
    DefinitionInUse,

    #[error("invalid process definition: {0}")]
    InvalidDefinition(String),

    #[error("form data reference not found")]
    FormDataNotFound,

    #[error("no assignee resolved for node '{node_id}'")]
    NoAssigneeResolved { node_id: String },

    #[error("user already holds a pending task at node '{node_id}'")]
    DuplicatePendingTask { node_id: String },

    // -- State conflicts --
    #[error("process instance not found")]
    InstanceNotFound,

    #[error("instance is {0}, expected running")]
    InvalidInstanceState(InstanceStatus),

    #[error("instance already reached a terminal status")]
    AlreadyTerminated,

    #[error("only the applicant may withdraw the instance")]
    NotApplicant,

    #[error("approval task not found")]
    TaskNotFound,

    #[error("task is not assigned to this user")]
    TaskNotAssignedToUser,

    #[error("task was already resolved")]
    TaskAlreadyResolved,

    // -- Infrastructure --
    #[error("storage error: {0}")]
    Storage(#[from] RepositoryError),

    #[error("directory error: {0}")]
    Directory(#[from] DirectoryError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_error_display() {
        let err = EngineError::NoAssigneeResolved {
            node_id: "finance-review".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "no assignee resolved for node 'finance-review'"
        );
    }

    #[test]
    fn test_invalid_state_names_actual_status() {
        let err = EngineError::InvalidInstanceState(InstanceStatus::Withdrawn);
        assert_eq!(err.to_string(), "instance is withdrawn, expected running");
    }

    #[test]
    fn test_repository_error_wraps_into_engine_error() {
        let err: EngineError = RepositoryError::Query("syntax error".to_string()).into();
        assert_eq!(err.to_string(), "storage error: query error: syntax error");
    }
}
