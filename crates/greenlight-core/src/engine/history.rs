//! Best-effort history recording.
//!
//! Every business transition appends one entry through `HistoryRecorder`.
//! The log is an audit trail, not a ledger the engine depends on: when an
//! append fails the transition it describes has already committed, so the
//! failure is logged and swallowed rather than bubbled up.

use chrono::Utc;
use greenlight_types::history::{HistoryAction, HistoryEntry};
use greenlight_types::id::{InstanceId, TaskId, UserId};
use uuid::Uuid;

use crate::repository::history::HistoryRepository;

/// Build a history entry stamped with the current time.
pub fn entry(
    instance_id: InstanceId,
    task_id: Option<TaskId>,
    actor_id: UserId,
    action: HistoryAction,
    comment: Option<String>,
    details: Option<serde_json::Value>,
) -> HistoryEntry {
    HistoryEntry {
        id: Uuid::now_v7(),
        instance_id,
        task_id,
        actor_id,
        action,
        comment,
        details,
        occurred_at: Utc::now(),
    }
}

/// Appends history entries, downgrading storage failures to warnings.
#[derive(Debug, Clone)]
pub struct HistoryRecorder<H> {
    repo: H,
}

impl<H: HistoryRepository> HistoryRecorder<H> {
    pub fn new(repo: H) -> Self {
        Self { repo }
    }

    /// Access the underlying repository for reads.
    pub fn repo(&self) -> &H {
        &self.repo
    }

    /// Append one entry. A failed append is logged with the instance and
    /// action context and otherwise ignored; the transition it records
    /// stands either way.
    pub async fn record(&self, entry: HistoryEntry) {
        if let Err(err) = self.repo.append(&entry).await {
            tracing::warn!(
                instance_id = %entry.instance_id,
                action = %entry.action,
                error = %err,
                "failed to append history entry"
            );
        }
    }
}
