//! Persistence boundary.
//!
//! The orchestrator and generators treat the store as a pure CRUD
//! collaborator; schema and migration concerns live with the database.
//! `SupabaseStore` is the production implementation over PostgREST.

#[cfg(test)]
pub mod memory;
mod supabase;
mod types;

pub use supabase::SupabaseStore;
pub use types::{
    DbLifecycle, DbMeeting, DbSubmission, DbTask, DbUser, LifecycleStatus, UserStats,
};

use std::collections::HashMap;

use async_trait::async_trait;
use uuid::Uuid;

use crate::generate::{GeneratedMeeting, GeneratedTask};
use crate::scoring::EvaluationResult;

/// Store failures. `NotFound` is fatal to the workflow step that needed
/// the row; everything else is a transport or decoding problem.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("store request failed: {0}")]
    Request(String),
    #[error("unexpected store response: {0}")]
    Decode(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        Self::Request(err.to_string())
    }
}

/// CRUD boundary used by the orchestrator and generators.
#[async_trait]
pub trait Store: Send + Sync {
    async fn get_task(&self, id: Uuid) -> Result<DbTask, StoreError>;

    /// Load a submission with its parent task and submitting user joined.
    async fn get_submission(&self, id: Uuid) -> Result<DbSubmission, StoreError>;

    async fn get_user(&self, id: Uuid) -> Result<DbUser, StoreError>;

    async fn get_meeting(&self, id: Uuid) -> Result<DbMeeting, StoreError>;

    async fn get_lifecycle(
        &self,
        user_id: Uuid,
        task_id: Uuid,
    ) -> Result<Option<DbLifecycle>, StoreError>;

    /// Insert or update the lifecycle row keyed by (user, task).
    async fn upsert_lifecycle(&self, state: &DbLifecycle) -> Result<(), StoreError>;

    /// Persist generated tasks, returning their assigned identifiers.
    async fn save_tasks(&self, tasks: &[GeneratedTask]) -> Result<Vec<Uuid>, StoreError>;

    /// Persist a generated meeting for a (user, task) pair.
    async fn save_meeting(
        &self,
        user_id: Uuid,
        task_id: Uuid,
        meeting: &GeneratedMeeting,
    ) -> Result<Uuid, StoreError>;

    async fn update_submission_evaluation(
        &self,
        id: Uuid,
        evaluation: &EvaluationResult,
        status: &str,
    ) -> Result<(), StoreError>;

    async fn update_user_stats(&self, id: Uuid, stats: &UserStats) -> Result<(), StoreError>;

    /// Append text to a meeting's stored summary without overwriting it.
    async fn append_meeting_summary(&self, id: Uuid, text: &str) -> Result<(), StoreError>;

    async fn count_tasks_by_field(&self) -> Result<HashMap<String, i64>, StoreError>;
}
