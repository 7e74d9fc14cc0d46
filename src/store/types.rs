//! Row types for the backing store.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::generate::meeting::{ActionItem, AgendaItem, Participant};
use crate::generate::{Deliverable, MeetingType, TaskResource};

/// A task stored in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbTask {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub instructions: String,
    #[serde(default)]
    pub job_field: String,
    #[serde(default)]
    pub difficulty: String,
    #[serde(default)]
    pub estimated_duration: Option<String>,
    #[serde(default)]
    pub skills_required: Vec<String>,
    #[serde(default)]
    pub deliverables: Vec<Deliverable>,
    #[serde(default)]
    pub resources: Vec<TaskResource>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// A platform user with aggregate performance statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbUser {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub total_score: i64,
    #[serde(default)]
    pub completed_tasks: i64,
    #[serde(default)]
    pub average_score: f64,
}

/// Aggregate statistics written back after a submission evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStats {
    pub total_score: i64,
    pub completed_tasks: i64,
    pub average_score: f64,
}

/// A submission row joined with its parent task and submitting user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbSubmission {
    pub id: Uuid,
    pub content: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub status: String,
    pub task: DbTask,
    pub user: DbUser,
    #[serde(default)]
    pub submitted_at: Option<String>,
}

/// A meeting stored in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbMeeting {
    pub id: Uuid,
    pub user_id: Uuid,
    pub task_id: Uuid,
    pub title: String,
    pub meeting_type: MeetingType,
    #[serde(default)]
    pub participants: Vec<Participant>,
    #[serde(default)]
    pub agenda: Vec<AgendaItem>,
    #[serde(default)]
    pub duration_minutes: u32,
    #[serde(default)]
    pub transcript: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub action_items: Vec<ActionItem>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Per-(user, task) workflow state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStatus {
    NotStarted,
    InProgress,
    Completed,
    Abandoned,
}

impl LifecycleStatus {
    /// Completed and abandoned runs accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Abandoned)
    }
}

impl std::fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Abandoned => "abandoned",
        };
        write!(f, "{}", s)
    }
}

/// Lifecycle record keyed by (user, task).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbLifecycle {
    pub user_id: Uuid,
    pub task_id: Uuid,
    pub status: LifecycleStatus,
    pub deadline: DateTime<Utc>,
    #[serde(default)]
    pub meeting_ids: Vec<Uuid>,
    #[serde(default)]
    pub submission_ids: Vec<Uuid>,
    /// Per-meeting evaluation scores, filled in as evaluations complete.
    #[serde(default)]
    pub meeting_scores: HashMap<Uuid, i64>,
    #[serde(default)]
    pub final_score: Option<i64>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}
