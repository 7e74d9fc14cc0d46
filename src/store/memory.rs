//! In-memory store used by tests.
//!
//! Behaves like the PostgREST-backed store for the operations the
//! orchestrator and generators exercise, with knobs for injecting
//! failures into specific rows.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use crate::generate::{GeneratedMeeting, GeneratedTask, MeetingType};
use crate::scoring::EvaluationResult;

use super::types::{DbLifecycle, DbMeeting, DbSubmission, DbTask, DbUser, UserStats};
use super::{Store, StoreError};

#[derive(Default)]
struct Inner {
    tasks: HashMap<Uuid, DbTask>,
    users: HashMap<Uuid, DbUser>,
    meetings: HashMap<Uuid, DbMeeting>,
    submissions: HashMap<Uuid, DbSubmission>,
    lifecycles: HashMap<(Uuid, Uuid), DbLifecycle>,
    evaluations: HashMap<Uuid, (EvaluationResult, String)>,
    stats: HashMap<Uuid, UserStats>,
    fail_meeting_types: HashSet<MeetingType>,
    saved_meeting_order: Vec<MeetingType>,
}

pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn insert_task(&self, task: DbTask) {
        self.inner.lock().unwrap().tasks.insert(task.id, task);
    }

    pub fn insert_user(&self, user: DbUser) {
        self.inner.lock().unwrap().users.insert(user.id, user);
    }

    pub fn insert_meeting(&self, meeting: DbMeeting) {
        self.inner.lock().unwrap().meetings.insert(meeting.id, meeting);
    }

    pub fn insert_submission(&self, submission: DbSubmission) {
        self.inner
            .lock()
            .unwrap()
            .submissions
            .insert(submission.id, submission);
    }

    /// Make `save_meeting` fail for one meeting type.
    pub fn fail_meeting_saves_for(&self, meeting_type: MeetingType) {
        self.inner
            .lock()
            .unwrap()
            .fail_meeting_types
            .insert(meeting_type);
    }

    /// Types persisted so far, in save order.
    pub fn meeting_types_saved(&self) -> Vec<MeetingType> {
        self.inner.lock().unwrap().saved_meeting_order.clone()
    }

    pub fn recorded_evaluation(&self, submission_id: Uuid) -> Option<(EvaluationResult, String)> {
        self.inner
            .lock()
            .unwrap()
            .evaluations
            .get(&submission_id)
            .cloned()
    }

    pub fn recorded_stats(&self, user_id: Uuid) -> Option<UserStats> {
        self.inner.lock().unwrap().stats.get(&user_id).cloned()
    }

    pub fn meeting_summary(&self, meeting_id: Uuid) -> Option<String> {
        self.inner
            .lock()
            .unwrap()
            .meetings
            .get(&meeting_id)
            .map(|m| m.summary.clone())
    }

    pub fn sample_user() -> DbUser {
        DbUser {
            id: Uuid::new_v4(),
            name: "Alex Rivera".to_string(),
            role: "Backend Engineer".to_string(),
            total_score: 160,
            completed_tasks: 2,
            average_score: 80.0,
        }
    }

    pub fn sample_task() -> DbTask {
        DbTask {
            id: Uuid::new_v4(),
            title: "Build a REST endpoint".to_string(),
            description: "Customer feedback endpoint".to_string(),
            instructions: "Implement and document the endpoint".to_string(),
            job_field: "software_engineering".to_string(),
            difficulty: "intermediate".to_string(),
            estimated_duration: Some("3 days".to_string()),
            skills_required: vec!["API design".to_string()],
            deliverables: vec![],
            resources: vec![],
            tags: vec![],
            created_at: None,
        }
    }

    pub fn sample_submission(task: &DbTask, user: &DbUser) -> DbSubmission {
        DbSubmission {
            id: Uuid::new_v4(),
            content: "Here is my implementation and documentation.".to_string(),
            notes: None,
            status: "submitted".to_string(),
            task: task.clone(),
            user: user.clone(),
            submitted_at: None,
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get_task(&self, id: Uuid) -> Result<DbTask, StoreError> {
        self.inner
            .lock()
            .unwrap()
            .tasks
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("task", id))
    }

    async fn get_submission(&self, id: Uuid) -> Result<DbSubmission, StoreError> {
        self.inner
            .lock()
            .unwrap()
            .submissions
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("submission", id))
    }

    async fn get_user(&self, id: Uuid) -> Result<DbUser, StoreError> {
        self.inner
            .lock()
            .unwrap()
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("user", id))
    }

    async fn get_meeting(&self, id: Uuid) -> Result<DbMeeting, StoreError> {
        self.inner
            .lock()
            .unwrap()
            .meetings
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("meeting", id))
    }

    async fn get_lifecycle(
        &self,
        user_id: Uuid,
        task_id: Uuid,
    ) -> Result<Option<DbLifecycle>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .lifecycles
            .get(&(user_id, task_id))
            .cloned())
    }

    async fn upsert_lifecycle(&self, state: &DbLifecycle) -> Result<(), StoreError> {
        self.inner
            .lock()
            .unwrap()
            .lifecycles
            .insert((state.user_id, state.task_id), state.clone());
        Ok(())
    }

    async fn save_tasks(&self, tasks: &[GeneratedTask]) -> Result<Vec<Uuid>, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let mut ids = Vec::with_capacity(tasks.len());
        for task in tasks {
            let id = Uuid::new_v4();
            inner.tasks.insert(
                id,
                DbTask {
                    id,
                    title: task.title.clone(),
                    description: task.description.clone(),
                    instructions: task.instructions.clone(),
                    job_field: task.job_field.clone(),
                    difficulty: task.difficulty.clone(),
                    estimated_duration: task.estimated_duration.clone(),
                    skills_required: task.skills_required.clone(),
                    deliverables: task.deliverables.clone(),
                    resources: task.resources.clone(),
                    tags: task.tags.clone(),
                    created_at: None,
                },
            );
            ids.push(id);
        }
        Ok(ids)
    }

    async fn save_meeting(
        &self,
        user_id: Uuid,
        task_id: Uuid,
        meeting: &GeneratedMeeting,
    ) -> Result<Uuid, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_meeting_types.contains(&meeting.meeting_type) {
            return Err(StoreError::Request(format!(
                "injected failure saving {} meeting",
                meeting.meeting_type
            )));
        }

        let id = Uuid::new_v4();
        inner.saved_meeting_order.push(meeting.meeting_type);
        inner.meetings.insert(
            id,
            DbMeeting {
                id,
                user_id,
                task_id,
                title: meeting.title.clone(),
                meeting_type: meeting.meeting_type,
                participants: meeting.participants.clone(),
                agenda: meeting.agenda.clone(),
                duration_minutes: meeting.duration_minutes,
                transcript: meeting.transcript.clone(),
                summary: meeting.summary.clone(),
                action_items: meeting.action_items.clone(),
                created_at: None,
            },
        );
        Ok(id)
    }

    async fn update_submission_evaluation(
        &self,
        id: Uuid,
        evaluation: &EvaluationResult,
        status: &str,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.submissions.contains_key(&id) {
            return Err(StoreError::not_found("submission", id));
        }
        if let Some(submission) = inner.submissions.get_mut(&id) {
            submission.status = status.to_string();
        }
        inner
            .evaluations
            .insert(id, (evaluation.clone(), status.to_string()));
        Ok(())
    }

    async fn update_user_stats(&self, id: Uuid, stats: &UserStats) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(user) = inner.users.get_mut(&id) {
            user.total_score = stats.total_score;
            user.completed_tasks = stats.completed_tasks;
            user.average_score = stats.average_score;
        }
        inner.stats.insert(id, stats.clone());
        Ok(())
    }

    async fn append_meeting_summary(&self, id: Uuid, text: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let meeting = inner
            .meetings
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("meeting", id))?;
        if meeting.summary.trim().is_empty() {
            meeting.summary = text.to_string();
        } else {
            meeting.summary = format!("{}\n\n{}", meeting.summary, text);
        }
        Ok(())
    }

    async fn count_tasks_by_field(&self) -> Result<HashMap<String, i64>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut counts = HashMap::new();
        for task in inner.tasks.values() {
            *counts.entry(task.job_field.clone()).or_insert(0) += 1;
        }
        Ok(counts)
    }
}
