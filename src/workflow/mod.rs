//! Task workflow orchestration.
//!
//! Sequences the full per-(user, task) lifecycle:
//! start (deadline + meeting series) -> await submission -> evaluate
//! submission -> evaluate meetings -> aggregate a final weighted score.
//!
//! State machine: `not_started -> in_progress -> completed`, with the side
//! transition `in_progress -> abandoned`.
//!
//! Two concurrent runs for the same (user, task) pair are not serialized
//! here; the lifecycle upsert is keyed per pair in the store, but a double
//! start can double-generate meetings.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::generate::MeetingGenerator;
use crate::llm::normalize::parse_structured;
use crate::llm::{ChatMessage, ChatOptions, LlmError, ProviderFactory};
use crate::pacing::Pacer;
use crate::scoring::{approval_status, EvaluationRequest, EvaluationResult, LetterGrade, ScoringEngine};
use crate::store::{DbLifecycle, DbUser, LifecycleStatus, Store, StoreError, UserStats};

/// Weighting of the final aggregate: submission quality dominates.
const SUBMISSION_WEIGHT: f64 = 0.7;
const MEETING_WEIGHT: f64 = 0.3;

/// Workflow failures. `Store(NotFound)` and provider errors are fatal to
/// the step that hit them; series/batch callers catch and exclude instead.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Provider(#[from] LlmError),
}

impl WorkflowError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_not_found())
    }
}

/// Result of starting a task.
#[derive(Debug, Clone, Serialize)]
pub struct StartOutcome {
    pub deadline: DateTime<Utc>,
    /// Meetings that were generated and persisted; failed types are absent.
    pub meeting_ids: Vec<Uuid>,
}

/// Result of completing a task.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionOutcome {
    pub submission_score: i64,
    /// Average over successfully evaluated meetings; absent when none
    /// succeeded.
    pub meeting_average: Option<f64>,
    pub final_score: i64,
}

/// Meeting-performance evaluation shape.
///
/// Meetings have no deliverables, so this bypasses the rubric-based
/// scoring path; the aliases accept the richer evaluation shape some
/// providers return for any "evaluate" request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingPerformance {
    #[serde(alias = "overall_score")]
    pub score: i64,
    #[serde(default)]
    pub grade: Option<LetterGrade>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default, alias = "improvement_areas")]
    pub improvements: Vec<String>,
    #[serde(default, alias = "detailed_feedback")]
    pub feedback: String,
}

/// Sequences the task lifecycle over the generators, scoring engine and
/// store.
pub struct Orchestrator {
    store: Arc<dyn Store>,
    factory: Arc<ProviderFactory>,
    scoring: ScoringEngine,
    meetings: MeetingGenerator,
    pacer: Arc<Pacer>,
    default_deadline_days: i64,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn Store>,
        factory: Arc<ProviderFactory>,
        scoring: ScoringEngine,
        meetings: MeetingGenerator,
        pacer: Arc<Pacer>,
        default_deadline_days: i64,
    ) -> Self {
        Self {
            store,
            factory,
            scoring,
            meetings,
            pacer,
            default_deadline_days,
        }
    }

    /// Start a task for a user.
    ///
    /// Computes the deadline from the task's estimated duration, upserts
    /// the lifecycle row keyed by (user, task) (re-starting updates the
    /// existing row rather than duplicating it), then generates the fixed
    /// four-meeting series. Returns the deadline and the meetings that
    /// succeeded.
    pub async fn start_task(
        &self,
        user_id: Uuid,
        task_id: Uuid,
    ) -> Result<StartOutcome, WorkflowError> {
        let task = self.store.get_task(task_id).await?;
        let user = self.store.get_user(user_id).await?;

        let days = deadline_days(task.estimated_duration.as_deref(), self.default_deadline_days);
        let deadline = Utc::now() + chrono::Duration::days(days);

        let mut lifecycle = match self.store.get_lifecycle(user_id, task_id).await? {
            Some(mut existing) => {
                existing.status = LifecycleStatus::InProgress;
                existing.deadline = deadline;
                existing
            }
            None => DbLifecycle {
                user_id,
                task_id,
                status: LifecycleStatus::InProgress,
                deadline,
                meeting_ids: Vec::new(),
                submission_ids: Vec::new(),
                meeting_scores: HashMap::new(),
                final_score: None,
                started_at: Some(Utc::now()),
                completed_at: None,
            },
        };
        self.store.upsert_lifecycle(&lifecycle).await?;

        tracing::info!(%user_id, %task_id, days, "task started; generating meeting series");
        let meeting_ids = self.meetings.generate_series(&user, &task).await;

        lifecycle.meeting_ids.extend(meeting_ids.iter().copied());
        self.store.upsert_lifecycle(&lifecycle).await?;

        Ok(StartOutcome {
            deadline,
            meeting_ids,
        })
    }

    /// Evaluate a submission, persist the outcome, and update the
    /// submitting user's aggregate statistics.
    pub async fn evaluate_submission(
        &self,
        submission_id: Uuid,
    ) -> Result<EvaluationResult, WorkflowError> {
        let submission = self.store.get_submission(submission_id).await?;
        let request = EvaluationRequest::from_submission(&submission);
        let result = self.scoring.evaluate(&request).await?;

        let status = approval_status(result.overall_score);
        self.store
            .update_submission_evaluation(submission_id, &result, status)
            .await?;

        let stats = absorb_score(&submission.user, result.overall_score);
        self.store
            .update_user_stats(submission.user.id, &stats)
            .await?;

        tracing::info!(
            %submission_id,
            score = result.overall_score,
            status,
            "submission evaluated"
        );
        Ok(result)
    }

    /// Evaluate the human participant's performance in one meeting.
    ///
    /// The evaluation text is appended to the meeting's stored summary,
    /// never overwriting it.
    pub async fn evaluate_meeting_performance(
        &self,
        meeting_id: Uuid,
    ) -> Result<MeetingPerformance, WorkflowError> {
        let meeting = self.store.get_meeting(meeting_id).await?;

        let messages = vec![
            ChatMessage::system(
                "You evaluate a participant's meeting performance across five criteria: \
                 preparation, participation, clarity, follow-through, professionalism. \
                 Respond with JSON only: {\"score\": 0-100, \"grade\": \"A\"-\"F\", \
                 \"strengths\": [], \"improvements\": [], \"feedback\": \"\"}.",
            ),
            ChatMessage::user(format!(
                "Evaluate the human participant's performance in this {} meeting.\n\n\
                 Transcript:\n{}\n\nSummary:\n{}",
                meeting.meeting_type, meeting.transcript, meeting.summary,
            )),
        ];

        let provider = self.factory.get().await?;
        let response = provider
            .chat_completion(&messages, ChatOptions::with_temperature(0.3))
            .await?;

        let mut performance: MeetingPerformance = parse_structured(&response.content)?;
        performance.score = performance.score.clamp(0, 100);
        let grade = performance
            .grade
            .unwrap_or_else(|| LetterGrade::from_score(performance.score));
        performance.grade = Some(grade);

        let note = format!(
            "Performance evaluation: {}/100 ({}). {}",
            performance.score, grade, performance.feedback
        );
        self.store.append_meeting_summary(meeting_id, &note).await?;

        Ok(performance)
    }

    /// Complete a task: evaluate the submission (load-bearing, fatal on
    /// failure), evaluate every associated meeting (failures excluded from
    /// the average), aggregate the weighted final score, and transition
    /// the lifecycle to completed.
    pub async fn complete_task(
        &self,
        user_id: Uuid,
        task_id: Uuid,
        submission_id: Uuid,
    ) -> Result<CompletionOutcome, WorkflowError> {
        let submission_result = self.evaluate_submission(submission_id).await?;

        let mut lifecycle = self
            .store
            .get_lifecycle(user_id, task_id)
            .await?
            .ok_or_else(|| {
                StoreError::not_found("task_lifecycle", format!("{}/{}", user_id, task_id))
            })?;

        let mut meeting_scores: HashMap<Uuid, i64> = HashMap::new();
        for meeting_id in lifecycle.meeting_ids.clone() {
            self.pacer.acquire().await;
            match self.evaluate_meeting_performance(meeting_id).await {
                Ok(performance) => {
                    meeting_scores.insert(meeting_id, performance.score);
                }
                Err(e) => {
                    tracing::warn!(
                        meeting = %meeting_id,
                        "excluding meeting from final aggregate: {}", e
                    );
                }
            }
        }

        let meeting_average = if meeting_scores.is_empty() {
            None
        } else {
            let sum: i64 = meeting_scores.values().sum();
            Some(sum as f64 / meeting_scores.len() as f64)
        };
        let final_score = aggregate_final_score(submission_result.overall_score, meeting_average);

        if !lifecycle.submission_ids.contains(&submission_id) {
            lifecycle.submission_ids.push(submission_id);
        }
        lifecycle.meeting_scores.extend(meeting_scores);
        lifecycle.status = LifecycleStatus::Completed;
        lifecycle.final_score = Some(final_score);
        lifecycle.completed_at = Some(Utc::now());
        self.store.upsert_lifecycle(&lifecycle).await?;

        tracing::info!(%user_id, %task_id, final_score, "task completed");
        Ok(CompletionOutcome {
            submission_score: submission_result.overall_score,
            meeting_average,
            final_score,
        })
    }

    /// Abandon an in-progress task.
    pub async fn abandon_task(&self, user_id: Uuid, task_id: Uuid) -> Result<(), WorkflowError> {
        let mut lifecycle = self
            .store
            .get_lifecycle(user_id, task_id)
            .await?
            .ok_or_else(|| {
                StoreError::not_found("task_lifecycle", format!("{}/{}", user_id, task_id))
            })?;

        if lifecycle.status.is_terminal() {
            tracing::warn!(%user_id, %task_id, status = %lifecycle.status, "ignoring abandon of terminal lifecycle");
            return Ok(());
        }

        lifecycle.status = LifecycleStatus::Abandoned;
        self.store.upsert_lifecycle(&lifecycle).await?;
        Ok(())
    }
}

/// Weighted aggregate of submission and meeting performance. With no
/// successfully evaluated meetings the submission score stands alone.
fn aggregate_final_score(submission_score: i64, meeting_average: Option<f64>) -> i64 {
    match meeting_average {
        Some(average) => {
            (submission_score as f64 * SUBMISSION_WEIGHT + average * MEETING_WEIGHT).round() as i64
        }
        None => submission_score,
    }
}

/// Fold a new submission score into a user's aggregate statistics.
fn absorb_score(user: &DbUser, score: i64) -> UserStats {
    let total_score = user.total_score + score;
    let completed_tasks = user.completed_tasks + 1;
    let average_score =
        ((total_score as f64 / completed_tasks as f64) * 100.0).round() / 100.0;
    UserStats {
        total_score,
        completed_tasks,
        average_score,
    }
}

/// Extract a deadline in days from an estimated-duration string.
///
/// A leading integer plus a unit token (`day`, `week`, `hour`) is
/// recognized anywhere in the text; weeks convert at 7 days, hours round
/// up to full days with a minimum of one. Anything unparseable falls back
/// to the configured default.
fn deadline_days(estimated_duration: Option<&str>, default_days: i64) -> i64 {
    static DURATION_RE: OnceLock<Regex> = OnceLock::new();
    let re = DURATION_RE
        .get_or_init(|| Regex::new(r"(?i)(\d+)\s*(day|week|hour)").expect("valid duration regex"));

    let Some(text) = estimated_duration else {
        return default_days;
    };
    let Some(captures) = re.captures(text) else {
        return default_days;
    };

    let value: i64 = match captures[1].parse() {
        Ok(v) if v > 0 => v,
        _ => return default_days,
    };

    match captures[2].to_lowercase().as_str() {
        "week" => value * 7,
        "hour" => ((value + 23) / 24).max(1),
        _ => value,
    }
}
