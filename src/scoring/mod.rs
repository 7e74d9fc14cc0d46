//! Submission scoring.
//!
//! Turns untrusted, semi-structured evaluation output into a bounded
//! scoring model. Structurally valid but out-of-range results are
//! repaired (clamped, reconciled) rather than rejected; malformed results
//! are surfaced as errors, never defaulted.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::llm::normalize::parse_structured;
use crate::llm::{ChatMessage, ChatOptions, LlmError, ProviderFactory};
use crate::pacing::Pacer;
use crate::store::{DbSubmission, Store};

/// Submission content beyond this many characters is not sent for a quick
/// score.
const QUICK_SCORE_MAX_CHARS: usize = 2000;

/// A submission scoring at least this much is approved.
pub const APPROVAL_THRESHOLD: i64 = 60;

/// Letter grade derived from an overall score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LetterGrade {
    A,
    B,
    C,
    D,
    F,
}

impl LetterGrade {
    /// Threshold table: >=90 A, >=80 B, >=70 C, >=60 D, else F.
    pub fn from_score(score: i64) -> Self {
        match score {
            s if s >= 90 => Self::A,
            s if s >= 80 => Self::B,
            s if s >= 70 => Self::C,
            s if s >= 60 => Self::D,
            _ => Self::F,
        }
    }
}

impl std::fmt::Display for LetterGrade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::F => "F",
        };
        write!(f, "{}", s)
    }
}

/// One weighted sub-score of an evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriterionScore {
    pub criterion: String,
    #[serde(default)]
    pub weight: f64,
    pub score: i64,
    pub max_score: i64,
    #[serde(default)]
    pub feedback: String,
}

/// A validated, bounded evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Always within [0, 100].
    pub overall_score: i64,
    pub grade: LetterGrade,
    pub criteria: Vec<CriterionScore>,
    pub strengths: Vec<String>,
    pub improvement_areas: Vec<String>,
    pub detailed_feedback: String,
    pub recommendations: Vec<String>,
}

/// Evaluation output as the provider reported it, before validation.
#[derive(Debug, Deserialize)]
struct RawEvaluation {
    #[serde(default)]
    overall_score: i64,
    #[serde(default)]
    grade: Option<LetterGrade>,
    #[serde(default)]
    criteria: Vec<CriterionScore>,
    #[serde(default)]
    strengths: Vec<String>,
    #[serde(default)]
    improvement_areas: Vec<String>,
    #[serde(default)]
    detailed_feedback: String,
    #[serde(default)]
    recommendations: Vec<String>,
}

/// What the engine needs to know to evaluate a submission.
#[derive(Debug, Clone)]
pub struct EvaluationRequest {
    pub task_title: String,
    pub task_description: String,
    pub instructions: String,
    pub deliverables: Vec<crate::generate::Deliverable>,
    pub skills_required: Vec<String>,
    pub submission_content: String,
    pub notes: Option<String>,
}

impl EvaluationRequest {
    pub fn from_submission(submission: &DbSubmission) -> Self {
        Self {
            task_title: submission.task.title.clone(),
            task_description: submission.task.description.clone(),
            instructions: submission.task.instructions.clone(),
            deliverables: submission.task.deliverables.clone(),
            skills_required: submission.task.skills_required.clone(),
            submission_content: submission.content.clone(),
            notes: submission.notes.clone(),
        }
    }
}

/// Outcome status persisted with an evaluation.
pub fn approval_status(score: i64) -> &'static str {
    if score >= APPROVAL_THRESHOLD {
        "approved"
    } else {
        "rejected"
    }
}

/// Evaluates submissions through the content provider.
#[derive(Clone)]
pub struct ScoringEngine {
    factory: Arc<ProviderFactory>,
    store: Arc<dyn Store>,
    pacer: Arc<Pacer>,
    tolerance: i64,
}

impl ScoringEngine {
    pub fn new(
        factory: Arc<ProviderFactory>,
        store: Arc<dyn Store>,
        pacer: Arc<Pacer>,
        tolerance: i64,
    ) -> Self {
        Self {
            factory,
            store,
            pacer,
            tolerance,
        }
    }

    /// Evaluate one submission against its task rubric.
    ///
    /// Runs at a lower temperature than content generation, then validates:
    /// every criterion score is clamped into [0, max_score], and when the
    /// reported overall diverges from the verified criterion sum by more
    /// than the tolerance, the overall score and grade are recomputed from
    /// the sum. The model's self-reported total is never trusted blindly.
    pub async fn evaluate(&self, request: &EvaluationRequest) -> Result<EvaluationResult, LlmError> {
        let messages = build_evaluation_messages(request);
        let provider = self.factory.get().await?;
        let response = provider
            .chat_completion(&messages, ChatOptions::with_temperature(0.3))
            .await?;

        let raw: RawEvaluation = parse_structured(&response.content)?;
        Ok(validate(raw, self.tolerance))
    }

    /// Cheap single-number scoring of bounded content.
    pub async fn quick_score(&self, content: &str, criteria: &str) -> Result<i64, LlmError> {
        let truncated = truncate_chars(content, QUICK_SCORE_MAX_CHARS);
        let messages = vec![
            ChatMessage::system(
                "You are a strict grader. Reply with a single integer from 0 to 100 and nothing else.",
            ),
            ChatMessage::user(format!(
                "Provide a quick score for the following content against these criteria: {}\n\n{}",
                criteria, truncated
            )),
        ];

        let provider = self.factory.get().await?;
        let response = provider
            .chat_completion(&messages, ChatOptions::with_temperature(0.1))
            .await?;

        let score = parse_leading_int(&response.content).ok_or_else(|| {
            LlmError::malformed(format!(
                "quick score reply contained no integer: {:?}",
                response.content.chars().take(80).collect::<String>()
            ))
        })?;
        Ok(score.clamp(0, 100))
    }

    /// Evaluate a batch of submissions sequentially.
    ///
    /// Calls are spaced by the shared pacer; one submission's failure is
    /// logged and excluded from the result map, never aborting the batch.
    /// Each successful evaluation is persisted against its submission.
    pub async fn batch_evaluate(
        &self,
        submission_ids: &[Uuid],
    ) -> HashMap<Uuid, EvaluationResult> {
        let mut results = HashMap::new();

        for &id in submission_ids {
            self.pacer.acquire().await;
            match self.evaluate_one(id).await {
                Ok(result) => {
                    results.insert(id, result);
                }
                Err(e) => {
                    tracing::warn!(submission = %id, "excluding submission from batch: {}", e);
                }
            }
        }

        results
    }

    async fn evaluate_one(&self, id: Uuid) -> anyhow::Result<EvaluationResult> {
        let submission = self.store.get_submission(id).await?;
        let request = EvaluationRequest::from_submission(&submission);
        let result = self.evaluate(&request).await?;
        self.store
            .update_submission_evaluation(id, &result, approval_status(result.overall_score))
            .await?;
        Ok(result)
    }
}

fn build_evaluation_messages(request: &EvaluationRequest) -> Vec<ChatMessage> {
    let system = "You evaluate workplace task submissions. Respond with JSON only: \
                  {\"overall_score\": 0-100, \"grade\": \"A\"-\"F\", \"criteria\": \
                  [{\"criterion\", \"weight\", \"score\", \"max_score\", \"feedback\"}], \
                  \"strengths\": [], \"improvement_areas\": [], \"detailed_feedback\": \"\", \
                  \"recommendations\": []}. Criterion scores must sum to the overall score.";

    let deliverables = request
        .deliverables
        .iter()
        .map(|d| format!("- {}: {}", d.title, d.description))
        .collect::<Vec<_>>()
        .join("\n");

    let mut user = format!(
        "Evaluate this submission.\n\nTask: {}\nDescription: {}\nInstructions: {}\n\
         Expected deliverables:\n{}\nSkills being assessed: {}\n\nSubmission:\n{}",
        request.task_title,
        request.task_description,
        request.instructions,
        deliverables,
        request.skills_required.join(", "),
        request.submission_content,
    );
    if let Some(notes) = request.notes.as_deref().filter(|n| !n.trim().is_empty()) {
        user.push_str("\n\nSubmitter notes: ");
        user.push_str(notes);
    }

    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

/// Validation pass: clamp, reconcile, regrade.
fn validate(raw: RawEvaluation, tolerance: i64) -> EvaluationResult {
    let mut criteria = raw.criteria;
    for criterion in &mut criteria {
        criterion.max_score = criterion.max_score.max(0);
        let clamped = criterion.score.clamp(0, criterion.max_score);
        if clamped != criterion.score {
            tracing::warn!(
                criterion = %criterion.criterion,
                reported = criterion.score,
                max = criterion.max_score,
                "clamping out-of-range criterion score"
            );
            criterion.score = clamped;
        }
    }

    let mut overall = raw.overall_score.clamp(0, 100);
    let mut reconciled = false;
    if !criteria.is_empty() {
        let verified: i64 = criteria.iter().map(|c| c.score).sum();
        if (verified - raw.overall_score).abs() > tolerance {
            tracing::warn!(
                reported = raw.overall_score,
                verified,
                "overall score diverges from criterion sum; recomputing"
            );
            overall = verified.clamp(0, 100);
            reconciled = true;
        }
    }

    let grade = if reconciled {
        LetterGrade::from_score(overall)
    } else {
        raw.grade.unwrap_or_else(|| LetterGrade::from_score(overall))
    };

    EvaluationResult {
        overall_score: overall,
        grade,
        criteria,
        strengths: raw.strengths,
        improvement_areas: raw.improvement_areas,
        detailed_feedback: raw.detailed_feedback,
        recommendations: raw.recommendations,
    }
}

/// First integer appearing in the text, sign included.
fn parse_leading_int(text: &str) -> Option<i64> {
    let trimmed = text.trim();
    if let Ok(value) = trimmed.parse::<i64>() {
        return Some(value);
    }

    let bytes = trimmed.as_bytes();
    let mut start = None;
    for (i, b) in bytes.iter().enumerate() {
        if b.is_ascii_digit() {
            start = Some(if i > 0 && bytes[i - 1] == b'-' { i - 1 } else { i });
            break;
        }
    }
    let start = start?;
    let end = bytes[start..]
        .iter()
        .position(|b| !(b.is_ascii_digit() || *b == b'-'))
        .map(|offset| start + offset)
        .unwrap_or(bytes.len());
    trimmed[start..end].parse().ok()
}

/// Truncate on a char boundary.
fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::SettingsStore;
    use crate::store::memory::MemoryStore;
    use crate::Config;
    use std::time::Duration;

    fn raw(overall: i64, scores: &[(i64, i64)]) -> RawEvaluation {
        RawEvaluation {
            overall_score: overall,
            grade: None,
            criteria: scores
                .iter()
                .map(|&(score, max_score)| CriterionScore {
                    criterion: "c".to_string(),
                    weight: 0.25,
                    score,
                    max_score,
                    feedback: String::new(),
                })
                .collect(),
            strengths: vec![],
            improvement_areas: vec![],
            detailed_feedback: String::new(),
            recommendations: vec![],
        }
    }

    async fn engine(store: Arc<MemoryStore>) -> (ScoringEngine, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let settings = Arc::new(SettingsStore::new(&dir.path().to_path_buf()).await);
        let factory = Arc::new(ProviderFactory::new(Config::default(), settings));
        let pacer = Arc::new(Pacer::new(Duration::from_millis(1500)));
        (ScoringEngine::new(factory, store, pacer, 5), dir)
    }

    #[test]
    fn grade_thresholds_match_the_table() {
        assert_eq!(LetterGrade::from_score(95), LetterGrade::A);
        assert_eq!(LetterGrade::from_score(90), LetterGrade::A);
        assert_eq!(LetterGrade::from_score(89), LetterGrade::B);
        assert_eq!(LetterGrade::from_score(80), LetterGrade::B);
        assert_eq!(LetterGrade::from_score(70), LetterGrade::C);
        assert_eq!(LetterGrade::from_score(60), LetterGrade::D);
        assert_eq!(LetterGrade::from_score(59), LetterGrade::F);
        assert_eq!(LetterGrade::from_score(0), LetterGrade::F);
    }

    #[test]
    fn criterion_scores_are_clamped_to_their_max() {
        let result = validate(raw(80, &[(40, 30), (-5, 30), (25, 25)]), 5);
        assert_eq!(result.criteria[0].score, 30);
        assert_eq!(result.criteria[1].score, 0);
        assert_eq!(result.criteria[2].score, 25);
    }

    #[test]
    fn divergent_overall_is_recomputed_from_the_verified_sum() {
        // Criteria sum to 55, reported overall is 85: divergence 30 > 5.
        let result = validate(raw(85, &[(25, 30), (30, 40)]), 5);
        assert_eq!(result.overall_score, 55);
        assert_eq!(result.grade, LetterGrade::F);
    }

    #[test]
    fn overall_within_tolerance_is_kept() {
        let result = validate(raw(83, &[(40, 50), (40, 50)]), 5);
        assert_eq!(result.overall_score, 83);
        assert_eq!(result.grade, LetterGrade::B);
    }

    #[test]
    fn tolerance_boundary_is_inclusive() {
        // Divergence of exactly 5 does not trigger reconciliation.
        let result = validate(raw(85, &[(40, 50), (40, 50)]), 5);
        assert_eq!(result.overall_score, 85);
        // Divergence of 6 does.
        let result = validate(raw(86, &[(40, 50), (40, 50)]), 5);
        assert_eq!(result.overall_score, 80);
    }

    #[test]
    fn missing_criteria_keeps_reported_overall_clamped() {
        let result = validate(raw(150, &[]), 5);
        assert_eq!(result.overall_score, 100);
        assert_eq!(result.grade, LetterGrade::A);
    }

    #[test]
    fn parse_leading_int_handles_prose_and_signs() {
        assert_eq!(parse_leading_int("85"), Some(85));
        assert_eq!(parse_leading_int(" 92 "), Some(92));
        assert_eq!(parse_leading_int("Score: 73/100"), Some(73));
        assert_eq!(parse_leading_int("-5"), Some(-5));
        assert_eq!(parse_leading_int("no number here"), None);
    }

    #[test]
    fn quick_score_clamping_bounds() {
        assert_eq!(parse_leading_int("150").map(|s| s.clamp(0, 100)), Some(100));
        assert_eq!(parse_leading_int("-5").map(|s| s.clamp(0, 100)), Some(0));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let text = "héllo".repeat(1000);
        let truncated = truncate_chars(&text, 2000);
        assert_eq!(truncated.chars().count(), 2000);
    }

    #[tokio::test(start_paused = true)]
    async fn evaluate_via_mock_provider_is_consistent() {
        let store = Arc::new(MemoryStore::new());
        let (engine, _dir) = engine(store).await;
        let request = EvaluationRequest {
            task_title: "T".to_string(),
            task_description: "d".to_string(),
            instructions: "i".to_string(),
            deliverables: vec![],
            skills_required: vec!["API design".to_string()],
            submission_content: "my work".to_string(),
            notes: None,
        };
        let result = engine.evaluate(&request).await.unwrap();
        assert_eq!(result.overall_score, 85);
        assert_eq!(result.grade, LetterGrade::B);
        let sum: i64 = result.criteria.iter().map(|c| c.score).sum();
        assert_eq!(sum, result.overall_score);
    }

    #[tokio::test(start_paused = true)]
    async fn quick_score_via_mock_provider() {
        let store = Arc::new(MemoryStore::new());
        let (engine, _dir) = engine(store).await;
        let score = engine.quick_score("content", "clarity").await.unwrap();
        assert_eq!(score, 85);
    }

    #[tokio::test(start_paused = true)]
    async fn batch_excludes_missing_submissions_without_aborting() {
        let store = Arc::new(MemoryStore::new());
        let user = MemoryStore::sample_user();
        let task = MemoryStore::sample_task();
        store.insert_user(user.clone());
        store.insert_task(task.clone());

        let first = MemoryStore::sample_submission(&task, &user);
        let second = MemoryStore::sample_submission(&task, &user);
        store.insert_submission(first.clone());
        store.insert_submission(second.clone());
        let missing = Uuid::new_v4();

        let (engine, _dir) = engine(Arc::clone(&store)).await;
        let results = engine
            .batch_evaluate(&[first.id, missing, second.id])
            .await;

        assert_eq!(results.len(), 2);
        assert!(results.contains_key(&first.id));
        assert!(results.contains_key(&second.id));
        assert!(!results.contains_key(&missing));

        // Successful evaluations were persisted with an outcome status.
        let (_, status) = store.recorded_evaluation(first.id).unwrap();
        assert_eq!(status, "approved");
    }

    #[test]
    fn approval_threshold() {
        assert_eq!(approval_status(60), "approved");
        assert_eq!(approval_status(59), "rejected");
    }
}
