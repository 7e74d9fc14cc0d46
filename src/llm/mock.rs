//! Deterministic in-process provider for tests and offline operation.
//!
//! Never performs network I/O. The incoming prompt text is inspected for
//! keyword signals and answered with a canned, internally-consistent
//! payload of the matching shape, after a fixed artificial latency so that
//! asynchronous call sites are exercised without flakiness.
//!
//! The canned payloads deliberately leave some identifiers out, omit the
//! human participant, and mark an action item completed: downstream
//! generators must repair all of that, and these payloads prove they do.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use super::{ChatMessage, ChatOptions, ChatResponse, LlmClient, LlmError, TokenUsage};

const MOCK_LATENCY: Duration = Duration::from_millis(500);

/// Deterministic mock client.
pub struct MockClient {
    latency: Duration,
}

impl MockClient {
    pub fn new() -> Self {
        Self {
            latency: MOCK_LATENCY,
        }
    }

    /// Override the artificial latency (tests that do not care about
    /// async timing use zero).
    pub fn with_latency(latency: Duration) -> Self {
        Self { latency }
    }

    fn respond_to(prompt: &str) -> String {
        let prompt = prompt.to_lowercase();

        if prompt.contains("quick") && prompt.contains("score") {
            return "85".to_string();
        }
        if prompt.contains("evaluat") {
            return canned_evaluation();
        }
        if prompt.contains("meeting") {
            return canned_meeting();
        }
        if prompt.contains("generate") && prompt.contains("task") {
            return canned_tasks();
        }

        "I can generate tasks, simulate meetings, and evaluate submissions.".to_string()
    }
}

impl Default for MockClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmClient for MockClient {
    fn name(&self) -> &str {
        "mock"
    }

    async fn chat_completion(
        &self,
        messages: &[ChatMessage],
        _options: ChatOptions,
    ) -> Result<ChatResponse, LlmError> {
        tokio::time::sleep(self.latency).await;

        let prompt = messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let content = Self::respond_to(&prompt);

        Ok(ChatResponse {
            content,
            usage: Some(TokenUsage::new(
                prompt.len() as u64 / 4,
                64,
            )),
            model: Some("mock".to_string()),
            finish_reason: Some("stop".to_string()),
        })
    }
}

/// Task batch, fenced: real providers often ignore "JSON only", so the
/// mock does too, exercising the normalizer on every generation path.
fn canned_tasks() -> String {
    let payload = json!({
        "tasks": [
            {
                "title": "Build a REST endpoint for customer feedback",
                "description": "The product team wants customers to submit feedback from the dashboard. Design and implement the endpoint backing that form.",
                "instructions": "Define the request schema, implement validation, persist submissions, and document the endpoint for the frontend team.",
                "job_field": "software_engineering",
                "difficulty": "intermediate",
                "estimated_duration": "3 days",
                "skills_required": ["API design", "Testing", "Documentation"],
                "deliverables": [
                    {
                        "title": "Endpoint implementation",
                        "description": "Working endpoint with validation and persistence",
                        "type": "code",
                        "required": true
                    },
                    {
                        "id": "d-2",
                        "title": "API documentation",
                        "description": "Request/response reference for the frontend team",
                        "type": "document",
                        "required": true
                    }
                ],
                "resources": [
                    {
                        "title": "Internal API style guide",
                        "type": "link",
                        "url": "https://intranet.example.com/api-style"
                    }
                ],
                "tags": ["backend", "api"]
            }
        ]
    });
    format!("```json\n{}\n```", payload)
}

/// Meeting without the requesting user and with a pre-completed action
/// item; the generator must repair both.
fn canned_meeting() -> String {
    json!({
        "title": "Project kickoff",
        "meeting_type": "kickoff",
        "duration_minutes": 30,
        "participants": [
            {"name": "Sarah Chen", "role": "Project Manager", "is_human": false},
            {"id": "p-lead", "name": "Marcus Webb", "role": "Tech Lead", "is_human": false}
        ],
        "agenda": [
            {"title": "Scope walkthrough", "duration_minutes": 10, "presenter": "Sarah Chen"},
            {"id": "a-2", "title": "Timeline and milestones", "duration_minutes": 10, "presenter": "Marcus Webb"},
            {"title": "Questions", "duration_minutes": 10, "presenter": "Sarah Chen"}
        ],
        "transcript": "Sarah: Welcome everyone, let's walk through the scope.\nMarcus: The main deliverable is the feedback endpoint.\nSarah: Deadline is end of next week. Any questions?",
        "summary": "Kickoff covering scope, the feedback endpoint deliverable, and the end-of-next-week deadline.",
        "action_items": [
            {"description": "Share the API style guide", "assignee": "Marcus Webb", "completed": true},
            {"description": "Draft the request schema", "assignee": "Sarah Chen", "due_date": "2025-06-10"}
        ]
    })
    .to_string()
}

/// Evaluation whose criterion scores sum exactly to the reported overall,
/// so the validation pass leaves it untouched.
fn canned_evaluation() -> String {
    json!({
        "overall_score": 85,
        "grade": "B",
        "criteria": [
            {"criterion": "Completeness", "weight": 0.3, "score": 25, "max_score": 30,
             "feedback": "All required deliverables are present."},
            {"criterion": "Quality", "weight": 0.25, "score": 22, "max_score": 25,
             "feedback": "Clean structure with minor rough edges."},
            {"criterion": "Requirements adherence", "weight": 0.25, "score": 21, "max_score": 25,
             "feedback": "Matches the instructions closely."},
            {"criterion": "Communication", "weight": 0.2, "score": 17, "max_score": 20,
             "feedback": "Notes are clear and well organized."}
        ],
        "strengths": ["Thorough coverage of requirements", "Clear written communication"],
        "improvement_areas": ["Edge-case handling could go deeper"],
        "detailed_feedback": "A solid submission that satisfies every required deliverable. The main gap is depth on edge cases.",
        "recommendations": ["Add negative-path tests before the next submission"]
    })
    .to_string()
}
