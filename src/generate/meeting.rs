//! Meeting simulation.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::llm::normalize::parse_structured;
use crate::llm::{ChatMessage, ChatOptions, LlmError, ProviderFactory};
use crate::pacing::Pacer;
use crate::store::{DbTask, DbUser, Store};

/// The fixed set of meeting kinds the platform simulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeetingType {
    Kickoff,
    Standup,
    Review,
    ClientCall,
    General,
}

impl MeetingType {
    /// Generation order for a full task lifecycle.
    pub const SERIES: [MeetingType; 4] = [
        MeetingType::Kickoff,
        MeetingType::Standup,
        MeetingType::Review,
        MeetingType::ClientCall,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Kickoff => "kickoff",
            Self::Standup => "standup",
            Self::Review => "review",
            Self::ClientCall => "client call",
            Self::General => "general",
        }
    }
}

impl std::fmt::Display for MeetingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Someone in the room. Exactly one participant per meeting is the human
/// user; everyone else is synthetic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Participant {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub is_human: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgendaItem {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub duration_minutes: u32,
    #[serde(default)]
    pub presenter: String,
}

/// Follow-up work captured during the meeting. Always starts incomplete,
/// whatever the provider claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionItem {
    #[serde(default)]
    pub id: String,
    pub description: String,
    #[serde(default)]
    pub assignee: String,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub completed: bool,
}

/// A generated meeting with transcript and follow-ups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedMeeting {
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
}

/// Request for one simulated meeting.
#[derive(Debug, Clone)]
pub struct MeetingRequest {
    pub meeting_type: MeetingType,
    pub task_title: String,
    pub task_description: String,
    pub user_name: String,
    pub user_role: String,
}

/// Generates simulated meetings through the content provider.
#[derive(Clone)]
pub struct MeetingGenerator {
    factory: Arc<ProviderFactory>,
    store: Arc<dyn Store>,
    pacer: Arc<Pacer>,
}

impl MeetingGenerator {
    pub fn new(factory: Arc<ProviderFactory>, store: Arc<dyn Store>, pacer: Arc<Pacer>) -> Self {
        Self {
            factory,
            store,
            pacer,
        }
    }

    /// Generate a single meeting.
    ///
    /// On return the meeting satisfies all artifact invariants: exactly one
    /// human participant (the requesting user, prepended if the provider
    /// left them out), non-empty identifiers everywhere, and every action
    /// item incomplete.
    pub async fn generate(&self, request: &MeetingRequest) -> Result<GeneratedMeeting, LlmError> {
        let messages = build_messages(request);
        let provider = self.factory.get().await?;
        let response = provider
            .chat_completion(&messages, ChatOptions::with_temperature(0.7))
            .await?;

        let mut meeting: GeneratedMeeting = parse_structured(&response.content)?;
        finalize(&mut meeting, request);
        Ok(meeting)
    }

    /// Generate and persist the full meeting series for a task, in the
    /// fixed order kickoff, standup, review, client call.
    ///
    /// Each meeting is saved before the next is generated, and calls are
    /// spaced by the shared pacer. A failure on one type is logged and
    /// skipped; the series continues with the remaining types. Returns the
    /// identifiers of the meetings that made it into the store.
    pub async fn generate_series(&self, user: &DbUser, task: &DbTask) -> Vec<Uuid> {
        let mut meeting_ids = Vec::new();

        for meeting_type in MeetingType::SERIES {
            self.pacer.acquire().await;

            let request = MeetingRequest {
                meeting_type,
                task_title: task.title.clone(),
                task_description: task.description.clone(),
                user_name: user.name.clone(),
                user_role: user.role.clone(),
            };

            let meeting = match self.generate(&request).await {
                Ok(meeting) => meeting,
                Err(e) => {
                    tracing::warn!(%meeting_type, "skipping meeting generation: {}", e);
                    continue;
                }
            };

            match self.store.save_meeting(user.id, task.id, &meeting).await {
                Ok(id) => meeting_ids.push(id),
                Err(e) => {
                    tracing::warn!(%meeting_type, "skipping meeting persistence: {}", e);
                }
            }
        }

        meeting_ids
    }
}

fn build_messages(request: &MeetingRequest) -> Vec<ChatMessage> {
    let system = "You simulate workplace meetings for a job-simulation platform. \
                  Respond with JSON only: an object with title, meeting_type, participants \
                  (name, role, is_human), agenda (title, duration_minutes, presenter), \
                  duration_minutes, transcript, summary and action_items \
                  (description, assignee, due_date).";

    let user = format!(
        "Simulate a {} meeting about the task {:?}.\nTask description: {}\n\
         The human participant is {} ({}); everyone else is simulated.",
        request.meeting_type,
        request.task_title,
        request.task_description,
        request.user_name,
        request.user_role,
    );

    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

/// Repair everything the provider is allowed to get wrong.
fn finalize(meeting: &mut GeneratedMeeting, request: &MeetingRequest) {
    meeting.meeting_type = request.meeting_type;

    // Exactly one human participant: the requesting user. Prepend them if
    // the provider left them out; demote any extra human flags.
    let mut human_seen = false;
    for participant in &mut meeting.participants {
        if participant.is_human {
            if human_seen {
                participant.is_human = false;
            }
            human_seen = true;
        }
    }
    if !human_seen {
        meeting.participants.insert(
            0,
            Participant {
                id: Uuid::new_v4().to_string(),
                name: request.user_name.clone(),
                role: request.user_role.clone(),
                is_human: true,
            },
        );
    }

    for participant in &mut meeting.participants {
        if participant.id.trim().is_empty() {
            participant.id = Uuid::new_v4().to_string();
        }
    }
    for item in &mut meeting.agenda {
        if item.id.trim().is_empty() {
            item.id = Uuid::new_v4().to_string();
        }
    }
    for item in &mut meeting.action_items {
        if item.id.trim().is_empty() {
            item.id = Uuid::new_v4().to_string();
        }
        item.completed = false;
    }
}
