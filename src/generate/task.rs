//! Task generation.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::llm::normalize::parse_structured;
use crate::llm::{ChatMessage, ChatOptions, LlmError, ProviderFactory};

/// A concrete work product the user is expected to hand in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deliverable {
    /// Backfilled with a fresh UUID when the provider omits it.
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default)]
    pub deliverable_type: String,
    #[serde(default)]
    pub required: bool,
}

/// Supporting material attached to a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResource {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(rename = "type", default)]
    pub resource_type: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// A generated workplace task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedTask {
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
}

/// Request for a batch of tasks.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskRequest {
    pub job_field: String,
    pub difficulty: String,
    #[serde(default = "default_count")]
    pub count: usize,
    /// Explicit skills; defaults to the per-field catalog.
    #[serde(default)]
    pub skills: Option<Vec<String>>,
    /// Free-text context folded into the prompt.
    #[serde(default)]
    pub context: Option<String>,
}

fn default_count() -> usize {
    1
}

/// Provider output arrives in one of three shapes; all coerce to a list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TaskBatch {
    List(Vec<GeneratedTask>),
    Wrapped { tasks: Vec<GeneratedTask> },
    Single(GeneratedTask),
}

impl TaskBatch {
    fn into_tasks(self) -> Vec<GeneratedTask> {
        match self {
            Self::List(tasks) => tasks,
            Self::Wrapped { tasks } => tasks,
            Self::Single(task) => vec![task],
        }
    }
}

/// Default skill catalog per job field; the first five seed the prompt
/// when the request does not name skills explicitly.
fn field_skills(job_field: &str) -> &'static [&'static str] {
    match job_field {
        "software_engineering" => &[
            "API design",
            "Code review",
            "Testing",
            "Debugging",
            "Version control",
            "CI/CD",
        ],
        "data_science" => &[
            "Data cleaning",
            "Statistical analysis",
            "Visualization",
            "SQL",
            "Experiment design",
            "Reporting",
        ],
        "marketing" => &[
            "Copywriting",
            "Campaign planning",
            "Audience research",
            "Analytics",
            "A/B testing",
        ],
        "design" => &[
            "Wireframing",
            "Prototyping",
            "User research",
            "Visual hierarchy",
            "Design systems",
        ],
        "project_management" => &[
            "Scheduling",
            "Risk management",
            "Stakeholder communication",
            "Scope definition",
            "Retrospectives",
        ],
        _ => &[
            "Communication",
            "Time management",
            "Problem solving",
            "Collaboration",
            "Documentation",
        ],
    }
}

/// Generates workplace tasks through the content provider.
#[derive(Clone)]
pub struct TaskGenerator {
    factory: Arc<ProviderFactory>,
    max_tasks: usize,
}

impl TaskGenerator {
    pub fn new(factory: Arc<ProviderFactory>, max_tasks: usize) -> Self {
        Self { factory, max_tasks }
    }

    /// Generate tasks for a request.
    ///
    /// The requested count is clamped to the configured maximum. Every
    /// deliverable and resource carries a non-empty identifier on return,
    /// whether or not the provider supplied one.
    pub async fn generate(&self, request: &TaskRequest) -> Result<Vec<GeneratedTask>, LlmError> {
        let count = self.clamped_count(request.count);
        let skills = match &request.skills {
            Some(skills) if !skills.is_empty() => skills.clone(),
            _ => field_skills(&request.job_field)
                .iter()
                .take(5)
                .map(|s| s.to_string())
                .collect(),
        };

        let messages = build_messages(request, count, &skills);
        let provider = self.factory.get().await?;
        let response = provider
            .chat_completion(&messages, ChatOptions::with_temperature(0.7))
            .await?;

        let batch: TaskBatch = parse_structured(&response.content)?;
        let mut tasks = batch.into_tasks();
        for task in &mut tasks {
            backfill_ids(task);
        }

        tracing::info!(
            job_field = %request.job_field,
            count = tasks.len(),
            "generated tasks"
        );
        Ok(tasks)
    }

    fn clamped_count(&self, requested: usize) -> usize {
        requested.clamp(1, self.max_tasks)
    }
}

fn build_messages(request: &TaskRequest, count: usize, skills: &[String]) -> Vec<ChatMessage> {
    let system = "You generate realistic workplace tasks for a job-simulation platform. \
                  Respond with JSON only: an object {\"tasks\": [...]} where each task has \
                  title, description, instructions, job_field, difficulty, estimated_duration, \
                  skills_required, deliverables (title, description, type, required), \
                  resources (title, type, url) and tags.";

    let mut user = format!(
        "Generate {count} workplace task(s) for the {} field at {} difficulty. \
         Target these skills: {}.",
        request.job_field,
        request.difficulty,
        skills.join(", ")
    );
    if let Some(context) = request.context.as_deref().filter(|c| !c.trim().is_empty()) {
        user.push_str("\nAdditional context: ");
        user.push_str(context);
    }

    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

fn backfill_ids(task: &mut GeneratedTask) {
    for deliverable in &mut task.deliverables {
        if deliverable.id.trim().is_empty() {
            deliverable.id = Uuid::new_v4().to_string();
        }
    }
    for resource in &mut task.resources {
        if resource.id.trim().is_empty() {
            resource.id = Uuid::new_v4().to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::SettingsStore;
    use crate::Config;

    async fn generator(max_tasks: usize) -> (TaskGenerator, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let settings = Arc::new(SettingsStore::new(&dir.path().to_path_buf()).await);
        let factory = Arc::new(ProviderFactory::new(Config::default(), settings));
        (TaskGenerator::new(factory, max_tasks), dir)
    }

    fn request(count: usize) -> TaskRequest {
        TaskRequest {
            job_field: "software_engineering".to_string(),
            difficulty: "intermediate".to_string(),
            count,
            skills: None,
            context: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn generated_tasks_have_all_identifiers_backfilled() {
        let (generator, _dir) = generator(5).await;
        let tasks = generator.generate(&request(1)).await.unwrap();
        assert!(!tasks.is_empty());
        for task in &tasks {
            assert!(!task.deliverables.is_empty());
            for deliverable in &task.deliverables {
                assert!(!deliverable.id.trim().is_empty());
            }
            for resource in &task.resources {
                assert!(!resource.id.trim().is_empty());
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn provider_supplied_ids_are_preserved() {
        let (generator, _dir) = generator(5).await;
        let tasks = generator.generate(&request(1)).await.unwrap();
        // The mock's second deliverable ships with an explicit id.
        let ids: Vec<&str> = tasks[0].deliverables.iter().map(|d| d.id.as_str()).collect();
        assert!(ids.contains(&"d-2"));
    }

    #[test]
    fn batch_accepts_bare_array() {
        let raw = r#"[{"title": "A", "description": "d"}]"#;
        let batch: TaskBatch = serde_json::from_str(raw).unwrap();
        assert_eq!(batch.into_tasks().len(), 1);
    }

    #[test]
    fn batch_accepts_wrapped_object() {
        let raw = r#"{"tasks": [{"title": "A", "description": "d"}, {"title": "B", "description": "d"}]}"#;
        let batch: TaskBatch = serde_json::from_str(raw).unwrap();
        assert_eq!(batch.into_tasks().len(), 2);
    }

    #[test]
    fn batch_accepts_single_object() {
        let raw = r#"{"title": "A", "description": "d"}"#;
        let batch: TaskBatch = serde_json::from_str(raw).unwrap();
        let tasks = batch.into_tasks();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].title, "A");
    }

    #[test]
    fn batch_rejects_garbage() {
        assert!(serde_json::from_str::<TaskBatch>("42").is_err());
    }

    #[test]
    fn default_skills_take_first_five_of_catalog() {
        let skills = field_skills("software_engineering");
        assert!(skills.len() >= 5);
        let unknown = field_skills("basket_weaving");
        assert_eq!(unknown.len(), 5);
    }

    #[tokio::test]
    async fn count_is_clamped_to_configured_maximum() {
        let (generator, _dir) = generator(3).await;
        assert_eq!(generator.clamped_count(12), 3);
        assert_eq!(generator.clamped_count(0), 1);
        assert_eq!(generator.clamped_count(2), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_skills_flow_into_the_prompt() {
        let request = TaskRequest {
            skills: Some(vec!["Kubernetes".to_string()]),
            ..request(1)
        };
        let messages = build_messages(&request, 1, request.skills.as_ref().unwrap());
        assert!(messages[1].content.contains("Kubernetes"));
        // Keyword signals the mock relies on.
        let prompt = messages
            .iter()
            .map(|m| m.content.to_lowercase())
            .collect::<String>();
        assert!(prompt.contains("generate") && prompt.contains("task"));
    }
}
