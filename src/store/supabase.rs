//! Supabase client for the PostgREST API.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::generate::{GeneratedMeeting, GeneratedTask};
use crate::scoring::EvaluationResult;

use super::types::{DbLifecycle, DbMeeting, DbSubmission, DbTask, DbUser, UserStats};
use super::{Store, StoreError};

/// Store implementation over Supabase's PostgREST endpoint.
pub struct SupabaseStore {
    client: Client,
    url: String,
    service_role_key: String,
}

impl SupabaseStore {
    /// Create a new Supabase store client.
    pub fn new(url: &str, service_role_key: &str) -> Self {
        Self {
            client: Client::new(),
            url: url.trim_end_matches('/').to_string(),
            service_role_key: service_role_key.to_string(),
        }
    }

    /// Get the PostgREST URL.
    fn rest_url(&self) -> String {
        format!("{}/rest/v1", self.url)
    }

    /// Build a request with the auth headers every PostgREST call needs.
    fn request(&self, method: Method, path_and_query: &str) -> RequestBuilder {
        self.client
            .request(method, format!("{}/{}", self.rest_url(), path_and_query))
            .header("apikey", &self.service_role_key)
            .header(
                "Authorization",
                format!("Bearer {}", self.service_role_key),
            )
            .header("Content-Type", "application/json")
    }

    /// Send a request, bail on non-2xx, decode the JSON body.
    async fn fetch<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, StoreError> {
        let resp = builder.send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            return Err(StoreError::Request(format!("{} - {}", status, text)));
        }

        serde_json::from_str(&text).map_err(|e| StoreError::Decode(format!("{}: {}", e, text)))
    }

    /// Send a request, bail on non-2xx, discard the body.
    async fn execute(&self, builder: RequestBuilder) -> Result<(), StoreError> {
        let resp = builder.send().await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await?;
            return Err(StoreError::Request(format!("{} - {}", status, text)));
        }
        Ok(())
    }

    /// Fetch rows and take the first, mapping an empty set to `NotFound`.
    async fn fetch_one<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
        entity: &'static str,
        id: impl ToString,
    ) -> Result<T, StoreError> {
        let rows: Vec<T> = self.fetch(builder).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| StoreError::not_found(entity, id.to_string()))
    }
}

#[async_trait]
impl Store for SupabaseStore {
    async fn get_task(&self, id: Uuid) -> Result<DbTask, StoreError> {
        let builder = self.request(Method::GET, &format!("tasks?id=eq.{}", id));
        self.fetch_one(builder, "task", id).await
    }

    async fn get_submission(&self, id: Uuid) -> Result<DbSubmission, StoreError> {
        let builder = self.request(
            Method::GET,
            &format!("submissions?id=eq.{}&select=*,task:tasks(*),user:users(*)", id),
        );
        self.fetch_one(builder, "submission", id).await
    }

    async fn get_user(&self, id: Uuid) -> Result<DbUser, StoreError> {
        let builder = self.request(Method::GET, &format!("users?id=eq.{}", id));
        self.fetch_one(builder, "user", id).await
    }

    async fn get_meeting(&self, id: Uuid) -> Result<DbMeeting, StoreError> {
        let builder = self.request(Method::GET, &format!("meetings?id=eq.{}", id));
        self.fetch_one(builder, "meeting", id).await
    }

    async fn get_lifecycle(
        &self,
        user_id: Uuid,
        task_id: Uuid,
    ) -> Result<Option<DbLifecycle>, StoreError> {
        let builder = self.request(
            Method::GET,
            &format!("task_lifecycles?user_id=eq.{}&task_id=eq.{}", user_id, task_id),
        );
        let rows: Vec<DbLifecycle> = self.fetch(builder).await?;
        Ok(rows.into_iter().next())
    }

    async fn upsert_lifecycle(&self, state: &DbLifecycle) -> Result<(), StoreError> {
        let builder = self
            .request(
                Method::POST,
                "task_lifecycles?on_conflict=user_id,task_id",
            )
            .header("Prefer", "resolution=merge-duplicates")
            .json(state);
        self.execute(builder).await
    }

    async fn save_tasks(&self, tasks: &[GeneratedTask]) -> Result<Vec<Uuid>, StoreError> {
        let builder = self
            .request(Method::POST, "tasks")
            .header("Prefer", "return=representation")
            .json(tasks);
        let rows: Vec<DbTask> = self.fetch(builder).await?;
        Ok(rows.into_iter().map(|t| t.id).collect())
    }

    async fn save_meeting(
        &self,
        user_id: Uuid,
        task_id: Uuid,
        meeting: &GeneratedMeeting,
    ) -> Result<Uuid, StoreError> {
        let mut row = serde_json::to_value(meeting)
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        if let Some(obj) = row.as_object_mut() {
            obj.insert("user_id".to_string(), serde_json::json!(user_id));
            obj.insert("task_id".to_string(), serde_json::json!(task_id));
        }

        let builder = self
            .request(Method::POST, "meetings")
            .header("Prefer", "return=representation")
            .json(&row);
        let rows: Vec<DbMeeting> = self.fetch(builder).await?;
        rows.into_iter()
            .next()
            .map(|m| m.id)
            .ok_or_else(|| StoreError::Decode("no meeting returned".to_string()))
    }

    async fn update_submission_evaluation(
        &self,
        id: Uuid,
        evaluation: &EvaluationResult,
        status: &str,
    ) -> Result<(), StoreError> {
        let body = serde_json::json!({
            "evaluation": evaluation,
            "score": evaluation.overall_score,
            "status": status,
        });
        let builder = self
            .request(Method::PATCH, &format!("submissions?id=eq.{}", id))
            .json(&body);
        self.execute(builder).await
    }

    async fn update_user_stats(&self, id: Uuid, stats: &UserStats) -> Result<(), StoreError> {
        let builder = self
            .request(Method::PATCH, &format!("users?id=eq.{}", id))
            .json(stats);
        self.execute(builder).await
    }

    async fn append_meeting_summary(&self, id: Uuid, text: &str) -> Result<(), StoreError> {
        // PostgREST has no string-append; read-modify-write the summary.
        let meeting = self.get_meeting(id).await?;
        let summary = if meeting.summary.trim().is_empty() {
            text.to_string()
        } else {
            format!("{}\n\n{}", meeting.summary, text)
        };

        let body = serde_json::json!({ "summary": summary });
        let builder = self
            .request(Method::PATCH, &format!("meetings?id=eq.{}", id))
            .json(&body);
        self.execute(builder).await
    }

    async fn count_tasks_by_field(&self) -> Result<HashMap<String, i64>, StoreError> {
        #[derive(serde::Deserialize)]
        struct FieldRow {
            #[serde(default)]
            job_field: String,
        }

        let builder = self.request(Method::GET, "tasks?select=job_field");
        let rows: Vec<FieldRow> = self.fetch(builder).await?;

        let mut counts = HashMap::new();
        for row in rows {
            *counts.entry(row.job_field).or_insert(0) += 1;
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rest_url_trims_trailing_slash() {
        let store = SupabaseStore::new("https://proj.supabase.co/", "key");
        assert_eq!(store.rest_url(), "https://proj.supabase.co/rest/v1");
    }

    #[test]
    fn generated_task_serializes_to_a_postgrest_row() {
        let task = GeneratedTask {
            title: "T".to_string(),
            description: "d".to_string(),
            instructions: "i".to_string(),
            job_field: "design".to_string(),
            difficulty: "entry".to_string(),
            estimated_duration: Some("2 weeks".to_string()),
            skills_required: vec!["Wireframing".to_string()],
            deliverables: vec![],
            resources: vec![],
            tags: vec![],
        };
        let row = serde_json::to_value(&task).unwrap();
        assert_eq!(row["job_field"], "design");
        assert_eq!(row["estimated_duration"], "2 weeks");
        // Inserts must not carry an id; the database assigns it.
        assert!(row.get("id").is_none());
    }

    #[test]
    fn meeting_row_carries_owner_keys() {
        let meeting = GeneratedMeeting {
            title: "Kickoff".to_string(),
            meeting_type: crate::generate::MeetingType::Kickoff,
            participants: vec![],
            agenda: vec![],
            duration_minutes: 30,
            transcript: String::new(),
            summary: String::new(),
            action_items: vec![],
        };
        let user_id = Uuid::new_v4();
        let task_id = Uuid::new_v4();
        let mut row = serde_json::to_value(&meeting).unwrap();
        row.as_object_mut().unwrap().insert(
            "user_id".to_string(),
            serde_json::json!(user_id),
        );
        row.as_object_mut().unwrap().insert(
            "task_id".to_string(),
            serde_json::json!(task_id),
        );
        assert_eq!(row["meeting_type"], "kickoff");
        assert_eq!(row["user_id"], serde_json::json!(user_id));
    }
}
