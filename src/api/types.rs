//! Request/response types for the HTTP API.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::workflow::WorkflowError;

/// Standard response envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            message: None,
        })
    }

    pub fn ok_with_message(data: T, message: impl Into<String>) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            message: Some(message.into()),
        })
    }
}

/// One field-level validation failure.
#[derive(Debug, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Error half of the envelope.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub error: String,
    pub fields: Option<Vec<FieldError>>,
}

impl ApiError {
    /// 400 with structured field errors.
    pub fn validation(fields: Vec<FieldError>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: "validation failed".to_string(),
            fields: Some(fields),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            error: message.into(),
            fields: None,
        }
    }

    /// 500; the underlying message is only exposed in dev mode.
    pub fn internal(err: impl std::fmt::Display, dev_mode: bool) -> Self {
        let error = if dev_mode {
            err.to_string()
        } else {
            "internal server error".to_string()
        };
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error,
            fields: None,
        }
    }

    /// Map a workflow failure onto the HTTP taxonomy.
    pub fn from_workflow(err: WorkflowError, dev_mode: bool) -> Self {
        if err.is_not_found() {
            Self::not_found(err.to_string())
        } else {
            Self::internal(err, dev_mode)
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorBody {
            success: bool,
            error: String,
            #[serde(skip_serializing_if = "Option::is_none")]
            fields: Option<Vec<FieldError>>,
        }

        let body = ErrorBody {
            success: false,
            error: self.error,
            fields: self.fields,
        };
        (self.status, Json(body)).into_response()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Request bodies
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct GenerateTasksRequest {
    pub job_field: String,
    pub difficulty: String,
    #[serde(default = "one")]
    pub count: usize,
    #[serde(default)]
    pub skills: Option<Vec<String>>,
    #[serde(default)]
    pub context: Option<String>,
}

fn one() -> usize {
    1
}

#[derive(Debug, Deserialize)]
pub struct WorkflowKeyRequest {
    pub user_id: Uuid,
    pub task_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct CompleteTaskRequest {
    pub user_id: Uuid,
    pub task_id: Uuid,
    pub submission_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct BatchEvaluateRequest {
    pub submission_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct QuickScoreRequest {
    pub content: String,
    pub criteria: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateSettingsRequest {
    pub provider: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Response bodies
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub provider: String,
    pub dev_mode: bool,
}

#[derive(Debug, Serialize)]
pub struct GeneratedTasksResponse {
    pub task_ids: Vec<Uuid>,
    pub tasks: Vec<crate::generate::GeneratedTask>,
}

#[derive(Debug, Serialize)]
pub struct QuickScoreResponse {
    pub score: i64,
}
