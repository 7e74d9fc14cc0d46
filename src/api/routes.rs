//! HTTP route handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post, put},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::config::{Config, KNOWN_PROVIDERS};
use crate::generate::{MeetingGenerator, TaskGenerator, TaskRequest};
use crate::llm::ProviderFactory;
use crate::pacing::Pacer;
use crate::scoring::ScoringEngine;
use crate::settings::{SettingsStore, SharedSettingsStore};
use crate::store::{Store, SupabaseStore};
use crate::workflow::Orchestrator;

use super::types::*;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub factory: Arc<ProviderFactory>,
    pub store: Arc<dyn Store>,
    pub orchestrator: Orchestrator,
    pub tasks: TaskGenerator,
    pub scoring: ScoringEngine,
    pub settings: SharedSettingsStore,
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let settings: SharedSettingsStore =
        Arc::new(SettingsStore::new(&config.working_dir).await);
    let factory = Arc::new(ProviderFactory::new(config.clone(), Arc::clone(&settings)));
    let store: Arc<dyn Store> = Arc::new(SupabaseStore::new(
        &config.supabase_url,
        &config.supabase_service_role_key,
    ));
    let pacer = Arc::new(Pacer::new(config.call_interval));

    let tasks = TaskGenerator::new(Arc::clone(&factory), config.max_tasks_per_request);
    let meetings = MeetingGenerator::new(
        Arc::clone(&factory),
        Arc::clone(&store),
        Arc::clone(&pacer),
    );
    let scoring = ScoringEngine::new(
        Arc::clone(&factory),
        Arc::clone(&store),
        Arc::clone(&pacer),
        config.score_tolerance,
    );
    let orchestrator = Orchestrator::new(
        Arc::clone(&store),
        Arc::clone(&factory),
        scoring.clone(),
        meetings,
        Arc::clone(&pacer),
        config.default_deadline_days,
    );

    let state = Arc::new(AppState {
        config: config.clone(),
        factory,
        store,
        orchestrator,
        tasks,
        scoring,
        settings,
    });

    let app = Router::new()
        .route("/api/health", get(health))
        .route("/api/tasks/generate", post(generate_tasks))
        .route("/api/tasks/field-counts", get(field_counts))
        .route("/api/workflow/start", post(start_workflow))
        .route("/api/workflow/complete", post(complete_workflow))
        .route("/api/workflow/abandon", post(abandon_workflow))
        .route("/api/submissions/:id/evaluate", post(evaluate_submission))
        .route("/api/meetings/:id/evaluate", post(evaluate_meeting))
        .route("/api/evaluations/batch", post(batch_evaluate))
        .route("/api/evaluations/quick", post(quick_score))
        .route("/api/settings", get(get_settings))
        .route("/api/settings", put(update_settings))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::clone(&state));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

/// Health check endpoint.
async fn health(State(state): State<Arc<AppState>>) -> Json<ApiResponse<HealthResponse>> {
    ApiResponse::ok(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        provider: state.config.provider.clone(),
        dev_mode: state.config.dev_mode,
    })
}

/// POST /api/tasks/generate - Generate and persist a batch of tasks.
async fn generate_tasks(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateTasksRequest>,
) -> Result<Json<ApiResponse<GeneratedTasksResponse>>, ApiError> {
    let mut fields = Vec::new();
    if req.job_field.trim().is_empty() {
        fields.push(FieldError::new("job_field", "must not be empty"));
    }
    if req.difficulty.trim().is_empty() {
        fields.push(FieldError::new("difficulty", "must not be empty"));
    }
    if req.count == 0 {
        fields.push(FieldError::new("count", "must be at least 1"));
    }
    if !fields.is_empty() {
        return Err(ApiError::validation(fields));
    }

    let request = TaskRequest {
        job_field: req.job_field,
        difficulty: req.difficulty,
        count: req.count,
        skills: req.skills,
        context: req.context,
    };

    let tasks = state
        .tasks
        .generate(&request)
        .await
        .map_err(|e| ApiError::internal(e, state.config.dev_mode))?;
    let task_ids = state
        .store
        .save_tasks(&tasks)
        .await
        .map_err(|e| ApiError::internal(e, state.config.dev_mode))?;

    Ok(ApiResponse::ok_with_message(
        GeneratedTasksResponse { task_ids, tasks },
        "tasks generated",
    ))
}

/// GET /api/tasks/field-counts - Count stored tasks per job field.
async fn field_counts(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ApiResponse<std::collections::HashMap<String, i64>>>, ApiError> {
    let counts = state
        .store
        .count_tasks_by_field()
        .await
        .map_err(|e| ApiError::internal(e, state.config.dev_mode))?;
    Ok(ApiResponse::ok(counts))
}

/// POST /api/workflow/start - Start a task for a user.
async fn start_workflow(
    State(state): State<Arc<AppState>>,
    Json(req): Json<WorkflowKeyRequest>,
) -> Result<Json<ApiResponse<crate::workflow::StartOutcome>>, ApiError> {
    let outcome = state
        .orchestrator
        .start_task(req.user_id, req.task_id)
        .await
        .map_err(|e| ApiError::from_workflow(e, state.config.dev_mode))?;
    Ok(ApiResponse::ok_with_message(outcome, "task started"))
}

/// POST /api/workflow/complete - Evaluate and close out a task.
async fn complete_workflow(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CompleteTaskRequest>,
) -> Result<Json<ApiResponse<crate::workflow::CompletionOutcome>>, ApiError> {
    let outcome = state
        .orchestrator
        .complete_task(req.user_id, req.task_id, req.submission_id)
        .await
        .map_err(|e| ApiError::from_workflow(e, state.config.dev_mode))?;
    Ok(ApiResponse::ok_with_message(outcome, "task completed"))
}

/// POST /api/workflow/abandon - Abandon an in-progress task.
async fn abandon_workflow(
    State(state): State<Arc<AppState>>,
    Json(req): Json<WorkflowKeyRequest>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state
        .orchestrator
        .abandon_task(req.user_id, req.task_id)
        .await
        .map_err(|e| ApiError::from_workflow(e, state.config.dev_mode))?;
    Ok(ApiResponse::ok_with_message((), "task abandoned"))
}

/// POST /api/submissions/:id/evaluate - Evaluate one submission.
async fn evaluate_submission(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<crate::scoring::EvaluationResult>>, ApiError> {
    let result = state
        .orchestrator
        .evaluate_submission(id)
        .await
        .map_err(|e| ApiError::from_workflow(e, state.config.dev_mode))?;
    Ok(ApiResponse::ok(result))
}

/// POST /api/meetings/:id/evaluate - Evaluate meeting performance.
async fn evaluate_meeting(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<crate::workflow::MeetingPerformance>>, ApiError> {
    let performance = state
        .orchestrator
        .evaluate_meeting_performance(id)
        .await
        .map_err(|e| ApiError::from_workflow(e, state.config.dev_mode))?;
    Ok(ApiResponse::ok(performance))
}

/// POST /api/evaluations/batch - Evaluate submissions sequentially.
async fn batch_evaluate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BatchEvaluateRequest>,
) -> Result<
    Json<ApiResponse<std::collections::HashMap<Uuid, crate::scoring::EvaluationResult>>>,
    ApiError,
> {
    if req.submission_ids.is_empty() {
        return Err(ApiError::validation(vec![FieldError::new(
            "submission_ids",
            "must not be empty",
        )]));
    }

    let results = state.scoring.batch_evaluate(&req.submission_ids).await;
    let message = format!(
        "evaluated {} of {} submissions",
        results.len(),
        req.submission_ids.len()
    );
    Ok(ApiResponse::ok_with_message(results, message))
}

/// POST /api/evaluations/quick - Single-number scoring of bounded content.
async fn quick_score(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QuickScoreRequest>,
) -> Result<Json<ApiResponse<QuickScoreResponse>>, ApiError> {
    if req.content.trim().is_empty() {
        return Err(ApiError::validation(vec![FieldError::new(
            "content",
            "must not be empty",
        )]));
    }

    let score = state
        .scoring
        .quick_score(&req.content, &req.criteria)
        .await
        .map_err(|e| ApiError::internal(e, state.config.dev_mode))?;
    Ok(ApiResponse::ok(QuickScoreResponse { score }))
}

/// GET /api/settings - Current runtime settings.
async fn get_settings(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<crate::settings::Settings>> {
    ApiResponse::ok(state.settings.get().await)
}

/// PUT /api/settings - Update runtime settings and re-resolve the provider.
async fn update_settings(
    State(state): State<Arc<AppState>>,
    Json(req): Json<UpdateSettingsRequest>,
) -> Result<Json<ApiResponse<crate::settings::Settings>>, ApiError> {
    if let Some(provider) = req.provider.as_deref() {
        if !KNOWN_PROVIDERS.contains(&provider) {
            return Err(ApiError::validation(vec![FieldError::new(
                "provider",
                format!("unknown provider {provider:?}"),
            )]));
        }
    }

    state
        .settings
        .set_provider(req.provider)
        .await
        .map_err(|e| ApiError::internal(e, state.config.dev_mode))?;
    state.factory.reset().await;

    Ok(ApiResponse::ok_with_message(
        state.settings.get().await,
        "settings updated; provider will re-resolve on next use",
    ))
}
