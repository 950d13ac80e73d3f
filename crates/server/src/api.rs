//! # Dashboard API
//!
//! JSON endpoints a dashboard drives the crew through. Failures answer
//! with the recorded [`AppError`] as the body.
//!
//! The crew runs one operation at a time. Status and the last run are
//! served from a snapshot, so they answer while a cycle is in progress;
//! crew operations arriving meanwhile get `409 Conflict`.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use devteam_core::config::Settings;
use devteam_core::crew::{CycleResult, DevTeamCrew, PipelineRun};
use devteam_core::errors::{AppError, ErrorCategory, ErrorStore, ErrorSummary, Severity};
use devteam_core::guard::{guarded, ClassifiedError};
use devteam_core::tools::{CodeAnalysisTool, ToolCapability, ToolOutput};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{Mutex, MutexGuard, RwLock};

/// What the read-only endpoints report about the crew
#[derive(Debug, Clone, Default)]
struct CrewSnapshot {
    language: Option<String>,
    last_run: Option<PipelineRun>,
}

impl CrewSnapshot {
    fn of(crew: Option<&DevTeamCrew>) -> Self {
        Self {
            language: crew.map(|c| c.language().to_string()),
            last_run: crew.and_then(|c| c.last_run().cloned()),
        }
    }
}

pub struct AppState {
    settings: Settings,
    store: ErrorStore,
    crew: Mutex<Option<DevTeamCrew>>,
    snapshot: RwLock<CrewSnapshot>,
    /// Why the crew could not be built, if it could not
    crew_error: Option<AppError>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    /// Build the crew from settings. A crew that fails to build leaves the
    /// error and analysis endpoints working.
    pub fn new(settings: Settings, store: ErrorStore) -> Self {
        let built = DevTeamCrew::builder_from_settings(&settings)
            .with_store(store.clone())
            .build();
        let (crew, crew_error) = match built {
            Ok(crew) => (Some(crew), None),
            Err(e) => {
                tracing::warn!("Crew unavailable: {}", e);
                (None, Some(e.into_record()))
            }
        };
        Self {
            settings,
            store,
            snapshot: RwLock::new(CrewSnapshot::of(crew.as_ref())),
            crew: Mutex::new(crew),
            crew_error,
        }
    }

    pub fn with_crew(settings: Settings, store: ErrorStore, crew: Option<DevTeamCrew>) -> Self {
        Self {
            settings,
            store,
            snapshot: RwLock::new(CrewSnapshot::of(crew.as_ref())),
            crew: Mutex::new(crew),
            crew_error: None,
        }
    }

    /// Exclusive access to the crew, or `409` while another operation holds it
    fn claim_crew(&self) -> Result<MutexGuard<'_, Option<DevTeamCrew>>, ApiError> {
        self.crew.try_lock().map_err(|_| ApiError::busy(self))
    }

    async fn refresh_snapshot(&self, crew: &DevTeamCrew) {
        *self.snapshot.write().await = CrewSnapshot::of(Some(crew));
    }
}

pub fn router(state: SharedState) -> Router {
    let api = Router::new()
        .route("/status", get(get_status))
        .route("/crew/cycle", post(run_cycle))
        .route("/crew/review", post(run_review))
        .route("/crew/language", patch(set_language))
        .route("/analyze", post(analyze))
        .route("/errors", get(list_errors).delete(clear_errors))
        .route("/errors/summary", get(error_summary))
        .route("/runs/last", get(last_run));

    Router::new().nest("/api/v1", api).with_state(state)
}

pub async fn serve(state: SharedState, port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Dashboard API listening");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    record: AppError,
}

impl ApiError {
    fn unavailable(state: &AppState) -> Self {
        let record = state.crew_error.clone().unwrap_or_else(|| {
            state.store.create_error(
                "crew unavailable: no language model binding",
                ErrorCategory::Configuration,
                Severity::Error,
                None,
                None,
                None,
            )
        });
        Self {
            status: StatusCode::SERVICE_UNAVAILABLE,
            record,
        }
    }

    fn busy(state: &AppState) -> Self {
        let record = state.store.create_error(
            "crew busy: another crew operation is in progress",
            ErrorCategory::Orchestration,
            Severity::Warning,
            None,
            None,
            None,
        );
        Self {
            status: StatusCode::CONFLICT,
            record,
        }
    }
}

impl From<ClassifiedError> for ApiError {
    fn from(err: ClassifiedError) -> Self {
        let status = match err.category() {
            ErrorCategory::Validation => StatusCode::BAD_REQUEST,
            ErrorCategory::Authentication => StatusCode::UNAUTHORIZED,
            ErrorCategory::LanguageModel
            | ErrorCategory::Network
            | ErrorCategory::Api
            | ErrorCategory::SourceControl => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            record: err.into_record(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.record)).into_response()
    }
}

// ============================================================================
// Handlers
// ============================================================================

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub crew_ready: bool,
    /// A crew operation is running
    pub crew_busy: bool,
    pub language: String,
    pub provider: String,
    pub model: String,
    pub github_repository: Option<String>,
    pub errors: ErrorSummary,
    pub has_critical_errors: bool,
}

pub async fn get_status(State(state): State<SharedState>) -> Json<StatusResponse> {
    let crew_busy = state.crew.try_lock().is_err();
    let snapshot = state.snapshot.read().await;
    let github = &state.settings.github;
    Json(StatusResponse {
        crew_ready: snapshot.language.is_some(),
        crew_busy,
        language: snapshot
            .language
            .clone()
            .unwrap_or_else(|| state.settings.language.clone()),
        provider: state.settings.llm.provider.to_string(),
        model: state.settings.llm.model.clone(),
        github_repository: github
            .owner
            .as_ref()
            .zip(github.repo.as_ref())
            .map(|(o, r)| format!("{}/{}", o, r)),
        errors: state.store.summary(),
        has_critical_errors: state.store.has_critical_errors(),
    })
}

#[derive(Debug, Deserialize)]
pub struct CycleRequest {
    pub requirements: String,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub constraints: Option<String>,
}

pub async fn run_cycle(
    State(state): State<SharedState>,
    Json(req): Json<CycleRequest>,
) -> Result<Json<CycleResult>, ApiError> {
    let mut guard = state.claim_crew()?;
    let crew = guard.as_mut().ok_or_else(|| ApiError::unavailable(&state))?;
    let outcome = crew
        .run_full_cycle(
            &req.requirements,
            req.context.as_deref(),
            req.constraints.as_deref(),
        )
        .await;
    state.refresh_snapshot(crew).await;
    Ok(Json(outcome?))
}

#[derive(Debug, Deserialize)]
pub struct ReviewRequest {
    pub code: String,
    #[serde(default)]
    pub specifications: Option<String>,
}

pub async fn run_review(
    State(state): State<SharedState>,
    Json(req): Json<ReviewRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let guard = state.claim_crew()?;
    let crew = guard.as_ref().ok_or_else(|| ApiError::unavailable(&state))?;
    let review = crew
        .run_code_review(&req.code, req.specifications.as_deref())
        .await?;
    Ok(Json(json!({ "review": review })))
}

#[derive(Debug, Deserialize)]
pub struct LanguageRequest {
    pub language: String,
}

pub async fn set_language(
    State(state): State<SharedState>,
    Json(req): Json<LanguageRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut guard = state.claim_crew()?;
    let crew = guard.as_mut().ok_or_else(|| ApiError::unavailable(&state))?;
    crew.set_language(&req.language)?;
    state.refresh_snapshot(crew).await;
    Ok(Json(json!({ "language": crew.language() })))
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub code: String,
    #[serde(default)]
    pub language: Option<String>,
    /// quality, security, performance or all
    #[serde(default, rename = "type")]
    pub analysis_type: Option<String>,
    /// text or json
    #[serde(default)]
    pub format: Option<String>,
}

pub async fn analyze(
    State(state): State<SharedState>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<ToolOutput>, ApiError> {
    let language = req
        .language
        .unwrap_or_else(|| state.settings.language.clone());
    let params = json!({
        "code": req.code,
        "language": language,
        "format": req.format.unwrap_or_else(|| "json".to_string()),
    });
    let action = req.analysis_type.unwrap_or_else(|| "all".to_string());
    let tool = CodeAnalysisTool::new();
    let output = guarded(&state.store, "api.analyze", tool.run(&action, &params)).await?;
    Ok(Json(output))
}

pub async fn list_errors(State(state): State<SharedState>) -> Json<Vec<AppError>> {
    Json(state.store.errors())
}

pub async fn error_summary(State(state): State<SharedState>) -> Json<serde_json::Value> {
    Json(json!({
        "summary": state.store.summary(),
        "has_critical_errors": state.store.has_critical_errors(),
    }))
}

pub async fn clear_errors(State(state): State<SharedState>) -> StatusCode {
    state.store.clear();
    tracing::info!("Error store cleared");
    StatusCode::NO_CONTENT
}

pub async fn last_run(State(state): State<SharedState>) -> Response {
    let snapshot = state.snapshot.read().await;
    match &snapshot.last_run {
        Some(run) => Json::<PipelineRun>(run.clone()).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "no development cycle has run yet" })),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{serve, CannedModel};
    use devteam_core::llm::ResponseCache;
    use std::time::Duration;

    fn state_without_crew() -> SharedState {
        Arc::new(AppState::with_crew(
            Settings::default(),
            ErrorStore::new(),
            None,
        ))
    }

    fn state_with_model(model: &Arc<CannedModel>) -> SharedState {
        let store = ErrorStore::new();
        let crew = DevTeamCrew::builder("Java")
            .with_store(store.clone())
            .with_provider(model.provider())
            .with_cache(ResponseCache::in_memory().unwrap())
            .build()
            .unwrap();
        Arc::new(AppState::with_crew(Settings::default(), store, Some(crew)))
    }

    fn echo(request: &devteam_core::llm::ModelRequest) -> Result<String, devteam_core::llm::ModelError> {
        Ok(format!(
            "answer to: {}",
            request.prompt.lines().next().unwrap_or_default()
        ))
    }

    #[tokio::test]
    async fn test_status_without_crew() {
        let state = state_without_crew();
        state.store.warning("GITHUB_ACCESS_TOKEN not set", ErrorCategory::Configuration);

        let Json(status) = get_status(State(state)).await;
        assert!(!status.crew_ready);
        assert_eq!(status.language, "Java");
        assert_eq!(status.provider, "Anthropic");
        assert_eq!(status.errors.warning, 1);
        assert!(!status.has_critical_errors);
    }

    #[tokio::test]
    async fn test_crew_endpoints_unavailable() {
        let state = state_without_crew();
        let err = run_review(
            State(state.clone()),
            Json(ReviewRequest {
                code: "class A {}".to_string(),
                specifications: None,
            }),
        )
        .await
        .unwrap_err();

        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.record.category(), ErrorCategory::Configuration);
        assert!(!err.record.suggestions().is_empty());
        assert_eq!(state.store.len(), 1);

        let response = last_run(State(state)).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_analyze_endpoint() {
        let state = state_without_crew();
        let Json(output) = analyze(
            State(state.clone()),
            Json(AnalyzeRequest {
                code: "api_key = \"sk-123\"".to_string(),
                language: Some("Python".to_string()),
                analysis_type: Some("security".to_string()),
                format: None,
            }),
        )
        .await
        .unwrap();

        match output {
            ToolOutput::Structured(value) => {
                assert_eq!(value["security"]["count"], 1);
            }
            ToolOutput::Text(text) => panic!("expected structured output, got {}", text),
        }
        assert!(state.store.is_empty());
    }

    #[tokio::test]
    async fn test_error_endpoints() {
        let state = state_without_crew();
        state.store.create_error(
            "disk on fire",
            ErrorCategory::General,
            Severity::Critical,
            None,
            None,
            None,
        );

        let Json(errors) = list_errors(State(state.clone())).await;
        assert_eq!(errors.len(), 1);

        let Json(summary) = error_summary(State(state.clone())).await;
        assert_eq!(summary["summary"]["critical"], 1);
        assert_eq!(summary["has_critical_errors"], true);

        let status = clear_errors(State(state.clone())).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let Json(summary) = error_summary(State(state)).await;
        assert_eq!(summary["has_critical_errors"], false);
        assert_eq!(summary["summary"]["critical"], 0);
    }

    #[test]
    fn test_router_builds() {
        let _ = router(state_without_crew());
    }

    #[tokio::test]
    async fn test_status_answers_while_a_cycle_runs() {
        let model = CannedModel::gated(echo);
        let state = state_with_model(&model);

        let cycle = tokio::spawn(run_cycle(
            State(state.clone()),
            Json(CycleRequest {
                requirements: "Build a task API".to_string(),
                context: None,
                constraints: None,
            }),
        ));
        model.wait_entered().await;

        let Json(status) = tokio::time::timeout(
            Duration::from_secs(1),
            get_status(State(state.clone())),
        )
        .await
        .unwrap();
        assert!(status.crew_ready);
        assert!(status.crew_busy);
        assert_eq!(status.language, "Java");

        let response = tokio::time::timeout(Duration::from_secs(1), last_run(State(state.clone())))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let busy = set_language(
            State(state.clone()),
            Json(LanguageRequest {
                language: "Kotlin".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(busy.status, StatusCode::CONFLICT);
        assert_eq!(busy.record.severity(), Severity::Warning);

        for _ in 0..4 {
            model.open();
        }
        let Json(result) = cycle.await.unwrap().unwrap();
        assert!(result.review.starts_with("answer to:"));

        let Json(status) = get_status(State(state.clone())).await;
        assert!(!status.crew_busy);
        let response = last_run(State(state)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_routes_over_http() {
        let model = CannedModel::new(echo);
        let state = state_with_model(&model);
        let base = format!("{}/api/v1", serve(router(state)).await);
        let http = reqwest::Client::new();

        let status: serde_json::Value = http
            .get(format!("{base}/status"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(status["crew_ready"], true);
        assert_eq!(status["crew_busy"], false);

        let response = http.get(format!("{base}/runs/last")).send().await.unwrap();
        assert_eq!(response.status().as_u16(), 404);

        let response = http
            .post(format!("{base}/crew/cycle"))
            .json(&json!({ "requirements": "Build a task API" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);
        let result: serde_json::Value = response.json().await.unwrap();
        assert!(result["specification"].as_str().unwrap().starts_with("answer to:"));

        let run: serde_json::Value = http
            .get(format!("{base}/runs/last"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(run["language"], "Java");

        let response = http
            .patch(format!("{base}/crew/language"))
            .json(&json!({ "language": " " }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 400);
        let record: serde_json::Value = response.json().await.unwrap();
        assert_eq!(record["category"], "validation");

        let response = http
            .patch(format!("{base}/crew/language"))
            .json(&json!({ "language": "Kotlin" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);
        let status: serde_json::Value = http
            .get(format!("{base}/status"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(status["language"], "Kotlin");

        let response = http.delete(format!("{base}/errors")).send().await.unwrap();
        assert_eq!(response.status().as_u16(), 204);
        let summary: serde_json::Value = http
            .get(format!("{base}/errors/summary"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(summary["summary"]["error"], 0);
    }

    #[tokio::test]
    async fn test_crew_routes_unavailable_over_http() {
        let base = format!("{}/api/v1", serve(router(state_without_crew())).await);
        let http = reqwest::Client::new();

        let response = http
            .post(format!("{base}/crew/review"))
            .json(&json!({ "code": "class A {}" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 503);

        let response = http
            .post(format!("{base}/analyze"))
            .json(&json!({ "code": "password = \"x\"", "type": "security" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status().as_u16(), 200);
        let report: serde_json::Value = response.json().await.unwrap();
        assert_eq!(report["security"]["count"], 1);
    }
}
