// 🌐 Web Server
// Upload form, HTML dashboard and JSON API with Axum

use anyhow::{Context, Result};
use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::analyze::{StatementAnalyzer, StatementReport};
use crate::config::ServerConfig;
use crate::dashboard::{render_dashboard, render_error};
use crate::rules::ClassificationRule;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    analyzer: Arc<StatementAnalyzer>,
}

impl AppState {
    pub fn new(analyzer: StatementAnalyzer) -> Self {
        Self {
            analyzer: Arc::new(analyzer),
        }
    }
}

/// API Response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    rules: usize,
}

#[derive(Debug, Serialize)]
struct CategoriesResponse<'a> {
    categories: Vec<String>,
    rules: &'a [ClassificationRule],
}

/// Why an upload could not be turned into a report
#[derive(Debug)]
enum UploadError {
    /// No `file` field, or an empty one
    Missing,
    /// Malformed or oversized multipart body
    Body(StatusCode, String),
    Analysis(String),
}

impl UploadError {
    fn status(&self) -> StatusCode {
        match self {
            UploadError::Missing => StatusCode::BAD_REQUEST,
            UploadError::Body(status, _) => *status,
            UploadError::Analysis(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    fn message(&self) -> String {
        match self {
            UploadError::Missing => "No file uploaded. Choose a bank statement PDF or CSV.".to_string(),
            UploadError::Body(_, msg) | UploadError::Analysis(msg) => msg.clone(),
        }
    }
}

// ============================================================================
// Upload handling
// ============================================================================

async fn read_upload(mut multipart: Multipart) -> Result<(String, Vec<u8>), UploadError> {
    loop {
        let field = multipart
            .next_field()
            .await
            .map_err(|e| UploadError::Body(e.status(), e.body_text()))?;

        let Some(field) = field else {
            return Err(UploadError::Missing);
        };

        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| UploadError::Body(e.status(), e.body_text()))?;

        if filename.is_empty() || bytes.is_empty() {
            return Err(UploadError::Missing);
        }
        return Ok((filename, bytes.to_vec()));
    }
}

async fn analyze_upload(state: &AppState, multipart: Multipart) -> Result<StatementReport, UploadError> {
    let (filename, bytes) = read_upload(multipart).await?;
    info!(file = %filename, size = bytes.len(), "Statement uploaded");

    let analyzer = Arc::clone(&state.analyzer);
    let job = filename.clone();
    let result = tokio::task::spawn_blocking(move || analyzer.analyze_bytes(&bytes, &job))
        .await
        .map_err(|e| UploadError::Analysis(format!("Analysis task failed: {}", e)))?;

    result.map_err(|e| {
        warn!(file = %filename, error = %format!("{:#}", e), "Statement analysis failed");
        UploadError::Analysis(e.to_string())
    })
}

// ============================================================================
// Handlers
// ============================================================================

/// GET / - Serve the upload form
async fn serve_index() -> impl IntoResponse {
    Html(include_str!("../web/index.html"))
}

/// POST /analyze - Upload a statement, get the HTML dashboard
async fn analyze_page(State(state): State<AppState>, multipart: Multipart) -> Response {
    match analyze_upload(&state, multipart).await {
        Ok(report) => Html(render_dashboard(&report)).into_response(),
        Err(e) => (e.status(), Html(render_error(&e.message()))).into_response(),
    }
}

/// POST /api/analyze - Upload a statement, get the report as JSON
async fn analyze_api(State(state): State<AppState>, multipart: Multipart) -> Response {
    match analyze_upload(&state, multipart).await {
        Ok(report) => (StatusCode::OK, Json(ApiResponse::ok(report))).into_response(),
        Err(e) => (e.status(), Json(ApiResponse::<()>::err(e.message()))).into_response(),
    }
}

/// GET /api/health - Health check
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::ok(HealthResponse {
        status: "OK",
        version: crate::VERSION,
        rules: state.analyzer.engine().rule_count(),
    }))
}

/// GET /api/categories - Effective category rules
async fn get_categories(State(state): State<AppState>) -> Response {
    let engine = state.analyzer.engine();
    Json(ApiResponse::ok(CategoriesResponse {
        categories: engine.categories(),
        rules: engine.rules(),
    }))
    .into_response()
}

// ============================================================================
// Router and server
// ============================================================================

/// Build the application router
pub fn build_router(state: AppState, config: &ServerConfig) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/categories", get(get_categories))
        .route("/analyze", post(analyze_api));

    let mut app = Router::new()
        .route("/", get(serve_index))
        .route("/analyze", post(analyze_page))
        .nest("/api", api_routes)
        .with_state(state)
        .layer(DefaultBodyLimit::max(config.max_upload_bytes));

    if config.cors {
        app = app.layer(CorsLayer::permissive());
    }

    app.layer(TraceLayer::new_for_http())
}

/// Bind and serve until Ctrl+C
pub async fn serve(config: ServerConfig, analyzer: StatementAnalyzer) -> Result<()> {
    let rules = analyzer.engine().rule_count();
    let app = build_router(AppState::new(analyzer), &config);

    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.addr))?;

    info!(
        addr = %config.addr,
        rules,
        max_upload_bytes = config.max_upload_bytes,
        "Server running"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}

// ============================================================================
// TESTS
// ============================================================================
