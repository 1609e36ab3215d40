//! HTTP API server for integration with other systems.
//!
//! Exposes the answer pipeline as `POST /ask` and a `GET /health` probe.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::{AskRequest, Orchestrator};
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Shared application state.
struct AppState {
    orchestrator: Orchestrator,
}

/// Run the HTTP API server.
pub async fn run_serve(host: &str, port: u16, settings: Settings) -> anyhow::Result<()> {
    // The server still starts without an index; /health reports it.
    if let Err(e) = preflight::check(Operation::Ask, &settings) {
        Output::warning(&format!("{}", e));
    }

    let orchestrator = Orchestrator::new(&settings)?;
    let state = Arc::new(AppState { orchestrator });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health))
        .route("/ask", post(ask))
        .layer(cors)
        .with_state(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Sunno API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("Ask", "POST /ask");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    index_available: bool,
    entries: usize,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn validate(request: &AskRequest) -> Result<(), String> {
    if request.question.trim().is_empty() {
        return Err("question must not be empty".to_string());
    }
    Ok(())
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let index = state.orchestrator.index();
    let available = index.is_available();
    Json(HealthResponse {
        status: if available { "ok" } else { "degraded" },
        index_available: available,
        entries: index.len(),
    })
}

async fn ask(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AskRequest>,
) -> impl IntoResponse {
    if let Err(error) = validate(&req) {
        return (StatusCode::BAD_REQUEST, Json(ErrorResponse { error })).into_response();
    }

    let response = state.orchestrator.answer(&req).await;
    info!("Answered /ask with {} sources", response.sources.len());
    Json(response).into_response()
}
