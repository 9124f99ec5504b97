//! HTTP surface: live MJPEG feed plus JSON status, history and pattern endpoints.
//!
//! Handlers are thin; every piece of state lives in the shared `Monitor` and
//! its `SessionState`.

use std::convert::Infallible;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    body::Body,
    extract::{Form, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::classes::ClassTable;
use crate::error::PipelineError;
use crate::filter::ActiveFilter;
use crate::monitor::Monitor;
use crate::stream;

pub struct AppState {
    pub monitor: Arc<Monitor>,
    pub table: ClassTable,
    pub default_cue: String,
}

pub type SharedState = Arc<AppState>;

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let status = match &self {
            PipelineError::DeviceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            PipelineError::AlreadyStreaming => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/video_feed", get(video_feed))
        .route("/detection_status", get(detection_status))
        .route("/animal_timing", get(animal_timing))
        .route("/animal_pattern", get(animal_pattern))
        .route("/select_animal", post(select_animal))
        .route("/select_sound", post(select_sound))
        .route("/stop_video_feed", post(stop_video_feed))
        .route("/logout", get(logout))
        .route("/health", get(health))
        .with_state(state)
}

/// Bind and serve until Ctrl-C, then stop any running session.
pub async fn serve(state: SharedState, bind: &str) -> Result<()> {
    let monitor = Arc::clone(&state.monitor);
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("Serving on http://{}", bind);
    info!("  - Live feed: http://{}/video_feed", bind);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    monitor.stop().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

async fn video_feed(State(state): State<SharedState>) -> Result<Response, PipelineError> {
    let frames = state.monitor.start().await?;
    let body = Body::from_stream(frames.map(Ok::<_, Infallible>));

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, stream::content_type())
        .header(header::CACHE_CONTROL, "no-cache")
        .body(body)
        .map_err(|e| PipelineError::Encode(e.to_string()))
}

async fn detection_status(State(state): State<SharedState>) -> impl IntoResponse {
    Json(state.monitor.session().take_detection_status())
}

async fn animal_timing(State(state): State<SharedState>) -> impl IntoResponse {
    Json(state.monitor.session().formatted_history())
}

async fn animal_pattern(State(state): State<SharedState>) -> impl IntoResponse {
    Json(state.monitor.session().pattern_report())
}

#[derive(Debug, Deserialize)]
pub struct SelectAnimal {
    pub selected_animal: Option<String>,
}

async fn select_animal(State(state): State<SharedState>, Form(form): Form<SelectAnimal>) -> impl IntoResponse {
    let filter = ActiveFilter::parse(form.selected_animal.as_deref(), &state.table);
    state.monitor.session().set_filter(filter.clone());
    Json(json!({ "selected_animal": filter }))
}

#[derive(Debug, Deserialize)]
pub struct SelectSound {
    pub selected_sound: Option<String>,
}

async fn select_sound(State(state): State<SharedState>, Form(form): Form<SelectSound>) -> impl IntoResponse {
    let cue = form
        .selected_sound
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| state.default_cue.clone());
    state.monitor.session().set_cue(cue.clone());
    Json(json!({ "selected_sound": cue }))
}

async fn stop_video_feed(State(state): State<SharedState>) -> impl IntoResponse {
    state.monitor.stop().await;
    Json(json!({ "stopped": true }))
}

async fn logout(State(state): State<SharedState>) -> impl IntoResponse {
    state.monitor.stop().await;
    Json(json!({ "logged_out": true }))
}

async fn health(State(state): State<SharedState>) -> impl IntoResponse {
    let session = state.monitor.session();
    Json(json!({
        "active": session.is_active(),
        "capturing": state.monitor.is_capturing().await,
        "selected_animal": session.filter(),
        "selected_sound": session.cue(),
    }))
}
