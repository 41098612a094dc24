//! HTTP routes mounted under `/api/weather`
//!
//! Handlers only translate: query parameters into pipeline calls and
//! [`PipelineOutcome`]s into status codes.

use std::sync::Arc;

use axum::{
    Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::error::ErrorClass;
use crate::history::HistoryRecorder;
use crate::models::{PipelineOutcome, StoredRecord};
use crate::pipeline::PlaylistOrchestrator;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: PlaylistOrchestrator,
    pub history: Arc<dyn HistoryRecorder>,
}

impl AppState {
    /// History is read from the same recorder the pipeline writes to
    pub fn new(orchestrator: PlaylistOrchestrator) -> Self {
        let history = Arc::clone(orchestrator.history());
        Self {
            orchestrator,
            history,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CityParams {
    pub city: String,
}

#[derive(Debug, Deserialize)]
pub struct CoordinateParams {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct ApiError {
    pub error: String,
    pub message: String,
}

impl ApiError {
    fn response(status: StatusCode, error: &str, message: impl Into<String>) -> Response {
        let body = Self {
            error: error.to_string(),
            message: message.into(),
        };
        (status, Json(body)).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/playlist/city", get(playlist_by_city))
        .route("/playlist/coordinates", get(playlist_by_coordinates))
        .route("/history", get(list_history))
        .route("/history/{id}", get(get_history))
        .with_state(state)
}

fn status_for(class: ErrorClass) -> StatusCode {
    match class {
        ErrorClass::NotFound => StatusCode::NOT_FOUND,
        ErrorClass::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorClass::BadRequest => StatusCode::BAD_REQUEST,
    }
}

fn outcome_response(outcome: PipelineOutcome) -> Response {
    match outcome {
        PipelineOutcome::Success(playlist) => (StatusCode::OK, Json(playlist)).into_response(),
        PipelineOutcome::Failure { class, message } => {
            let error = serde_json::to_value(class)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_else(|| class.to_string());
            ApiError::response(status_for(class), &error, message)
        }
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn playlist_by_city(
    State(state): State<AppState>,
    Query(params): Query<CityParams>,
) -> Response {
    outcome_response(state.orchestrator.playlist_by_city(&params.city).await)
}

async fn playlist_by_coordinates(
    State(state): State<AppState>,
    Query(params): Query<CoordinateParams>,
) -> Response {
    outcome_response(
        state
            .orchestrator
            .playlist_by_coordinates(params.lat, params.lon)
            .await,
    )
}

async fn list_history(State(state): State<AppState>) -> Result<Json<Vec<StoredRecord>>, Response> {
    state.history.all().await.map(Json).map_err(|e| {
        error!("Failed to read history: {:#}", e);
        ApiError::response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal",
            "History is not available",
        )
    })
}

async fn get_history(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<StoredRecord>, Response> {
    match state.history.get(id).await {
        Ok(Some(record)) => Ok(Json(record)),
        Ok(None) => Err(ApiError::response(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("No request with id {id}"),
        )),
        Err(e) => {
            error!("Failed to read history entry {}: {:#}", id, e);
            Err(ApiError::response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal",
                "History is not available",
            ))
        }
    }
}
