//! The `easel serve` command: HTTP polling API for external render workers.
//!
//! Workers poll `GET /api/jobs/pending`, mark progress through
//! `POST /api/jobs/{id}/status`, and report completion through
//! `POST /api/jobs/{id}/artifact`. All state changes go through the job
//! state machine; there is no raw status write.

use std::net::SocketAddr;
use std::str::FromStr;

use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use easel_core::state::{JobStateMachine, QueueDepth, StateError};
use easel_db::models::{Job, RenderStatus};
use easel_db::queries::jobs as job_db;

/// Page size cap for the pending-jobs endpoint.
const MAX_PAGE_SIZE: i64 = 100;
const DEFAULT_PAGE_SIZE: i64 = 20;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }

    pub fn internal(err: anyhow::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("{err:#}"),
        }
    }
}

impl From<StateError> for AppError {
    fn from(err: StateError) -> Self {
        let status = match &err {
            StateError::NotFound(_) => StatusCode::NOT_FOUND,
            StateError::InvalidTransition { .. } => StatusCode::CONFLICT,
            StateError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct PendingParams {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ArtifactBody {
    pub artifact_ref: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct DepthResponse {
    pub queued: i64,
    pub rendering: i64,
    pub in_progress: i64,
    pub done: i64,
    pub failed: i64,
    pub total: i64,
}

impl From<QueueDepth> for DepthResponse {
    fn from(d: QueueDepth) -> Self {
        Self {
            queued: d.queued,
            rendering: d.rendering,
            in_progress: d.in_progress,
            done: d.done,
            failed: d.failed,
            total: d.total,
        }
    }
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(pool: PgPool) -> Router {
    Router::new()
        .route("/api/jobs/pending", get(list_pending))
        .route("/api/jobs/depth", get(queue_depth))
        .route("/api/jobs/{id}/artifact", post(set_artifact))
        .route("/api/jobs/{id}/status", post(set_status))
        .layer(CorsLayer::permissive())
        .with_state(pool)
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn run_serve(pool: PgPool, bind: &str, port: u16) -> Result<()> {
    let app = build_router(pool);
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    tracing::info!("easel serve listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("easel serve shut down");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install Ctrl+C handler");
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `Queued` jobs, most recent first, bounded page size.
async fn list_pending(
    State(pool): State<PgPool>,
    Query(params): Query<PendingParams>,
) -> Result<Json<Vec<Job>>, AppError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);

    let jobs = job_db::list_queued_recent(&pool, limit)
        .await
        .map_err(AppError::internal)?;

    Ok(Json(jobs))
}

/// Job counts by render status.
async fn queue_depth(State(pool): State<PgPool>) -> Result<Json<DepthResponse>, AppError> {
    let depth = JobStateMachine::queue_depth(&pool).await?;
    Ok(Json(depth.into()))
}

/// Attach the rendered artifact and mark the job `done`.
async fn set_artifact(
    State(pool): State<PgPool>,
    Path(id): Path<Uuid>,
    Json(body): Json<ArtifactBody>,
) -> Result<Json<Job>, AppError> {
    JobStateMachine::complete_with_artifact(&pool, id, &body.artifact_ref).await?;
    fetch_job(&pool, id).await
}

/// Operator/worker status override, validated by the state machine.
async fn set_status(
    State(pool): State<PgPool>,
    Path(id): Path<Uuid>,
    Json(body): Json<StatusBody>,
) -> Result<Json<Job>, AppError> {
    let status = RenderStatus::from_str(&body.status)
        .map_err(|e| AppError::bad_request(e.to_string()))?;

    JobStateMachine::set_status(&pool, id, status).await?;
    fetch_job(&pool, id).await
}

async fn fetch_job(pool: &PgPool, id: Uuid) -> Result<Json<Job>, AppError> {
    let job = job_db::get_job(pool, id)
        .await
        .map_err(AppError::internal)?
        .ok_or(StateError::NotFound(id))?;
    Ok(Json(job))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
