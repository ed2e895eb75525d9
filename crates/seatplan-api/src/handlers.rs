//! REST API handlers.
//!
//! Runs and previews execute on the blocking pool through the engine; the
//! read endpoints go straight to the store. Every response uses the
//! `{success, data, error}` envelope.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::{error, warn};

use seatplan_engine::{EngineError, RunOptions};
use seatplan_state::ExamYearId;

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

/// Storage and roster failures are 500s; cancelled or timed-out runs are 504s.
fn engine_error(err: EngineError) -> Response {
    let status = match err {
        EngineError::Cancelled | EngineError::TimedOut(_) => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!(error = %err, "assignment request failed");
    } else {
        warn!(error = %err, "assignment request did not complete");
    }
    error_response(&err.to_string(), status).into_response()
}

/// An empty body means default options.
fn parse_run_options(body: &[u8]) -> Result<RunOptions, String> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(RunOptions::default());
    }
    serde_json::from_slice(body).map_err(|e| format!("invalid run options: {e}"))
}

// ── Runs ───────────────────────────────────────────────────────

/// POST /api/v1/exam-years/{year}/assignments/run
pub async fn run_assignment(
    State(state): State<ApiState>,
    Path(year): Path<ExamYearId>,
    body: Bytes,
) -> impl IntoResponse {
    let options = match parse_run_options(&body) {
        Ok(options) => options,
        Err(msg) => return error_response(&msg, StatusCode::BAD_REQUEST).into_response(),
    };
    match state
        .engine
        .run_with_timeout(year, options, state.run_timeout)
        .await
    {
        Ok(report) => ApiResponse::ok(report).into_response(),
        Err(e) => engine_error(e),
    }
}

/// POST /api/v1/exam-years/{year}/assignments/preview
pub async fn preview_assignment(
    State(state): State<ApiState>,
    Path(year): Path<ExamYearId>,
) -> impl IntoResponse {
    match state.engine.preview_blocking(year).await {
        Ok(report) => ApiResponse::ok(report).into_response(),
        Err(e) => engine_error(e),
    }
}

// ── Read models ────────────────────────────────────────────────

/// GET /api/v1/exam-years/{year}/assignments
pub async fn list_assignments(
    State(state): State<ApiState>,
    Path(year): Path<ExamYearId>,
) -> impl IntoResponse {
    match state.engine.list_assignments(year) {
        Ok(assignments) => ApiResponse::ok(assignments).into_response(),
        Err(e) => engine_error(e),
    }
}

/// GET /api/v1/exam-years/{year}/skips
pub async fn list_skips(
    State(state): State<ApiState>,
    Path(year): Path<ExamYearId>,
) -> impl IntoResponse {
    match state.engine.list_skips(year) {
        Ok(skips) => ApiResponse::ok(skips).into_response(),
        Err(e) => engine_error(e),
    }
}

/// GET /api/v1/exam-years/{year}/utilization
pub async fn center_utilization(
    State(state): State<ApiState>,
    Path(year): Path<ExamYearId>,
) -> impl IntoResponse {
    match state.engine.utilization(year) {
        Ok(rows) => ApiResponse::ok(rows).into_response(),
        Err(e) => engine_error(e),
    }
}
