//! seatplan-api — REST API for the assignment engine.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/api/v1/exam-years/{year}/assignments/run` | Run assignment and commit |
//! | POST | `/api/v1/exam-years/{year}/assignments/preview` | Plan without committing |
//! | GET | `/api/v1/exam-years/{year}/assignments` | List assignments |
//! | GET | `/api/v1/exam-years/{year}/skips` | List recorded skips |
//! | GET | `/api/v1/exam-years/{year}/utilization` | Seat usage per center |

pub mod handlers;

use std::time::Duration;

use axum::Router;
use axum::routing::{get, post};
use seatplan_engine::AssignmentEngine;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub engine: AssignmentEngine,
    /// Upper bound on one run; the run is cancelled and rolled back past it.
    pub run_timeout: Duration,
}

/// Build the complete API router.
pub fn build_router(engine: AssignmentEngine, run_timeout: Duration) -> Router {
    let api_state = ApiState {
        engine,
        run_timeout,
    };

    let api_routes = Router::new()
        .route("/exam-years/{year}/assignments/run", post(handlers::run_assignment))
        .route("/exam-years/{year}/assignments/preview", post(handlers::preview_assignment))
        .route("/exam-years/{year}/assignments", get(handlers::list_assignments))
        .route("/exam-years/{year}/skips", get(handlers::list_skips))
        .route("/exam-years/{year}/utilization", get(handlers::center_utilization))
        .with_state(api_state);

    Router::new().nest("/api/v1", api_routes)
}
