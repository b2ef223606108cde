//! Discharge worker status HTTP endpoint.
//!
//! GET /api/v1/worker/status returns the current state of the background
//! discharge worker as JSON.

use axum::extract::State;
use axum::Json;

use crate::services::worker::{SharedWorkerState, WorkerState};

/// Get the current discharge worker status.
///
/// Returns per-sensor results of the last run (pending, processed, skipped,
/// errors) and global info (next_wakeup_at, last_run_completed_at, active).
#[utoipa::path(
    get,
    path = "/api/v1/worker/status",
    tag = "Worker",
    responses(
        (status = 200, description = "Current worker status", body = WorkerState),
    )
)]
pub async fn get_worker_status(State(state): State<SharedWorkerState>) -> Json<WorkerState> {
    let s = state.read().await;
    Json(s.clone())
}
