//! REST endpoints for onboarding progress and activity tracking.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use tracing::{info, warn};

use super::progress::OnboardingProgress;
use super::state::Checkpoint;
use crate::config::MachineConfig;
use crate::error::{DatabaseError, Error, OnboardingError};
use crate::store::ProfileStore;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ProfileStore>,
    /// Activities a week needs when the caller does not say whether it was met.
    pub weekly_target: u32,
}

/// Build the Axum router with onboarding and activity routes.
pub fn onboarding_routes(store: Arc<dyn ProfileStore>, machines: &MachineConfig) -> Router {
    let state = AppState {
        store,
        weekly_target: machines.weekly_target,
    };

    Router::new()
        .route("/health", get(health))
        .route("/api/onboarding/{user_id}/status", get(get_status))
        .route("/api/onboarding/{user_id}/profile", get(get_profile))
        .route(
            "/api/onboarding/{user_id}/checkpoints/{step}",
            get(get_checkpoint),
        )
        .route("/api/onboarding/{user_id}/identity", put(put_identity))
        .route("/api/onboarding/{user_id}/goals", put(put_goals))
        .route("/api/onboarding/{user_id}/movement", put(put_movement))
        .route("/api/onboarding/{user_id}/equipment", put(put_equipment))
        .route("/api/onboarding/{user_id}/commitment", put(put_commitment))
        .route("/api/onboarding/{user_id}/advance", post(advance))
        .route("/api/onboarding/{user_id}/complete", post(complete))
        .route("/api/users/{user_id}/stats", get(get_stats))
        .route("/api/users/{user_id}/activities", post(log_activity))
        .route("/api/users/{user_id}/weeks", post(close_week))
        .with_state(state)
}

// ── Errors ──────────────────────────────────────────────────────────────

fn error_body(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({"error": message.into()}))).into_response()
}

fn error_response(err: Error) -> Response {
    let status = match &err {
        Error::Onboarding(OnboardingError::InvalidStep(_)) => StatusCode::BAD_REQUEST,
        Error::Onboarding(OnboardingError::StepLocked { .. }) => StatusCode::CONFLICT,
        Error::Onboarding(OnboardingError::ProfileNotFound { .. })
        | Error::Database(DatabaseError::NotFound { .. }) => StatusCode::NOT_FOUND,
        Error::Onboarding(OnboardingError::FetchFailed(_)) | Error::Database(_) => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        Error::Config(_) | Error::Machine(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        warn!(error = %err, "Onboarding request failed");
    }
    error_body(status, err.to_string())
}

/// Controller for one request, loaded from the store.
async fn load(state: &AppState, user_id: String) -> Result<OnboardingProgress, Error> {
    let progress = OnboardingProgress::authenticated(user_id, Arc::clone(&state.store));
    progress.refresh().await?;
    Ok(progress)
}

fn respond<T: serde::Serialize>(result: Result<T, Error>) -> Response {
    match result {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(e) => error_response(e),
    }
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "moai-core"
    }))
}

// ── Onboarding ──────────────────────────────────────────────────────────

async fn get_status(State(state): State<AppState>, Path(user_id): Path<String>) -> Response {
    match load(&state, user_id).await {
        Ok(progress) => (StatusCode::OK, Json(progress.snapshot().await)).into_response(),
        Err(e) => error_response(e),
    }
}

/// Returns the normalized profile, or 404 if the user has none yet.
async fn get_profile(State(state): State<AppState>, Path(user_id): Path<String>) -> Response {
    let result = async {
        let progress = load(&state, user_id.clone()).await?;
        progress
            .profile()
            .await
            .ok_or(Error::Onboarding(OnboardingError::ProfileNotFound { user_id }))
    };
    respond(result.await)
}

async fn get_checkpoint(
    State(state): State<AppState>,
    Path((user_id, step)): Path<(String, i64)>,
) -> Response {
    let progress = match load(&state, user_id).await {
        Ok(progress) => progress,
        Err(e) => return error_response(e),
    };
    respond(progress.checkpoint_status(step).await.map_err(Error::from))
}

#[derive(Deserialize)]
struct IdentityRequest {
    first_name: String,
    last_name: String,
}

async fn put_identity(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(body): Json<IdentityRequest>,
) -> Response {
    let result = async {
        let progress = load(&state, user_id).await?;
        progress.save_identity(body.first_name, body.last_name).await
    };
    respond(result.await)
}

#[derive(Deserialize)]
struct GoalsRequest {
    goals: BTreeSet<String>,
}

async fn put_goals(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(body): Json<GoalsRequest>,
) -> Response {
    let result = async {
        let progress = load(&state, user_id).await?;
        progress.save_goals(body.goals).await
    };
    respond(result.await)
}

#[derive(Deserialize)]
struct MovementRequest {
    activities: BTreeMap<String, serde_json::Value>,
}

async fn put_movement(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(body): Json<MovementRequest>,
) -> Response {
    let result = async {
        let progress = load(&state, user_id).await?;
        progress.save_movement(body.activities).await
    };
    respond(result.await)
}

#[derive(Deserialize)]
struct EquipmentRequest {
    equipment: BTreeSet<String>,
}

async fn put_equipment(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(body): Json<EquipmentRequest>,
) -> Response {
    let result = async {
        let progress = load(&state, user_id).await?;
        progress.save_equipment(body.equipment).await
    };
    respond(result.await)
}

async fn put_commitment(State(state): State<AppState>, Path(user_id): Path<String>) -> Response {
    let result = async {
        let progress = load(&state, user_id).await?;
        progress.set_commitment().await
    };
    respond(result.await)
}

#[derive(Deserialize)]
struct AdvanceRequest {
    step: i64,
}

async fn advance(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(body): Json<AdvanceRequest>,
) -> Response {
    let result = async {
        let step = Checkpoint::try_from(body.step)?;
        let progress = load(&state, user_id).await?;
        progress.advance_to(step).await
    };
    respond(result.await)
}

async fn complete(State(state): State<AppState>, Path(user_id): Path<String>) -> Response {
    let result = async {
        let progress = load(&state, user_id).await?;
        progress.complete_onboarding().await
    };
    respond(result.await)
}

// ── Activity ────────────────────────────────────────────────────────────

async fn get_stats(State(state): State<AppState>, Path(user_id): Path<String>) -> Response {
    respond(
        state
            .store
            .activity_stats(&user_id)
            .await
            .map_err(Error::from),
    )
}

#[derive(Deserialize)]
struct ActivityRequest {
    kind: String,
    #[serde(default)]
    occurred_at: Option<DateTime<Utc>>,
}

async fn log_activity(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(body): Json<ActivityRequest>,
) -> Response {
    let occurred_at = body.occurred_at.unwrap_or_else(Utc::now);
    match state
        .store
        .record_activity(&user_id, &body.kind, occurred_at)
        .await
    {
        Ok(id) => {
            info!(user_id = %user_id, kind = %body.kind, "Activity logged");
            (
                StatusCode::CREATED,
                Json(serde_json::json!({"id": id, "status": "created"})),
            )
                .into_response()
        }
        Err(e) => error_response(e.into()),
    }
}

#[derive(Deserialize)]
struct WeekRequest {
    week_start: NaiveDate,
    activity_count: u32,
    #[serde(default)]
    target_met: Option<bool>,
}

async fn close_week(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(body): Json<WeekRequest>,
) -> Response {
    let target_met = body
        .target_met
        .unwrap_or(body.activity_count >= state.weekly_target);
    match state
        .store
        .record_weekly_summary(&user_id, body.week_start, body.activity_count, target_met)
        .await
    {
        Ok(id) => (
            StatusCode::CREATED,
            Json(serde_json::json!({"id": id, "status": "created"})),
        )
            .into_response(),
        Err(e) => error_response(e.into()),
    }
}
