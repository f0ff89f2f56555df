use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{
        BundleResponse, DayQuery, DeletedEntryResponse, EditExerciseRequest, EditFoodRequest,
        ExerciseEntryResponse, FoodEntryResponse, LogBundleRequest, LogExerciseRequest,
        LogFoodRequest,
    },
    services,
};
use crate::{
    error::AppError,
    identity::CurrentUser,
    ledger::{EntryKind, LogEntry},
    state::AppState,
};

pub fn read_routes() -> Router<AppState> {
    Router::new().route("/entries", get(list_entries))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/entries/food", post(log_food))
        .route("/entries/food/bundle", post(log_bundle))
        .route("/entries/food/:id", patch(edit_food).delete(delete_food))
        .route("/entries/exercise", post(log_exercise))
        .route("/entries/exercise/:id", patch(edit_exercise).delete(delete_exercise))
}

/// GET /entries?date=YYYY-MM-DD
#[instrument(skip(state))]
pub async fn list_entries(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Query(q): Query<DayQuery>,
) -> Result<Json<Vec<LogEntry>>, AppError> {
    let entries = services::entries_on(state.ledger.as_ref(), user_id, &q.date).await?;
    Ok(Json(entries))
}

#[instrument(skip(state, body))]
pub async fn log_food(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(body): Json<LogFoodRequest>,
) -> Result<(StatusCode, Json<FoodEntryResponse>), AppError> {
    let res = services::log_food(state.ledger.as_ref(), state.catalog.as_ref(), user_id, body).await?;
    Ok((StatusCode::CREATED, Json(res)))
}

#[instrument(skip(state, body))]
pub async fn edit_food(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
    Json(body): Json<EditFoodRequest>,
) -> Result<Json<FoodEntryResponse>, AppError> {
    let res =
        services::edit_food(state.ledger.as_ref(), state.catalog.as_ref(), user_id, id, body).await?;
    Ok(Json(res))
}

#[instrument(skip(state))]
pub async fn delete_food(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<DeletedEntryResponse>, AppError> {
    let res = services::delete_entry(state.ledger.as_ref(), EntryKind::Food, user_id, id).await?;
    Ok(Json(res))
}

#[instrument(skip(state, body))]
pub async fn log_bundle(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(body): Json<LogBundleRequest>,
) -> Result<(StatusCode, Json<BundleResponse>), AppError> {
    let res = services::log_bundle(state.ledger.as_ref(), state.catalog.as_ref(), user_id, body).await?;
    Ok((StatusCode::CREATED, Json(res)))
}

#[instrument(skip(state, body))]
pub async fn log_exercise(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(body): Json<LogExerciseRequest>,
) -> Result<(StatusCode, Json<ExerciseEntryResponse>), AppError> {
    let res = services::log_exercise(state.ledger.as_ref(), user_id, body).await?;
    Ok((StatusCode::CREATED, Json(res)))
}

#[instrument(skip(state, body))]
pub async fn edit_exercise(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
    Json(body): Json<EditExerciseRequest>,
) -> Result<Json<ExerciseEntryResponse>, AppError> {
    let res = services::edit_exercise(state.ledger.as_ref(), user_id, id, body).await?;
    Ok(Json(res))
}

#[instrument(skip(state))]
pub async fn delete_exercise(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<DeletedEntryResponse>, AppError> {
    let res = services::delete_entry(state.ledger.as_ref(), EntryKind::Exercise, user_id, id).await?;
    Ok(Json(res))
}
