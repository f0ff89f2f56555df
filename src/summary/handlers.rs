use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::{RecomputeRequest, RecomputeResponse, ReconcileResponse},
    services,
};
use crate::{error::AppError, identity::CurrentUser, ledger::AggregateRow, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/summary/:date", get(day_summary))
        .route("/summary/:date/meals", get(meal_summaries))
        .route("/summary/:date/:meal", get(meal_summary))
        .route("/activity/:date", get(activity_summary))
        .route("/recompute", post(recompute))
        .route("/recompute/all", post(recompute_all))
}

#[instrument(skip(state))]
pub async fn day_summary(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(date): Path<String>,
) -> Result<Json<AggregateRow>, AppError> {
    let key = services::day_key(user_id, &date)?;
    Ok(Json(services::read_row(state.ledger.as_ref(), key).await?))
}

#[instrument(skip(state))]
pub async fn meal_summary(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path((date, meal)): Path<(String, String)>,
) -> Result<Json<AggregateRow>, AppError> {
    let key = services::meal_key(user_id, &date, &meal)?;
    Ok(Json(services::read_row(state.ledger.as_ref(), key).await?))
}

#[instrument(skip(state))]
pub async fn meal_summaries(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(date): Path<String>,
) -> Result<Json<Vec<AggregateRow>>, AppError> {
    Ok(Json(services::meals_of_day(state.ledger.as_ref(), user_id, &date).await?))
}

#[instrument(skip(state))]
pub async fn activity_summary(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(date): Path<String>,
) -> Result<Json<AggregateRow>, AppError> {
    let key = services::activity_key(user_id, &date)?;
    Ok(Json(services::read_row(state.ledger.as_ref(), key).await?))
}

#[instrument(skip(state))]
pub async fn recompute(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(body): Json<RecomputeRequest>,
) -> Result<Json<RecomputeResponse>, AppError> {
    Ok(Json(services::recompute(state.ledger.as_ref(), user_id, &body).await?))
}

#[instrument(skip(state))]
pub async fn recompute_all(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<ReconcileResponse>, AppError> {
    Ok(Json(services::reconcile_user(state.ledger.as_ref(), user_id).await?))
}
