use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::{dto::CreateFoodRequest, services};
use crate::{error::AppError, nutrition::FoodDefinition, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/foods", post(create_food))
        .route("/foods/:id", get(get_food).delete(delete_food))
}

#[instrument(skip(state, body), fields(name = %body.name))]
pub async fn create_food(
    State(state): State<AppState>,
    Json(body): Json<CreateFoodRequest>,
) -> Result<(StatusCode, Json<FoodDefinition>), AppError> {
    let food = services::create_food(state.catalog.as_ref(), body).await?;
    Ok((StatusCode::CREATED, Json(food)))
}

#[instrument(skip(state))]
pub async fn get_food(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<FoodDefinition>, AppError> {
    Ok(Json(services::get_food(state.catalog.as_ref(), id).await?))
}

#[instrument(skip(state))]
pub async fn delete_food(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    services::delete_food(state.catalog.as_ref(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
