use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

use crate::nutrition::NutritionError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Nutrition(#[from] NutritionError),

    #[error("food {0} not found")]
    FoodNotFound(Uuid),

    #[error("entry {0} not found")]
    EntryNotFound(Uuid),

    #[error("no data for this key")]
    NoData,

    #[error("missing or malformed x-user-id header")]
    Unauthenticated,

    #[error("internal error: {0}")]
    Internal(#[source] anyhow::Error),
}

/// Storage code may wrap an [`AppError`] in its `anyhow::Error`; that error is
/// surfaced as is. Anything else is internal.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<AppError>() {
            Ok(app) => app,
            Err(err) => AppError::Internal(err),
        }
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::Nutrition(_) => StatusCode::BAD_REQUEST,
            AppError::FoodNotFound(_) | AppError::EntryNotFound(_) | AppError::NoData => {
                StatusCode::NOT_FOUND
            }
            AppError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Internal(e) => {
                error!(error = %e, "request failed");
                "internal error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
