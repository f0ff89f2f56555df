use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::AppError;

pub const USER_HEADER: &str = "x-user-id";

/// Caller identity as forwarded by the gateway in front of the service.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_HEADER)
            .and_then(|h| h.to_str().ok())
            .ok_or(AppError::Unauthenticated)?;
        let user_id = Uuid::parse_str(raw.trim()).map_err(|_| AppError::Unauthenticated)?;
        Ok(CurrentUser(user_id))
    }
}
