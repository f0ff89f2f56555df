//! Food catalog: definitions and their named servings.

mod dto;
pub mod handlers;
pub mod memory;
pub mod repo;
mod repo_types;
pub mod services;

use async_trait::async_trait;
use axum::Router;
use uuid::Uuid;

use crate::{nutrition::FoodDefinition, state::AppState};

pub use memory::MemoryCatalog;
pub use repo::PgCatalog;

#[async_trait]
pub trait FoodCatalog: Send + Sync {
    /// Store a food together with its servings.
    async fn create(&self, food: &FoodDefinition) -> anyhow::Result<()>;

    /// Food with servings ordered by `sort_order`.
    async fn get(&self, id: Uuid) -> anyhow::Result<Option<FoodDefinition>>;

    /// Returns false when nothing was deleted. Logged entries keep their snapshot.
    async fn delete(&self, id: Uuid) -> anyhow::Result<bool>;
}

pub fn router() -> Router<AppState> {
    handlers::routes()
}
