use std::{collections::HashMap, sync::Arc};

use anyhow::bail;
use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::FoodCatalog;
use crate::nutrition::FoodDefinition;

#[derive(Clone, Default)]
pub struct MemoryCatalog {
    foods: Arc<RwLock<HashMap<Uuid, FoodDefinition>>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FoodCatalog for MemoryCatalog {
    async fn create(&self, food: &FoodDefinition) -> anyhow::Result<()> {
        let mut foods = self.foods.write().await;
        if foods.contains_key(&food.id) {
            bail!("food {} already exists", food.id);
        }
        let mut stored = food.clone();
        stored.servings.sort_by_key(|s| (s.sort_order, s.id));
        foods.insert(food.id, stored);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<FoodDefinition>> {
        Ok(self.foods.read().await.get(&id).cloned())
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        Ok(self.foods.write().await.remove(&id).is_some())
    }
}
