use tracing::info;
use uuid::Uuid;

use super::{dto::CreateFoodRequest, FoodCatalog};
use crate::{error::AppError, nutrition::FoodDefinition};

pub async fn create_food(
    catalog: &dyn FoodCatalog,
    req: CreateFoodRequest,
) -> Result<FoodDefinition, AppError> {
    let mut food = req.into_definition()?;
    food.validate()?;
    food.servings.sort_by_key(|s| (s.sort_order, s.id));
    catalog.create(&food).await?;
    info!(food_id = %food.id, servings = food.servings.len(), "food created");
    Ok(food)
}

pub async fn get_food(catalog: &dyn FoodCatalog, id: Uuid) -> Result<FoodDefinition, AppError> {
    catalog.get(id).await?.ok_or(AppError::FoodNotFound(id))
}

pub async fn delete_food(catalog: &dyn FoodCatalog, id: Uuid) -> Result<(), AppError> {
    if !catalog.delete(id).await? {
        return Err(AppError::FoodNotFound(id));
    }
    info!(food_id = %id, "food deleted");
    Ok(())
}
