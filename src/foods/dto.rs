use serde::Deserialize;
use uuid::Uuid;

use crate::nutrition::{
    FoodDefinition, NutrientVector, NutritionError, ServingDefinition, ServingMeasure, UnitClass,
};

#[derive(Debug, Deserialize)]
pub struct CreateFoodRequest {
    pub name: String,
    #[serde(flatten)]
    pub nutrients: NutrientVector,
    pub serving_size: f64,
    pub serving_unit: UnitClass,
    #[serde(default)]
    pub servings: Vec<CreateServingRequest>,
}

#[derive(Debug, Deserialize)]
pub struct CreateServingRequest {
    pub name: String,
    pub weight_g: Option<f64>,
    pub volume_ml: Option<f64>,
    pub sort_order: Option<i32>,
}

impl CreateFoodRequest {
    /// Assigns fresh ids. Servings without a sort order keep request order.
    pub fn into_definition(self) -> Result<FoodDefinition, NutritionError> {
        let food_id = Uuid::new_v4();
        let servings = self
            .servings
            .into_iter()
            .enumerate()
            .map(|(i, s)| {
                Ok(ServingDefinition {
                    id: Uuid::new_v4(),
                    food_id,
                    name: s.name.trim().to_string(),
                    measure: ServingMeasure::from_columns(s.weight_g, s.volume_ml)?,
                    sort_order: s.sort_order.unwrap_or(i as i32),
                })
            })
            .collect::<Result<Vec<_>, NutritionError>>()?;

        Ok(FoodDefinition {
            id: food_id,
            name: self.name.trim().to_string(),
            nutrients: self.nutrients,
            serving_size: self.serving_size,
            serving_unit: self.serving_unit,
            servings,
        })
    }
}
