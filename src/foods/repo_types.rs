use anyhow::Context;
use sqlx::FromRow;
use uuid::Uuid;

use crate::nutrition::{FoodDefinition, NutrientVector, ServingDefinition, ServingMeasure, UnitClass};

#[derive(Debug, FromRow)]
pub struct FoodRow {
    pub id: Uuid,
    pub name: String,
    pub calories: f64,
    pub protein_g: Option<f64>,
    pub carbs_g: Option<f64>,
    pub fat_g: Option<f64>,
    pub fiber_g: Option<f64>,
    pub saturated_fat_g: Option<f64>,
    pub sugar_g: Option<f64>,
    pub sodium_mg: Option<f64>,
    pub serving_size: f64,
    pub serving_unit: String,
}

#[derive(Debug, FromRow)]
pub struct ServingRow {
    pub id: Uuid,
    pub food_id: Uuid,
    pub name: String,
    pub weight_g: Option<f64>,
    pub volume_ml: Option<f64>,
    pub sort_order: i32,
}

impl TryFrom<ServingRow> for ServingDefinition {
    type Error = anyhow::Error;

    fn try_from(r: ServingRow) -> anyhow::Result<Self> {
        let measure = ServingMeasure::from_columns(r.weight_g, r.volume_ml)
            .with_context(|| format!("serving {} has a bad measure", r.id))?;
        Ok(Self {
            id: r.id,
            food_id: r.food_id,
            name: r.name,
            measure,
            sort_order: r.sort_order,
        })
    }
}

impl FoodRow {
    pub fn with_servings(self, servings: Vec<ServingRow>) -> anyhow::Result<FoodDefinition> {
        let serving_unit = UnitClass::parse(&self.serving_unit)
            .with_context(|| format!("food {} has a bad serving unit", self.id))?;
        Ok(FoodDefinition {
            id: self.id,
            name: self.name,
            nutrients: NutrientVector {
                calories: self.calories,
                protein_g: self.protein_g,
                carbs_g: self.carbs_g,
                fat_g: self.fat_g,
                fiber_g: self.fiber_g,
                saturated_fat_g: self.saturated_fat_g,
                sugar_g: self.sugar_g,
                sodium_mg: self.sodium_mg,
            },
            serving_size: self.serving_size,
            serving_unit,
            servings: servings
                .into_iter()
                .map(ServingDefinition::try_from)
                .collect::<anyhow::Result<_>>()?,
        })
    }
}
