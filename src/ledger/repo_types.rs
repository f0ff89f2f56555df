use anyhow::{bail, Context};
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::{
    ActivityTotals, AggregateKey, AggregateRow, ExerciseEntry, FoodEntry, MealType, NutrientTotals,
    Totals,
};
use crate::nutrition::{NutrientVector, Unit};

#[derive(Debug, FromRow)]
pub struct FoodEntryRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub food_id: Option<Uuid>,
    pub food_name: String,
    pub serving_id: Option<Uuid>,
    pub entry_date: Date,
    pub meal_type: String,
    pub quantity: f64,
    pub unit: String,
    pub calories: f64,
    pub protein_g: Option<f64>,
    pub carbs_g: Option<f64>,
    pub fat_g: Option<f64>,
    pub fiber_g: Option<f64>,
    pub saturated_fat_g: Option<f64>,
    pub sugar_g: Option<f64>,
    pub sodium_mg: Option<f64>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl TryFrom<FoodEntryRow> for FoodEntry {
    type Error = anyhow::Error;

    fn try_from(r: FoodEntryRow) -> anyhow::Result<Self> {
        let meal = r
            .meal_type
            .parse::<MealType>()
            .with_context(|| format!("food entry {} has bad meal_type", r.id))?;
        let unit = Unit::parse(&r.unit).with_context(|| format!("food entry {} has bad unit", r.id))?;
        Ok(Self {
            id: r.id,
            user_id: r.user_id,
            food_id: r.food_id,
            food_name: r.food_name,
            serving_id: r.serving_id,
            date: r.entry_date,
            meal,
            quantity: r.quantity,
            unit,
            nutrients: NutrientVector {
                calories: r.calories,
                protein_g: r.protein_g,
                carbs_g: r.carbs_g,
                fat_g: r.fat_g,
                fiber_g: r.fiber_g,
                saturated_fat_g: r.saturated_fat_g,
                sugar_g: r.sugar_g,
                sodium_mg: r.sodium_mg,
            },
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
pub struct ExerciseEntryRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub entry_date: Date,
    pub name: String,
    pub duration_min: f64,
    pub calories_burned: f64,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl From<ExerciseEntryRow> for ExerciseEntry {
    fn from(r: ExerciseEntryRow) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            date: r.entry_date,
            name: r.name,
            duration_min: r.duration_min,
            calories_burned: r.calories_burned,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// Sum columns shared by `daily_nutrition` and `meal_nutrition`.
#[derive(Debug, FromRow)]
pub struct NutritionTotalsRow {
    pub calories: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
    pub fiber_g: f64,
    pub saturated_fat_g: f64,
    pub sugar_g: f64,
    pub sodium_mg: f64,
    pub entry_count: i64,
    pub last_recomputed_at: OffsetDateTime,
}

impl NutritionTotalsRow {
    pub fn into_row(self, key: AggregateKey) -> AggregateRow {
        AggregateRow {
            key,
            totals: Totals::Nutrients(NutrientTotals {
                calories: self.calories,
                protein_g: self.protein_g,
                carbs_g: self.carbs_g,
                fat_g: self.fat_g,
                fiber_g: self.fiber_g,
                saturated_fat_g: self.saturated_fat_g,
                sugar_g: self.sugar_g,
                sodium_mg: self.sodium_mg,
            }),
            entry_count: self.entry_count,
            last_recomputed_at: self.last_recomputed_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct ActivityTotalsRow {
    pub duration_min: f64,
    pub calories_burned: f64,
    pub entry_count: i64,
    pub last_recomputed_at: OffsetDateTime,
}

impl ActivityTotalsRow {
    pub fn into_row(self, key: AggregateKey) -> AggregateRow {
        AggregateRow {
            key,
            totals: Totals::Activity(ActivityTotals {
                duration_min: self.duration_min,
                calories_burned: self.calories_burned,
            }),
            entry_count: self.entry_count,
            last_recomputed_at: self.last_recomputed_at,
        }
    }
}

/// One row of the key discovery union.
#[derive(Debug, FromRow)]
pub struct KeyRow {
    pub kind: String,
    pub user_id: Uuid,
    pub entry_date: Date,
    pub meal_type: Option<String>,
}

impl TryFrom<KeyRow> for AggregateKey {
    type Error = anyhow::Error;

    fn try_from(r: KeyRow) -> anyhow::Result<Self> {
        let (user_id, date) = (r.user_id, r.entry_date);
        match (r.kind.as_str(), r.meal_type) {
            ("food_day", _) => Ok(AggregateKey::FoodDay { user_id, date }),
            ("exercise_day", _) => Ok(AggregateKey::ExerciseDay { user_id, date }),
            ("food_meal", Some(meal)) => Ok(AggregateKey::FoodMeal {
                user_id,
                date,
                meal: meal.parse()?,
            }),
            (kind, meal) => bail!("unexpected key row {kind} / {meal:?}"),
        }
    }
}
