use serde::Serialize;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::{
    keys::{AggregateKey, MealType},
    totals::{ActivityTotals, NutrientTotals, Totals},
};
use crate::{
    error::AppError,
    nutrition::{NutrientVector, NutritionError, Unit, MAX_VALUE},
};

/// Frozen snapshot of a logged food. Later edits to the food definition never
/// reach back into it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FoodEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub food_id: Option<Uuid>,
    pub food_name: String,
    pub serving_id: Option<Uuid>,
    pub date: Date,
    pub meal: MealType,
    pub quantity: f64,
    pub unit: Unit,
    #[serde(flatten)]
    pub nutrients: NutrientVector,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExerciseEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub date: Date,
    pub name: String,
    pub duration_min: f64,
    pub calories_burned: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Food,
    Exercise,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LogEntry {
    Food(FoodEntry),
    Exercise(ExerciseEntry),
}

/// What the recompute engine needs from any log row: where it counts and what
/// it adds.
pub trait LogSource {
    fn entry_id(&self) -> Uuid;
    fn owner(&self) -> Uuid;
    fn aggregate_keys(&self) -> Vec<AggregateKey>;
    fn tally(&self) -> Totals;
    fn validate(&self) -> Result<(), AppError>;
}

impl LogSource for FoodEntry {
    fn entry_id(&self) -> Uuid {
        self.id
    }

    fn owner(&self) -> Uuid {
        self.user_id
    }

    fn aggregate_keys(&self) -> Vec<AggregateKey> {
        vec![
            AggregateKey::FoodDay {
                user_id: self.user_id,
                date: self.date,
            },
            AggregateKey::FoodMeal {
                user_id: self.user_id,
                date: self.date,
                meal: self.meal,
            },
        ]
    }

    fn tally(&self) -> Totals {
        let mut totals = NutrientTotals::default();
        totals.add_vector(&self.nutrients);
        Totals::Nutrients(totals)
    }

    fn validate(&self) -> Result<(), AppError> {
        if !self.quantity.is_finite() || self.quantity <= 0.0 {
            return Err(NutritionError::NonPositiveQuantity(self.quantity).into());
        }
        if self.quantity > MAX_VALUE {
            return Err(NutritionError::OutOfRange("quantity").into());
        }
        self.nutrients.validate()?;
        Ok(())
    }
}

impl LogSource for ExerciseEntry {
    fn entry_id(&self) -> Uuid {
        self.id
    }

    fn owner(&self) -> Uuid {
        self.user_id
    }

    fn aggregate_keys(&self) -> Vec<AggregateKey> {
        vec![AggregateKey::ExerciseDay {
            user_id: self.user_id,
            date: self.date,
        }]
    }

    fn tally(&self) -> Totals {
        Totals::Activity(ActivityTotals {
            duration_min: self.duration_min,
            calories_burned: self.calories_burned,
        })
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("exercise name must not be empty".into()));
        }
        if !self.duration_min.is_finite() || self.duration_min <= 0.0 {
            return Err(AppError::Validation(format!(
                "duration_min must be greater than zero (got {})",
                self.duration_min
            )));
        }
        if !self.calories_burned.is_finite() || self.calories_burned < 0.0 {
            return Err(AppError::Validation(
                "calories_burned must be a non-negative number".into(),
            ));
        }
        let bounded = [
            ("duration_min", self.duration_min),
            ("calories_burned", self.calories_burned),
        ];
        for (name, value) in bounded {
            if value > MAX_VALUE {
                return Err(NutritionError::OutOfRange(name).into());
            }
        }
        Ok(())
    }
}

impl LogEntry {
    pub fn kind(&self) -> EntryKind {
        match self {
            LogEntry::Food(_) => EntryKind::Food,
            LogEntry::Exercise(_) => EntryKind::Exercise,
        }
    }

    pub fn created_at(&self) -> OffsetDateTime {
        match self {
            LogEntry::Food(e) => e.created_at,
            LogEntry::Exercise(e) => e.created_at,
        }
    }

    fn source(&self) -> &dyn LogSource {
        match self {
            LogEntry::Food(e) => e,
            LogEntry::Exercise(e) => e,
        }
    }
}

impl LogSource for LogEntry {
    fn entry_id(&self) -> Uuid {
        self.source().entry_id()
    }

    fn owner(&self) -> Uuid {
        self.source().owner()
    }

    fn aggregate_keys(&self) -> Vec<AggregateKey> {
        self.source().aggregate_keys()
    }

    fn tally(&self) -> Totals {
        self.source().tally()
    }

    fn validate(&self) -> Result<(), AppError> {
        self.source().validate()
    }
}
