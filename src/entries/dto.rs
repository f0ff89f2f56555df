use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    ledger::{engine::KeyRecompute, ExerciseEntry, FoodEntry, LogEntry},
    nutrition::ResolvedServing,
};

#[derive(Debug, Deserialize)]
pub struct LogFoodRequest {
    pub food_id: Uuid,
    pub date: String,
    pub meal_type: String,
    pub quantity: f64,
    pub unit: String,
    pub serving_id: Option<Uuid>,
}

/// Absent fields keep their current value. Giving `unit` without
/// `serving_id` drops the named serving.
#[derive(Debug, Default, Deserialize)]
pub struct EditFoodRequest {
    pub date: Option<String>,
    pub meal_type: Option<String>,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub serving_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct BundleItem {
    pub food_id: Uuid,
    pub quantity: f64,
    pub unit: String,
    pub serving_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct LogBundleRequest {
    pub name: Option<String>,
    pub date: String,
    pub meal_type: String,
    pub items: Vec<BundleItem>,
}

#[derive(Debug, Deserialize)]
pub struct LogExerciseRequest {
    pub date: String,
    pub name: String,
    pub duration_min: f64,
    pub calories_burned: f64,
}

#[derive(Debug, Default, Deserialize)]
pub struct EditExerciseRequest {
    pub date: Option<String>,
    pub name: Option<String>,
    pub duration_min: Option<f64>,
    pub calories_burned: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct DayQuery {
    pub date: String,
}

#[derive(Debug, Serialize)]
pub struct FoodEntryResponse {
    pub entry: FoodEntry,
    /// Present when the write resolved nutrients against the food.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<ResolvedServing>,
    pub aggregates: Vec<KeyRecompute>,
}

#[derive(Debug, Serialize)]
pub struct BundleResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub entries: Vec<FoodEntry>,
    pub aggregates: Vec<KeyRecompute>,
}

#[derive(Debug, Serialize)]
pub struct ExerciseEntryResponse {
    pub entry: ExerciseEntry,
    pub aggregates: Vec<KeyRecompute>,
}

#[derive(Debug, Serialize)]
pub struct DeletedEntryResponse {
    pub deleted: LogEntry,
    pub aggregates: Vec<KeyRecompute>,
}
