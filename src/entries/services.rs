use std::collections::{hash_map::Entry, HashMap};

use time::{Date, OffsetDateTime};
use tracing::{info, instrument};
use uuid::Uuid;

use super::dto::{
    BundleResponse, DeletedEntryResponse, EditExerciseRequest, EditFoodRequest,
    ExerciseEntryResponse, FoodEntryResponse, LogBundleRequest, LogExerciseRequest,
    LogFoodRequest,
};
use crate::{
    error::AppError,
    foods::FoodCatalog,
    ledger::{engine, parse_date, EntryKind, ExerciseEntry, FoodEntry, Ledger, LogEntry, MealType},
    nutrition::{nutrients_for, FoodDefinition, ResolutionPath, ResolvedServing, Unit},
};

/// Where a food entry counts.
#[derive(Debug, Clone, Copy)]
pub struct Placement {
    pub user_id: Uuid,
    pub date: Date,
    pub meal: MealType,
}

/// How much of a food was eaten.
#[derive(Debug, Clone, Copy)]
pub struct Portion {
    pub quantity: f64,
    pub unit: Unit,
    pub serving_id: Option<Uuid>,
}

/// Resolve, scale and freeze a food into an entry. The only place a food
/// definition turns into logged nutrients.
pub fn snapshot_food_entry(
    id: Uuid,
    food: &FoodDefinition,
    placement: Placement,
    portion: Portion,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
) -> Result<(FoodEntry, ResolvedServing), AppError> {
    let (nutrients, resolved) =
        nutrients_for(food, portion.quantity, portion.unit, portion.serving_id)?;
    // keep the serving only if it was actually used
    let serving_id = portion
        .serving_id
        .filter(|_| resolved.path == ResolutionPath::NamedServing);

    let entry = FoodEntry {
        id,
        user_id: placement.user_id,
        food_id: Some(food.id),
        food_name: food.name.clone(),
        serving_id,
        date: placement.date,
        meal: placement.meal,
        quantity: portion.quantity,
        unit: portion.unit,
        nutrients,
        created_at,
        updated_at,
    };
    Ok((entry, resolved))
}

async fn load_food(catalog: &dyn FoodCatalog, id: Uuid) -> Result<FoodDefinition, AppError> {
    catalog.get(id).await?.ok_or(AppError::FoodNotFound(id))
}

#[instrument(skip(ledger, catalog, req), fields(food_id = %req.food_id))]
pub async fn log_food(
    ledger: &dyn Ledger,
    catalog: &dyn FoodCatalog,
    user_id: Uuid,
    req: LogFoodRequest,
) -> Result<FoodEntryResponse, AppError> {
    let placement = Placement {
        user_id,
        date: parse_date(&req.date)?,
        meal: req.meal_type.parse()?,
    };
    let portion = Portion {
        quantity: req.quantity,
        unit: Unit::parse(&req.unit)?,
        serving_id: req.serving_id,
    };
    let food = load_food(catalog, req.food_id).await?;

    let now = OffsetDateTime::now_utc();
    let (entry, resolved) = snapshot_food_entry(Uuid::new_v4(), &food, placement, portion, now, now)?;
    let aggregates = engine::insert_entry(ledger, LogEntry::Food(entry.clone())).await?;

    info!(entry_id = %entry.id, path = ?resolved.path, calories = entry.nutrients.calories, "food logged");
    Ok(FoodEntryResponse {
        entry,
        resolution: Some(resolved),
        aggregates,
    })
}

/// Moving an entry keeps its nutrients. Changing quantity, unit or serving
/// resolves again against the food as it is now. Fields left out of the
/// request are taken from the entry as committed when the row lock is held.
#[instrument(skip(ledger, catalog, req))]
pub async fn edit_food(
    ledger: &dyn Ledger,
    catalog: &dyn FoodCatalog,
    user_id: Uuid,
    id: Uuid,
    req: EditFoodRequest,
) -> Result<FoodEntryResponse, AppError> {
    let date = req.date.as_deref().map(parse_date).transpose()?;
    let meal = req.meal_type.as_deref().map(str::parse::<MealType>).transpose()?;
    let unit = req.unit.as_deref().map(Unit::parse).transpose()?;
    let rescale = req.quantity.is_some() || unit.is_some() || req.serving_id.is_some();

    // an entry never moves to another food, so the food can be loaded up front
    let food = if rescale {
        let food_id = match ledger.entry(EntryKind::Food, user_id, id).await? {
            Some(LogEntry::Food(entry)) => entry.food_id.ok_or_else(food_deleted)?,
            _ => return Err(AppError::EntryNotFound(id)),
        };
        Some(load_food(catalog, food_id).await?)
    } else {
        None
    };

    let now = OffsetDateTime::now_utc();
    let (entry, resolution, aggregates) =
        engine::edit_entry(ledger, EntryKind::Food, user_id, id, |current| {
            let LogEntry::Food(current) = current else {
                return Err(AppError::EntryNotFound(id));
            };
            let placement = Placement {
                user_id,
                date: date.unwrap_or(current.date),
                meal: meal.unwrap_or(current.meal),
            };
            let Some(food) = food.as_ref() else {
                let entry = FoodEntry {
                    date: placement.date,
                    meal: placement.meal,
                    updated_at: now,
                    ..current
                };
                return Ok((LogEntry::Food(entry), None));
            };
            if current.food_id != Some(food.id) {
                return Err(food_deleted());
            }
            let serving_id = match (req.serving_id, unit.is_some()) {
                (Some(serving_id), _) => Some(serving_id),
                (None, true) => None,
                (None, false) => current.serving_id,
            };
            let portion = Portion {
                quantity: req.quantity.unwrap_or(current.quantity),
                unit: unit.unwrap_or(current.unit),
                serving_id,
            };
            let (entry, resolved) =
                snapshot_food_entry(id, food, placement, portion, current.created_at, now)?;
            Ok((LogEntry::Food(entry), Some(resolved)))
        })
        .await?;

    let LogEntry::Food(entry) = entry else {
        return Err(AppError::EntryNotFound(id));
    };
    info!(rescaled = rescale, "food entry edited");
    Ok(FoodEntryResponse {
        entry,
        resolution,
        aggregates,
    })
}

fn food_deleted() -> AppError {
    AppError::Validation("the food of this entry was deleted; only date and meal can change".into())
}

/// Expand a bundle into food entries. Every item is resolved before anything
/// is written; one bad item rejects the whole bundle.
#[instrument(skip(ledger, catalog, req), fields(items = req.items.len()))]
pub async fn log_bundle(
    ledger: &dyn Ledger,
    catalog: &dyn FoodCatalog,
    user_id: Uuid,
    req: LogBundleRequest,
) -> Result<BundleResponse, AppError> {
    if req.items.is_empty() {
        return Err(AppError::Validation("a bundle needs at least one item".into()));
    }
    let placement = Placement {
        user_id,
        date: parse_date(&req.date)?,
        meal: req.meal_type.parse()?,
    };
    let now = OffsetDateTime::now_utc();

    let mut foods: HashMap<Uuid, FoodDefinition> = HashMap::new();
    let mut entries = Vec::with_capacity(req.items.len());
    for item in &req.items {
        let portion = Portion {
            quantity: item.quantity,
            unit: Unit::parse(&item.unit)?,
            serving_id: item.serving_id,
        };
        let food = match foods.entry(item.food_id) {
            Entry::Occupied(slot) => slot.into_mut(),
            Entry::Vacant(slot) => slot.insert(load_food(catalog, item.food_id).await?),
        };
        let (entry, _) = snapshot_food_entry(Uuid::new_v4(), food, placement, portion, now, now)?;
        entries.push(entry);
    }

    let log: Vec<LogEntry> = entries.iter().cloned().map(LogEntry::Food).collect();
    let aggregates = engine::insert_entries(ledger, &log).await?;

    info!(entries = entries.len(), "bundle logged");
    Ok(BundleResponse {
        name: req.name,
        entries,
        aggregates,
    })
}

#[instrument(skip(ledger, req))]
pub async fn log_exercise(
    ledger: &dyn Ledger,
    user_id: Uuid,
    req: LogExerciseRequest,
) -> Result<ExerciseEntryResponse, AppError> {
    let now = OffsetDateTime::now_utc();
    let entry = ExerciseEntry {
        id: Uuid::new_v4(),
        user_id,
        date: parse_date(&req.date)?,
        name: req.name.trim().to_string(),
        duration_min: req.duration_min,
        calories_burned: req.calories_burned,
        created_at: now,
        updated_at: now,
    };
    let aggregates = engine::insert_entry(ledger, LogEntry::Exercise(entry.clone())).await?;
    info!(entry_id = %entry.id, "exercise logged");
    Ok(ExerciseEntryResponse { entry, aggregates })
}

#[instrument(skip(ledger, req))]
pub async fn edit_exercise(
    ledger: &dyn Ledger,
    user_id: Uuid,
    id: Uuid,
    req: EditExerciseRequest,
) -> Result<ExerciseEntryResponse, AppError> {
    let date = req.date.as_deref().map(parse_date).transpose()?;
    let now = OffsetDateTime::now_utc();

    let (entry, (), aggregates) =
        engine::edit_entry(ledger, EntryKind::Exercise, user_id, id, |current| {
            let LogEntry::Exercise(current) = current else {
                return Err(AppError::EntryNotFound(id));
            };
            let entry = ExerciseEntry {
                date: date.unwrap_or(current.date),
                name: req.name.map(|n| n.trim().to_string()).unwrap_or(current.name),
                duration_min: req.duration_min.unwrap_or(current.duration_min),
                calories_burned: req.calories_burned.unwrap_or(current.calories_burned),
                updated_at: now,
                ..current
            };
            Ok((LogEntry::Exercise(entry), ()))
        })
        .await?;

    let LogEntry::Exercise(entry) = entry else {
        return Err(AppError::EntryNotFound(id));
    };
    Ok(ExerciseEntryResponse { entry, aggregates })
}

pub async fn delete_entry(
    ledger: &dyn Ledger,
    kind: EntryKind,
    user_id: Uuid,
    id: Uuid,
) -> Result<DeletedEntryResponse, AppError> {
    let (deleted, aggregates) = engine::delete_entry(ledger, kind, user_id, id).await?;
    Ok(DeletedEntryResponse {
        deleted,
        aggregates,
    })
}

pub async fn entries_on(ledger: &dyn Ledger, user_id: Uuid, date: &str) -> Result<Vec<LogEntry>, AppError> {
    let date = parse_date(date)?;
    Ok(ledger.entries_on(user_id, date).await?)
}
