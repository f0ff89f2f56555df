use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use super::{FoodDefinition, NutritionError, Unit, MAX_VALUE};

/// Which branch produced the scale factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionPath {
    /// Quantity counted servings of a catalogued serving.
    NamedServing,
    /// Quantity converted to the food's base unit (or counted canonical servings).
    RawQuantity,
    /// Requested unit belongs to the other class; the number was used as-is.
    ClassMismatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResolvedServing {
    /// Requested amount expressed in the food's base unit.
    pub base_amount: f64,
    pub scale_factor: f64,
    pub path: ResolutionPath,
}

pub fn resolve(
    food: &FoodDefinition,
    quantity: f64,
    unit: Unit,
    serving_id: Option<Uuid>,
) -> Result<ResolvedServing, NutritionError> {
    if !quantity.is_finite() || quantity <= 0.0 {
        return Err(NutritionError::NonPositiveQuantity(quantity));
    }
    if quantity > MAX_VALUE {
        return Err(NutritionError::OutOfRange("quantity"));
    }
    let canonical = food.serving_size;
    if !canonical.is_finite() || canonical <= 0.0 {
        return Err(NutritionError::InvalidFood(format!(
            "food {} has a non-positive serving size",
            food.id
        )));
    }

    // Servings are self-describing: the declared measure wins even if its
    // class differs from the food's.
    if let Some(serving) = serving_id.and_then(|id| food.serving(id)) {
        let base_amount = quantity * serving.measure.amount();
        return Ok(ResolvedServing {
            base_amount,
            scale_factor: base_amount / canonical,
            path: ResolutionPath::NamedServing,
        });
    }

    if let Some(id) = serving_id {
        debug!(food_id = %food.id, serving_id = %id, "serving not in catalogue, falling back to raw quantity");
    }

    let (base_amount, path) = match unit.class() {
        None => (quantity * canonical, ResolutionPath::RawQuantity),
        Some(class) if class == food.serving_unit => {
            (quantity * unit.to_base_factor(), ResolutionPath::RawQuantity)
        }
        Some(_) => (quantity, ResolutionPath::ClassMismatch),
    };

    Ok(ResolvedServing {
        base_amount,
        scale_factor: base_amount / canonical,
        path,
    })
}
