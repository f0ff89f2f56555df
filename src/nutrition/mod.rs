//! Serving resolution and nutrient scaling.
//!
//! Everything here is pure: no I/O, no clock. Both the single-entry write path
//! and bundle expansion go through [`nutrients_for`].

pub mod compute;
pub mod resolver;
pub mod types;

use thiserror::Error;
use uuid::Uuid;

pub use compute::{compute_nutrients, round_hundredths};
pub use resolver::{resolve, ResolutionPath, ResolvedServing};
pub use types::{FoodDefinition, NutrientVector, ServingDefinition, ServingMeasure, Unit, UnitClass};

/// Upper bound for any single quantity, nutrient or activity value.
pub const MAX_VALUE: f64 = 1.0e9;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum NutritionError {
    #[error("quantity must be greater than zero (got {0})")]
    NonPositiveQuantity(f64),

    #[error("unknown unit '{0}'")]
    UnknownUnit(String),

    #[error("{0} must be a non-negative number")]
    NegativeNutrient(&'static str),

    #[error("{0} must not exceed {}", MAX_VALUE)]
    OutOfRange(&'static str),

    #[error("invalid food definition: {0}")]
    InvalidFood(String),
}

/// Resolve and scale in one step.
pub fn nutrients_for(
    food: &FoodDefinition,
    quantity: f64,
    unit: Unit,
    serving_id: Option<Uuid>,
) -> Result<(NutrientVector, ResolvedServing), NutritionError> {
    let resolved = resolve(food, quantity, unit, serving_id)?;
    Ok((compute_nutrients(food, &resolved), resolved))
}
