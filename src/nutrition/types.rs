use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{NutritionError, MAX_VALUE};

/// Unit class of a food's canonical serving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum UnitClass {
    Weight, // grams
    Volume, // milliliters
}

impl UnitClass {
    pub fn as_str(self) -> &'static str {
        match self {
            UnitClass::Weight => "g",
            UnitClass::Volume => "ml",
        }
    }

    pub fn parse(value: &str) -> Result<Self, NutritionError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "g" | "weight" => Ok(UnitClass::Weight),
            "ml" | "volume" => Ok(UnitClass::Volume),
            other => Err(NutritionError::UnknownUnit(other.to_string())),
        }
    }
}

impl TryFrom<String> for UnitClass {
    type Error = NutritionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        UnitClass::parse(&value)
    }
}

impl From<UnitClass> for String {
    fn from(class: UnitClass) -> Self {
        class.as_str().to_string()
    }
}

/// Units accepted on the write path. Everything except `Serving` converts to
/// grams or milliliters with a fixed factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Unit {
    Gram,
    Kilogram,
    Milligram,
    Ounce,
    Pound,
    Milliliter,
    Liter,
    FluidOunce,
    Cup,
    Tablespoon,
    Teaspoon,
    Serving,
}

impl Unit {
    pub fn as_str(self) -> &'static str {
        match self {
            Unit::Gram => "g",
            Unit::Kilogram => "kg",
            Unit::Milligram => "mg",
            Unit::Ounce => "oz",
            Unit::Pound => "lb",
            Unit::Milliliter => "ml",
            Unit::Liter => "l",
            Unit::FluidOunce => "fl_oz",
            Unit::Cup => "cup",
            Unit::Tablespoon => "tbsp",
            Unit::Teaspoon => "tsp",
            Unit::Serving => "serving",
        }
    }

    pub fn parse(value: &str) -> Result<Self, NutritionError> {
        let unit = match value.trim().to_ascii_lowercase().as_str() {
            "g" | "gram" | "grams" => Unit::Gram,
            "kg" => Unit::Kilogram,
            "mg" => Unit::Milligram,
            "oz" => Unit::Ounce,
            "lb" | "lbs" => Unit::Pound,
            "ml" => Unit::Milliliter,
            "l" => Unit::Liter,
            "fl_oz" | "floz" => Unit::FluidOunce,
            "cup" | "cups" => Unit::Cup,
            "tbsp" => Unit::Tablespoon,
            "tsp" => Unit::Teaspoon,
            "serving" | "servings" => Unit::Serving,
            other => return Err(NutritionError::UnknownUnit(other.to_string())),
        };
        Ok(unit)
    }

    /// `None` for `Serving`, which has no physical class of its own.
    pub fn class(self) -> Option<UnitClass> {
        match self {
            Unit::Gram | Unit::Kilogram | Unit::Milligram | Unit::Ounce | Unit::Pound => {
                Some(UnitClass::Weight)
            }
            Unit::Milliliter
            | Unit::Liter
            | Unit::FluidOunce
            | Unit::Cup
            | Unit::Tablespoon
            | Unit::Teaspoon => Some(UnitClass::Volume),
            Unit::Serving => None,
        }
    }

    /// Multiplier to grams (weight units) or milliliters (volume units).
    pub fn to_base_factor(self) -> f64 {
        match self {
            Unit::Gram | Unit::Milliliter | Unit::Serving => 1.0,
            Unit::Kilogram | Unit::Liter => 1000.0,
            Unit::Milligram => 0.001,
            Unit::Ounce => 28.349_523_125,
            Unit::Pound => 453.592_37,
            Unit::FluidOunce => 29.573_529_562_5,
            Unit::Cup => 240.0,
            Unit::Tablespoon => 14.786_764_781_25,
            Unit::Teaspoon => 4.928_921_593_75,
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Unit {
    type Error = NutritionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Unit::parse(&value)
    }
}

impl From<Unit> for String {
    fn from(unit: Unit) -> Self {
        unit.as_str().to_string()
    }
}

/// Nutrient values. `None` means "unknown", which is not the same as zero.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct NutrientVector {
    pub calories: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protein_g: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carbs_g: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fat_g: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fiber_g: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saturated_fat_g: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sugar_g: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sodium_mg: Option<f64>,
}

impl NutrientVector {
    /// Named fields, in column order.
    pub fn fields(&self) -> [(&'static str, Option<f64>); 8] {
        [
            ("calories", Some(self.calories)),
            ("protein_g", self.protein_g),
            ("carbs_g", self.carbs_g),
            ("fat_g", self.fat_g),
            ("fiber_g", self.fiber_g),
            ("saturated_fat_g", self.saturated_fat_g),
            ("sugar_g", self.sugar_g),
            ("sodium_mg", self.sodium_mg),
        ]
    }

    pub fn validate(&self) -> Result<(), NutritionError> {
        for (name, value) in self.fields() {
            if let Some(v) = value {
                if v.is_nan() || v < 0.0 {
                    return Err(NutritionError::NegativeNutrient(name));
                }
                if v > MAX_VALUE {
                    return Err(NutritionError::OutOfRange(name));
                }
            }
        }
        Ok(())
    }
}

/// A serving is measured by weight or by volume, never both.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ServingMeasure {
    #[serde(rename = "weight_g")]
    Weight(f64),
    #[serde(rename = "volume_ml")]
    Volume(f64),
}

impl ServingMeasure {
    pub fn from_columns(weight_g: Option<f64>, volume_ml: Option<f64>) -> Result<Self, NutritionError> {
        match (weight_g, volume_ml) {
            (Some(w), None) => Ok(ServingMeasure::Weight(w)),
            (None, Some(v)) => Ok(ServingMeasure::Volume(v)),
            _ => Err(NutritionError::InvalidFood(
                "a serving needs exactly one of weight_g or volume_ml".into(),
            )),
        }
    }

    pub fn amount(self) -> f64 {
        match self {
            ServingMeasure::Weight(v) | ServingMeasure::Volume(v) => v,
        }
    }

    pub fn weight_g(self) -> Option<f64> {
        match self {
            ServingMeasure::Weight(v) => Some(v),
            ServingMeasure::Volume(_) => None,
        }
    }

    pub fn volume_ml(self) -> Option<f64> {
        match self {
            ServingMeasure::Volume(v) => Some(v),
            ServingMeasure::Weight(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServingDefinition {
    pub id: Uuid,
    pub food_id: Uuid,
    pub name: String,
    #[serde(flatten)]
    pub measure: ServingMeasure,
    pub sort_order: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodDefinition {
    pub id: Uuid,
    pub name: String,
    #[serde(flatten)]
    pub nutrients: NutrientVector,
    /// Amount the base nutrient vector refers to, in `serving_unit`.
    pub serving_size: f64,
    pub serving_unit: UnitClass,
    #[serde(default)]
    pub servings: Vec<ServingDefinition>,
}

impl FoodDefinition {
    pub fn serving(&self, serving_id: Uuid) -> Option<&ServingDefinition> {
        self.servings.iter().find(|s| s.id == serving_id)
    }

    pub fn validate(&self) -> Result<(), NutritionError> {
        if self.name.trim().is_empty() {
            return Err(NutritionError::InvalidFood("name must not be empty".into()));
        }
        if !self.serving_size.is_finite() || self.serving_size <= 0.0 {
            return Err(NutritionError::InvalidFood(format!(
                "serving_size must be greater than zero (got {})",
                self.serving_size
            )));
        }
        self.nutrients.validate()?;
        for serving in &self.servings {
            if serving.food_id != self.id {
                return Err(NutritionError::InvalidFood(format!(
                    "serving {} belongs to another food",
                    serving.id
                )));
            }
            let amount = serving.measure.amount();
            if !amount.is_finite() || amount <= 0.0 {
                return Err(NutritionError::InvalidFood(format!(
                    "serving '{}' must have a positive amount",
                    serving.name
                )));
            }
        }
        Ok(())
    }
}
