use super::{FoodDefinition, NutrientVector, ResolvedServing};

/// Scale a food's base vector. Calories and sodium round to whole numbers,
/// gram macros to two decimals; anything negative becomes zero. A result that
/// overflows stays infinite and is rejected when the entry is validated.
pub fn compute_nutrients(food: &FoodDefinition, resolved: &ResolvedServing) -> NutrientVector {
    let factor = resolved.scale_factor;
    let base = &food.nutrients;
    let grams = |v: Option<f64>| v.map(|v| round_hundredths(v * factor));

    NutrientVector {
        calories: round_whole(base.calories * factor),
        protein_g: grams(base.protein_g),
        carbs_g: grams(base.carbs_g),
        fat_g: grams(base.fat_g),
        fiber_g: grams(base.fiber_g),
        saturated_fat_g: grams(base.saturated_fat_g),
        sugar_g: grams(base.sugar_g),
        sodium_mg: base.sodium_mg.map(|v| round_whole(v * factor)),
    }
}

pub fn round_hundredths(value: f64) -> f64 {
    clamp_non_negative((value * 100.0).round() / 100.0)
}

fn round_whole(value: f64) -> f64 {
    clamp_non_negative(value.round())
}

fn clamp_non_negative(value: f64) -> f64 {
    // folds -0.0 and NaN into 0.0; infinity is kept so validation rejects it
    if value > 0.0 {
        value
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nutrition::{nutrients_for, resolve, NutritionError, ResolutionPath, Unit, UnitClass};
    use uuid::Uuid;

    fn food(nutrients: NutrientVector, serving_size: f64, serving_unit: UnitClass) -> FoodDefinition {
        FoodDefinition {
            id: Uuid::new_v4(),
            name: "test food".into(),
            nutrients,
            serving_size,
            serving_unit,
            servings: Vec::new(),
        }
    }

    #[test]
    fn scaling_is_linear_in_quantity() {
        let f = food(
            NutrientVector {
                calories: 200.0,
                protein_g: Some(12.5),
                ..Default::default()
            },
            100.0,
            UnitClass::Weight,
        );

        let (at_150, _) = nutrients_for(&f, 150.0, Unit::Gram, None).unwrap();
        let (at_300, _) = nutrients_for(&f, 300.0, Unit::Gram, None).unwrap();

        assert_eq!(at_150.calories, 300.0);
        assert_eq!(at_300.calories, 2.0 * at_150.calories);
        assert_eq!(at_150.protein_g, Some(18.75));
        assert_eq!(at_300.protein_g, Some(37.5));
    }

    #[test]
    fn volume_food_without_servings_uses_raw_quantity() {
        let f = food(
            NutrientVector {
                calories: 50.0,
                ..Default::default()
            },
            100.0,
            UnitClass::Volume,
        );
        let (n, resolved) = nutrients_for(&f, 250.0, Unit::Milliliter, None).unwrap();
        assert_eq!(resolved.path, ResolutionPath::RawQuantity);
        assert_eq!(n.calories, 125.0);
    }

    #[test]
    fn absent_fields_stay_absent() {
        let f = food(
            NutrientVector {
                calories: 90.0,
                fat_g: Some(0.0),
                ..Default::default()
            },
            100.0,
            UnitClass::Weight,
        );
        let (n, _) = nutrients_for(&f, 50.0, Unit::Gram, None).unwrap();
        assert_eq!(n.fat_g, Some(0.0));
        assert_eq!(n.protein_g, None);
        assert_eq!(n.sodium_mg, None);
    }

    #[test]
    fn rounding_policy() {
        let f = food(
            NutrientVector {
                calories: 101.0,
                carbs_g: Some(1.0),
                sodium_mg: Some(7.0),
                ..Default::default()
            },
            3.0,
            UnitClass::Weight,
        );
        let resolved = resolve(&f, 1.0, Unit::Gram, None).unwrap();
        let n = compute_nutrients(&f, &resolved);
        assert_eq!(n.calories, 34.0);
        assert_eq!(n.carbs_g, Some(0.33));
        assert_eq!(n.sodium_mg, Some(2.0));
    }

    #[test]
    fn negative_results_are_clamped() {
        let f = food(
            NutrientVector {
                calories: -10.0,
                sugar_g: Some(-1.0),
                ..Default::default()
            },
            100.0,
            UnitClass::Weight,
        );
        let resolved = ResolvedServing {
            base_amount: 100.0,
            scale_factor: 1.0,
            path: ResolutionPath::RawQuantity,
        };
        let n = compute_nutrients(&f, &resolved);
        assert_eq!(n.calories, 0.0);
        assert_eq!(n.sugar_g, Some(0.0));
    }

    #[test]
    fn overflowing_scale_is_rejected_not_zeroed() {
        let f = food(
            NutrientVector {
                calories: 500.0,
                ..Default::default()
            },
            100.0,
            UnitClass::Weight,
        );
        let resolved = ResolvedServing {
            base_amount: 1e308,
            scale_factor: 1e307,
            path: ResolutionPath::RawQuantity,
        };
        let n = compute_nutrients(&f, &resolved);
        assert!(n.calories.is_infinite());
        assert_eq!(n.validate(), Err(NutritionError::OutOfRange("calories")));
    }
}
