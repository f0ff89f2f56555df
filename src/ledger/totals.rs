use anyhow::bail;
use serde::Serialize;
use time::OffsetDateTime;

use super::{
    entries::{LogEntry, LogSource},
    keys::AggregateKey,
};
use crate::nutrition::{round_hundredths, NutrientVector};

/// Summed nutrients. Unknown values in an entry contribute nothing.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct NutrientTotals {
    pub calories: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
    pub fiber_g: f64,
    pub saturated_fat_g: f64,
    pub sugar_g: f64,
    pub sodium_mg: f64,
}

impl NutrientTotals {
    pub fn add_vector(&mut self, v: &NutrientVector) {
        self.calories += v.calories;
        self.protein_g += v.protein_g.unwrap_or(0.0);
        self.carbs_g += v.carbs_g.unwrap_or(0.0);
        self.fat_g += v.fat_g.unwrap_or(0.0);
        self.fiber_g += v.fiber_g.unwrap_or(0.0);
        self.saturated_fat_g += v.saturated_fat_g.unwrap_or(0.0);
        self.sugar_g += v.sugar_g.unwrap_or(0.0);
        self.sodium_mg += v.sodium_mg.unwrap_or(0.0);
    }

    fn add(&mut self, other: &NutrientTotals) {
        self.calories += other.calories;
        self.protein_g += other.protein_g;
        self.carbs_g += other.carbs_g;
        self.fat_g += other.fat_g;
        self.fiber_g += other.fiber_g;
        self.saturated_fat_g += other.saturated_fat_g;
        self.sugar_g += other.sugar_g;
        self.sodium_mg += other.sodium_mg;
    }

    fn is_finite(&self) -> bool {
        [
            self.calories,
            self.protein_g,
            self.carbs_g,
            self.fat_g,
            self.fiber_g,
            self.saturated_fat_g,
            self.sugar_g,
            self.sodium_mg,
        ]
        .iter()
        .all(|v| v.is_finite())
    }

    fn normalized(self) -> Self {
        Self {
            calories: round_hundredths(self.calories),
            protein_g: round_hundredths(self.protein_g),
            carbs_g: round_hundredths(self.carbs_g),
            fat_g: round_hundredths(self.fat_g),
            fiber_g: round_hundredths(self.fiber_g),
            saturated_fat_g: round_hundredths(self.saturated_fat_g),
            sugar_g: round_hundredths(self.sugar_g),
            sodium_mg: round_hundredths(self.sodium_mg),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ActivityTotals {
    pub duration_min: f64,
    pub calories_burned: f64,
}

impl ActivityTotals {
    fn add(&mut self, other: &ActivityTotals) {
        self.duration_min += other.duration_min;
        self.calories_burned += other.calories_burned;
    }

    fn is_finite(&self) -> bool {
        self.duration_min.is_finite() && self.calories_burned.is_finite()
    }

    fn normalized(self) -> Self {
        Self {
            duration_min: round_hundredths(self.duration_min),
            calories_burned: round_hundredths(self.calories_burned),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Totals {
    Nutrients(NutrientTotals),
    Activity(ActivityTotals),
}

impl Totals {
    pub fn empty_for(key: &AggregateKey) -> Self {
        match key {
            AggregateKey::FoodDay { .. } | AggregateKey::FoodMeal { .. } => {
                Totals::Nutrients(NutrientTotals::default())
            }
            AggregateKey::ExerciseDay { .. } => Totals::Activity(ActivityTotals::default()),
        }
    }

    fn accumulate(&mut self, other: &Totals) {
        match (self, other) {
            (Totals::Nutrients(a), Totals::Nutrients(b)) => a.add(b),
            (Totals::Activity(a), Totals::Activity(b)) => a.add(b),
            (a, b) => unreachable!("cannot add {b:?} to {a:?}"),
        }
    }

    fn is_finite(&self) -> bool {
        match self {
            Totals::Nutrients(t) => t.is_finite(),
            Totals::Activity(t) => t.is_finite(),
        }
    }

    fn normalized(self) -> Self {
        match self {
            Totals::Nutrients(t) => Totals::Nutrients(t.normalized()),
            Totals::Activity(t) => Totals::Activity(t.normalized()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRow {
    #[serde(flatten)]
    pub key: AggregateKey,
    #[serde(flatten)]
    pub totals: Totals,
    pub entry_count: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub last_recomputed_at: OffsetDateTime,
}

impl AggregateRow {
    /// Full re-aggregation of `entries` for `key`. Entries that do not count
    /// towards `key` are ignored; `None` when nothing counts. Fails when a sum
    /// is not a finite number.
    pub fn derive(
        key: AggregateKey,
        entries: &[LogEntry],
        now: OffsetDateTime,
    ) -> anyhow::Result<Option<Self>> {
        let mut totals = Totals::empty_for(&key);
        let mut entry_count = 0i64;
        for entry in entries.iter().filter(|e| e.aggregate_keys().contains(&key)) {
            totals.accumulate(&entry.tally());
            entry_count += 1;
        }

        if entry_count == 0 {
            return Ok(None);
        }
        if !totals.is_finite() {
            bail!("sums for {key} over {entry_count} entries are not finite");
        }
        Ok(Some(Self {
            key,
            totals: totals.normalized(),
            entry_count,
            last_recomputed_at: now,
        }))
    }

    /// Equal sums and count; the recompute timestamp is not compared.
    pub fn same_contents(&self, other: &AggregateRow) -> bool {
        self.key == other.key && self.totals == other.totals && self.entry_count == other.entry_count
    }

    pub fn calories(&self) -> f64 {
        match self.totals {
            Totals::Nutrients(t) => t.calories,
            Totals::Activity(t) => t.calories_burned,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ledger::{entries::ExerciseEntry, FoodEntry, MealType},
        nutrition::Unit,
    };
    use time::macros::date;
    use uuid::Uuid;

    fn food(user_id: Uuid, meal: MealType, calories: f64, protein: Option<f64>) -> LogEntry {
        let now = OffsetDateTime::now_utc();
        LogEntry::Food(FoodEntry {
            id: Uuid::new_v4(),
            user_id,
            food_id: None,
            food_name: "toast".into(),
            serving_id: None,
            date: date!(2024 - 05 - 01),
            meal,
            quantity: 1.0,
            unit: Unit::Serving,
            nutrients: NutrientVector {
                calories,
                protein_g: protein,
                ..Default::default()
            },
            created_at: now,
            updated_at: now,
        })
    }

    #[test]
    fn derive_sums_only_matching_entries() {
        let user_id = Uuid::new_v4();
        let entries = vec![
            food(user_id, MealType::Breakfast, 100.0, Some(3.1)),
            food(user_id, MealType::Breakfast, 150.0, None),
            food(user_id, MealType::Lunch, 400.0, Some(20.0)),
        ];
        let key = AggregateKey::FoodMeal {
            user_id,
            date: date!(2024 - 05 - 01),
            meal: MealType::Breakfast,
        };

        let row = AggregateRow::derive(key, &entries, OffsetDateTime::now_utc()).unwrap().unwrap();
        assert_eq!(row.entry_count, 2);
        assert_eq!(row.calories(), 250.0);
        match row.totals {
            Totals::Nutrients(t) => assert_eq!(t.protein_g, 3.1),
            Totals::Activity(_) => panic!("expected nutrient totals"),
        }
    }

    #[test]
    fn derive_returns_none_without_entries() {
        let key = AggregateKey::FoodDay {
            user_id: Uuid::new_v4(),
            date: date!(2024 - 05 - 01),
        };
        assert!(AggregateRow::derive(key, &[], OffsetDateTime::now_utc()).unwrap().is_none());
    }

    #[test]
    fn exercise_entries_sum_into_activity() {
        let user_id = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();
        let run = |minutes: f64, kcal: f64| {
            LogEntry::Exercise(ExerciseEntry {
                id: Uuid::new_v4(),
                user_id,
                date: date!(2024 - 05 - 01),
                name: "run".into(),
                duration_min: minutes,
                calories_burned: kcal,
                created_at: now,
                updated_at: now,
            })
        };
        let key = AggregateKey::ExerciseDay {
            user_id,
            date: date!(2024 - 05 - 01),
        };
        let row = AggregateRow::derive(key, &[run(30.0, 310.0), run(12.5, 90.0)], now)
            .unwrap()
            .unwrap();
        assert_eq!(
            row.totals,
            Totals::Activity(ActivityTotals {
                duration_min: 42.5,
                calories_burned: 400.0
            })
        );
    }

    #[test]
    fn row_serializes_key_and_sums_inline() {
        let user_id = Uuid::new_v4();
        let entries = vec![food(user_id, MealType::Dinner, 80.0, None)];
        let key = AggregateKey::FoodDay {
            user_id,
            date: date!(2024 - 05 - 01),
        };
        let row = AggregateRow::derive(key, &entries, OffsetDateTime::now_utc()).unwrap().unwrap();
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["kind"], "food_day");
        assert_eq!(json["date"], "2024-05-01");
        assert_eq!(json["calories"], 80.0);
        assert_eq!(json["entry_count"], 1);
    }

    #[test]
    fn overflowing_sum_is_an_error() {
        let user_id = Uuid::new_v4();
        let entries = vec![
            food(user_id, MealType::Lunch, f64::MAX, None),
            food(user_id, MealType::Lunch, f64::MAX, None),
        ];
        let key = AggregateKey::FoodDay {
            user_id,
            date: date!(2024 - 05 - 01),
        };
        assert!(AggregateRow::derive(key, &entries, OffsetDateTime::now_utc()).is_err());
    }

    #[test]
    #[should_panic]
    fn mixing_totals_kinds_panics() {
        let mut totals = Totals::Nutrients(NutrientTotals::default());
        totals.accumulate(&Totals::Activity(ActivityTotals::default()));
    }
}
