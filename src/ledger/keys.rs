use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use time::{macros::format_description, Date};
use uuid::Uuid;

use crate::error::AppError;

/// Sub-key partitioning a day's food entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

impl MealType {
    pub const ALL: [MealType; 4] = [
        MealType::Breakfast,
        MealType::Lunch,
        MealType::Dinner,
        MealType::Snack,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MealType::Breakfast => "breakfast",
            MealType::Lunch => "lunch",
            MealType::Dinner => "dinner",
            MealType::Snack => "snack",
        }
    }
}

impl FromStr for MealType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        MealType::ALL
            .into_iter()
            .find(|m| m.as_str() == needle)
            .ok_or_else(|| AppError::Validation(format!("unknown meal type '{s}'")))
    }
}

/// Identity of one aggregate row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AggregateKey {
    FoodDay {
        user_id: Uuid,
        date: Date,
    },
    FoodMeal {
        user_id: Uuid,
        date: Date,
        meal: MealType,
    },
    ExerciseDay {
        user_id: Uuid,
        date: Date,
    },
}

impl AggregateKey {
    pub fn user_id(&self) -> Uuid {
        match *self {
            AggregateKey::FoodDay { user_id, .. }
            | AggregateKey::FoodMeal { user_id, .. }
            | AggregateKey::ExerciseDay { user_id, .. } => user_id,
        }
    }
}

impl fmt::Display for AggregateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateKey::FoodDay { user_id, date } => write!(f, "food_day:{user_id}:{date}"),
            AggregateKey::FoodMeal {
                user_id,
                date,
                meal,
            } => write!(f, "food_meal:{user_id}:{date}:{}", meal.as_str()),
            AggregateKey::ExerciseDay { user_id, date } => {
                write!(f, "exercise_day:{user_id}:{date}")
            }
        }
    }
}

pub fn parse_date(raw: &str) -> Result<Date, AppError> {
    Date::parse(raw.trim(), format_description!("[year]-[month]-[day]"))
        .map_err(|_| AppError::Validation(format!("invalid date '{raw}', expected YYYY-MM-DD")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    #[test]
    fn meal_type_parses_case_insensitively() {
        assert_eq!("Breakfast".parse::<MealType>().unwrap(), MealType::Breakfast);
        assert_eq!(" snack ".parse::<MealType>().unwrap(), MealType::Snack);
        let err = "brunch".parse::<MealType>().unwrap_err();
        assert_eq!(err.to_string(), "unknown meal type 'brunch'");
    }

    #[test]
    fn key_display_is_stable() {
        let user_id = Uuid::nil();
        let key = AggregateKey::FoodMeal {
            user_id,
            date: date!(2024 - 03 - 09),
            meal: MealType::Dinner,
        };
        assert_eq!(
            key.to_string(),
            "food_meal:00000000-0000-0000-0000-000000000000:2024-03-09:dinner"
        );
    }

    #[test]
    fn parses_iso_dates_only() {
        assert_eq!(parse_date("2024-02-29").unwrap(), date!(2024 - 02 - 29));
        assert!(parse_date("2023-02-29").is_err());
        assert!(parse_date("29/02/2024").is_err());
    }
}
