use uuid::Uuid;

use super::dto::{RecomputeRequest, RecomputeResponse, ReconcileResponse, SummaryKind};
use crate::{
    error::AppError,
    ledger::{engine, parse_date, AggregateKey, AggregateRow, Ledger, MealType},
};

pub async fn read_row(ledger: &dyn Ledger, key: AggregateKey) -> Result<AggregateRow, AppError> {
    ledger.aggregate(&key).await?.ok_or(AppError::NoData)
}

pub fn day_key(user_id: Uuid, date: &str) -> Result<AggregateKey, AppError> {
    Ok(AggregateKey::FoodDay {
        user_id,
        date: parse_date(date)?,
    })
}

pub fn meal_key(user_id: Uuid, date: &str, meal: &str) -> Result<AggregateKey, AppError> {
    Ok(AggregateKey::FoodMeal {
        user_id,
        date: parse_date(date)?,
        meal: meal.parse()?,
    })
}

pub fn activity_key(user_id: Uuid, date: &str) -> Result<AggregateKey, AppError> {
    Ok(AggregateKey::ExerciseDay {
        user_id,
        date: parse_date(date)?,
    })
}

/// A meal type selects the meal row, otherwise `kind` picks the day row.
pub fn key_for(user_id: Uuid, req: &RecomputeRequest) -> Result<AggregateKey, AppError> {
    match (req.kind, req.meal_type.as_deref()) {
        (SummaryKind::Nutrition, Some(meal)) => meal_key(user_id, &req.date, meal),
        (SummaryKind::Nutrition, None) => day_key(user_id, &req.date),
        (SummaryKind::Activity, None) => activity_key(user_id, &req.date),
        (SummaryKind::Activity, Some(_)) => Err(AppError::Validation(
            "meal_type does not apply to activity".into(),
        )),
    }
}

pub async fn recompute(
    ledger: &dyn Ledger,
    user_id: Uuid,
    req: &RecomputeRequest,
) -> Result<RecomputeResponse, AppError> {
    let key = key_for(user_id, req)?;
    let result = engine::recompute(ledger, key).await?;
    let row = ledger.aggregate(&key).await?;
    Ok(RecomputeResponse { result, row })
}

pub async fn reconcile_user(ledger: &dyn Ledger, user_id: Uuid) -> Result<ReconcileResponse, AppError> {
    let results = engine::reconcile_all(ledger, Some(user_id)).await?;
    Ok(ReconcileResponse::from_results(results))
}

/// Every meal row of a day, skipping meals with nothing logged.
pub async fn meals_of_day(
    ledger: &dyn Ledger,
    user_id: Uuid,
    date: &str,
) -> Result<Vec<AggregateRow>, AppError> {
    let date = parse_date(date)?;
    let mut rows = Vec::new();
    for meal in MealType::ALL {
        let key = AggregateKey::FoodMeal { user_id, date, meal };
        if let Some(row) = ledger.aggregate(&key).await? {
            rows.push(row);
        }
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{
        engine::RecomputeOutcome, memory::MemoryLedger, ExerciseEntry, LogEntry,
    };
    use time::{macros::date, OffsetDateTime};

    fn req(meal_type: Option<&str>, kind: SummaryKind) -> RecomputeRequest {
        RecomputeRequest {
            date: "2024-02-29".into(),
            meal_type: meal_type.map(Into::into),
            kind,
        }
    }

    #[test]
    fn key_selection_follows_meal_and_kind() {
        let user = Uuid::new_v4();
        let d = date!(2024 - 02 - 29);
        assert_eq!(
            key_for(user, &req(None, SummaryKind::Nutrition)).unwrap(),
            AggregateKey::FoodDay { user_id: user, date: d }
        );
        assert_eq!(
            key_for(user, &req(Some("Snack"), SummaryKind::Nutrition)).unwrap(),
            AggregateKey::FoodMeal {
                user_id: user,
                date: d,
                meal: MealType::Snack
            }
        );
        assert_eq!(
            key_for(user, &req(None, SummaryKind::Activity)).unwrap(),
            AggregateKey::ExerciseDay { user_id: user, date: d }
        );
        assert!(matches!(
            key_for(user, &req(Some("lunch"), SummaryKind::Activity)),
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn missing_row_is_no_data() {
        let ledger = MemoryLedger::new();
        let key = day_key(Uuid::new_v4(), "2024-02-29").unwrap();
        assert!(matches!(read_row(&ledger, key).await, Err(AppError::NoData)));
    }

    #[tokio::test]
    async fn recompute_of_an_empty_key_is_absent() {
        let ledger = MemoryLedger::new();
        let res = recompute(&ledger, Uuid::new_v4(), &req(None, SummaryKind::Activity))
            .await
            .unwrap();
        assert_eq!(res.result.outcome, RecomputeOutcome::Absent);
        assert!(res.row.is_none());
    }

    #[tokio::test]
    async fn reconcile_reports_nothing_changed_when_consistent() {
        let ledger = MemoryLedger::new();
        let user = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();
        engine::insert_entry(
            &ledger,
            LogEntry::Exercise(ExerciseEntry {
                id: Uuid::new_v4(),
                user_id: user,
                date: date!(2024 - 02 - 29),
                name: "yoga".into(),
                duration_min: 60.0,
                calories_burned: 180.0,
                created_at: now,
                updated_at: now,
            }),
        )
        .await
        .unwrap();

        let res = reconcile_user(&ledger, user).await.unwrap();
        assert_eq!(res.keys, 1);
        assert_eq!(res.changed, 0);
    }
}
