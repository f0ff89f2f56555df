use anyhow::{bail, Context};
use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use time::Date;
use uuid::Uuid;

use super::{
    repo_types::{ActivityTotalsRow, ExerciseEntryRow, FoodEntryRow, KeyRow, NutritionTotalsRow},
    AggregateKey, AggregateRow, EntryKind, ExerciseEntry, FoodEntry, Ledger, LedgerTx, LogEntry,
    LogSource, Totals,
};
use crate::error::AppError;

const FOOD_ENTRY_COLUMNS: &str = "id, user_id, food_id, food_name, serving_id, entry_date, meal_type, \
     quantity, unit, calories, protein_g, carbs_g, fat_g, fiber_g, saturated_fat_g, sugar_g, \
     sodium_mg, created_at, updated_at";

const EXERCISE_ENTRY_COLUMNS: &str =
    "id, user_id, entry_date, name, duration_min, calories_burned, created_at, updated_at";

const NUTRITION_TOTAL_COLUMNS: &str = "calories, protein_g, carbs_g, fat_g, fiber_g, \
     saturated_fat_g, sugar_g, sodium_mg, entry_count, last_recomputed_at";

/// `food_id` is the only foreign key on `food_entries`; a violation means the
/// food was deleted after it was resolved.
fn food_write_error(err: sqlx::Error, food_id: Option<Uuid>, what: &'static str) -> anyhow::Error {
    let fk_violation = err
        .as_database_error()
        .map_or(false, |db| db.is_foreign_key_violation());
    match food_id {
        Some(id) if fk_violation => AppError::FoodNotFound(id).into(),
        _ => anyhow::Error::new(err).context(what),
    }
}

#[derive(Clone)]
pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub struct PgTx {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgTx {
    fn conn(&mut self) -> anyhow::Result<&mut PgConnection> {
        self.tx.as_deref_mut().context("transaction already committed")
    }
}

async fn fetch_food(
    conn: &mut PgConnection,
    user_id: Uuid,
    id: Uuid,
    lock: bool,
) -> anyhow::Result<Option<LogEntry>> {
    let sql = format!(
        "SELECT {FOOD_ENTRY_COLUMNS} FROM food_entries WHERE id = $1 AND user_id = $2{}",
        if lock { " FOR UPDATE" } else { "" }
    );
    let row = sqlx::query_as::<_, FoodEntryRow>(&sql)
        .bind(id)
        .bind(user_id)
        .fetch_optional(conn)
        .await
        .context("select food entry")?;
    row.map(|r| FoodEntry::try_from(r).map(LogEntry::Food)).transpose()
}

async fn fetch_exercise(
    conn: &mut PgConnection,
    user_id: Uuid,
    id: Uuid,
    lock: bool,
) -> anyhow::Result<Option<LogEntry>> {
    let sql = format!(
        "SELECT {EXERCISE_ENTRY_COLUMNS} FROM exercise_entries WHERE id = $1 AND user_id = $2{}",
        if lock { " FOR UPDATE" } else { "" }
    );
    let row = sqlx::query_as::<_, ExerciseEntryRow>(&sql)
        .bind(id)
        .bind(user_id)
        .fetch_optional(conn)
        .await
        .context("select exercise entry")?;
    Ok(row.map(|r| LogEntry::Exercise(r.into())))
}

async fn fetch_entry(
    conn: &mut PgConnection,
    kind: EntryKind,
    user_id: Uuid,
    id: Uuid,
    lock: bool,
) -> anyhow::Result<Option<LogEntry>> {
    match kind {
        EntryKind::Food => fetch_food(conn, user_id, id, lock).await,
        EntryKind::Exercise => fetch_exercise(conn, user_id, id, lock).await,
    }
}

async fn fetch_aggregate(
    conn: &mut PgConnection,
    key: &AggregateKey,
) -> anyhow::Result<Option<AggregateRow>> {
    let row = match *key {
        AggregateKey::FoodDay { user_id, date } => sqlx::query_as::<_, NutritionTotalsRow>(&format!(
            "SELECT {NUTRITION_TOTAL_COLUMNS} FROM daily_nutrition \
             WHERE user_id = $1 AND entry_date = $2"
        ))
        .bind(user_id)
        .bind(date)
        .fetch_optional(conn)
        .await
        .context("select daily_nutrition")?
        .map(|r| r.into_row(*key)),
        AggregateKey::FoodMeal {
            user_id,
            date,
            meal,
        } => sqlx::query_as::<_, NutritionTotalsRow>(&format!(
            "SELECT {NUTRITION_TOTAL_COLUMNS} FROM meal_nutrition \
             WHERE user_id = $1 AND entry_date = $2 AND meal_type = $3"
        ))
        .bind(user_id)
        .bind(date)
        .bind(meal.as_str())
        .fetch_optional(conn)
        .await
        .context("select meal_nutrition")?
        .map(|r| r.into_row(*key)),
        AggregateKey::ExerciseDay { user_id, date } => sqlx::query_as::<_, ActivityTotalsRow>(
            r#"
            SELECT duration_min, calories_burned, entry_count, last_recomputed_at
            FROM daily_activity
            WHERE user_id = $1 AND entry_date = $2
            "#,
        )
        .bind(user_id)
        .bind(date)
        .fetch_optional(conn)
        .await
        .context("select daily_activity")?
        .map(|r| r.into_row(*key)),
    };
    Ok(row)
}

#[async_trait]
impl LedgerTx for PgTx {
    async fn lock_keys(&mut self, keys: &[AggregateKey]) -> anyhow::Result<()> {
        let mut sorted = keys.to_vec();
        sorted.sort();
        sorted.dedup();
        let conn = self.conn()?;
        for key in sorted {
            sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
                .bind(key.to_string())
                .execute(&mut *conn)
                .await
                .with_context(|| format!("advisory lock {key}"))?;
        }
        Ok(())
    }

    async fn find_entry(
        &mut self,
        kind: EntryKind,
        user_id: Uuid,
        id: Uuid,
    ) -> anyhow::Result<Option<LogEntry>> {
        fetch_entry(self.conn()?, kind, user_id, id, true).await
    }

    async fn insert_entry(&mut self, entry: &LogEntry) -> anyhow::Result<()> {
        let conn = self.conn()?;
        match entry {
            LogEntry::Food(e) => {
                sqlx::query(
                    r#"
                    INSERT INTO food_entries (id, user_id, food_id, food_name, serving_id, entry_date,
                        meal_type, quantity, unit, calories, protein_g, carbs_g, fat_g, fiber_g,
                        saturated_fat_g, sugar_g, sodium_mg, created_at, updated_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
                    "#,
                )
                .bind(e.id)
                .bind(e.user_id)
                .bind(e.food_id)
                .bind(&e.food_name)
                .bind(e.serving_id)
                .bind(e.date)
                .bind(e.meal.as_str())
                .bind(e.quantity)
                .bind(e.unit.as_str())
                .bind(e.nutrients.calories)
                .bind(e.nutrients.protein_g)
                .bind(e.nutrients.carbs_g)
                .bind(e.nutrients.fat_g)
                .bind(e.nutrients.fiber_g)
                .bind(e.nutrients.saturated_fat_g)
                .bind(e.nutrients.sugar_g)
                .bind(e.nutrients.sodium_mg)
                .bind(e.created_at)
                .bind(e.updated_at)
                .execute(conn)
                .await
                .map_err(|err| food_write_error(err, e.food_id, "insert food entry"))?;
            }
            LogEntry::Exercise(e) => {
                sqlx::query(
                    r#"
                    INSERT INTO exercise_entries (id, user_id, entry_date, name, duration_min,
                        calories_burned, created_at, updated_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                    "#,
                )
                .bind(e.id)
                .bind(e.user_id)
                .bind(e.date)
                .bind(&e.name)
                .bind(e.duration_min)
                .bind(e.calories_burned)
                .bind(e.created_at)
                .bind(e.updated_at)
                .execute(conn)
                .await
                .context("insert exercise entry")?;
            }
        }
        Ok(())
    }

    async fn update_entry(&mut self, entry: &LogEntry) -> anyhow::Result<()> {
        let conn = self.conn()?;
        let result = match entry {
            LogEntry::Food(e) => sqlx::query(
                r#"
                UPDATE food_entries
                SET food_id = $3, food_name = $4, serving_id = $5, entry_date = $6, meal_type = $7,
                    quantity = $8, unit = $9, calories = $10, protein_g = $11, carbs_g = $12,
                    fat_g = $13, fiber_g = $14, saturated_fat_g = $15, sugar_g = $16,
                    sodium_mg = $17, updated_at = $18
                WHERE id = $1 AND user_id = $2
                "#,
            )
            .bind(e.id)
            .bind(e.user_id)
            .bind(e.food_id)
            .bind(&e.food_name)
            .bind(e.serving_id)
            .bind(e.date)
            .bind(e.meal.as_str())
            .bind(e.quantity)
            .bind(e.unit.as_str())
            .bind(e.nutrients.calories)
            .bind(e.nutrients.protein_g)
            .bind(e.nutrients.carbs_g)
            .bind(e.nutrients.fat_g)
            .bind(e.nutrients.fiber_g)
            .bind(e.nutrients.saturated_fat_g)
            .bind(e.nutrients.sugar_g)
            .bind(e.nutrients.sodium_mg)
            .bind(e.updated_at)
            .execute(conn)
            .await
            .map_err(|err| food_write_error(err, e.food_id, "update food entry"))?,
            LogEntry::Exercise(e) => sqlx::query(
                r#"
                UPDATE exercise_entries
                SET entry_date = $3, name = $4, duration_min = $5, calories_burned = $6, updated_at = $7
                WHERE id = $1 AND user_id = $2
                "#,
            )
            .bind(e.id)
            .bind(e.user_id)
            .bind(e.date)
            .bind(&e.name)
            .bind(e.duration_min)
            .bind(e.calories_burned)
            .bind(e.updated_at)
            .execute(conn)
            .await
            .context("update exercise entry")?,
        };
        if result.rows_affected() != 1 {
            bail!("entry {} does not exist", entry.entry_id());
        }
        Ok(())
    }

    async fn delete_entry(&mut self, kind: EntryKind, user_id: Uuid, id: Uuid) -> anyhow::Result<()> {
        let sql = match kind {
            EntryKind::Food => "DELETE FROM food_entries WHERE id = $1 AND user_id = $2",
            EntryKind::Exercise => "DELETE FROM exercise_entries WHERE id = $1 AND user_id = $2",
        };
        sqlx::query(sql)
            .bind(id)
            .bind(user_id)
            .execute(self.conn()?)
            .await
            .context("delete entry")?;
        Ok(())
    }

    async fn entries_for(&mut self, key: &AggregateKey) -> anyhow::Result<Vec<LogEntry>> {
        let conn = self.conn()?;
        match *key {
            AggregateKey::FoodDay { user_id, date } => {
                let rows = sqlx::query_as::<_, FoodEntryRow>(&format!(
                    "SELECT {FOOD_ENTRY_COLUMNS} FROM food_entries \
                     WHERE user_id = $1 AND entry_date = $2 ORDER BY id"
                ))
                .bind(user_id)
                .bind(date)
                .fetch_all(conn)
                .await
                .context("select food entries for day")?;
                rows.into_iter()
                    .map(|r| FoodEntry::try_from(r).map(LogEntry::Food))
                    .collect()
            }
            AggregateKey::FoodMeal {
                user_id,
                date,
                meal,
            } => {
                let rows = sqlx::query_as::<_, FoodEntryRow>(&format!(
                    "SELECT {FOOD_ENTRY_COLUMNS} FROM food_entries \
                     WHERE user_id = $1 AND entry_date = $2 AND meal_type = $3 ORDER BY id"
                ))
                .bind(user_id)
                .bind(date)
                .bind(meal.as_str())
                .fetch_all(conn)
                .await
                .context("select food entries for meal")?;
                rows.into_iter()
                    .map(|r| FoodEntry::try_from(r).map(LogEntry::Food))
                    .collect()
            }
            AggregateKey::ExerciseDay { user_id, date } => {
                let rows = sqlx::query_as::<_, ExerciseEntryRow>(&format!(
                    "SELECT {EXERCISE_ENTRY_COLUMNS} FROM exercise_entries \
                     WHERE user_id = $1 AND entry_date = $2 ORDER BY id"
                ))
                .bind(user_id)
                .bind(date)
                .fetch_all(conn)
                .await
                .context("select exercise entries for day")?;
                Ok(rows.into_iter().map(|r| LogEntry::Exercise(r.into())).collect())
            }
        }
    }

    async fn aggregate(&mut self, key: &AggregateKey) -> anyhow::Result<Option<AggregateRow>> {
        fetch_aggregate(self.conn()?, key).await
    }

    async fn put_aggregate(&mut self, row: &AggregateRow) -> anyhow::Result<()> {
        let conn = self.conn()?;
        match (row.key, row.totals) {
            (AggregateKey::FoodDay { user_id, date }, Totals::Nutrients(t)) => {
                sqlx::query(
                    r#"
                    INSERT INTO daily_nutrition (user_id, entry_date, calories, protein_g, carbs_g,
                        fat_g, fiber_g, saturated_fat_g, sugar_g, sodium_mg, entry_count, last_recomputed_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                    ON CONFLICT (user_id, entry_date) DO UPDATE
                    SET calories = EXCLUDED.calories, protein_g = EXCLUDED.protein_g,
                        carbs_g = EXCLUDED.carbs_g, fat_g = EXCLUDED.fat_g, fiber_g = EXCLUDED.fiber_g,
                        saturated_fat_g = EXCLUDED.saturated_fat_g, sugar_g = EXCLUDED.sugar_g,
                        sodium_mg = EXCLUDED.sodium_mg, entry_count = EXCLUDED.entry_count,
                        last_recomputed_at = EXCLUDED.last_recomputed_at
                    "#,
                )
                .bind(user_id)
                .bind(date)
                .bind(t.calories)
                .bind(t.protein_g)
                .bind(t.carbs_g)
                .bind(t.fat_g)
                .bind(t.fiber_g)
                .bind(t.saturated_fat_g)
                .bind(t.sugar_g)
                .bind(t.sodium_mg)
                .bind(row.entry_count)
                .bind(row.last_recomputed_at)
                .execute(conn)
                .await
                .context("upsert daily_nutrition")?;
            }
            (
                AggregateKey::FoodMeal {
                    user_id,
                    date,
                    meal,
                },
                Totals::Nutrients(t),
            ) => {
                sqlx::query(
                    r#"
                    INSERT INTO meal_nutrition (user_id, entry_date, meal_type, calories, protein_g,
                        carbs_g, fat_g, fiber_g, saturated_fat_g, sugar_g, sodium_mg, entry_count,
                        last_recomputed_at)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
                    ON CONFLICT (user_id, entry_date, meal_type) DO UPDATE
                    SET calories = EXCLUDED.calories, protein_g = EXCLUDED.protein_g,
                        carbs_g = EXCLUDED.carbs_g, fat_g = EXCLUDED.fat_g, fiber_g = EXCLUDED.fiber_g,
                        saturated_fat_g = EXCLUDED.saturated_fat_g, sugar_g = EXCLUDED.sugar_g,
                        sodium_mg = EXCLUDED.sodium_mg, entry_count = EXCLUDED.entry_count,
                        last_recomputed_at = EXCLUDED.last_recomputed_at
                    "#,
                )
                .bind(user_id)
                .bind(date)
                .bind(meal.as_str())
                .bind(t.calories)
                .bind(t.protein_g)
                .bind(t.carbs_g)
                .bind(t.fat_g)
                .bind(t.fiber_g)
                .bind(t.saturated_fat_g)
                .bind(t.sugar_g)
                .bind(t.sodium_mg)
                .bind(row.entry_count)
                .bind(row.last_recomputed_at)
                .execute(conn)
                .await
                .context("upsert meal_nutrition")?;
            }
            (AggregateKey::ExerciseDay { user_id, date }, Totals::Activity(t)) => {
                sqlx::query(
                    r#"
                    INSERT INTO daily_activity (user_id, entry_date, duration_min, calories_burned,
                        entry_count, last_recomputed_at)
                    VALUES ($1, $2, $3, $4, $5, $6)
                    ON CONFLICT (user_id, entry_date) DO UPDATE
                    SET duration_min = EXCLUDED.duration_min,
                        calories_burned = EXCLUDED.calories_burned,
                        entry_count = EXCLUDED.entry_count,
                        last_recomputed_at = EXCLUDED.last_recomputed_at
                    "#,
                )
                .bind(user_id)
                .bind(date)
                .bind(t.duration_min)
                .bind(t.calories_burned)
                .bind(row.entry_count)
                .bind(row.last_recomputed_at)
                .execute(conn)
                .await
                .context("upsert daily_activity")?;
            }
            (key, _) => bail!("totals do not match key {key}"),
        }
        Ok(())
    }

    async fn remove_aggregate(&mut self, key: &AggregateKey) -> anyhow::Result<()> {
        let conn = self.conn()?;
        let query = match *key {
            AggregateKey::FoodDay { user_id, date } => {
                sqlx::query("DELETE FROM daily_nutrition WHERE user_id = $1 AND entry_date = $2")
                    .bind(user_id)
                    .bind(date)
            }
            AggregateKey::FoodMeal {
                user_id,
                date,
                meal,
            } => sqlx::query(
                "DELETE FROM meal_nutrition WHERE user_id = $1 AND entry_date = $2 AND meal_type = $3",
            )
            .bind(user_id)
            .bind(date)
            .bind(meal.as_str()),
            AggregateKey::ExerciseDay { user_id, date } => {
                sqlx::query("DELETE FROM daily_activity WHERE user_id = $1 AND entry_date = $2")
                    .bind(user_id)
                    .bind(date)
            }
        };
        query
            .execute(conn)
            .await
            .with_context(|| format!("delete aggregate {key}"))?;
        Ok(())
    }

    async fn commit(&mut self) -> anyhow::Result<()> {
        let tx = self.tx.take().context("transaction already committed")?;
        tx.commit().await.context("commit transaction")?;
        Ok(())
    }
}

#[async_trait]
impl Ledger for PgLedger {
    async fn begin(&self) -> anyhow::Result<Box<dyn LedgerTx>> {
        let tx = self.pool.begin().await.context("begin transaction")?;
        Ok(Box::new(PgTx { tx: Some(tx) }))
    }

    async fn aggregate(&self, key: &AggregateKey) -> anyhow::Result<Option<AggregateRow>> {
        let mut conn = self.pool.acquire().await.context("acquire connection")?;
        fetch_aggregate(&mut conn, key).await
    }

    async fn entry(&self, kind: EntryKind, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<LogEntry>> {
        let mut conn = self.pool.acquire().await.context("acquire connection")?;
        fetch_entry(&mut conn, kind, user_id, id, false).await
    }

    async fn entries_on(&self, user_id: Uuid, date: Date) -> anyhow::Result<Vec<LogEntry>> {
        let foods = sqlx::query_as::<_, FoodEntryRow>(&format!(
            "SELECT {FOOD_ENTRY_COLUMNS} FROM food_entries \
             WHERE user_id = $1 AND entry_date = $2 ORDER BY created_at, id"
        ))
        .bind(user_id)
        .bind(date)
        .fetch_all(&self.pool)
        .await
        .context("list food entries")?;

        let exercises = sqlx::query_as::<_, ExerciseEntryRow>(&format!(
            "SELECT {EXERCISE_ENTRY_COLUMNS} FROM exercise_entries \
             WHERE user_id = $1 AND entry_date = $2 ORDER BY created_at, id"
        ))
        .bind(user_id)
        .bind(date)
        .fetch_all(&self.pool)
        .await
        .context("list exercise entries")?;

        let mut entries = foods
            .into_iter()
            .map(|r| FoodEntry::try_from(r).map(LogEntry::Food))
            .collect::<anyhow::Result<Vec<_>>>()?;
        entries.extend(
            exercises
                .into_iter()
                .map(|r| LogEntry::Exercise(ExerciseEntry::from(r))),
        );
        Ok(entries)
    }

    async fn known_keys(&self, user_id: Option<Uuid>) -> anyhow::Result<Vec<AggregateKey>> {
        let rows = sqlx::query_as::<_, KeyRow>(
            r#"
            SELECT 'food_day' AS kind, user_id, entry_date, NULL::text AS meal_type
            FROM food_entries WHERE ($1::uuid IS NULL OR user_id = $1)
            UNION
            SELECT 'food_day', user_id, entry_date, NULL FROM daily_nutrition
            WHERE ($1::uuid IS NULL OR user_id = $1)
            UNION
            SELECT 'food_meal', user_id, entry_date, meal_type FROM food_entries
            WHERE ($1::uuid IS NULL OR user_id = $1)
            UNION
            SELECT 'food_meal', user_id, entry_date, meal_type FROM meal_nutrition
            WHERE ($1::uuid IS NULL OR user_id = $1)
            UNION
            SELECT 'exercise_day', user_id, entry_date, NULL FROM exercise_entries
            WHERE ($1::uuid IS NULL OR user_id = $1)
            UNION
            SELECT 'exercise_day', user_id, entry_date, NULL FROM daily_activity
            WHERE ($1::uuid IS NULL OR user_id = $1)
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("discover aggregate keys")?;

        let mut keys = rows
            .into_iter()
            .map(AggregateKey::try_from)
            .collect::<anyhow::Result<Vec<_>>>()?;
        keys.sort();
        keys.dedup();
        Ok(keys)
    }
}
