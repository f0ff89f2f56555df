use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{
    repo_types::{FoodRow, ServingRow},
    FoodCatalog,
};
use crate::nutrition::FoodDefinition;

#[derive(Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FoodCatalog for PgCatalog {
    async fn create(&self, food: &FoodDefinition) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await.context("begin transaction")?;

        let n = &food.nutrients;
        sqlx::query(
            r#"
            INSERT INTO foods (id, name, calories, protein_g, carbs_g, fat_g, fiber_g,
                saturated_fat_g, sugar_g, sodium_mg, serving_size, serving_unit)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(food.id)
        .bind(&food.name)
        .bind(n.calories)
        .bind(n.protein_g)
        .bind(n.carbs_g)
        .bind(n.fat_g)
        .bind(n.fiber_g)
        .bind(n.saturated_fat_g)
        .bind(n.sugar_g)
        .bind(n.sodium_mg)
        .bind(food.serving_size)
        .bind(food.serving_unit.as_str())
        .execute(&mut *tx)
        .await
        .context("insert food")?;

        for serving in &food.servings {
            sqlx::query(
                r#"
                INSERT INTO food_servings (id, food_id, name, weight_g, volume_ml, sort_order)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(serving.id)
            .bind(food.id)
            .bind(&serving.name)
            .bind(serving.measure.weight_g())
            .bind(serving.measure.volume_ml())
            .bind(serving.sort_order)
            .execute(&mut *tx)
            .await
            .context("insert food serving")?;
        }

        tx.commit().await.context("commit food")?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<FoodDefinition>> {
        let food = sqlx::query_as::<_, FoodRow>(
            r#"
            SELECT id, name, calories, protein_g, carbs_g, fat_g, fiber_g, saturated_fat_g,
                   sugar_g, sodium_mg, serving_size, serving_unit
            FROM foods
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("select food")?;

        let Some(food) = food else {
            return Ok(None);
        };

        let servings = sqlx::query_as::<_, ServingRow>(
            r#"
            SELECT id, food_id, name, weight_g, volume_ml, sort_order
            FROM food_servings
            WHERE food_id = $1
            ORDER BY sort_order, id
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .context("select food servings")?;

        food.with_servings(servings).map(Some)
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM foods WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("delete food")?;
        Ok(result.rows_affected() > 0)
    }
}
