//! Recipe rating repository.
//!
//! Every write recomputes the recipe's `avg_rating` in the same transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use pantry_core::{DeviceId, RatingId, RecipeId, UserId};

use super::{RepositoryError, map_unique_violation};
use crate::models::Rating;

/// Constraint violated by a device rating the same recipe twice.
pub const RATING_UNIQUE: &str = "recipe_rating_recipe_device_key";

/// Storage port for recipe ratings.
#[async_trait]
pub trait RatingRepository: Send + Sync {
    /// # Errors
    ///
    /// `Conflict(RATING_UNIQUE)` when the device already rated the recipe.
    async fn create(
        &self,
        recipe: RecipeId,
        device: DeviceId,
        rating: i16,
    ) -> Result<Rating, RepositoryError>;

    async fn get(&self, id: RatingId) -> Result<Option<Rating>, RepositoryError>;

    async fn update(&self, id: RatingId, rating: i16) -> Result<Rating, RepositoryError>;

    async fn delete(&self, id: RatingId) -> Result<(), RepositoryError>;
}

#[derive(sqlx::FromRow)]
struct RatingRow {
    id: RatingId,
    recipe_id: RecipeId,
    recipe_title: String,
    device_id: DeviceId,
    owner_user_id: Option<UserId>,
    rating: i16,
    created_at: DateTime<Utc>,
}

impl From<RatingRow> for Rating {
    fn from(row: RatingRow) -> Self {
        Self {
            id: row.id,
            recipe_id: row.recipe_id,
            recipe_title: row.recipe_title,
            device_id: row.device_id,
            owner_user_id: row.owner_user_id,
            rating: row.rating,
            created_at: row.created_at,
        }
    }
}

/// `PostgreSQL` rating repository.
#[derive(Clone)]
pub struct PgRatingRepository {
    pool: PgPool,
}

impl PgRatingRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn refresh_average(
    tx: &mut Transaction<'_, Postgres>,
    recipe: RecipeId,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE recipe
        SET avg_rating = COALESCE(
            (SELECT avg(rating)::DOUBLE PRECISION FROM recipe_rating WHERE recipe_id = $1),
            0
        )
        WHERE id = $1
        ",
    )
    .bind(recipe)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[async_trait]
impl RatingRepository for PgRatingRepository {
    async fn create(
        &self,
        recipe: RecipeId,
        device: DeviceId,
        rating: i16,
    ) -> Result<Rating, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let id: RatingId = sqlx::query_scalar(
            r"
            INSERT INTO recipe_rating (recipe_id, device_id, rating)
            VALUES ($1, $2, $3)
            RETURNING id
            ",
        )
        .bind(recipe)
        .bind(device)
        .bind(rating)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_unique_violation)?;

        refresh_average(&mut tx, recipe).await?;
        tx.commit().await?;

        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    async fn get(&self, id: RatingId) -> Result<Option<Rating>, RepositoryError> {
        let row = sqlx::query_as::<_, RatingRow>(
            r"
            SELECT r.id, r.recipe_id, rc.title AS recipe_title, r.device_id,
                   d.user_id AS owner_user_id, r.rating, r.created_at
            FROM recipe_rating r
            JOIN recipe rc ON rc.id = r.recipe_id
            JOIN device d ON d.id = r.device_id
            WHERE r.id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn update(&self, id: RatingId, rating: i16) -> Result<Rating, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let recipe: Option<RecipeId> = sqlx::query_scalar(
            "UPDATE recipe_rating SET rating = $2 WHERE id = $1 RETURNING recipe_id",
        )
        .bind(id)
        .bind(rating)
        .fetch_optional(&mut *tx)
        .await?;
        let recipe = recipe.ok_or(RepositoryError::NotFound)?;

        refresh_average(&mut tx, recipe).await?;
        tx.commit().await?;

        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    async fn delete(&self, id: RatingId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let recipe: Option<RecipeId> =
            sqlx::query_scalar("DELETE FROM recipe_rating WHERE id = $1 RETURNING recipe_id")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;

        if let Some(recipe) = recipe {
            refresh_average(&mut tx, recipe).await?;
        }
        tx.commit().await?;
        Ok(())
    }
}
