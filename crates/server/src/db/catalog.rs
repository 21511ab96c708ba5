//! Catalog lookups: colors, products, recipes and questionnaire answers.
//!
//! Catalog content is managed outside this service; the API only reads it.

use async_trait::async_trait;
use sqlx::PgPool;

use pantry_core::{AnswerId, ColorId, IngredientId, Measurement, ProductId, QuestionId, RecipeId};

use super::RepositoryError;
use crate::models::{Answer, Color, Ingredient, Recipe};

/// Read-only catalog port.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn color(&self, id: ColorId) -> Result<Option<Color>, RepositoryError>;

    async fn product_exists(&self, id: ProductId) -> Result<bool, RepositoryError>;

    async fn recipe(&self, id: RecipeId) -> Result<Option<Recipe>, RepositoryError>;

    /// Ingredients of `recipe` whose ids are in `ids`, ordered by id.
    async fn ingredients(
        &self,
        recipe: RecipeId,
        ids: &[IngredientId],
    ) -> Result<Vec<Ingredient>, RepositoryError>;

    async fn answer(&self, id: AnswerId) -> Result<Option<Answer>, RepositoryError>;
}

#[derive(sqlx::FromRow)]
struct ColorRow {
    id: ColorId,
    title: String,
    code: String,
}

#[derive(sqlx::FromRow)]
struct RecipeRow {
    id: RecipeId,
    title: String,
    avg_rating: f64,
}

#[derive(sqlx::FromRow)]
struct IngredientRow {
    id: IngredientId,
    recipe_id: RecipeId,
    product_id: ProductId,
    quantity: i32,
    measurement: Measurement,
}

#[derive(sqlx::FromRow)]
struct AnswerRow {
    id: AnswerId,
    question_id: QuestionId,
    title: String,
}

/// `PostgreSQL` catalog repository.
#[derive(Clone)]
pub struct PgCatalogRepository {
    pool: PgPool,
}

impl PgCatalogRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogRepository for PgCatalogRepository {
    async fn color(&self, id: ColorId) -> Result<Option<Color>, RepositoryError> {
        let row = sqlx::query_as::<_, ColorRow>("SELECT id, title, code FROM color WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| Color {
            id: r.id,
            title: r.title,
            code: r.code,
        }))
    }

    async fn product_exists(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM product WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn recipe(&self, id: RecipeId) -> Result<Option<Recipe>, RepositoryError> {
        let row = sqlx::query_as::<_, RecipeRow>(
            "SELECT id, title, avg_rating FROM recipe WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Recipe {
            id: r.id,
            title: r.title,
            avg_rating: r.avg_rating,
        }))
    }

    async fn ingredients(
        &self,
        recipe: RecipeId,
        ids: &[IngredientId],
    ) -> Result<Vec<Ingredient>, RepositoryError> {
        let rows = sqlx::query_as::<_, IngredientRow>(
            r"
            SELECT id, recipe_id, product_id, quantity, measurement
            FROM recipe_ingredient
            WHERE recipe_id = $1 AND id = ANY($2)
            ORDER BY id
            ",
        )
        .bind(recipe)
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| Ingredient {
                id: r.id,
                recipe_id: r.recipe_id,
                product_id: r.product_id,
                quantity: r.quantity,
                measurement: r.measurement,
            })
            .collect())
    }

    async fn answer(&self, id: AnswerId) -> Result<Option<Answer>, RepositoryError> {
        let row = sqlx::query_as::<_, AnswerRow>(
            "SELECT id, question_id, title FROM answer WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| Answer {
            id: r.id,
            question_id: r.question_id,
            title: r.title,
        }))
    }
}
