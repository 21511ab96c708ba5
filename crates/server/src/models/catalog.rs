//! Read-only catalog records referenced by carts, ratings and votes.

use serde::Serialize;

use pantry_core::{AnswerId, ColorId, IngredientId, Measurement, ProductId, QuestionId, RecipeId};

#[derive(Debug, Clone, Serialize)]
pub struct Color {
    pub id: ColorId,
    pub title: String,
    /// `#rrggbb`
    pub code: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Recipe {
    pub id: RecipeId,
    pub title: String,
    pub avg_rating: f64,
}

/// A recipe line: which product, how much of it.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Ingredient {
    pub id: IngredientId,
    pub recipe_id: RecipeId,
    pub product_id: ProductId,
    pub quantity: i32,
    pub measurement: Measurement,
}

#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub id: AnswerId,
    pub question_id: QuestionId,
    pub title: String,
}
