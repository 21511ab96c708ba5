//! Recipe routes: bulk ingredient insertion and ratings.

use axum::extract::State;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use pantry_core::{RatingId, RecipeId};

use crate::error::Result;
use crate::extract::{Json, Path};
use crate::middleware::Caller;
use crate::models::Rating;
use crate::response::ApiResponse;
use crate::services::recipes::IngredientsToCarts;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct Created {
    pub created: u64,
}

#[derive(Debug, Deserialize)]
pub struct RatingRequest {
    pub rating: i16,
}

/// POST /recipes/{id}/ingredients
///
/// All-or-nothing: one foreign cart in the list aborts the whole insert.
pub async fn add_ingredients(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    Path(recipe): Path<RecipeId>,
    Json(req): Json<IngredientsToCarts>,
) -> Result<ApiResponse<Created>> {
    let created = state
        .recipes()
        .add_ingredients_to_carts(&ctx, recipe, req)
        .await?;
    Ok(ApiResponse::created(Created { created }))
}

/// POST /recipes/{id}/review
pub async fn review(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    Path(recipe): Path<RecipeId>,
    Json(req): Json<RatingRequest>,
) -> Result<ApiResponse<Rating>> {
    let rating = state.recipes().rate(&ctx, recipe, req.rating).await?;
    Ok(ApiResponse::created(rating))
}

/// PATCH /recipes/ratings/{id}
pub async fn update_rating(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    Path(id): Path<RatingId>,
    Json(req): Json<RatingRequest>,
) -> Result<ApiResponse<Rating>> {
    let rating = state.recipes().update_rating(&ctx, id, req.rating).await?;
    Ok(ApiResponse::ok(rating))
}

/// DELETE /recipes/ratings/{id}
pub async fn delete_rating(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    Path(id): Path<RatingId>,
) -> Result<StatusCode> {
    state.recipes().delete_rating(&ctx, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
