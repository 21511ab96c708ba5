//! Cart and cart line routes.
//!
//! Listing and creating need the device itself; everything addressed by id
//! accepts either the owning device or its bound user.

use axum::extract::State;
use axum::http::StatusCode;
use serde::Serialize;

use pantry_core::{CartId, CartProductId};

use crate::error::Result;
use crate::extract::{Json, Path};
use crate::middleware::{Caller, MaybeUser, MobileDevice};
use crate::models::{Cart, CartProduct};
use crate::response::ApiResponse;
use crate::services::carts::{
    CartChanges, CartDetail, CartProductChanges, NewCartInput, NewCartProductInput,
};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct Completion {
    pub is_completed: bool,
}

/// GET /carts
///
/// The device's carts, widened to the user's when a bearer token is sent.
pub async fn list(
    State(state): State<AppState>,
    MobileDevice(device): MobileDevice,
    MaybeUser(user): MaybeUser,
) -> Result<ApiResponse<Vec<Cart>>> {
    let carts = state.carts().list(&device, user.as_ref()).await?;
    Ok(ApiResponse::ok(carts))
}

/// POST /carts
pub async fn create(
    State(state): State<AppState>,
    MobileDevice(device): MobileDevice,
    Json(req): Json<NewCartInput>,
) -> Result<ApiResponse<Cart>> {
    let cart = state.carts().create(&device, req).await?;
    Ok(ApiResponse::created(cart))
}

/// GET /carts/{id}
pub async fn show(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    Path(id): Path<CartId>,
) -> Result<ApiResponse<CartDetail>> {
    Ok(ApiResponse::ok(state.carts().get(&ctx, id).await?))
}

/// PATCH /carts/{id}
pub async fn update(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    Path(id): Path<CartId>,
    Json(req): Json<CartChanges>,
) -> Result<ApiResponse<Cart>> {
    Ok(ApiResponse::ok(state.carts().update(&ctx, id, req).await?))
}

/// DELETE /carts/{id}
pub async fn delete(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    Path(id): Path<CartId>,
) -> Result<StatusCode> {
    state.carts().delete(&ctx, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /carts/{id}/products
pub async fn add_product(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    Path(cart): Path<CartId>,
    Json(req): Json<NewCartProductInput>,
) -> Result<ApiResponse<CartProduct>> {
    let line = state.carts().add_product(&ctx, cart, req).await?;
    Ok(ApiResponse::created(line))
}

/// GET /carts/{id}/products/{product_id}
pub async fn show_product(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    Path((cart, id)): Path<(CartId, CartProductId)>,
) -> Result<ApiResponse<CartProduct>> {
    Ok(ApiResponse::ok(state.carts().get_product(&ctx, cart, id).await?))
}

/// PATCH /carts/{id}/products/{product_id}
pub async fn update_product(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    Path((cart, id)): Path<(CartId, CartProductId)>,
    Json(req): Json<CartProductChanges>,
) -> Result<ApiResponse<CartProduct>> {
    let line = state.carts().update_product(&ctx, cart, id, req).await?;
    Ok(ApiResponse::ok(line))
}

/// DELETE /carts/{id}/products/{product_id}
pub async fn delete_product(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    Path((cart, id)): Path<(CartId, CartProductId)>,
) -> Result<StatusCode> {
    state.carts().delete_product(&ctx, cart, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /carts/{id}/products/{product_id}/completed
pub async fn toggle_completed(
    State(state): State<AppState>,
    Caller(ctx): Caller,
    Path((cart, id)): Path<(CartId, CartProductId)>,
) -> Result<ApiResponse<Completion>> {
    let is_completed = state.carts().toggle_completed(&ctx, cart, id).await?;
    Ok(ApiResponse::ok(Completion { is_completed }))
}
