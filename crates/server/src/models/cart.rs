//! Shopping cart domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use pantry_core::{CartId, CartProductId, ColorId, DeviceId, Measurement, ProductId, UserId};

/// A per-device shopping list with its product counters.
#[derive(Debug, Clone, Serialize)]
pub struct Cart {
    pub id: CartId,
    #[serde(rename = "device")]
    pub device_id: DeviceId,
    /// User bound to the owning device at read time.
    #[serde(skip)]
    pub owner_user_id: Option<UserId>,
    pub title: String,
    #[serde(rename = "color")]
    pub color_id: ColorId,
    pub color_code: String,
    pub completed_products: i64,
    pub total_products: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Validated cart changes.
#[derive(Debug, Clone, Default)]
pub struct CartPatch {
    pub title: Option<String>,
    pub color_id: Option<ColorId>,
}

/// One line in a cart.
#[derive(Debug, Clone, Serialize)]
pub struct CartProduct {
    pub id: CartProductId,
    #[serde(rename = "cart")]
    pub cart_id: CartId,
    #[serde(rename = "product")]
    pub product_id: ProductId,
    pub quantity: i32,
    pub measurement: Measurement,
    pub is_completed: bool,
}

/// Validated input for a new cart line.
#[derive(Debug, Clone, Copy)]
pub struct NewCartProduct {
    pub product_id: ProductId,
    pub quantity: i32,
    pub measurement: Measurement,
}

/// Validated cart line changes.
#[derive(Debug, Clone, Copy, Default)]
pub struct CartProductPatch {
    pub quantity: Option<i32>,
    pub measurement: Option<Measurement>,
    pub is_completed: Option<bool>,
}
