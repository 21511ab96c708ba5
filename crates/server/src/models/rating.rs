//! Recipe rating owned by a device.

use chrono::{DateTime, Utc};
use serde::Serialize;

use pantry_core::{DeviceId, RatingId, RecipeId, UserId};

#[derive(Debug, Clone, Serialize)]
pub struct Rating {
    pub id: RatingId,
    #[serde(rename = "recipe")]
    pub recipe_id: RecipeId,
    pub recipe_title: String,
    #[serde(rename = "device")]
    pub device_id: DeviceId,
    #[serde(skip)]
    pub owner_user_id: Option<UserId>,
    pub rating: i16,
    pub created_at: DateTime<Utc>,
}
