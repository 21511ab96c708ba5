//! Recipe actions: copying ingredients into carts, and ratings.

use std::collections::BTreeSet;

use serde::Deserialize;

use pantry_core::{CartId, IngredientId, RatingId, RecipeId};

use super::access::RequestContext;
use super::guard::{Decision, Owned, ResourceError, acting_device, authorize, ensure};
use super::validation::ValidationErrors;
use crate::db::Repositories;
use crate::db::ratings::RATING_UNIQUE;
use crate::models::{NewCartProduct, Rating};

const RATING_RANGE: std::ops::RangeInclusive<i16> = 0..=5;

/// Which ingredients go into which carts.
#[derive(Debug, Clone, Deserialize)]
pub struct IngredientsToCarts {
    pub ingredients: Vec<IngredientId>,
    pub carts: Vec<CartId>,
}

pub struct RecipeService<'a> {
    repos: &'a Repositories,
}

impl<'a> RecipeService<'a> {
    #[must_use]
    pub const fn new(repos: &'a Repositories) -> Self {
        Self { repos }
    }

    /// Add one line per (cart, ingredient) pair. All carts are checked
    /// before anything is written.
    ///
    /// # Errors
    ///
    /// `Validation` for empty lists, `NotFound` when none of the carts or
    /// ingredients exist, `PermissionDenied` if any cart is not the caller's.
    pub async fn add_ingredients_to_carts(
        &self,
        ctx: &RequestContext,
        recipe: RecipeId,
        request: IngredientsToCarts,
    ) -> Result<u64, ResourceError> {
        let mut errors = ValidationErrors::new();
        if request.ingredients.is_empty() {
            errors.add("ingredients", "must not be empty");
        }
        if request.carts.is_empty() {
            errors.add("carts", "must not be empty");
        }
        errors.into_result()?;

        if self.repos.catalog.recipe(recipe).await?.is_none() {
            return Err(ResourceError::NotFound);
        }

        let ingredient_ids: Vec<IngredientId> = dedup(request.ingredients);
        let ingredients = self.repos.catalog.ingredients(recipe, &ingredient_ids).await?;
        let cart_ids: Vec<CartId> = dedup(request.carts);
        let carts = self.repos.carts.get_many(&cart_ids).await?;
        if ingredients.is_empty() || carts.is_empty() {
            return Err(ResourceError::NotFound);
        }

        for cart in &carts {
            if authorize(ctx, &cart.owner()) == Decision::Denied {
                tracing::warn!(
                    cart_id = %cart.id,
                    recipe_id = %recipe,
                    "Bulk ingredient insert denied"
                );
                return Err(ResourceError::PermissionDenied);
            }
        }

        let lines: Vec<(CartId, NewCartProduct)> = carts
            .iter()
            .flat_map(|cart| {
                ingredients.iter().map(|i| {
                    (
                        cart.id,
                        NewCartProduct {
                            product_id: i.product_id,
                            quantity: i.quantity,
                            measurement: i.measurement,
                        },
                    )
                })
            })
            .collect();

        let created = self.repos.carts.add_products_bulk(&lines).await?;
        tracing::info!(recipe_id = %recipe, carts = carts.len(), created, "Ingredients added to carts");
        Ok(created)
    }

    // =========================================================================
    // Ratings
    // =========================================================================

    /// Rate a recipe once per device.
    ///
    /// # Errors
    ///
    /// `DeviceNotFound` if the caller has no device, `Validation` for an
    /// out-of-range rating, `NotFound` for an unknown recipe,
    /// `AlreadyExists` for a second rating from the same device.
    pub async fn rate(
        &self,
        ctx: &RequestContext,
        recipe: RecipeId,
        rating: i16,
    ) -> Result<Rating, ResourceError> {
        let device = acting_device(self.repos, ctx).await?;
        check_rating(rating)?;

        if self.repos.catalog.recipe(recipe).await?.is_none() {
            return Err(ResourceError::NotFound);
        }

        match self.repos.ratings.create(recipe, device, rating).await {
            Ok(rating) => Ok(rating),
            Err(e) if e.is_conflict_on(RATING_UNIQUE) => Err(ResourceError::AlreadyExists),
            Err(e) => Err(e.into()),
        }
    }

    /// # Errors
    ///
    /// `NotFound`, `PermissionDenied` or `Validation`.
    pub async fn update_rating(
        &self,
        ctx: &RequestContext,
        id: RatingId,
        rating: i16,
    ) -> Result<Rating, ResourceError> {
        let existing = ensure(ctx, self.repos.ratings.get(id).await?)?;
        check_rating(rating)?;
        Ok(self.repos.ratings.update(existing.id, rating).await?)
    }

    /// # Errors
    ///
    /// `NotFound` or `PermissionDenied`.
    pub async fn delete_rating(&self, ctx: &RequestContext, id: RatingId) -> Result<(), ResourceError> {
        let existing = ensure(ctx, self.repos.ratings.get(id).await?)?;
        self.repos.ratings.delete(existing.id).await?;
        Ok(())
    }
}

fn check_rating(rating: i16) -> Result<(), ValidationErrors> {
    if RATING_RANGE.contains(&rating) {
        Ok(())
    } else {
        Err(ValidationErrors::single("rating", "must be between 0 and 5"))
    }
}

fn dedup<T: Ord>(ids: Vec<T>) -> Vec<T> {
    ids.into_iter().collect::<BTreeSet<_>>().into_iter().collect()
}
