//! Shopping carts and their lines.
//!
//! Carts are created under the presenting device. Every read or write of an
//! existing cart goes through [`guard::ensure`](super::guard::ensure), and a
//! cart line is only ever addressed through the cart it belongs to.

use serde::{Deserialize, Serialize};

use pantry_core::{CartId, CartProductId, ColorId, Measurement, ProductId};

use super::access::RequestContext;
use super::guard::{ResourceError, ensure};
use super::validation::{ValidationErrors, check_length};
use crate::db::Repositories;
use crate::models::{Cart, CartPatch, CartProduct, CartProductPatch, Device, NewCartProduct, User};

const TITLE_MAX_LENGTH: usize = 128;

#[derive(Debug, Clone, Deserialize)]
pub struct NewCartInput {
    pub title: String,
    pub color: ColorId,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CartChanges {
    pub title: Option<String>,
    pub color: Option<ColorId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCartProductInput {
    pub product: ProductId,
    pub quantity: i32,
    #[serde(default)]
    pub measurement: Measurement,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CartProductChanges {
    pub quantity: Option<i32>,
    pub measurement: Option<Measurement>,
    pub is_completed: Option<bool>,
}

/// A cart with its lines.
#[derive(Debug, Clone, Serialize)]
pub struct CartDetail {
    #[serde(flatten)]
    pub cart: Cart,
    pub products: Vec<CartProduct>,
}

pub struct CartService<'a> {
    repos: &'a Repositories,
}

impl<'a> CartService<'a> {
    #[must_use]
    pub const fn new(repos: &'a Repositories) -> Self {
        Self { repos }
    }

    /// The device's own carts, widened to all of the user's devices when a
    /// bearer user is present.
    ///
    /// # Errors
    ///
    /// Returns `ResourceError::Repository` if storage fails.
    pub async fn list(&self, device: &Device, user: Option<&User>) -> Result<Vec<Cart>, ResourceError> {
        Ok(self
            .repos
            .carts
            .list_visible(device.id, user.map(|u| u.id))
            .await?)
    }

    /// # Errors
    ///
    /// `Validation` for a blank or over-long title or an unknown color.
    pub async fn create(&self, device: &Device, input: NewCartInput) -> Result<Cart, ResourceError> {
        let mut errors = ValidationErrors::new();
        let title = input.title.trim().to_owned();
        check_length(&mut errors, "title", &title, 1, TITLE_MAX_LENGTH);
        self.check_color(&mut errors, input.color).await?;
        errors.into_result()?;

        let cart = self.repos.carts.create(device.id, &title, input.color).await?;
        tracing::info!(cart_id = %cart.id, device_id = %device.id, "Cart created");
        Ok(cart)
    }

    async fn check_color(
        &self,
        errors: &mut ValidationErrors,
        color: ColorId,
    ) -> Result<(), ResourceError> {
        if self.repos.catalog.color(color).await?.is_none() {
            errors.add("color", "does not exist");
        }
        Ok(())
    }

    async fn owned_cart(&self, ctx: &RequestContext, id: CartId) -> Result<Cart, ResourceError> {
        let cart = self.repos.carts.get(id).await?;
        ensure(ctx, cart)
    }

    /// # Errors
    ///
    /// `NotFound` for a missing cart, `PermissionDenied` for someone else's.
    pub async fn get(&self, ctx: &RequestContext, id: CartId) -> Result<CartDetail, ResourceError> {
        let cart = self.owned_cart(ctx, id).await?;
        let products = self.repos.carts.list_products(cart.id).await?;
        Ok(CartDetail { cart, products })
    }

    /// # Errors
    ///
    /// As [`Self::get`], plus `Validation` for bad fields.
    pub async fn update(
        &self,
        ctx: &RequestContext,
        id: CartId,
        changes: CartChanges,
    ) -> Result<Cart, ResourceError> {
        let cart = self.owned_cart(ctx, id).await?;

        let mut errors = ValidationErrors::new();
        let title = changes.title.map(|t| t.trim().to_owned());
        if let Some(title) = &title {
            check_length(&mut errors, "title", title, 1, TITLE_MAX_LENGTH);
        }
        if let Some(color) = changes.color {
            self.check_color(&mut errors, color).await?;
        }
        errors.into_result()?;

        let patch = CartPatch {
            title,
            color_id: changes.color,
        };
        Ok(self.repos.carts.update(cart.id, &patch).await?)
    }

    /// Delete a cart and its lines.
    ///
    /// # Errors
    ///
    /// As [`Self::get`].
    pub async fn delete(&self, ctx: &RequestContext, id: CartId) -> Result<(), ResourceError> {
        let cart = self.owned_cart(ctx, id).await?;
        self.repos.carts.delete(cart.id).await?;
        tracing::info!(cart_id = %cart.id, "Cart deleted");
        Ok(())
    }

    // =========================================================================
    // Cart lines
    // =========================================================================

    /// # Errors
    ///
    /// As [`Self::get`], plus `Validation` for an unknown product or a
    /// quantity below one.
    pub async fn add_product(
        &self,
        ctx: &RequestContext,
        cart: CartId,
        input: NewCartProductInput,
    ) -> Result<CartProduct, ResourceError> {
        let cart = self.owned_cart(ctx, cart).await?;

        let mut errors = ValidationErrors::new();
        if !self.repos.catalog.product_exists(input.product).await? {
            errors.add("product", "does not exist");
        }
        check_quantity(&mut errors, input.quantity);
        errors.into_result()?;

        let line = NewCartProduct {
            product_id: input.product,
            quantity: input.quantity,
            measurement: input.measurement,
        };
        Ok(self.repos.carts.add_product(cart.id, &line).await?)
    }

    async fn owned_line(
        &self,
        ctx: &RequestContext,
        cart: CartId,
        id: CartProductId,
    ) -> Result<CartProduct, ResourceError> {
        let cart = self.owned_cart(ctx, cart).await?;
        self.repos
            .carts
            .get_product(cart.id, id)
            .await?
            .ok_or(ResourceError::NotFound)
    }

    /// # Errors
    ///
    /// `NotFound` when the line does not exist in this cart.
    pub async fn get_product(
        &self,
        ctx: &RequestContext,
        cart: CartId,
        id: CartProductId,
    ) -> Result<CartProduct, ResourceError> {
        self.owned_line(ctx, cart, id).await
    }

    /// # Errors
    ///
    /// As [`Self::get_product`], plus `Validation` for a quantity below one.
    pub async fn update_product(
        &self,
        ctx: &RequestContext,
        cart: CartId,
        id: CartProductId,
        changes: CartProductChanges,
    ) -> Result<CartProduct, ResourceError> {
        let line = self.owned_line(ctx, cart, id).await?;

        let mut errors = ValidationErrors::new();
        if let Some(quantity) = changes.quantity {
            check_quantity(&mut errors, quantity);
        }
        errors.into_result()?;

        let patch = CartProductPatch {
            quantity: changes.quantity,
            measurement: changes.measurement,
            is_completed: changes.is_completed,
        };
        Ok(self.repos.carts.update_product(line.id, &patch).await?)
    }

    /// # Errors
    ///
    /// As [`Self::get_product`].
    pub async fn delete_product(
        &self,
        ctx: &RequestContext,
        cart: CartId,
        id: CartProductId,
    ) -> Result<(), ResourceError> {
        let line = self.owned_line(ctx, cart, id).await?;
        self.repos.carts.delete_product(line.id).await?;
        Ok(())
    }

    /// Flip the completion flag and return the new value.
    ///
    /// # Errors
    ///
    /// As [`Self::get_product`].
    pub async fn toggle_completed(
        &self,
        ctx: &RequestContext,
        cart: CartId,
        id: CartProductId,
    ) -> Result<bool, ResourceError> {
        let line = self.owned_line(ctx, cart, id).await?;
        Ok(self.repos.carts.toggle_completed(line.id).await?)
    }
}

fn check_quantity(errors: &mut ValidationErrors, quantity: i32) {
    if quantity < 1 {
        errors.add("quantity", "must be at least 1");
    }
}
