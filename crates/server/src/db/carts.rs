//! Cart repository.
//!
//! Cart reads join the owning device so callers get the ownership chain
//! (`cart -> device -> user`) in the same row as the cart itself.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use pantry_core::{
    CartId, CartProductId, ColorId, DeviceId, Measurement, ProductId, UserId,
};

use super::RepositoryError;
use crate::models::{Cart, CartPatch, CartProduct, CartProductPatch, NewCartProduct};

/// Storage port for carts and their lines.
#[async_trait]
pub trait CartRepository: Send + Sync {
    /// Carts of `device`, plus every cart of `user`'s devices when given.
    async fn list_visible(
        &self,
        device: DeviceId,
        user: Option<UserId>,
    ) -> Result<Vec<Cart>, RepositoryError>;

    async fn get(&self, id: CartId) -> Result<Option<Cart>, RepositoryError>;

    /// Every existing cart among `ids`; unknown ids are skipped.
    async fn get_many(&self, ids: &[CartId]) -> Result<Vec<Cart>, RepositoryError>;

    async fn create(
        &self,
        device: DeviceId,
        title: &str,
        color: ColorId,
    ) -> Result<Cart, RepositoryError>;

    async fn update(&self, id: CartId, patch: &CartPatch) -> Result<Cart, RepositoryError>;

    /// Delete a cart and its lines.
    async fn delete(&self, id: CartId) -> Result<(), RepositoryError>;

    async fn list_products(&self, cart: CartId) -> Result<Vec<CartProduct>, RepositoryError>;

    async fn add_product(
        &self,
        cart: CartId,
        product: &NewCartProduct,
    ) -> Result<CartProduct, RepositoryError>;

    /// A line, only if it belongs to `cart`.
    async fn get_product(
        &self,
        cart: CartId,
        id: CartProductId,
    ) -> Result<Option<CartProduct>, RepositoryError>;

    async fn update_product(
        &self,
        id: CartProductId,
        patch: &CartProductPatch,
    ) -> Result<CartProduct, RepositoryError>;

    async fn delete_product(&self, id: CartProductId) -> Result<(), RepositoryError>;

    /// Flip `is_completed` in place; returns the new value.
    async fn toggle_completed(&self, id: CartProductId) -> Result<bool, RepositoryError>;

    /// Insert all lines or none.
    async fn add_products_bulk(
        &self,
        lines: &[(CartId, NewCartProduct)],
    ) -> Result<u64, RepositoryError>;
}

#[derive(sqlx::FromRow)]
struct CartRow {
    id: CartId,
    device_id: DeviceId,
    owner_user_id: Option<UserId>,
    title: String,
    color_id: ColorId,
    color_code: String,
    completed_products: i64,
    total_products: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CartRow> for Cart {
    fn from(row: CartRow) -> Self {
        Self {
            id: row.id,
            device_id: row.device_id,
            owner_user_id: row.owner_user_id,
            title: row.title,
            color_id: row.color_id,
            color_code: row.color_code,
            completed_products: row.completed_products,
            total_products: row.total_products,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CartProductRow {
    id: CartProductId,
    cart_id: CartId,
    product_id: ProductId,
    quantity: i32,
    measurement: Measurement,
    is_completed: bool,
}

impl From<CartProductRow> for CartProduct {
    fn from(row: CartProductRow) -> Self {
        Self {
            id: row.id,
            cart_id: row.cart_id,
            product_id: row.product_id,
            quantity: row.quantity,
            measurement: row.measurement,
            is_completed: row.is_completed,
        }
    }
}

/// `PostgreSQL` cart repository.
#[derive(Clone)]
pub struct PgCartRepository {
    pool: PgPool,
}

impl PgCartRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CartRepository for PgCartRepository {
    async fn list_visible(
        &self,
        device: DeviceId,
        user: Option<UserId>,
    ) -> Result<Vec<Cart>, RepositoryError> {
        let rows = sqlx::query_as::<_, CartRow>(
            r"
            SELECT c.id, c.device_id, d.user_id AS owner_user_id, c.title, c.color_id,
                   col.code AS color_code,
                   count(cp.id) FILTER (WHERE cp.is_completed) AS completed_products,
                   count(cp.id) AS total_products,
                   c.created_at, c.updated_at
            FROM cart c
            JOIN device d ON d.id = c.device_id
            JOIN color col ON col.id = c.color_id
            LEFT JOIN cart_product cp ON cp.cart_id = c.id
            WHERE c.device_id = $1 OR ($2::INTEGER IS NOT NULL AND d.user_id = $2)
            GROUP BY c.id, d.user_id, col.code
            ORDER BY c.id
            ",
        )
        .bind(device)
        .bind(user)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get(&self, id: CartId) -> Result<Option<Cart>, RepositoryError> {
        let row = sqlx::query_as::<_, CartRow>(
            r"
            SELECT c.id, c.device_id, d.user_id AS owner_user_id, c.title, c.color_id,
                   col.code AS color_code,
                   count(cp.id) FILTER (WHERE cp.is_completed) AS completed_products,
                   count(cp.id) AS total_products,
                   c.created_at, c.updated_at
            FROM cart c
            JOIN device d ON d.id = c.device_id
            JOIN color col ON col.id = c.color_id
            LEFT JOIN cart_product cp ON cp.cart_id = c.id
            WHERE c.id = $1
            GROUP BY c.id, d.user_id, col.code
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn get_many(&self, ids: &[CartId]) -> Result<Vec<Cart>, RepositoryError> {
        let rows = sqlx::query_as::<_, CartRow>(
            r"
            SELECT c.id, c.device_id, d.user_id AS owner_user_id, c.title, c.color_id,
                   col.code AS color_code,
                   count(cp.id) FILTER (WHERE cp.is_completed) AS completed_products,
                   count(cp.id) AS total_products,
                   c.created_at, c.updated_at
            FROM cart c
            JOIN device d ON d.id = c.device_id
            JOIN color col ON col.id = c.color_id
            LEFT JOIN cart_product cp ON cp.cart_id = c.id
            WHERE c.id = ANY($1)
            GROUP BY c.id, d.user_id, col.code
            ORDER BY c.id
            ",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn create(
        &self,
        device: DeviceId,
        title: &str,
        color: ColorId,
    ) -> Result<Cart, RepositoryError> {
        let id: CartId = sqlx::query_scalar(
            "INSERT INTO cart (device_id, title, color_id) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(device)
        .bind(title)
        .bind(color)
        .fetch_one(&self.pool)
        .await?;

        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    async fn update(&self, id: CartId, patch: &CartPatch) -> Result<Cart, RepositoryError> {
        let result = sqlx::query(
            r"
            UPDATE cart
            SET title = COALESCE($2, title),
                color_id = COALESCE($3, color_id),
                updated_at = now()
            WHERE id = $1
            ",
        )
        .bind(id)
        .bind(patch.title.as_deref())
        .bind(patch.color_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    async fn delete(&self, id: CartId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM cart WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_products(&self, cart: CartId) -> Result<Vec<CartProduct>, RepositoryError> {
        let rows = sqlx::query_as::<_, CartProductRow>(
            r"
            SELECT id, cart_id, product_id, quantity, measurement, is_completed
            FROM cart_product
            WHERE cart_id = $1
            ORDER BY id
            ",
        )
        .bind(cart)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn add_product(
        &self,
        cart: CartId,
        product: &NewCartProduct,
    ) -> Result<CartProduct, RepositoryError> {
        let row = sqlx::query_as::<_, CartProductRow>(
            r"
            INSERT INTO cart_product (cart_id, product_id, quantity, measurement)
            VALUES ($1, $2, $3, $4)
            RETURNING id, cart_id, product_id, quantity, measurement, is_completed
            ",
        )
        .bind(cart)
        .bind(product.product_id)
        .bind(product.quantity)
        .bind(product.measurement)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn get_product(
        &self,
        cart: CartId,
        id: CartProductId,
    ) -> Result<Option<CartProduct>, RepositoryError> {
        let row = sqlx::query_as::<_, CartProductRow>(
            r"
            SELECT id, cart_id, product_id, quantity, measurement, is_completed
            FROM cart_product
            WHERE id = $1 AND cart_id = $2
            ",
        )
        .bind(id)
        .bind(cart)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn update_product(
        &self,
        id: CartProductId,
        patch: &CartProductPatch,
    ) -> Result<CartProduct, RepositoryError> {
        let row = sqlx::query_as::<_, CartProductRow>(
            r"
            UPDATE cart_product
            SET quantity = COALESCE($2, quantity),
                measurement = COALESCE($3, measurement),
                is_completed = COALESCE($4, is_completed)
            WHERE id = $1
            RETURNING id, cart_id, product_id, quantity, measurement, is_completed
            ",
        )
        .bind(id)
        .bind(patch.quantity)
        .bind(patch.measurement)
        .bind(patch.is_completed)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        Ok(row.into())
    }

    async fn delete_product(&self, id: CartProductId) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM cart_product WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn toggle_completed(&self, id: CartProductId) -> Result<bool, RepositoryError> {
        let completed: Option<bool> = sqlx::query_scalar(
            r"
            UPDATE cart_product
            SET is_completed = NOT is_completed
            WHERE id = $1
            RETURNING is_completed
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        completed.ok_or(RepositoryError::NotFound)
    }

    async fn add_products_bulk(
        &self,
        lines: &[(CartId, NewCartProduct)],
    ) -> Result<u64, RepositoryError> {
        let cart_ids: Vec<i32> = lines.iter().map(|(cart, _)| cart.as_i32()).collect();
        let product_ids: Vec<i32> = lines.iter().map(|(_, p)| p.product_id.as_i32()).collect();
        let quantities: Vec<i32> = lines.iter().map(|(_, p)| p.quantity).collect();
        let measurements: Vec<&str> = lines.iter().map(|(_, p)| p.measurement.as_str()).collect();

        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r"
            INSERT INTO cart_product (cart_id, product_id, quantity, measurement)
            SELECT * FROM UNNEST($1::INTEGER[], $2::INTEGER[], $3::INTEGER[], $4::TEXT[])
            ",
        )
        .bind(&cart_ids)
        .bind(&product_ids)
        .bind(&quantities)
        .bind(&measurements)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE cart SET updated_at = now() WHERE id = ANY($1)")
            .bind(&cart_ids)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected())
    }
}
