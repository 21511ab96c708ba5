//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                                    - Liveness
//! GET  /health/ready                              - Store reachable
//!
//! # Under /api/v1
//!
//! # Users (open unless noted)
//! POST  /users/register
//! POST  /users/verify                             - optional Token header
//! POST  /users/login                              - optional Token header
//! POST  /users/forgot-password
//! PATCH /users/set-password                       - bearer
//! PATCH /users/update-password                    - bearer
//! GET   /users/profile, PATCH /users/profile      - bearer
//! POST  /users/logout                             - bearer, optional Token
//! POST  /users/token/refresh
//!
//! # Devices
//! POST /users/devices
//! GET  /users/devices/list                        - Token
//! POST /users/devices/logout                      - Token
//! POST /users/devices/logout-all                  - bearer
//!
//! # Carts (Token for the collection, Token or bearer by id)
//! GET/POST             /carts
//! GET/PATCH/DELETE     /carts/{id}
//! POST                 /carts/{id}/products
//! GET/PATCH/DELETE     /carts/{id}/products/{product_id}
//! POST                 /carts/{id}/products/{product_id}/completed
//!
//! # Recipes and questionnaires (Token or bearer)
//! POST         /recipes/{id}/ingredients
//! POST         /recipes/{id}/review
//! PATCH/DELETE /recipes/ratings/{id}
//! POST         /questionnaires/vote
//! DELETE       /questionnaires/votes/{id}
//!
//! # Releases
//! GET  /app-versions/latest
//!
//! # Admin (bearer, admin only)
//! GET    /admin/users
//! GET    /admin/users/statistics
//! GET    /admin/users/{id}
//! DELETE /admin/users/{id}/devices/{device_id}
//! POST   /admin/app-versions
//! POST   /admin/app-versions/{id}/activate
//! ```

pub mod admin;
pub mod app_versions;
pub mod carts;
pub mod devices;
pub mod health;
pub mod questionnaires;
pub mod recipes;
pub mod users;

use axum::{
    Router,
    routing::{delete, get, patch, post},
};

use crate::state::AppState;

/// Prefix for every versioned route.
pub const API_PREFIX: &str = "/api/v1";

/// Create the user and device routes router.
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(users::register))
        .route("/verify", post(users::verify))
        .route("/login", post(users::login))
        .route("/forgot-password", post(users::forgot_password))
        .route("/set-password", patch(users::set_password))
        .route("/update-password", patch(users::update_password))
        .route("/profile", get(users::profile).patch(users::update_profile))
        .route("/logout", post(users::logout))
        .route("/token/refresh", post(users::refresh))
        .route("/devices", post(devices::register))
        .route("/devices/list", get(devices::list))
        .route("/devices/logout", post(devices::logout))
        .route("/devices/logout-all", post(devices::logout_all))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(carts::list).post(carts::create))
        .route(
            "/{id}",
            get(carts::show).patch(carts::update).delete(carts::delete),
        )
        .route("/{id}/products", post(carts::add_product))
        .route(
            "/{id}/products/{product_id}",
            get(carts::show_product)
                .patch(carts::update_product)
                .delete(carts::delete_product),
        )
        .route(
            "/{id}/products/{product_id}/completed",
            post(carts::toggle_completed),
        )
}

/// Create the recipe routes router.
pub fn recipe_routes() -> Router<AppState> {
    Router::new()
        .route("/{id}/ingredients", post(recipes::add_ingredients))
        .route("/{id}/review", post(recipes::review))
        .route(
            "/ratings/{id}",
            patch(recipes::update_rating).delete(recipes::delete_rating),
        )
}

/// Create the questionnaire routes router.
pub fn questionnaire_routes() -> Router<AppState> {
    Router::new()
        .route("/vote", post(questionnaires::vote))
        .route("/votes/{id}", delete(questionnaires::delete_vote))
}

/// Create the admin routes router.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(admin::list_users))
        .route("/users/statistics", get(admin::statistics))
        .route("/users/{id}", get(admin::user_detail))
        .route(
            "/users/{id}/devices/{device_id}",
            delete(admin::logout_user_device),
        )
        .route("/app-versions", post(admin::publish_version))
        .route("/app-versions/{id}/activate", post(admin::activate_version))
}

/// Every versioned route, to be nested under [`API_PREFIX`].
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/users", user_routes())
        .nest("/carts", cart_routes())
        .nest("/recipes", recipe_routes())
        .nest("/questionnaires", questionnaire_routes())
        .route("/app-versions/latest", get(app_versions::latest))
        .nest("/admin", admin_routes())
}

/// Health checks plus the versioned API.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest(API_PREFIX, api_routes())
}
