//! Business logic.
//!
//! Services borrow repository ports from [`AppState`](crate::state::AppState)
//! for the duration of a request and return typed errors that the HTTP
//! layer maps onto message keys.

pub mod access;
pub mod admin;
pub mod app_versions;
pub mod carts;
pub mod devices;
pub mod guard;
pub mod identity;
pub mod otp;
pub mod passwords;
pub mod recipes;
pub mod tokens;
pub mod validation;
pub mod votes;
