//! Core types for Pantry.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod device_token;
pub mod id;
pub mod password;
pub mod phone;
pub mod status;

pub use device_token::{DeviceToken, DeviceTokenError};
pub use id::*;
pub use password::{PasswordError, validate_password};
pub use phone::{Phone, PhoneError};
pub use status::*;
