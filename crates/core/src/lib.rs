//! Pantry Core - Shared domain types.
//!
//! This crate provides the types shared by every Pantry component:
//! - `server` - Mobile/admin HTTP API (device identity, carts, OTP auth)
//! - `cli` - Command-line tools for migrations and management
//!
//! # Architecture
//!
//! The core crate contains only types and validation rules - no I/O, no
//! database access, no HTTP clients. The `postgres` feature adds `sqlx`
//! encode/decode support so the same types can be bound into queries.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, phone numbers, device tokens, password policy and enums

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
