//! Domain models.
//!
//! These types are validated domain objects, separate from the row types the
//! `PostgreSQL` repositories decode into. Response shapes that hide internal
//! fields (password hashes, other devices' tokens) live next to the model
//! they project.

pub mod app_version;
pub mod cart;
pub mod catalog;
pub mod device;
pub mod otp;
pub mod rating;
pub mod user;
pub mod vote;

pub use app_version::{AppVersion, NewAppVersion};
pub use cart::{Cart, CartPatch, CartProduct, CartProductPatch, NewCartProduct};
pub use catalog::{Answer, Color, Ingredient, Recipe};
pub use device::{Device, DeviceStatistics, DeviceView, NewDevice, RegisteredDevice};
pub use otp::PhoneOtp;
pub use rating::Rating;
pub use user::{NewUser, ProfileUpdate, User, UserProfile};
pub use vote::Vote;
